use super::bookmarks::{AddBookmarkForm, BookmarkListView, WriteNotice};
use super::use_sign_out;
use crate::components::ui::{Button, ButtonSize, ButtonVariant};
use crate::state::AppContext;
use leptos::prelude::*;

#[component]
pub fn HomePage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let principal = app_state.0.principal;
    let sign_out = use_sign_out();

    let email = move || {
        principal.with(|p| {
            p.as_ref()
                .and_then(|p| p.email.clone())
                .unwrap_or_default()
        })
    };

    view! {
        <div class="min-h-screen bg-background">
            <header class="border-b">
                <div class="mx-auto flex w-full max-w-2xl items-center justify-between px-4 py-3">
                    <div class="text-sm font-medium text-foreground">"My Bookmarks"</div>
                    <div class="flex items-center gap-3">
                        <span class="text-xs text-muted-foreground">{email}</span>
                        <Button
                            variant=ButtonVariant::Outline
                            size=ButtonSize::Sm
                            on:click=move |_| sign_out.run(())
                        >
                            "Sign out"
                        </Button>
                    </div>
                </div>
            </header>

            <main class="mx-auto flex w-full max-w-2xl flex-col gap-4 px-4 py-6">
                <AddBookmarkForm />
                <WriteNotice />
                <BookmarkListView />
            </main>
        </div>
    }
}
