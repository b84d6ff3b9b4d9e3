use super::GuestOnly;
use crate::api::OAuthProvider;
use crate::components::ui::{
    Alert, AlertDescription, Button, ButtonSize, Card, CardContent, CardDescription, CardHeader,
    CardTitle,
};
use crate::state::AppContext;
use crate::util::current_origin;
use leptos::logging::error;
use leptos::prelude::*;

#[component]
pub fn LoginPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let failure: RwSignal<Option<String>> = RwSignal::new(None);
    let redirecting: RwSignal<bool> = RwSignal::new(false);

    let on_sign_in = move |_| {
        let redirect_to = format!("{}/auth/callback", current_origin());
        redirecting.set(true);
        failure.set(None);

        // On success the browser leaves the app.
        if let Err(e) = app_state.0.client.sign_in(OAuthProvider::Google, &redirect_to) {
            error!("Sign-in error: {e}");
            failure.set(Some(e.to_string()));
            redirecting.set(false);
        }
    };

    view! {
        <GuestOnly>
            <div class="min-h-screen bg-background">
                <div class="mx-auto flex min-h-screen w-full max-w-sm flex-col justify-center px-4 py-10">
                    <Card>
                        <CardHeader>
                            <CardTitle class="text-lg">"Smart Bookmarks"</CardTitle>
                            <CardDescription class="text-xs">"Save links and see them on every device."</CardDescription>
                        </CardHeader>

                        <CardContent>
                            <div class="flex flex-col gap-3">
                                <Show when=move || failure.get().is_some() fallback=|| ().into_view()>
                                    {move || {
                                        failure.get().map(|e| {
                                            view! {
                                                <Alert class="border-destructive/30">
                                                    <AlertDescription class="text-destructive text-xs">
                                                        {e}
                                                    </AlertDescription>
                                                </Alert>
                                            }
                                        })
                                    }}
                                </Show>

                                <Button
                                    class="w-full"
                                    size=ButtonSize::Sm
                                    attr:disabled=move || redirecting.get()
                                    on:click=on_sign_in
                                >
                                    "Sign in with Google"
                                </Button>
                            </div>
                        </CardContent>
                    </Card>
                </div>
            </div>
        </GuestOnly>
    }
}
