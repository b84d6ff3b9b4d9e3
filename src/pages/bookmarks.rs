use super::use_sign_out;
use crate::api::{ApiError, SupabaseClient};
use crate::components::ui::{
    Alert, AlertDescription, Button, ButtonSize, ButtonVariant, Card, CardContent, CardHeader,
    CardTitle, Input, Label, Spinner,
};
use crate::gateway::{BookmarkGateway, Subscription};
use crate::models::Bookmark;
use crate::state::{
    load_bookmarks, request_delete, submit_bookmark, subscribe_bookmarks, AppContext,
    BookmarkDraft, BookmarkList, LoadStatus,
};
use crate::util::spawn_scoped;
use leptos::logging::error;
use leptos::prelude::*;

type LiveFeed = <SupabaseClient as BookmarkGateway>::Subscription;

/// Insert and delete failures share one notice; an expired session ends the
/// visit instead.
fn report_write_failure(e: ApiError, notice: RwSignal<Option<String>>, sign_out: Callback<()>) {
    if e.is_unauthorized() {
        sign_out.run(());
    } else {
        notice.set(Some(e.to_string()));
    }
}

#[component]
pub fn WriteNotice() -> impl IntoView {
    let notice = expect_context::<AppContext>().0.notice;

    view! {
        <Show when=move || notice.with(|n| n.is_some()) fallback=|| ().into_view()>
            {move || {
                notice.get().map(|message| {
                    view! {
                        <Alert class="border-destructive/30">
                            <AlertDescription class="text-destructive text-xs">
                                {message}
                            </AlertDescription>
                        </Alert>
                    }
                })
            }}
        </Show>
    }
}

#[component]
pub fn AddBookmarkForm() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let notice = app_state.0.notice;
    let client = StoredValue::new(app_state.0.client.clone());
    let sign_out = use_sign_out();

    let title: RwSignal<String> = RwSignal::new(String::new());
    let url: RwSignal<String> = RwSignal::new(String::new());
    let submitting: RwSignal<bool> = RwSignal::new(false);

    let can_submit = move || {
        !submitting.get() && BookmarkDraft::new(title.get(), url.get()).is_submittable()
    };

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();

        let mut draft = BookmarkDraft::new(title.get_untracked(), url.get_untracked());
        if submitting.get_untracked() || !draft.is_submittable() {
            return;
        }

        submitting.set(true);
        notice.set(None);

        let gateway = client.get_value();
        spawn_scoped(async move {
            let result = submit_bookmark(&gateway, &mut draft).await;

            // The new row shows up through the insert echo, not from here.
            title.set(draft.title);
            url.set(draft.url);
            submitting.set(false);

            if let Err(e) = result {
                report_write_failure(e, notice, sign_out);
            }
        });
    };

    view! {
        <Card>
            <CardHeader>
                <CardTitle class="text-sm">"Add Bookmark"</CardTitle>
            </CardHeader>
            <CardContent>
                <form class="flex flex-col gap-3" on:submit=on_submit>
                    <div class="flex flex-col gap-1.5">
                        <Label html_for="bookmark-title" class="text-xs">"Title"</Label>
                        <Input
                            id="bookmark-title"
                            placeholder="Bookmark title"
                            bind_value=title
                            disabled=Signal::derive(move || submitting.get())
                            class="h-8 text-sm"
                        />
                    </div>

                    <div class="flex flex-col gap-1.5">
                        <Label html_for="bookmark-url" class="text-xs">"URL"</Label>
                        <Input
                            id="bookmark-url"
                            r#type="url"
                            placeholder="https://example.com"
                            bind_value=url
                            disabled=Signal::derive(move || submitting.get())
                            class="h-8 text-sm"
                        />
                    </div>

                    <Button
                        class="w-full"
                        size=ButtonSize::Sm
                        attr:disabled=move || !can_submit()
                    >
                        <span class="inline-flex items-center gap-2">
                            <Show when=move || submitting.get() fallback=|| ().into_view()>
                                <Spinner />
                            </Show>
                            {move || if submitting.get() { "Adding..." } else { "Add Bookmark" }}
                        </span>
                    </Button>
                </form>
            </CardContent>
        </Card>
    }
}

#[component]
fn BookmarkRow(bookmark: Bookmark, on_delete: Callback<String>) -> impl IntoView {
    let Bookmark { id, title, url, .. } = bookmark;
    let href = url.clone();

    view! {
        <li class="flex items-center justify-between gap-3 rounded-md border px-3 py-2">
            <div class="min-w-0 flex-1">
                <div class="truncate text-sm font-medium text-foreground">{title}</div>
                <a
                    href=href
                    target="_blank"
                    rel="noopener noreferrer"
                    class="block truncate text-xs text-primary underline-offset-4 hover:underline"
                >
                    {url}
                </a>
            </div>
            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Sm
                class="text-destructive"
                attr:title="Delete"
                on:click=move |_| on_delete.run(id.clone())
            >
                "Delete"
            </Button>
        </li>
    }
}

/// The signed-in user's bookmarks, kept live by the realtime feed.
///
/// The feed is opened once the principal is known, replaced when the
/// principal changes and closed when the view goes away.
#[component]
pub fn BookmarkListView() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let principal = app_state.0.principal;
    let notice = app_state.0.notice;
    let client = StoredValue::new(app_state.0.client.clone());
    let sign_out = use_sign_out();

    let list: RwSignal<BookmarkList> = RwSignal::new(BookmarkList::new());
    let feed: StoredValue<Option<LiveFeed>, LocalStorage> = StoredValue::new_local(None);
    let owner_id = Memo::new(move |_| principal.with(|p| p.as_ref().map(|p| p.id.clone())));
    let status = Memo::new(move |_| list.with(|l| l.status().clone()));

    Effect::new(move |_| {
        let Some(owner_id) = owner_id.get() else {
            return;
        };

        list.set(BookmarkList::new());

        // Runs on the next owner change and when the view is disposed.
        on_cleanup(move || {
            feed.try_update_value(|f| {
                if let Some(f) = f.take() {
                    f.cancel();
                }
            });
        });

        let gateway = client.get_value();
        match subscribe_bookmarks(&gateway, &owner_id, move |change| {
            list.update(|l| l.apply(change));
        }) {
            Ok(f) => feed.set_value(Some(f)),
            Err(e) => error!("Realtime subscription failed: {e}"),
        }

        spawn_scoped(async move {
            let result = load_bookmarks(&gateway, &owner_id).await;
            if matches!(&result, Err(e) if e.is_unauthorized()) {
                sign_out.run(());
                return;
            }
            list.update(|l| l.apply_snapshot(result));
        });
    });

    let on_delete = Callback::new(move |id: String| {
        notice.set(None);
        let gateway = client.get_value();
        spawn_scoped(async move {
            if let Err(e) = request_delete(&gateway, &id).await {
                report_write_failure(e, notice, sign_out);
            }
        });
    });

    view! {
        {move || match status.get() {
            LoadStatus::Loading => view! {
                <div class="flex items-center gap-2 text-xs text-muted-foreground">
                    <Spinner />
                    "Loading bookmarks..."
                </div>
            }
            .into_any(),
            LoadStatus::Error(message) => view! {
                <div class="text-xs text-destructive">{format!("Error: {message}")}</div>
            }
            .into_any(),
            LoadStatus::Ready => view! {
                <Card>
                    <CardHeader>
                        <CardTitle class="text-sm">
                            {move || format!("My Bookmarks ({})", list.with(|l| l.len()))}
                        </CardTitle>
                    </CardHeader>
                    <CardContent>
                        <Show
                            when=move || !list.with(|l| l.is_empty())
                            fallback=|| view! {
                                <div class="text-xs text-muted-foreground">"No bookmarks yet. Add one above!"</div>
                            }
                        >
                            <ul class="flex flex-col gap-2">
                                <For
                                    each=move || list.with(|l| l.entries().to_vec())
                                    key=|b| (b.id.clone(), b.title.clone(), b.url.clone())
                                    let:bookmark
                                >
                                    <BookmarkRow bookmark=bookmark on_delete=on_delete />
                                </For>
                            </ul>
                        </Show>
                    </CardContent>
                </Card>
            }
            .into_any(),
        }}
    }
}
