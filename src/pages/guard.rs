use crate::state::{check_session, has_session, AppContext, GuardOutcome};
use crate::util::spawn_scoped;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::use_navigate;
use leptos_router::NavigateOptions;

fn replace() -> NavigateOptions {
    NavigateOptions {
        replace: true,
        ..Default::default()
    }
}

/// Renders `children` only once a session has been confirmed.
///
/// The check runs once per activation. No session, or a failed check, sends
/// the user to `/login` without ever rendering the guarded view.
#[component]
pub fn RequireSession(children: ChildrenFn) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let principal = app_state.0.principal;
    let navigate = StoredValue::new(use_navigate());
    let checked: RwSignal<bool> = RwSignal::new(false);

    let client = app_state.0.client.clone();
    spawn_scoped(async move {
        match check_session(&client).await {
            GuardOutcome::Render(user) => {
                principal.set(Some(user));
                checked.set(true);
            }
            GuardOutcome::RedirectToLogin => navigate.with_value(|nav| nav("/login", replace())),
        }
    });

    // Store children so the view macro sees an `Fn` (not an `FnOnce`).
    let children = StoredValue::new(children);
    let ready = move || checked.get() && principal.with(|p| p.is_some());

    view! {
        <Show
            when=ready
            fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Loading..."</div> }
        >
            {move || children.with_value(|c| c())}
        </Show>
    }
}

/// Views for signed-out users. A visitor who already has a session is sent
/// to the main view.
#[component]
pub fn GuestOnly(children: Children) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let navigate = StoredValue::new(use_navigate());

    let client = app_state.0.client.clone();
    spawn_scoped(async move {
        if has_session(&client).await {
            navigate.with_value(|nav| nav("/", replace()));
        }
    });

    children()
}

/// Sign out remotely (best effort), forget the session and go to `/login`.
///
/// Also used when the backend stops accepting the stored token.
pub(crate) fn use_sign_out() -> Callback<()> {
    let state = expect_context::<AppContext>().0;
    let navigate = StoredValue::new(use_navigate());

    Callback::new(move |_| {
        let client = state.client.clone();
        let principal = state.principal;
        spawn_local(async move {
            client.sign_out().await;
            navigate.with_value(|nav| nav("/login", replace()));
            principal.set(None);
        });
    })
}
