use crate::components::ui::Spinner;
use crate::state::AppContext;
use crate::util::spawn_scoped;
use leptos::logging::{error, log};
use leptos::prelude::*;
use leptos_router::hooks::{use_navigate, use_query_map};
use leptos_router::NavigateOptions;

/// Landing route of the OAuth redirect (`/auth/callback?code=...`).
#[component]
pub fn AuthCallbackPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let navigate = StoredValue::new(use_navigate());
    let query = use_query_map().get_untracked();

    if let Some(description) = query.get("error_description") {
        error!("OAuth error: {description}");
    }
    let code = query.get("code");

    let client = app_state.0.client.clone();
    spawn_scoped(async move {
        let target = match code {
            Some(code) => match client.exchange_code(&code).await {
                Ok(session) => {
                    log!("Signed in as {}", session.user.id);
                    "/"
                }
                Err(e) => {
                    error!("Code exchange failed: {e}");
                    "/login"
                }
            },
            None => "/login",
        };

        navigate.with_value(|nav| {
            nav(
                target,
                NavigateOptions {
                    replace: true,
                    ..Default::default()
                },
            )
        });
    });

    view! {
        <div class="flex min-h-screen items-center justify-center gap-2 text-xs text-muted-foreground">
            <Spinner />
            "Signing in..."
        </div>
    }
}
