use crate::api::SupabaseClient;
use crate::pages::{AuthCallbackPage, HomePage, LoginPage, RequireSession};
use crate::state::{AppContext, AppState};
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App() -> impl IntoView {
    // One client per app instance, handed down through context.
    provide_context(AppContext(AppState::new(SupabaseClient::from_env())));

    view! {
        <Router>
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Not found"</div> }>
                <Route path=path!("login") view=LoginPage />
                <Route path=path!("auth/callback") view=AuthCallbackPage />
                <Route path=path!("") view=move || view! {
                    <RequireSession>
                        <HomePage />
                    </RequireSession>
                } />
            </Routes>
        </Router>
    }
}
