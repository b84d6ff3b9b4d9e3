use crate::gateway::BookmarkGateway;
use crate::models::Principal;
use leptos::logging::error;

/// What a guarded view does after the one-time session check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum GuardOutcome {
    Render(Principal),
    RedirectToLogin,
}

/// A failed check counts as "no session": the user lands on the login view
/// and nothing guarded is rendered.
pub(crate) async fn check_session<G: BookmarkGateway>(gateway: &G) -> GuardOutcome {
    match gateway.get_session().await {
        Ok(Some(session)) => GuardOutcome::Render(session.user),
        Ok(None) => GuardOutcome::RedirectToLogin,
        Err(e) => {
            error!("Session check failed: {e}");
            GuardOutcome::RedirectToLogin
        }
    }
}

/// Whether a visitor on a guest-only view already has a session and should
/// go to the main view instead.
pub(crate) async fn has_session<G: BookmarkGateway>(gateway: &G) -> bool {
    matches!(gateway.get_session().await, Ok(Some(_)))
}
