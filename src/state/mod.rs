mod bookmarks;
mod draft;
mod session;

pub(crate) use bookmarks::{load_bookmarks, request_delete, subscribe_bookmarks, BookmarkList, LoadStatus};
pub(crate) use draft::{submit_bookmark, BookmarkDraft};
pub(crate) use session::{check_session, has_session, GuardOutcome};

use crate::api::SupabaseClient;
use crate::models::Principal;
use leptos::prelude::*;

#[derive(Clone)]
pub(crate) struct AppState {
    pub client: SupabaseClient,

    /// Set by the session guard once a session has been confirmed.
    pub principal: RwSignal<Option<Principal>>,

    /// Last insert/delete failure, shown above the list until the next action.
    pub notice: RwSignal<Option<String>>,
}

impl AppState {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            client,
            principal: RwSignal::new(None),
            notice: RwSignal::new(None),
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);
