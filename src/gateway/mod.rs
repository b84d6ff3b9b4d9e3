//! Contract between the views and the hosted backend.
//!
//! The production implementation is [`crate::api::SupabaseClient`]; tests run
//! the same operations against the in-memory remote in `memory`.

#[cfg(test)]
pub(crate) mod memory;

use crate::api::ApiResult;
use crate::models::{Bookmark, NewBookmark, Principal, Session};
use std::rc::Rc;

/// A row-level change pushed by the remote for one owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BookmarkChange {
    Insert(Bookmark),
    Update(Bookmark),
    /// Deletes only carry the primary key.
    Delete { id: String },
}

pub(crate) type ChangeHandler = Rc<dyn Fn(BookmarkChange)>;

/// A live change stream. Once `cancel` returns the handler is never called again.
pub(crate) trait Subscription {
    fn cancel(self);
}

pub(crate) trait BookmarkGateway {
    type Subscription: Subscription + 'static;

    async fn get_session(&self) -> ApiResult<Option<Session>>;

    async fn get_current_user(&self) -> ApiResult<Option<Principal>>;

    async fn insert(&self, record: &NewBookmark) -> ApiResult<Bookmark>;

    async fn delete_by_id(&self, id: &str) -> ApiResult<()>;

    /// All rows owned by `owner_id`, newest first.
    async fn query(&self, owner_id: &str) -> ApiResult<Vec<Bookmark>>;

    fn subscribe_to_changes(
        &self,
        owner_id: &str,
        on_change: ChangeHandler,
    ) -> ApiResult<Self::Subscription>;
}
