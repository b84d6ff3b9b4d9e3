use super::{ApiError, ApiResult, SupabaseClient};
use crate::gateway::{BookmarkGateway, ChangeHandler};
use crate::models::{Bookmark, NewBookmark, Principal, Session};
use crate::realtime::RealtimeSubscription;
use crate::storage::load_session_from_storage;
use crate::util::now_secs;

const TABLE_PATH: &str = "/rest/v1/bookmarks";

impl SupabaseClient {
    pub(crate) fn select_bookmarks_url(&self, owner_id: &str) -> String {
        format!(
            "{}?select=*&user_id=eq.{}&order=created_at.desc",
            self.url(TABLE_PATH),
            urlencoding::encode(owner_id)
        )
    }

    pub(crate) fn bookmark_by_id_url(&self, id: &str) -> String {
        format!("{}?id=eq.{}", self.url(TABLE_PATH), urlencoding::encode(id))
    }
}

/// Token for the realtime join. An expired token would only be rejected by the
/// server after the socket opened.
fn realtime_token(session: Option<Session>, now_secs: i64) -> ApiResult<String> {
    match session {
        Some(s) if !s.is_expired(now_secs) => Ok(s.access_token),
        _ => Err(ApiError::unauthorized()),
    }
}

impl BookmarkGateway for SupabaseClient {
    type Subscription = RealtimeSubscription;

    async fn get_session(&self) -> ApiResult<Option<Session>> {
        self.load_session().await
    }

    async fn get_current_user(&self) -> ApiResult<Option<Principal>> {
        self.fetch_user().await
    }

    async fn insert(&self, record: &NewBookmark) -> ApiResult<Bookmark> {
        let token = self.access_token().await?;
        let req = self
            .with_auth_headers(
                reqwest::Client::new().post(self.url(TABLE_PATH)),
                Some(token.as_str()),
            )
            .header("Prefer", "return=representation")
            .json(record);

        // PostgREST answers a single-row insert with a one-element array.
        let rows: Vec<Bookmark> = self.send_json(req).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::parse("Insert returned no row"))
    }

    async fn delete_by_id(&self, id: &str) -> ApiResult<()> {
        let token = self.access_token().await?;
        let req = self.with_auth_headers(
            reqwest::Client::new().delete(self.bookmark_by_id_url(id)),
            Some(token.as_str()),
        );
        self.send(req).await.map(|_| ())
    }

    async fn query(&self, owner_id: &str) -> ApiResult<Vec<Bookmark>> {
        let token = self.access_token().await?;
        let req = self.with_auth_headers(
            reqwest::Client::new().get(self.select_bookmarks_url(owner_id)),
            Some(token.as_str()),
        );
        self.send_json(req).await
    }

    fn subscribe_to_changes(
        &self,
        owner_id: &str,
        on_change: ChangeHandler,
    ) -> ApiResult<RealtimeSubscription> {
        // Realtime applies row-level security with the user's JWT. The session
        // guard's `get_session` refreshed it just before the list view
        // subscribes, so it is not refreshed again here.
        let token = realtime_token(load_session_from_storage(), now_secs())?;
        RealtimeSubscription::open(&self.realtime_url(), owner_id, &token, on_change)
    }
}
