use crate::api::{ApiError, ApiResult};
use crate::gateway::BookmarkGateway;
use crate::models::{Bookmark, NewBookmark};
use crate::util::is_blank;
use leptos::logging::{error, log};

/// Contents of the creation form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct BookmarkDraft {
    pub title: String,
    pub url: String,
}

impl BookmarkDraft {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }

    /// Both fields must have something other than whitespace. The URL is not
    /// checked for well-formedness.
    pub fn is_submittable(&self) -> bool {
        !is_blank(&self.title) && !is_blank(&self.url)
    }

    fn into_record(self, user_id: String) -> NewBookmark {
        NewBookmark {
            title: self.title.trim().to_string(),
            url: self.url.trim().to_string(),
            user_id,
        }
    }
}

/// Resolve the current principal and insert the draft under their id.
///
/// An incomplete draft is rejected before anything reaches the gateway and is
/// left as it was. Otherwise the draft is emptied whether the insert succeeds
/// or fails. The returned row is informational only: the list picks it up from
/// the insert echo.
pub(crate) async fn submit_bookmark<G: BookmarkGateway>(
    gateway: &G,
    draft: &mut BookmarkDraft,
) -> ApiResult<Bookmark> {
    if !draft.is_submittable() {
        return Err(ApiError::invalid("Title and URL are required"));
    }
    let draft = std::mem::take(draft);

    let user = gateway
        .get_current_user()
        .await?
        .ok_or_else(ApiError::unauthorized)?;

    match gateway.insert(&draft.into_record(user.id)).await {
        Ok(row) => {
            log!("Bookmark added: {}", row.id);
            Ok(row)
        }
        Err(e) => {
            error!("Insert error: {e}");
            Err(e)
        }
    }
}
