use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use time::OffsetDateTime;

/// A row of the remote `bookmarks` table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    pub user_id: String,

    /// Assigned by the remote on insert.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Bookmark {
    /// Newest first; equal timestamps fall back to the id so the order never
    /// depends on delivery order.
    pub fn display_order(a: &Bookmark, b: &Bookmark) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    }
}

/// Insert payload. `id` and `created_at` come back from the remote.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct NewBookmark {
    pub title: String,
    pub url: String,
    pub user_id: String,
}

/// The authenticated identity behind a session.
///
/// GoTrue returns a much larger user object; only what the app reads is kept.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Principal {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Unix seconds. Older token responses only carry `expires_in`.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing)]
    pub expires_in: Option<i64>,

    pub user: Principal,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the token endpoint omitted it.
    pub fn with_issued_at(mut self, now_secs: i64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|s| now_secs + s);
        }
        self
    }

    /// A small margin keeps us from sending a token that expires in flight.
    pub fn is_expired(&self, now_secs: i64) -> bool {
        match self.expires_at {
            Some(at) => now_secs + 10 >= at,
            None => false,
        }
    }
}
