use super::{BookmarkChange, BookmarkGateway, ChangeHandler, Subscription};
use crate::api::{ApiError, ApiResult};
use crate::models::{Bookmark, NewBookmark, Principal, Session};
use std::cell::RefCell;
use std::rc::Rc;
use time::{Duration, OffsetDateTime};

#[derive(Default)]
struct Table {
    rows: Vec<Bookmark>,
    clock: i64,
    next_row_id: u64,
    subscribers: Vec<(u64, String, ChangeHandler)>,
    next_sub_id: u64,
    writes: usize,
    fail_next: Option<ApiError>,
    fail_next_insert: Option<ApiError>,
}

/// One shared remote table with owner-filtered fan-out. Every
/// [`MemoryGateway`] built from it behaves like a separate browser session.
#[derive(Clone, Default)]
pub(crate) struct MemoryRemote(Rc<RefCell<Table>>);

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_for(&self, user_id: &str) -> MemoryGateway {
        MemoryGateway {
            remote: self.clone(),
            user: Some(Principal {
                id: user_id.to_string(),
                email: Some(format!("{user_id}@example.com")),
            }),
        }
    }

    pub fn signed_out(&self) -> MemoryGateway {
        MemoryGateway {
            remote: self.clone(),
            user: None,
        }
    }

    pub fn bookmark(id: &str, owner: &str, created_secs: i64) -> Bookmark {
        Bookmark {
            id: id.to_string(),
            title: format!("title {id}"),
            url: format!("https://example.com/{id}"),
            user_id: owner.to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(created_secs),
        }
    }

    /// Put a row in place without notifying anyone.
    pub fn seed(&self, row: Bookmark) {
        let mut t = self.0.borrow_mut();
        t.clock = t.clock.max(row.created_at.unix_timestamp());
        t.rows.push(row);
    }

    pub fn fail_next(&self, e: ApiError) {
        self.0.borrow_mut().fail_next = Some(e);
    }

    /// Like `fail_next`, but only the next insert fails.
    pub fn fail_next_insert(&self, e: ApiError) {
        self.0.borrow_mut().fail_next_insert = Some(e);
    }

    pub fn writes(&self) -> usize {
        self.0.borrow().writes
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.borrow().subscribers.len()
    }

    pub fn rows_for(&self, owner_id: &str) -> Vec<Bookmark> {
        let mut rows: Vec<Bookmark> = self
            .0
            .borrow()
            .rows
            .iter()
            .filter(|b| b.user_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(Bookmark::display_order);
        rows
    }

    /// Simulate an edit made elsewhere (e.g. the dashboard).
    pub fn rename(&self, id: &str, title: &str) {
        let updated = {
            let mut t = self.0.borrow_mut();
            let Some(row) = t.rows.iter_mut().find(|b| b.id == id) else {
                return;
            };
            row.title = title.to_string();
            row.clone()
        };
        let owner = updated.user_id.clone();
        self.publish(&owner, BookmarkChange::Update(updated));
    }

    fn take_failure(&self) -> ApiResult<()> {
        match self.0.borrow_mut().fail_next.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // Handlers are cloned out first so they can call back into the remote.
    fn publish(&self, owner_id: &str, change: BookmarkChange) {
        let handlers: Vec<ChangeHandler> = self
            .0
            .borrow()
            .subscribers
            .iter()
            .filter(|(_, owner, _)| owner == owner_id)
            .map(|(_, _, h)| h.clone())
            .collect();
        for h in handlers {
            h(change.clone());
        }
    }
}

#[derive(Clone)]
pub(crate) struct MemoryGateway {
    remote: MemoryRemote,
    user: Option<Principal>,
}

impl MemoryGateway {
    fn require_user(&self) -> ApiResult<&Principal> {
        self.user.as_ref().ok_or_else(ApiError::unauthorized)
    }
}

pub(crate) struct MemorySubscription {
    remote: MemoryRemote,
    id: u64,
}

impl Subscription for MemorySubscription {
    fn cancel(self) {
        self.remote
            .0
            .borrow_mut()
            .subscribers
            .retain(|(id, _, _)| *id != self.id);
    }
}

impl BookmarkGateway for MemoryGateway {
    type Subscription = MemorySubscription;

    async fn get_session(&self) -> ApiResult<Option<Session>> {
        self.remote.take_failure()?;
        Ok(self.user.clone().map(|user| Session {
            access_token: format!("token-{}", user.id),
            refresh_token: String::new(),
            token_type: "bearer".to_string(),
            expires_at: None,
            expires_in: None,
            user,
        }))
    }

    async fn get_current_user(&self) -> ApiResult<Option<Principal>> {
        self.remote.take_failure()?;
        Ok(self.user.clone())
    }

    async fn insert(&self, record: &NewBookmark) -> ApiResult<Bookmark> {
        let user = self.require_user()?;
        self.remote.take_failure()?;
        if let Some(e) = self.remote.0.borrow_mut().fail_next_insert.take() {
            return Err(e);
        }
        if record.user_id != user.id {
            return Err(ApiError::invalid(
                "new row violates row-level security policy for table \"bookmarks\"",
            ));
        }

        let row = {
            let mut t = self.remote.0.borrow_mut();
            t.writes += 1;
            t.clock += 1;
            t.next_row_id += 1;
            let row = Bookmark {
                id: format!("bm-{}", t.next_row_id),
                title: record.title.clone(),
                url: record.url.clone(),
                user_id: record.user_id.clone(),
                created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(t.clock),
            };
            t.rows.push(row.clone());
            row
        };

        self.remote
            .publish(&row.user_id, BookmarkChange::Insert(row.clone()));
        Ok(row)
    }

    async fn delete_by_id(&self, id: &str) -> ApiResult<()> {
        let user = self.require_user()?;
        self.remote.take_failure()?;

        // Row-level security: other owners' rows are invisible, so the delete
        // silently matches nothing.
        let removed = {
            let mut t = self.remote.0.borrow_mut();
            t.writes += 1;
            let before = t.rows.len();
            t.rows.retain(|b| !(b.id == id && b.user_id == user.id));
            t.rows.len() != before
        };

        if removed {
            self.remote.publish(
                &user.id,
                BookmarkChange::Delete { id: id.to_string() },
            );
        }
        Ok(())
    }

    async fn query(&self, owner_id: &str) -> ApiResult<Vec<Bookmark>> {
        let user = self.require_user()?;
        self.remote.take_failure()?;
        if user.id != owner_id {
            return Ok(vec![]);
        }
        Ok(self.remote.rows_for(owner_id))
    }

    fn subscribe_to_changes(
        &self,
        owner_id: &str,
        on_change: ChangeHandler,
    ) -> ApiResult<MemorySubscription> {
        self.require_user()?;
        let mut t = self.remote.0.borrow_mut();
        t.next_sub_id += 1;
        let id = t.next_sub_id;
        t.subscribers.push((id, owner_id.to_string(), on_change));
        Ok(MemorySubscription {
            remote: self.remote.clone(),
            id,
        })
    }
}
