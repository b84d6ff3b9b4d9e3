use crate::api::ApiResult;
use crate::gateway::{BookmarkChange, BookmarkGateway};
use crate::models::Bookmark;
use leptos::logging::{error, log, warn};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum LoadStatus {
    Loading,
    Ready,
    /// Raw remote message, shown as-is.
    Error(String),
}

/// In-memory cache of one owner's bookmarks.
///
/// Fed by a single snapshot plus the live change stream. The two are not
/// ordered relative to each other, so every event is applied idempotently and
/// the snapshot is merged into (not written over) whatever arrived first.
///
/// Entries are always kept in [`Bookmark::display_order`].
#[derive(Clone, Debug)]
pub(crate) struct BookmarkList {
    entries: Vec<Bookmark>,
    status: LoadStatus,

    /// Ids deleted while the snapshot was in flight; a stale snapshot must not
    /// bring them back.
    deleted_while_loading: HashSet<String>,

    /// Updates for rows the snapshot has not delivered yet. They are newer
    /// than whatever the snapshot carries for the same id.
    updated_while_loading: HashMap<String, Bookmark>,
}

impl BookmarkList {
    pub fn new() -> Self {
        Self {
            entries: vec![],
            status: LoadStatus::Loading,
            deleted_while_loading: HashSet::new(),
            updated_while_loading: HashMap::new(),
        }
    }

    pub fn entries(&self) -> &[Bookmark] {
        &self.entries
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|b| b.id == id)
    }

    /// Resolve the snapshot fetch. Only the first call has an effect: no
    /// transition leads back out of `Ready` or `Error`.
    pub fn apply_snapshot(&mut self, result: ApiResult<Vec<Bookmark>>) {
        if self.status != LoadStatus::Loading {
            return;
        }

        match result {
            Ok(rows) => {
                // Live events that beat the snapshot are at least as fresh.
                let mut merged: Vec<Bookmark> = self.entries.drain(..).collect();
                for row in rows {
                    if self.deleted_while_loading.contains(&row.id)
                        || merged.iter().any(|b| b.id == row.id)
                    {
                        continue;
                    }
                    match self.updated_while_loading.remove(&row.id) {
                        Some(fresh) if fresh.user_id == row.user_id => merged.push(fresh),
                        Some(_) => {
                            warn!("Ignoring update for bookmark {} with a different owner", row.id);
                            merged.push(row);
                        }
                        None => merged.push(row),
                    }
                }

                merged.sort_by(Bookmark::display_order);
                self.entries = merged;
                self.status = LoadStatus::Ready;
            }
            Err(e) => {
                self.status = LoadStatus::Error(e.message);
            }
        }

        self.deleted_while_loading.clear();
        self.updated_while_loading.clear();
    }

    pub fn on_remote_insert(&mut self, record: Bookmark) {
        if self.contains(&record.id) {
            return;
        }
        self.deleted_while_loading.remove(&record.id);
        self.insert_sorted(record);
    }

    pub fn on_remote_update(&mut self, record: Bookmark) {
        let Some(idx) = self.entries.iter().position(|b| b.id == record.id) else {
            // The row may still be on its way in the snapshot.
            if self.status == LoadStatus::Loading {
                self.updated_while_loading.insert(record.id.clone(), record);
            }
            return;
        };

        if self.entries[idx].user_id != record.user_id {
            warn!(
                "Ignoring update for bookmark {} with a different owner",
                record.id
            );
            return;
        }

        if self.entries[idx].created_at == record.created_at {
            self.entries[idx] = record;
        } else {
            self.entries.remove(idx);
            self.insert_sorted(record);
        }
    }

    pub fn on_remote_delete(&mut self, id: &str) {
        self.entries.retain(|b| b.id != id);
        if self.status == LoadStatus::Loading {
            self.updated_while_loading.remove(id);
            self.deleted_while_loading.insert(id.to_string());
        }
    }

    pub fn apply(&mut self, change: BookmarkChange) {
        match change {
            BookmarkChange::Insert(record) => self.on_remote_insert(record),
            BookmarkChange::Update(record) => self.on_remote_update(record),
            BookmarkChange::Delete { id } => self.on_remote_delete(&id),
        }
    }

    // For a record newer than everything cached this is a prepend.
    fn insert_sorted(&mut self, record: Bookmark) {
        let pos = self
            .entries
            .partition_point(|b| Bookmark::display_order(b, &record) == Ordering::Less);
        self.entries.insert(pos, record);
    }
}

impl Default for BookmarkList {
    fn default() -> Self {
        Self::new()
    }
}

/// One-time snapshot fetch for `owner_id`.
pub(crate) async fn load_bookmarks<G: BookmarkGateway>(
    gateway: &G,
    owner_id: &str,
) -> ApiResult<Vec<Bookmark>> {
    match gateway.query(owner_id).await {
        Ok(rows) => {
            log!("Initial bookmarks loaded: {}", rows.len());
            Ok(rows)
        }
        Err(e) => {
            error!("Fetch error: {e}");
            Err(e)
        }
    }
}

/// Open the owner-filtered change stream, forwarding each change to `apply`.
pub(crate) fn subscribe_bookmarks<G: BookmarkGateway>(
    gateway: &G,
    owner_id: &str,
    apply: impl Fn(BookmarkChange) + 'static,
) -> ApiResult<G::Subscription> {
    log!("Setting up realtime subscription for user: {owner_id}");
    gateway.subscribe_to_changes(
        owner_id,
        Rc::new(move |change: BookmarkChange| {
            match &change {
                BookmarkChange::Insert(b) => log!("INSERT received: {}", b.id),
                BookmarkChange::Update(b) => log!("UPDATE received: {}", b.id),
                BookmarkChange::Delete { id } => log!("DELETE received: {id}"),
            }
            apply(change);
        }),
    )
}

/// Remote delete by id. The cached list is untouched here; the row
/// disappears when the delete echo comes back through the subscription.
pub(crate) async fn request_delete<G: BookmarkGateway>(gateway: &G, id: &str) -> ApiResult<()> {
    match gateway.delete_by_id(id).await {
        Ok(()) => {
            log!("Bookmark deleted: {id}");
            Ok(())
        }
        Err(e) => {
            error!("Delete error: {e}");
            Err(e)
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::gateway::memory::MemoryRemote;
    use crate::gateway::Subscription;
    use std::cell::RefCell;

    fn bm(id: &str, t: i64) -> Bookmark {
        MemoryRemote::bookmark(id, "u1", t)
    }

    fn ids(list: &BookmarkList) -> Vec<&str> {
        list.entries().iter().map(|b| b.id.as_str()).collect()
    }

    fn ready(rows: Vec<Bookmark>) -> BookmarkList {
        let mut list = BookmarkList::new();
        list.apply_snapshot(Ok(rows));
        list
    }

    #[test]
    fn test_starts_loading_and_empty() {
        let list = BookmarkList::new();
        assert_eq!(list.status(), &LoadStatus::Loading);
        assert!(list.is_empty());
    }

    #[test]
    fn test_snapshot_success_sets_ready_in_display_order() {
        let list = ready(vec![bm("b", 1), bm("a", 3)]);
        assert_eq!(list.status(), &LoadStatus::Ready);
        assert_eq!(ids(&list), vec!["a", "b"]);
    }

    #[test]
    fn test_snapshot_failure_surfaces_message_verbatim() {
        let mut list = BookmarkList::new();
        list.apply_snapshot(Err(ApiError::invalid(
            "permission denied for table bookmarks",
        )));
        assert_eq!(
            list.status(),
            &LoadStatus::Error("permission denied for table bookmarks".to_string())
        );
    }

    #[test]
    fn test_status_never_returns_to_loading() {
        let mut list = ready(vec![bm("a", 1)]);
        list.apply_snapshot(Err(ApiError::invalid("late failure")));
        assert_eq!(list.status(), &LoadStatus::Ready);
        list.apply_snapshot(Ok(vec![]));
        assert_eq!(ids(&list), vec!["a"]);

        list.on_remote_delete("a");
        assert_eq!(list.status(), &LoadStatus::Ready);
    }

    #[test]
    fn test_live_insert_after_snapshot_is_prepended() {
        let mut list = ready(vec![bm("a", 3), bm("b", 1)]);
        list.on_remote_insert(bm("c", 5));
        assert_eq!(ids(&list), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_live_insert_before_snapshot_survives_the_snapshot() {
        let mut list = BookmarkList::new();
        list.on_remote_insert(bm("c", 5));
        list.apply_snapshot(Ok(vec![bm("a", 3), bm("b", 1)]));
        assert_eq!(ids(&list), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_snapshot_and_live_event_overlap_is_deduplicated() {
        let mut list = BookmarkList::new();
        list.on_remote_insert(bm("a", 3));
        list.apply_snapshot(Ok(vec![bm("a", 3), bm("b", 1)]));
        assert_eq!(ids(&list), vec!["a", "b"]);

        list.on_remote_insert(bm("b", 1));
        assert_eq!(ids(&list), vec!["a", "b"]);
    }

    #[test]
    fn test_delete_while_loading_is_not_resurrected_by_snapshot() {
        let mut list = BookmarkList::new();
        list.on_remote_delete("a");
        list.apply_snapshot(Ok(vec![bm("a", 3), bm("b", 1)]));
        assert_eq!(ids(&list), vec!["b"]);
    }

    #[test]
    fn test_update_while_loading_wins_over_stale_snapshot_row() {
        let mut list = BookmarkList::new();
        let mut renamed = bm("a", 3);
        renamed.title = "renamed".to_string();
        list.on_remote_update(renamed);
        assert!(list.is_empty());

        list.apply_snapshot(Ok(vec![bm("a", 3), bm("b", 1)]));
        assert_eq!(ids(&list), vec!["a", "b"]);
        assert_eq!(list.entries()[0].title, "renamed");
    }

    #[test]
    fn test_update_while_loading_for_row_missing_from_snapshot_is_dropped() {
        let mut list = BookmarkList::new();
        list.on_remote_update(bm("zz", 9));
        list.apply_snapshot(Ok(vec![bm("a", 3)]));
        assert_eq!(ids(&list), vec!["a"]);
    }

    #[test]
    fn test_delete_after_update_while_loading_still_removes_row() {
        let mut list = BookmarkList::new();
        list.on_remote_update(bm("a", 3));
        list.on_remote_delete("a");
        list.apply_snapshot(Ok(vec![bm("a", 3), bm("b", 1)]));
        assert_eq!(ids(&list), vec!["b"]);
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut list = ready(vec![bm("a", 3), bm("b", 1)]);
        let mut renamed = bm("b", 1);
        renamed.title = "renamed".to_string();
        list.on_remote_update(renamed);
        assert_eq!(ids(&list), vec!["a", "b"]);
        assert_eq!(list.entries()[1].title, "renamed");
    }

    #[test]
    fn test_update_for_absent_id_is_noop() {
        let mut list = ready(vec![bm("a", 3)]);
        list.on_remote_update(bm("zz", 9));
        assert_eq!(ids(&list), vec!["a"]);
    }

    #[test]
    fn test_update_with_different_owner_is_rejected() {
        let mut list = ready(vec![bm("a", 3)]);
        let mut stolen = bm("a", 3);
        stolen.user_id = "u2".to_string();
        stolen.title = "stolen".to_string();
        list.on_remote_update(stolen);
        assert_eq!(list.entries()[0].user_id, "u1");
        assert_eq!(list.entries()[0].title, "title a");
    }

    #[test]
    fn test_delete_for_absent_id_is_noop() {
        let mut list = ready(vec![bm("a", 3)]);
        list.on_remote_delete("zz");
        assert_eq!(ids(&list), vec!["a"]);
        assert_eq!(list.status(), &LoadStatus::Ready);
    }

    #[test]
    fn test_equal_timestamps_have_a_total_order() {
        let mut first = ready(vec![]);
        first.on_remote_insert(bm("x", 2));
        first.on_remote_insert(bm("y", 2));

        let mut second = ready(vec![]);
        second.on_remote_insert(bm("y", 2));
        second.on_remote_insert(bm("x", 2));

        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_event_sequences_keep_one_entry_per_live_identity() {
        let events = vec![
            BookmarkChange::Insert(bm("a", 1)),
            BookmarkChange::Insert(bm("b", 2)),
            BookmarkChange::Insert(bm("a", 1)),
            BookmarkChange::Update(bm("b", 2)),
            BookmarkChange::Insert(bm("c", 3)),
            BookmarkChange::Delete { id: "a".to_string() },
            BookmarkChange::Insert(bm("c", 3)),
            BookmarkChange::Delete { id: "a".to_string() },
            BookmarkChange::Update(bm("a", 1)),
        ];

        let mut list = ready(vec![]);
        for e in events {
            list.apply(e);
        }

        assert_eq!(ids(&list), vec!["c", "b"]);
        let unique: HashSet<&str> = ids(&list).into_iter().collect();
        assert_eq!(unique.len(), list.len());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_load_and_live_insert_order_independent() {
        for insert_first in [true, false] {
            let remote = MemoryRemote::new();
            remote.seed(MemoryRemote::bookmark("a", "u1", 3));
            remote.seed(MemoryRemote::bookmark("b", "u1", 1));
            let gw = remote.session_for("u1");

            let snapshot = load_bookmarks(&gw, "u1").await;
            let mut list = BookmarkList::new();
            let live = MemoryRemote::bookmark("c", "u1", 5);
            if insert_first {
                list.on_remote_insert(live);
                list.apply_snapshot(snapshot);
            } else {
                list.apply_snapshot(snapshot);
                list.on_remote_insert(live);
            }

            assert_eq!(ids(&list), vec!["c", "a", "b"], "insert_first={insert_first}");
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_load_failure_is_reported() {
        let remote = MemoryRemote::new();
        let gw = remote.session_for("u1");
        remote.fail_next(ApiError::invalid("relation \"bookmarks\" does not exist"));

        let mut list = BookmarkList::new();
        list.apply_snapshot(load_bookmarks(&gw, "u1").await);
        assert_eq!(
            list.status(),
            &LoadStatus::Error("relation \"bookmarks\" does not exist".to_string())
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_request_delete_waits_for_echo() {
        let remote = MemoryRemote::new();
        remote.seed(MemoryRemote::bookmark("a", "u1", 3));
        let gw = remote.session_for("u1");

        // Local cache without a subscription: the request alone changes nothing.
        let mut detached = ready(remote.rows_for("u1"));
        request_delete(&gw, "a").await.expect("delete should succeed");
        assert_eq!(ids(&detached), vec!["a"]);

        // The echo is what removes it.
        detached.on_remote_delete("a");
        assert!(detached.is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_request_delete_for_unknown_id_is_harmless() {
        let remote = MemoryRemote::new();
        remote.seed(MemoryRemote::bookmark("a", "u1", 3));
        let gw = remote.session_for("u1");

        let list = Rc::new(RefCell::new(ready(remote.rows_for("u1"))));
        let sink = list.clone();
        let sub = subscribe_bookmarks(&gw, "u1", move |c| sink.borrow_mut().apply(c))
            .expect("subscribe should succeed");

        request_delete(&gw, "missing").await.expect("no-op delete should succeed");
        assert_eq!(ids(&list.borrow()), vec!["a"]);
        sub.cancel();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_request_delete_failure_is_returned_and_list_untouched() {
        let remote = MemoryRemote::new();
        remote.seed(MemoryRemote::bookmark("a", "u1", 3));
        let gw = remote.session_for("u1");
        let list = ready(remote.rows_for("u1"));

        remote.fail_next(ApiError::invalid("Failed to delete bookmark"));
        let err = request_delete(&gw, "a").await.expect_err("delete should fail");
        assert_eq!(err.message, "Failed to delete bookmark");
        assert_eq!(ids(&list), vec!["a"]);
        assert_eq!(remote.rows_for("u1").len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_second_session_sees_insert_without_refresh() {
        let remote = MemoryRemote::new();
        let session_a = remote.session_for("u1");
        let session_b = remote.session_for("u1");

        let list_b = Rc::new(RefCell::new(BookmarkList::new()));
        let sink = list_b.clone();
        let sub = subscribe_bookmarks(&session_b, "u1", move |c| sink.borrow_mut().apply(c))
            .expect("subscribe should succeed");
        let snapshot = load_bookmarks(&session_b, "u1").await;
        list_b.borrow_mut().apply_snapshot(snapshot);
        assert!(list_b.borrow().is_empty());

        let created = session_a
            .insert(&crate::models::NewBookmark {
                title: "Rust".to_string(),
                url: "https://www.rust-lang.org".to_string(),
                user_id: "u1".to_string(),
            })
            .await
            .expect("insert should succeed");

        assert_eq!(ids(&list_b.borrow()), vec![created.id.as_str()]);
        sub.cancel();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_other_owners_changes_are_not_delivered() {
        let remote = MemoryRemote::new();
        let mine = remote.session_for("u1");
        let theirs = remote.session_for("u2");

        let list = Rc::new(RefCell::new(ready(vec![])));
        let sink = list.clone();
        let sub = subscribe_bookmarks(&mine, "u1", move |c| sink.borrow_mut().apply(c))
            .expect("subscribe should succeed");

        theirs
            .insert(&crate::models::NewBookmark {
                title: "Theirs".to_string(),
                url: "https://example.org".to_string(),
                user_id: "u2".to_string(),
            })
            .await
            .expect("insert should succeed");

        assert!(list.borrow().is_empty());
        sub.cancel();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_cancelled_subscription_stops_delivery() {
        let remote = MemoryRemote::new();
        let gw = remote.session_for("u1");

        let list = Rc::new(RefCell::new(ready(vec![])));
        let sink = list.clone();
        let sub = subscribe_bookmarks(&gw, "u1", move |c| sink.borrow_mut().apply(c))
            .expect("subscribe should succeed");
        assert_eq!(remote.subscriber_count(), 1);

        sub.cancel();
        assert_eq!(remote.subscriber_count(), 0);

        gw.insert(&crate::models::NewBookmark {
            title: "Late".to_string(),
            url: "https://example.com".to_string(),
            user_id: "u1".to_string(),
        })
        .await
        .expect("insert should succeed");
        assert!(list.borrow().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_remote_rename_reaches_the_list() {
        let remote = MemoryRemote::new();
        remote.seed(MemoryRemote::bookmark("a", "u1", 3));
        let gw = remote.session_for("u1");

        let list = Rc::new(RefCell::new(ready(remote.rows_for("u1"))));
        let sink = list.clone();
        let sub = subscribe_bookmarks(&gw, "u1", move |c| sink.borrow_mut().apply(c))
            .expect("subscribe should succeed");

        remote.rename("a", "Renamed");
        assert_eq!(list.borrow().entries()[0].title, "Renamed");
        sub.cancel();
    }
}
