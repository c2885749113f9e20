//! Per-trip presence and typing registries. Thread-safe, overwrite-on-update,
//! reconciled optimistically; readers tolerate brief inconsistency.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::{PresenceData, PresenceStatus, PresenceUpdate};

/// Typing markers self-expire after this many seconds without a refresh.
pub const TYPING_TTL_SECS: i64 = 3;

pub(super) struct PresenceRegistry {
    /// One record per user, fully replaced on every update.
    members: DashMap<String, PresenceData>,
    /// user id → moment the typing marker was (re)set.
    typing: DashMap<String, DateTime<Utc>>,
}

impl PresenceRegistry {
    pub(super) fn new() -> Self {
        Self {
            members: DashMap::new(),
            typing: DashMap::new(),
        }
    }

    pub(super) fn update(&self, user_id: &str, name: &str, update: PresenceUpdate) {
        let mut entry = self
            .members
            .entry(user_id.to_string())
            .or_insert_with(|| PresenceData::new(user_id.to_string(), name.to_string()));
        entry.name = name.to_string();
        entry.merge(update);
    }

    pub(super) fn mark_offline(&self, user_id: &str) {
        if let Some(mut entry) = self.members.get_mut(user_id) {
            entry.status = PresenceStatus::Offline;
            entry.last_seen = Utc::now();
        }
    }

    /// Current presence list, stale records downgraded to offline. Sorted by
    /// user id so repeated snapshots are stable for clients and tests.
    pub(super) fn snapshot(&self, now: DateTime<Utc>) -> Vec<PresenceData> {
        let mut members: Vec<PresenceData> = self
            .members
            .iter()
            .map(|entry| {
                let mut p = entry.value().clone();
                p.status = p.effective_status(now);
                p
            })
            .collect();
        members.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        members
    }

    /// Returns the stamp written, so a scheduled clear can tell whether the
    /// marker it is about to remove is still its own.
    pub(super) fn set_typing(&self, user_id: &str) -> DateTime<Utc> {
        let stamp = Utc::now();
        self.typing.insert(user_id.to_string(), stamp);
        stamp
    }

    pub(super) fn clear_typing(&self, user_id: &str) {
        self.typing.remove(user_id);
    }

    /// Remove the marker only if it still carries `stamp`; a refresh since
    /// then means a newer timer owns it.
    pub(super) fn clear_typing_if_stamped(&self, user_id: &str, stamp: DateTime<Utc>) -> bool {
        self.typing
            .remove_if(user_id, |_, current| *current == stamp)
            .is_some()
    }

    pub(super) fn typing_snapshot(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut user_ids: Vec<String> = self
            .typing
            .iter()
            .filter(|entry| {
                now.signed_duration_since(*entry.value()).num_seconds() < TYPING_TTL_SECS
            })
            .map(|entry| entry.key().clone())
            .collect();
        user_ids.sort();
        user_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn update_overwrites_single_record() {
        let registry = PresenceRegistry::new();
        registry.update(
            "a@x.com",
            "Alice",
            PresenceUpdate {
                current_page: Some("/flights".to_string()),
                ..Default::default()
            },
        );
        registry.update(
            "a@x.com",
            "Alice",
            PresenceUpdate {
                status: Some(PresenceStatus::Away),
                ..Default::default()
            },
        );

        let snapshot = registry.snapshot(Utc::now());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, PresenceStatus::Away);
        assert_eq!(snapshot[0].current_page.as_deref(), Some("/flights"));
    }

    #[test]
    fn mark_offline_sticks() {
        let registry = PresenceRegistry::new();
        registry.update("a@x.com", "Alice", PresenceUpdate::default());
        registry.mark_offline("a@x.com");

        let snapshot = registry.snapshot(Utc::now());
        assert_eq!(snapshot[0].status, PresenceStatus::Offline);
    }

    #[test]
    fn expired_typing_markers_are_filtered_on_read() {
        let registry = PresenceRegistry::new();
        registry.set_typing("a@x.com");
        registry.set_typing("b@x.com");

        let now = Utc::now();
        assert_eq!(registry.typing_snapshot(now).len(), 2);

        // Four seconds later both markers are past the TTL, with no sweeper
        // having run.
        let later = now + Duration::seconds(TYPING_TTL_SECS + 1);
        assert!(registry.typing_snapshot(later).is_empty());
    }

    #[test]
    fn stamped_clear_spares_refreshed_markers() {
        let registry = PresenceRegistry::new();
        let old_stamp = registry.set_typing("a@x.com");
        let new_stamp = registry.set_typing("a@x.com");

        assert!(!registry.clear_typing_if_stamped("a@x.com", old_stamp));
        assert_eq!(registry.typing_snapshot(Utc::now()), vec!["a@x.com"]);

        assert!(registry.clear_typing_if_stamped("a@x.com", new_stamp));
        assert!(registry.typing_snapshot(Utc::now()).is_empty());
    }
}
