use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Presence records older than this are reported as offline even if no
/// disconnect was observed, so a wedged connection cannot look online forever.
pub const PRESENCE_STALE_AFTER_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceStatus {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "away")]
    Away,
    #[serde(rename = "offline")]
    Offline,
}

/// Ephemeral per-user state for one trip. Never persisted; one record per
/// (trip, user), fully overwritten by each merge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceData {
    pub user_id: String,
    pub name: String,
    pub status: PresenceStatus,
    pub last_seen: DateTime<Utc>,
    pub current_page: Option<String>,
    pub cursor: Option<String>,
}

impl PresenceData {
    pub fn new(user_id: String, name: String) -> Self {
        Self {
            user_id,
            name,
            status: PresenceStatus::Online,
            last_seen: Utc::now(),
            current_page: None,
            cursor: None,
        }
    }

    /// Merge a partial update over this record and stamp `last_seen`.
    pub fn merge(&mut self, update: PresenceUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(current_page) = update.current_page {
            self.current_page = Some(current_page);
        }
        if let Some(cursor) = update.cursor {
            self.cursor = Some(cursor);
        }
        self.last_seen = Utc::now();
    }

    /// Status as readers should report it: a record nobody refreshed within
    /// the stale window counts as offline regardless of what it claims.
    pub fn effective_status(&self, now: DateTime<Utc>) -> PresenceStatus {
        if self.status == PresenceStatus::Offline {
            return PresenceStatus::Offline;
        }
        let age = now.signed_duration_since(self.last_seen);
        if age.num_seconds() > PRESENCE_STALE_AFTER_SECS {
            PresenceStatus::Offline
        } else {
            self.status
        }
    }
}

/// Client-supplied partial presence update; omitted fields keep their
/// previous value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub status: Option<PresenceStatus>,
    pub current_page: Option<String>,
    pub cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn merge_overlays_fields_and_stamps_last_seen() {
        let mut p = PresenceData::new("a@x.com".to_string(), "Alice".to_string());
        let before = p.last_seen;

        p.merge(PresenceUpdate {
            status: Some(PresenceStatus::Away),
            current_page: Some("/packing".to_string()),
            cursor: None,
        });

        assert_eq!(p.status, PresenceStatus::Away);
        assert_eq!(p.current_page.as_deref(), Some("/packing"));
        assert!(p.last_seen >= before);

        // A later partial update keeps the untouched fields.
        p.merge(PresenceUpdate {
            cursor: Some("hotel-name".to_string()),
            ..Default::default()
        });
        assert_eq!(p.status, PresenceStatus::Away);
        assert_eq!(p.current_page.as_deref(), Some("/packing"));
        assert_eq!(p.cursor.as_deref(), Some("hotel-name"));
    }

    #[test]
    fn stale_records_read_as_offline() {
        let mut p = PresenceData::new("a@x.com".to_string(), "Alice".to_string());
        let now = Utc::now();
        assert_eq!(p.effective_status(now), PresenceStatus::Online);

        p.last_seen = now - Duration::seconds(PRESENCE_STALE_AFTER_SECS + 5);
        assert_eq!(p.effective_status(now), PresenceStatus::Offline);
    }
}
