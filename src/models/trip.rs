use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

/// A trip row as stored. The free-form `data` payload is kept as raw JSON
/// text; use [`TripRow::into_trip`] before handing it to clients.
#[derive(Debug, Clone, FromRow)]
pub struct TripRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub destination: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_shared: bool,
    pub version: i64,
    pub last_modified: String,
    pub modified_by: String,
    pub data: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TripRow {
    pub fn into_trip(self) -> Trip {
        let data = serde_json::from_str(&self.data).unwrap_or_default();
        Trip {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            destination: self.destination,
            start_date: self.start_date,
            end_date: self.end_date,
            is_shared: self.is_shared,
            version: self.version,
            last_modified: self.last_modified,
            modified_by: self.modified_by,
            data,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// The shared trip document. Known fields are modeled explicitly; anything
/// the wizard UI stores beyond them (packing preferences, notes, city picks)
/// rides in the `data` extras map, which can never shadow the envelope
/// fields `version`, `last_modified` and `modified_by`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub destination: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_shared: bool,
    pub version: i64,
    pub last_modified: String,
    pub modified_by: String,
    pub data: Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrip {
    pub title: String,
    pub destination: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// A partial update to a trip document. Fields left out stay untouched;
/// `data` keys are merged shallowly over the stored extras. Overlapping
/// writes from two clients resolve last-write-wins at this granularity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripUpdate {
    pub title: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_shared: Option<bool>,
    pub data: Option<Map<String, Value>>,
}

impl TripUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.destination.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.is_shared.is_none()
            && self.data.is_none()
    }
}

impl Trip {
    pub fn new(owner_id: String, new: NewTrip) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.clone(),
            title: new.title,
            destination: new.destination,
            start_date: new.start_date,
            end_date: new.end_date,
            is_shared: false,
            version: 1,
            last_modified: now.clone(),
            modified_by: owner_id,
            data: new.data,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Apply a partial update, bumping the version and stamping the editor.
    /// The whole merge happens in memory; callers persist the result in one
    /// transaction so an update either fully applies or not at all.
    pub fn apply(&mut self, update: TripUpdate, edited_by: &str) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(destination) = update.destination {
            self.destination = destination;
        }
        if let Some(start_date) = update.start_date {
            self.start_date = Some(start_date);
        }
        if let Some(end_date) = update.end_date {
            self.end_date = Some(end_date);
        }
        if let Some(is_shared) = update.is_shared {
            self.is_shared = is_shared;
        }
        if let Some(extras) = update.data {
            for (key, value) in extras {
                self.data.insert(key, value);
            }
        }

        let now = Utc::now().to_rfc3339();
        self.version += 1;
        self.last_modified = now.clone();
        self.modified_by = edited_by.to_string();
        self.updated_at = now;
    }

    pub fn data_json(&self) -> String {
        serde_json::to_string(&self.data).unwrap_or_else(|_| "{}".to_string())
    }
}
