use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;

/// A notable occurrence that can be linked to any number of dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalEvent {
    pub id: String,
    pub text: String,
    /// Optional URL; empty when unset
    #[serde(default)]
    pub link: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GlobalEvent {
    pub fn new(text: String, link: String, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            text,
            link,
            created_at: now,
            updated_at: now,
        }
    }
}
