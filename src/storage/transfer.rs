//! Whole-dataset export and import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use super::{KeyValueStore, StoreKey};
use crate::config::{Settings, EXPORT_VERSION};
use crate::entity::{AssociationMap, CommonTask, DiaryMap, EventMap, Plan};
use crate::error::{DaybookError, Result};

/// Every collection in one document.
///
/// A missing or `null` collection is left alone on import.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub diaries: Option<DiaryMap>,
    pub plans: Option<Vec<Plan>>,
    pub common_tasks: Option<Vec<CommonTask>>,
    pub global_events: Option<EventMap>,
    pub event_associations: Option<AssociationMap>,
    pub settings: Option<Settings>,
    pub export_date: Option<String>,
    pub version: Option<String>,
}

impl ExportDocument {
    /// Validate and decode an import document.
    ///
    /// The document must be an object with at least one recognized
    /// collection, and every present collection must decode.
    pub fn decode(document: &Value) -> Result<Self> {
        let map = document.as_object().ok_or_else(|| {
            DaybookError::InvalidImportFormat("expected a JSON object".to_string())
        })?;

        if !StoreKey::ALL.iter().any(|k| map.contains_key(k.name())) {
            return Err(DaybookError::InvalidImportFormat(
                "no recognized collections".to_string(),
            ));
        }

        serde_json::from_value(document.clone())
            .map_err(|e| DaybookError::InvalidImportFormat(e.to_string()))
    }

    /// Encoded collections present in this document, in key order.
    fn encoded(&self) -> Result<Vec<(StoreKey, String)>> {
        let mut out = Vec::new();
        if let Some(ref diaries) = self.diaries {
            out.push((StoreKey::Diaries, serde_json::to_string(diaries)?));
        }
        if let Some(ref plans) = self.plans {
            out.push((StoreKey::Plans, serde_json::to_string(plans)?));
        }
        if let Some(ref tasks) = self.common_tasks {
            out.push((StoreKey::CommonTasks, serde_json::to_string(tasks)?));
        }
        if let Some(ref events) = self.global_events {
            out.push((StoreKey::GlobalEvents, serde_json::to_string(events)?));
        }
        if let Some(ref associations) = self.event_associations {
            out.push((
                StoreKey::EventAssociations,
                serde_json::to_string(associations)?,
            ));
        }
        if let Some(ref settings) = self.settings {
            out.push((StoreKey::Settings, serde_json::to_string(settings)?));
        }
        Ok(out)
    }
}

/// Which collections an import replaced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub imported: Vec<StoreKey>,
}

impl KeyValueStore {
    pub fn export_all(&self) -> ExportDocument {
        self.export_at(Utc::now())
    }

    pub fn export_at(&self, now: DateTime<Utc>) -> ExportDocument {
        ExportDocument {
            diaries: self.get(StoreKey::Diaries),
            plans: self.get(StoreKey::Plans),
            common_tasks: self.get(StoreKey::CommonTasks),
            global_events: self.get(StoreKey::GlobalEvents),
            event_associations: self.get(StoreKey::EventAssociations),
            settings: self.get(StoreKey::Settings),
            export_date: Some(now.to_rfc3339()),
            version: Some(EXPORT_VERSION.to_string()),
        }
    }

    /// Replace every collection present in `document`.
    ///
    /// Nothing is written unless the whole document decodes. If a write
    /// fails partway, collections already replaced are put back.
    pub fn import_all(&self, document: &Value) -> Result<ImportSummary> {
        let decoded = ExportDocument::decode(document)?;
        let entries = decoded.encoded()?;

        let mut previous = Vec::with_capacity(entries.len());
        for (key, raw) in &entries {
            let written = self
                .read_raw(*key)
                .and_then(|before| self.write_raw(*key, raw).map(|()| before));
            match written {
                Ok(before) => previous.push((*key, before)),
                Err(e) => {
                    error!(%key, error = %e, "import failed, rolling back");
                    self.restore_raw(&previous);
                    return Err(e);
                }
            }
        }

        let imported: Vec<StoreKey> = entries.into_iter().map(|(key, _)| key).collect();
        info!(collections = imported.len(), "import complete");
        Ok(ImportSummary { imported })
    }

    /// Parse `text` as JSON and import it.
    pub fn import_json(&self, text: &str) -> Result<ImportSummary> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| DaybookError::InvalidImportFormat(e.to_string()))?;
        self.import_all(&document)
    }
}
