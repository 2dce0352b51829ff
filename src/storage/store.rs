use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{MemoryBackend, StorageBackend};
use crate::config::{Settings, DEFAULT_QUOTA_BYTES, KEY_PREFIX};
use crate::error::{DaybookError, Result};

/// The collections the journal persists, one JSON document each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKey {
    Diaries,
    Plans,
    CommonTasks,
    GlobalEvents,
    EventAssociations,
    Settings,
}

impl StoreKey {
    pub const ALL: [StoreKey; 6] = [
        StoreKey::Diaries,
        StoreKey::Plans,
        StoreKey::CommonTasks,
        StoreKey::GlobalEvents,
        StoreKey::EventAssociations,
        StoreKey::Settings,
    ];

    /// Name used in export documents.
    pub fn name(&self) -> &'static str {
        match self {
            StoreKey::Diaries => "diaries",
            StoreKey::Plans => "plans",
            StoreKey::CommonTasks => "commonTasks",
            StoreKey::GlobalEvents => "globalEvents",
            StoreKey::EventAssociations => "eventAssociations",
            StoreKey::Settings => "settings",
        }
    }

    /// Name used in the backend.
    pub fn namespaced(&self) -> String {
        format!("{}{}", KEY_PREFIX, self.name())
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How much of the quota the collections take up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageInfo {
    pub used_bytes: usize,
    pub quota_bytes: usize,
    pub per_key: Vec<(StoreKey, usize)>,
}

impl StorageInfo {
    pub fn used_mb(&self) -> f64 {
        self.used_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn usage_ratio(&self) -> f64 {
        if self.quota_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.quota_bytes as f64
    }
}

/// JSON documents over a [`StorageBackend`], with a size quota.
///
/// Reads never fail: a missing or undecodable value reads as `None` and is
/// logged. Writes either land completely or return an error.
pub struct KeyValueStore {
    backend: Box<dyn StorageBackend>,
    quota_bytes: usize,
}

impl KeyValueStore {
    /// Wrap `backend` with the default quota and seed default settings.
    pub fn new(backend: impl StorageBackend + 'static) -> Result<Self> {
        Self::with_quota(backend, DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota(backend: impl StorageBackend + 'static, quota_bytes: usize) -> Result<Self> {
        let store = Self {
            backend: Box::new(backend),
            quota_bytes,
        };
        store.init_default_settings()?;
        Ok(store)
    }

    /// A scratch store backed by memory.
    pub fn in_memory() -> Result<Self> {
        Self::new(MemoryBackend::new())
    }

    pub fn quota_bytes(&self) -> usize {
        self.quota_bytes
    }

    fn init_default_settings(&self) -> Result<()> {
        if self.get::<Settings>(StoreKey::Settings).is_none() {
            debug!("writing default settings");
            self.set(StoreKey::Settings, &Settings::default())?;
        }
        Ok(())
    }

    /// Decode the value under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: StoreKey) -> Option<T> {
        let raw = match self.read_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(%key, error = %e, "storage read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%key, error = %e, "ignoring undecodable stored value");
                None
            }
        }
    }

    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: StoreKey) -> T {
        self.get(key).unwrap_or_default()
    }

    /// Encode and write `value` under `key`.
    pub fn set<T: Serialize + ?Sized>(&self, key: StoreKey, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|e| {
            error!(%key, error = %e, "failed to encode value");
            DaybookError::StorageWrite {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.write_raw(key, &raw)
    }

    pub fn remove(&self, key: StoreKey) -> Result<()> {
        self.backend.delete(&key.namespaced()).map_err(|e| {
            error!(%key, error = %e, "failed to remove value");
            e
        })
    }

    /// Remove every collection, then restore default settings.
    pub fn clear(&self) -> Result<()> {
        for key in StoreKey::ALL {
            self.remove(key)?;
        }
        self.init_default_settings()?;
        info!("cleared all data");
        Ok(())
    }

    pub fn storage_info(&self) -> Result<StorageInfo> {
        let mut per_key = Vec::with_capacity(StoreKey::ALL.len());
        for key in StoreKey::ALL {
            per_key.push((key, self.raw_size(key)?));
        }
        Ok(StorageInfo {
            used_bytes: per_key.iter().map(|(_, size)| size).sum(),
            quota_bytes: self.quota_bytes,
            per_key,
        })
    }

    pub(crate) fn read_raw(&self, key: StoreKey) -> Result<Option<String>> {
        self.backend.read(&key.namespaced())
    }

    fn raw_size(&self, key: StoreKey) -> Result<usize> {
        Ok(self.read_raw(key)?.map(|raw| raw.len()).unwrap_or(0))
    }

    pub(crate) fn write_raw(&self, key: StoreKey, raw: &str) -> Result<()> {
        let mut others = 0;
        for other in StoreKey::ALL.into_iter().filter(|k| *k != key) {
            others += self.raw_size(other)?;
        }

        let needed = others + raw.len();
        if needed > self.quota_bytes {
            error!(%key, needed, quota = self.quota_bytes, "storage quota exceeded");
            return Err(DaybookError::QuotaExceeded {
                key: key.to_string(),
                needed,
                quota: self.quota_bytes,
            });
        }

        self.backend
            .write(&key.namespaced(), raw)
            .map_err(|e| {
                error!(%key, error = %e, "failed to save value");
                DaybookError::StorageWrite {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            })?;
        debug!(%key, bytes = raw.len(), "saved");
        Ok(())
    }

    /// Put back raw values captured before a multi-key write.
    pub(crate) fn restore_raw(&self, previous: &[(StoreKey, Option<String>)]) {
        for (key, raw) in previous.iter().rev() {
            let outcome = match raw {
                Some(raw) => self.backend.write(&key.namespaced(), raw),
                None => self.backend.delete(&key.namespaced()),
            };
            if let Err(e) = outcome {
                error!(%key, error = %e, "failed to restore previous value");
            }
        }
    }

    pub fn settings(&self) -> Settings {
        self.get_or_default(StoreKey::Settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.set(StoreKey::Settings, settings)
    }
}
