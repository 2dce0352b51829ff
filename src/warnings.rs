//! Storage usage warnings.
//!
//! The journal lives under a fixed byte quota; these warnings tell the user
//! before writes start failing.

use crate::storage::{StorageInfo, StoreKey};

/// Share of the quota above which usage is reported.
pub const USAGE_WARNING_RATIO: f64 = 0.8;

/// Share of the quota a single collection may take before it is named.
pub const COLLECTION_WARNING_RATIO: f64 = 0.5;

/// A warning about storage running short.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Total usage is close to the quota.
    NearQuota { used_mb: f64, quota_mb: f64, percent: f64 },
    /// One collection takes most of the quota.
    LargeCollection { key: StoreKey, size_mb: f64, percent: f64 },
}

/// Check usage against the thresholds.
///
/// # Returns
/// A vector of warnings (empty if usage is fine)
pub fn check_thresholds(info: &StorageInfo) -> Vec<Warning> {
    let mut warnings = Vec::new();
    if info.quota_bytes == 0 {
        return warnings;
    }

    let quota_mb = to_mb(info.quota_bytes);
    let ratio = info.usage_ratio();
    if ratio >= USAGE_WARNING_RATIO {
        warnings.push(Warning::NearQuota {
            used_mb: info.used_mb(),
            quota_mb,
            percent: ratio * 100.0,
        });
    }

    for (key, size) in &info.per_key {
        let share = *size as f64 / info.quota_bytes as f64;
        if share >= COLLECTION_WARNING_RATIO {
            warnings.push(Warning::LargeCollection {
                key: *key,
                size_mb: to_mb(*size),
                percent: share * 100.0,
            });
        }
    }

    warnings
}

fn to_mb(bytes: usize) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Format a warning for display.
pub fn format_warning(warning: &Warning) -> String {
    match warning {
        Warning::NearQuota {
            used_mb,
            quota_mb,
            percent,
        } => {
            format!(
                "Warning: storage is {:.0}% full ({:.2}MB of {:.0}MB) - export and clear old data",
                percent, used_mb, quota_mb
            )
        }
        Warning::LargeCollection {
            key,
            size_mb,
            percent,
        } => {
            format!(
                "Warning: '{}' takes {:.2}MB ({:.0}% of the quota)",
                key, size_mb, percent
            )
        }
    }
}
