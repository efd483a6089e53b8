//! Status probe abstraction and per-item completion classification.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Per-item refresh signal reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSignal {
    /// Item identifier (e.g. account id).
    pub item_id: String,
    /// Provider is still syncing this item.
    pub sync_in_progress: bool,
    /// Credentials behind this item need re-authentication.
    pub reauth_required: bool,
    /// Last successful sync, if any.
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl ItemSignal {
    /// Idle item last synced at `at`.
    pub fn synced(item_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            item_id: item_id.into(),
            sync_in_progress: false,
            reauth_required: false,
            last_synced_at: Some(at),
        }
    }

    /// Item with a sync still running.
    pub fn syncing(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            sync_in_progress: true,
            reauth_required: false,
            last_synced_at: None,
        }
    }
}

/// Capability that reports refresh progress for a set of items.
///
/// Implementations own the wire protocol; the orchestrator only consumes signals.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Return one signal per known item among `item_ids`.
    async fn check(&self, item_ids: &[String]) -> Result<Vec<ItemSignal>, ProbeError>;
}

/// Whether `signal` proves the item was refreshed after `started_at`.
///
/// Items idle since before the job started stay incomplete.
pub fn classify_item_signal(signal: &ItemSignal, started_at: DateTime<Utc>) -> bool {
    if signal.sync_in_progress || signal.reauth_required {
        return false;
    }
    signal
        .last_synced_at
        .is_some_and(|synced_at| synced_at >= started_at)
}
