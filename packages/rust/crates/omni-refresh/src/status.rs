//! Refresh job lifecycle status and its lock-free storage.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle state of a refresh job.
///
/// `Pending -> InProgress -> {Completed | Failed | Cancelled | TimedOut}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RefreshStatus {
    /// Created, `wait` not yet called.
    Pending = 0,
    /// Polling the provider.
    InProgress = 1,
    /// Every item reported complete.
    Completed = 2,
    /// Probe returned a non-retryable error.
    Failed = 3,
    /// Caller cancelled.
    Cancelled = 4,
    /// Wait deadline elapsed.
    TimedOut = 5,
}

impl RefreshStatus {
    /// Decode a stored status byte.
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::InProgress),
            2 => Some(Self::Completed),
            3 => Some(Self::Failed),
            4 => Some(Self::Cancelled),
            5 => Some(Self::TimedOut),
            _ => None,
        }
    }

    /// Status name for logs and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        }
    }

    /// No transition leaves a terminal status.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }
}

impl std::fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Single-word status cell. Readers never see a torn value.
#[derive(Debug)]
pub(crate) struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    pub(crate) fn new(status: RefreshStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    #[inline]
    pub(crate) fn load(&self) -> RefreshStatus {
        RefreshStatus::from_u8(self.0.load(Ordering::Acquire)).unwrap_or(RefreshStatus::Pending)
    }

    /// Move `from -> to` only if the cell still holds `from`.
    pub(crate) fn transition(&self, from: RefreshStatus, to: RefreshStatus) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Store a terminal status unless one is already stored.
    ///
    /// Returns `Ok(previous)` on success, `Err(existing_terminal)` otherwise.
    pub(crate) fn finish(&self, to: RefreshStatus) -> Result<RefreshStatus, RefreshStatus> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let decoded = RefreshStatus::from_u8(current).unwrap_or(RefreshStatus::Pending);
            if decoded.is_terminal() {
                return Err(decoded);
            }
            match self.0.compare_exchange_weak(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(decoded),
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bytes_round_trip() {
        for status in [
            RefreshStatus::Pending,
            RefreshStatus::InProgress,
            RefreshStatus::Completed,
            RefreshStatus::Failed,
            RefreshStatus::Cancelled,
            RefreshStatus::TimedOut,
        ] {
            assert_eq!(RefreshStatus::from_u8(status as u8), Some(status));
        }
        assert_eq!(RefreshStatus::from_u8(42), None);
    }

    #[test]
    fn terminal_status_is_sticky() {
        let cell = AtomicStatus::new(RefreshStatus::Pending);
        assert!(cell.transition(RefreshStatus::Pending, RefreshStatus::InProgress));
        assert_eq!(
            cell.finish(RefreshStatus::Completed),
            Ok(RefreshStatus::InProgress)
        );
        assert_eq!(
            cell.finish(RefreshStatus::Cancelled),
            Err(RefreshStatus::Completed)
        );
        assert!(!cell.transition(RefreshStatus::Pending, RefreshStatus::InProgress));
        assert_eq!(cell.load(), RefreshStatus::Completed);
    }

    #[test]
    fn pending_can_finish_directly() {
        let cell = AtomicStatus::new(RefreshStatus::Pending);
        assert_eq!(
            cell.finish(RefreshStatus::Cancelled),
            Ok(RefreshStatus::Pending)
        );
        assert_eq!(cell.load(), RefreshStatus::Cancelled);
    }
}
