//! omni-refresh - bulk refresh orchestration for linked external accounts.
//!
//! Kicks off nothing itself: a provider-side refresh is requested upstream
//! (see `RefreshRequester`), then a `RefreshJob` tracks it to completion.
//!
//! # Architecture
//!
//! ```text
//! RefreshOrchestrator.start()
//!      ↓ request_refresh (RefreshRequester)
//! RefreshJob (Pending) ──register──► RefreshJobManager
//!      ↓ wait(timeout)
//! poll loop: StatusProbe.check → progress map → backoff ticker
//!      ↓
//! Completed | Failed | Cancelled | TimedOut
//! ```
//!
//! Logging: all events go through `tracing`; the crate installs no subscriber.

mod backoff;
mod error;
mod job;
mod manager;
mod orchestrator;
mod probe;
mod settings;
mod status;

pub use backoff::BackoffPolicy;
pub use error::{ProbeError, RefreshError, Result};
pub use job::{RefreshJob, RefreshJobMetrics};
pub use manager::{RefreshJobManager, RefreshManagerSummary};
pub use orchestrator::{RefreshOrchestrator, RefreshRequester};
pub use probe::{ItemSignal, StatusProbe, classify_item_signal};
pub use settings::{
    RefreshSettings, load_refresh_settings, load_refresh_settings_from_paths,
    refresh_settings_paths,
};
pub use status::RefreshStatus;

pub use tokio_util::sync::CancellationToken;
