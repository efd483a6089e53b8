#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use omni_refresh::{BackoffPolicy, ItemSignal, ProbeError, StatusProbe};
use tokio::time::Instant;

/// What the scripted probe answers on one call.
#[derive(Debug, Clone)]
pub enum Step {
    /// Every item still syncing.
    Incomplete,
    /// The first `n` items synced just now, the rest still syncing.
    Partial(usize),
    /// Every item synced just now.
    Complete,
    /// Probe call fails.
    Fail(ProbeError),
}

pub struct ScriptedProbe {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedProbe {
    pub fn new(steps: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            fallback,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        })
    }

    pub fn always(step: Step) -> Arc<Self> {
        Self::new(Vec::new(), step)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().expect("call times lock").clone()
    }
}

#[async_trait]
impl StatusProbe for ScriptedProbe {
    async fn check(&self, item_ids: &[String]) -> Result<Vec<ItemSignal>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times
            .lock()
            .expect("call times lock")
            .push(Instant::now());
        let step = self
            .steps
            .lock()
            .expect("steps lock")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Incomplete => Ok(item_ids.iter().map(ItemSignal::syncing).collect()),
            Step::Partial(done) => Ok(item_ids
                .iter()
                .enumerate()
                .map(|(index, id)| {
                    if index < done {
                        ItemSignal::synced(id, Utc::now())
                    } else {
                        ItemSignal::syncing(id)
                    }
                })
                .collect()),
            Step::Complete => Ok(item_ids
                .iter()
                .map(|id| ItemSignal::synced(id, Utc::now()))
                .collect()),
            Step::Fail(error) => Err(error),
        }
    }
}

/// Probe returning a fixed signal list regardless of the request.
pub struct FixedProbe {
    pub signals: Vec<ItemSignal>,
}

#[async_trait]
impl StatusProbe for FixedProbe {
    async fn check(&self, _item_ids: &[String]) -> Result<Vec<ItemSignal>, ProbeError> {
        Ok(self.signals.clone())
    }
}

pub fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

pub fn fast_policy() -> BackoffPolicy {
    BackoffPolicy {
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(4),
        factor: 1.5,
        grow_every: 3,
    }
}
