use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use citetrace_core::{classify, Verification};

/// Time-to-certainty metrics recorded beside verification results rather than
/// stamped onto them. `Verification` stays an immutable value object; this
/// side channel is joined at read time via the citation key.
#[derive(Default)]
pub struct VerifyTiming {
    entries: Mutex<HashMap<String, TimingEntry>>,
}

#[derive(Debug, Clone, Copy)]
struct TimingEntry {
    started: Instant,
    settled: Option<Instant>,
}

impl VerifyTiming {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call when a citation key is first submitted for verification.
    pub fn started(&self, key: &str) {
        let mut entries = self.entries.lock().expect("timing poisoned");
        entries.entry(key.to_string()).or_insert(TimingEntry {
            started: Instant::now(),
            settled: None,
        });
    }

    /// Call when a verification arrives; pending statuses do not settle.
    pub fn observed(&self, key: &str, verification: &Verification) {
        if classify(Some(verification)).is_pending {
            return;
        }
        let mut entries = self.entries.lock().expect("timing poisoned");
        if let Some(entry) = entries.get_mut(key) {
            entry.settled.get_or_insert_with(Instant::now);
        }
    }

    /// Elapsed time from submission to the first terminal status, if settled.
    pub fn time_to_certainty(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().expect("timing poisoned");
        let entry = entries.get(key)?;
        entry.settled.map(|settled| settled - entry.started)
    }
}
