//! Bounded buffer of recent network activity
//!
//! The agent gets situational awareness ("who advertised lately") from
//! the most recent network events. Instead of a process-wide log file,
//! the daemon owns one [`EventRing`] and hands it to whoever needs it.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Default ring capacity
pub const DEFAULT_CAPACITY: usize = 100;

/// One observed network event, already rendered for display
#[derive(Debug, Clone)]
pub struct NetworkEvent {
    /// Rendered description, e.g. `ADVERT from ab12cd34 (BasecampNode)`
    pub detail: String,
    /// When it was observed
    pub timestamp: DateTime<Utc>,
}

/// Fixed-capacity ring of recent network events
///
/// Pushing beyond capacity drops the oldest entry. Owned explicitly by
/// the daemon and passed by reference into consumers.
#[derive(Debug)]
pub struct EventRing {
    events: VecDeque<NetworkEvent>,
    capacity: usize,
}

impl EventRing {
    /// Create a ring holding at most `capacity` events
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    /// Record an event, evicting the oldest if the ring is full
    pub fn push(&mut self, detail: String) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(NetworkEvent {
            detail,
            timestamp: Utc::now(),
        });
    }

    /// Most recent events, oldest first, rendered with a relative age
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<String> {
        let now = Utc::now();
        let skip = self.events.len().saturating_sub(limit);
        self.events
            .iter()
            .skip(skip)
            .map(|event| {
                let age = format_age(now.signed_duration_since(event.timestamp).num_seconds());
                format!("[{age}] {}", event.detail)
            })
            .collect()
    }

    /// Number of buffered events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events were recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for EventRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Render an age in seconds as `42s ago` / `7m ago` / `3h ago`
fn format_age(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        format!("{seconds}s ago")
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else {
        format!("{}h ago", seconds / 3600)
    }
}
