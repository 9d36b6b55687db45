//! Edge-triggered status tracking.
//!
//! [`StatusTracker`] exclusively owns the process-wide status memory: one
//! boolean per endpoint URL. Feeding it a cycle's probe results yields a
//! transition event for every URL whose status flipped since the previous
//! cycle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::prober::{EndpointStatus, ProbeResult};

/// A change in an endpoint's up/down state between two consecutive cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub id: String,
    pub display_name: String,
    pub url: String,
    pub previous: EndpointStatus,
    pub current: EndpointStatus,
    /// The probe result that triggered the transition.
    pub result: ProbeResult,
    pub timestamp: DateTime<Utc>,
}

impl TransitionEvent {
    fn new(result: &ProbeResult, previous: EndpointStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            display_name: result.display_name.clone(),
            url: result.url.clone(),
            previous,
            current: result.status,
            result: result.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct StatusTracker {
    memory: HashMap<String, bool>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cycle's results and return the transitions they caused.
    ///
    /// Memory is overwritten for every result, whether or not a transition
    /// fired, so it always reflects the most recent observation. A URL with
    /// no prior entry never produces an event.
    pub fn record_and_diff(&mut self, results: &[ProbeResult]) -> Vec<TransitionEvent> {
        let mut transitions = Vec::new();

        for result in results {
            let is_up = result.is_up();
            if let Some(&previous) = self.memory.get(&result.url) {
                if previous != is_up {
                    let previous = if previous {
                        EndpointStatus::Up
                    } else {
                        EndpointStatus::Down
                    };
                    transitions.push(TransitionEvent::new(result, previous));
                }
            }
            self.memory.insert(result.url.clone(), is_up);
        }

        transitions
    }

    /// Last observed status per URL, sorted by URL for stable output.
    pub fn statuses(&self) -> Vec<(String, bool)> {
        let mut all: Vec<_> = self.memory.iter().map(|(u, up)| (u.clone(), *up)).collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }
}
