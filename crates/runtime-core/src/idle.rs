//! Idle detection for interactive tasks
//!
//! The poller takes one [`ActivitySample`] per interval and asks
//! [`is_idle`] whether anything happened since the previous sample. All state
//! lives in the samples themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What counts as activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleMode {
    /// Idle when no kernels, terminals or sessions exist
    #[default]
    KernelsOrTerminals,

    /// Idle when no kernel has a client connection
    KernelConnections,

    /// Idle when no kernel is busy and activity has not advanced
    Activity,
}

/// Kernel status as reported by the notebook server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelStatus {
    pub connections: u32,
    pub execution_state: String,
    pub last_activity: DateTime<Utc>,
}

impl KernelStatus {
    pub fn is_busy(&self) -> bool {
        self.execution_state == "busy"
    }
}

/// Terminal status as reported by the notebook server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalStatus {
    pub last_activity: DateTime<Utc>,
}

/// One poll of the notebook server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySample {
    pub kernels: Vec<KernelStatus>,
    pub terminals: Vec<TerminalStatus>,
    pub sessions: usize,

    /// Latest activity seen so far, carried forward from the previous
    /// sample when nothing is running
    pub last_activity: Option<DateTime<Utc>>,
}

impl ActivitySample {
    pub fn new(
        kernels: Vec<KernelStatus>,
        terminals: Vec<TerminalStatus>,
        sessions: usize,
        previous: Option<&ActivitySample>,
    ) -> Self {
        let observed = kernels
            .iter()
            .map(|k| k.last_activity)
            .chain(terminals.iter().map(|t| t.last_activity))
            .max();
        let last_activity = observed.or_else(|| previous.and_then(|p| p.last_activity));

        Self {
            kernels,
            terminals,
            sessions,
            last_activity,
        }
    }
}

/// Decide whether the task is idle given the current and previous samples
pub fn is_idle(mode: IdleMode, current: &ActivitySample, previous: Option<&ActivitySample>) -> bool {
    match mode {
        IdleMode::KernelsOrTerminals => {
            current.kernels.is_empty() && current.terminals.is_empty() && current.sessions == 0
        }
        // The terminals API has no connection count
        IdleMode::KernelConnections => current.kernels.iter().all(|k| k.connections == 0),
        IdleMode::Activity => {
            let no_busy_kernels = current.kernels.iter().all(|k| !k.is_busy());
            let previous_activity = previous.and_then(|p| p.last_activity);
            no_busy_kernels && current.last_activity == previous_activity
        }
    }
}
