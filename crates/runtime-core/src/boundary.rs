//! Boundary evaluation
//!
//! Decides after every processed batch (or epoch-end signal) which scheduler
//! actions are due. The decision is a pure function of the progress counters
//! and the boundary list.

use serde::{Deserialize, Serialize};

use crate::{BoundaryKind, BoundaryUnit, Error, ProgressState, Result, TrainBoundary};

/// Actions due at a boundary-check point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryDecision {
    pub checkpoint: bool,
    pub validate: bool,
    pub train_limit: bool,
}

impl BoundaryDecision {
    pub fn any(&self) -> bool {
        self.checkpoint || self.validate || self.train_limit
    }
}

/// A validated boundary list, ordered by priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryPlan {
    boundaries: Vec<TrainBoundary>,
}

impl BoundaryPlan {
    /// Validate and order a boundary list.
    ///
    /// At most one TRAIN boundary may be given. The sort is stable, so
    /// boundaries of the same kind keep their configured order.
    pub fn new(boundaries: &[TrainBoundary]) -> Result<Self> {
        let train_limits: Vec<_> = boundaries
            .iter()
            .filter(|b| b.kind == BoundaryKind::Train)
            .collect();

        if train_limits.len() > 1 {
            let limits: Vec<String> = train_limits.iter().map(|b| b.unit.to_string()).collect();
            return Err(Error::ContradictoryLimits {
                message: format!("expected at most one train limit, got [{}]", limits.join(", ")),
            });
        }

        let mut boundaries = boundaries.to_vec();
        boundaries.sort_by_key(|b| b.kind);

        Ok(Self { boundaries })
    }

    /// Boundaries in priority order
    pub fn boundaries(&self) -> &[TrainBoundary] {
        &self.boundaries
    }

    /// The training-length limit, if one is configured and enabled
    pub fn train_limit(&self) -> Option<BoundaryUnit> {
        self.boundaries
            .iter()
            .find(|b| b.kind == BoundaryKind::Train && !b.unit.is_disabled())
            .map(|b| b.unit)
    }

    /// True if `progress` already satisfies the training-length limit
    pub fn limit_reached(&self, progress: &ProgressState) -> bool {
        self.train_limit()
            .map(|unit| unit.counter(progress) >= unit.count())
            .unwrap_or(false)
    }

    /// Evaluate every boundary against the counter transition `before -> after`
    pub fn evaluate(
        &self,
        before: &ProgressState,
        after: &ProgressState,
        epoch_ended: bool,
    ) -> BoundaryDecision {
        let mut decision = BoundaryDecision::default();

        for boundary in &self.boundaries {
            if !satisfied(boundary, before, after, epoch_ended) {
                continue;
            }
            match boundary.kind {
                BoundaryKind::Checkpoint => decision.checkpoint = true,
                BoundaryKind::Validate => decision.validate = true,
                BoundaryKind::Train => decision.train_limit = true,
            }
        }

        decision
    }
}

/// Whether a single boundary fires on the counter transition `before -> after`.
///
/// TRAIN boundaries are absolute limits. CHECKPOINT and VALIDATE boundaries are
/// periodic and fire when the counter crosses a multiple of the unit count.
/// Epoch units only fire on an epoch-end signal. A zero count never fires.
pub fn satisfied(
    boundary: &TrainBoundary,
    before: &ProgressState,
    after: &ProgressState,
    epoch_ended: bool,
) -> bool {
    let unit = boundary.unit;
    if unit.is_disabled() {
        return false;
    }
    if matches!(unit, BoundaryUnit::Epochs(_)) && !epoch_ended {
        return false;
    }

    let n = unit.count();
    let prev = unit.counter(before);
    let next = unit.counter(after);

    match boundary.kind {
        BoundaryKind::Train => next >= n,
        BoundaryKind::Checkpoint | BoundaryKind::Validate => next / n > prev / n,
    }
}
