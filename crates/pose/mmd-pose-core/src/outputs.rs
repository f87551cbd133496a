//! Per-tick outputs.
//!
//! The scheduler writes straight into the [`crate::Rig`]; the same writes are
//! mirrored here so hosts that keep their own skeleton (wasm bridge) can apply
//! them, alongside a list of semantic events.

use serde::{Deserialize, Serialize};

use crate::pose::BoneTransform;
use crate::vocab::BoneId;

/// One transform written to the rig this tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub bone: BoneId,
    pub transform: BoneTransform,
    /// Interpolation progress in [0,1] at the time of the write.
    pub progress: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum PoseEvent {
    TransitionStarted { bone: BoneId, duration_ms: f64 },
    /// Emitted when a new target replaces a transition still in flight.
    TransitionRetargeted { bone: BoneId, progress: f32 },
    TransitionCompleted { bone: BoneId },
    /// Target requested for a bone the rig has not loaded.
    BoneMissing { bone: BoneId },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub events: Vec<PoseEvent>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.changes.clear();
        self.events.clear();
    }

    #[inline]
    pub fn push_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Append an event unless the per-tick budget is exhausted.
    #[inline]
    pub fn push_event(&mut self, event: PoseEvent, limit: usize) {
        if self.events.len() < limit {
            self.events.push(event);
        } else {
            log::trace!("event budget of {limit} reached; dropping {event:?}");
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.events.is_empty()
    }
}
