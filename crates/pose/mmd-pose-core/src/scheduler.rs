//! Transition scheduler: per-bone in-flight interpolation records advanced once
//! per rendered frame.
//!
//! Per-bone state is implicit: a bone with a record is transitioning, a bone
//! without one is at rest at whatever was last written. `set_target` always
//! starts from the rig's *live* transform, so re-targeting mid-flight continues
//! from the value on screen instead of snapping.

use hashbrown::HashMap;

use crate::math;
use crate::outputs::{Change, Outputs, PoseEvent};
use crate::pose::BoneTransform;
use crate::rig::Rig;
use crate::vocab::BoneId;

/// One in-flight interpolation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub start: BoneTransform,
    pub target: BoneTransform,
    pub start_ms: f64,
    pub duration_ms: f64,
}

impl Transition {
    /// Normalized progress in [0,1]; zero-length transitions are complete immediately.
    pub fn progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0) as f32
    }

    /// Slerp for rotation, lerp for position. `t >= 1` is exactly the target.
    pub fn sample(&self, t: f32) -> BoneTransform {
        if t >= 1.0 {
            return self.target;
        }
        let rotation = math::slerp_quat(self.start.rotation, self.target.rotation, t);
        let position = match (self.start.position, self.target.position) {
            (Some(a), Some(b)) => Some(math::lerp_vec3(a, b, t)),
            (a, b) => b.or(a),
        };
        BoneTransform { position, rotation }
    }
}

#[derive(Debug)]
pub struct TransitionScheduler {
    in_flight: HashMap<BoneId, Transition>,
    /// Events raised between ticks (by `set_target`), flushed on the next tick.
    pending: Vec<PoseEvent>,
    max_events_per_tick: usize,
}

impl Default for TransitionScheduler {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl TransitionScheduler {
    pub fn new(max_events_per_tick: usize) -> Self {
        Self {
            in_flight: HashMap::new(),
            pending: Vec::new(),
            max_events_per_tick,
        }
    }

    /// Start (or restart) a transition for `bone` toward `target`.
    /// No-op returning `false` when the rig has no live bone by that name yet,
    /// or when `now_ms` is not finite.
    pub fn set_target<R: Rig + ?Sized>(
        &mut self,
        rig: &R,
        bone: BoneId,
        target: BoneTransform,
        duration_ms: f64,
        now_ms: f64,
    ) -> bool {
        if !now_ms.is_finite() {
            log::warn!("set_target: non-finite timestamp {now_ms} for '{bone}'; skipped");
            return false;
        }
        let Some(live) = rig.live_transform(bone) else {
            log::debug!("set_target: bone '{bone}' not loaded in rig; skipped");
            self.queue_event(PoseEvent::BoneMissing { bone });
            return false;
        };

        let duration_ms = if duration_ms.is_finite() {
            duration_ms.max(0.0)
        } else {
            0.0
        };
        let record = Transition {
            start: live,
            target: BoneTransform {
                position: target.position.or(live.position),
                rotation: target.rotation,
            },
            start_ms: now_ms,
            duration_ms,
        };

        match self.in_flight.insert(bone, record) {
            Some(previous) => {
                let progress = previous.progress(now_ms);
                log::debug!("set_target: '{bone}' retargeted at progress {progress:.3}");
                self.queue_event(PoseEvent::TransitionRetargeted { bone, progress });
            }
            None => {
                log::trace!("set_target: '{bone}' over {duration_ms}ms");
                self.queue_event(PoseEvent::TransitionStarted { bone, duration_ms });
            }
        }
        true
    }

    /// Advance every in-flight transition to `now_ms` and write the results.
    /// A non-finite `now_ms` only flushes pending events; the rig is not written.
    pub fn tick<R: Rig + ?Sized>(&mut self, rig: &mut R, now_ms: f64, outputs: &mut Outputs) {
        for event in self.pending.drain(..) {
            outputs.push_event(event, self.max_events_per_tick);
        }
        if self.in_flight.is_empty() {
            return;
        }
        if !now_ms.is_finite() {
            log::warn!("tick: non-finite timestamp {now_ms}; frame skipped");
            return;
        }

        let mut bones: Vec<BoneId> = self.in_flight.keys().copied().collect();
        bones.sort_unstable();

        for bone in bones {
            let Some(record) = self.in_flight.get(&bone).copied() else {
                continue;
            };
            let progress = record.progress(now_ms);
            let transform = record.sample(progress);
            rig.write_transform(bone, &transform);
            outputs.push_change(Change {
                bone,
                transform,
                progress,
            });
            if progress >= 1.0 {
                self.in_flight.remove(&bone);
                log::trace!("tick: '{bone}' settled");
                outputs.push_event(
                    PoseEvent::TransitionCompleted { bone },
                    self.max_events_per_tick,
                );
            }
        }
    }

    /// Applies from the next event; in-flight records are kept.
    pub fn set_max_events_per_tick(&mut self, limit: usize) {
        self.max_events_per_tick = limit;
    }

    pub fn in_flight(&self, bone: BoneId) -> Option<&Transition> {
        self.in_flight.get(&bone)
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Drop every record and pending event (scene teardown).
    pub fn clear(&mut self) {
        self.in_flight.clear();
        self.pending.clear();
    }

    fn queue_event(&mut self, event: PoseEvent) {
        if self.pending.len() < self.max_events_per_tick {
            self.pending.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{quat_angle_between, quat_from_euler, IDENTITY_QUAT};
    use crate::rig::MemoryRig;

    fn rot(q: [f32; 4]) -> BoneTransform {
        BoneTransform {
            position: None,
            rotation: q,
        }
    }

    fn live_rot(rig: &MemoryRig, bone: BoneId) -> [f32; 4] {
        rig.live_transform(bone).unwrap().rotation
    }

    #[test]
    fn progress_clamps_and_handles_zero_duration() {
        let t = Transition {
            start: BoneTransform::IDENTITY,
            target: BoneTransform::IDENTITY,
            start_ms: 100.0,
            duration_ms: 200.0,
        };
        assert_eq!(t.progress(50.0), 0.0);
        assert_eq!(t.progress(200.0), 0.5);
        assert_eq!(t.progress(1000.0), 1.0);
        let instant = Transition {
            duration_ms: 0.0,
            ..t
        };
        assert_eq!(instant.progress(100.0), 1.0);
    }

    #[test]
    fn tick_interpolates_then_snaps_and_removes() {
        let mut rig = MemoryRig::with_full_vocabulary();
        let mut sched = TransitionScheduler::default();
        let mut out = Outputs::default();
        let target = quat_from_euler(0.0, 1.0, 0.0);

        assert!(sched.set_target(&rig, BoneId::Head, rot(target), 1000.0, 0.0));
        sched.tick(&mut rig, 500.0, &mut out);
        let half = live_rot(&rig, BoneId::Head);
        assert!((quat_angle_between(IDENTITY_QUAT, half) - 0.5).abs() < 1e-4);
        assert!(matches!(out.events[0], PoseEvent::TransitionStarted { .. }));

        out.clear();
        sched.tick(&mut rig, 1000.0, &mut out);
        assert_eq!(live_rot(&rig, BoneId::Head), target);
        assert!(sched.is_idle());
        assert_eq!(
            out.events,
            vec![PoseEvent::TransitionCompleted { bone: BoneId::Head }]
        );
    }

    #[test]
    fn missing_bone_is_a_noop() {
        let rig = MemoryRig::new();
        let mut sched = TransitionScheduler::default();
        assert!(!sched.set_target(&rig, BoneId::Head, rot(IDENTITY_QUAT), 100.0, 0.0));
        assert!(sched.is_idle());
    }

    #[test]
    fn retarget_starts_from_live_value() {
        let mut rig = MemoryRig::with_full_vocabulary();
        let mut sched = TransitionScheduler::default();
        let mut out = Outputs::default();
        let first = quat_from_euler(1.0, 0.0, 0.0);
        let second = quat_from_euler(-1.0, 0.0, 0.0);

        sched.set_target(&rig, BoneId::Neck, rot(first), 1000.0, 0.0);
        sched.tick(&mut rig, 400.0, &mut out);
        let live = live_rot(&rig, BoneId::Neck);

        sched.set_target(&rig, BoneId::Neck, rot(second), 1000.0, 400.0);
        let record = sched.in_flight(BoneId::Neck).unwrap();
        assert_eq!(record.start.rotation, live);
        assert_eq!(record.start_ms, 400.0);

        out.clear();
        sched.tick(&mut rig, 400.0, &mut out);
        assert!(quat_angle_between(live_rot(&rig, BoneId::Neck), live) < 1e-5);
        assert!(out
            .events
            .iter()
            .any(|e| matches!(e, PoseEvent::TransitionRetargeted { .. })));
    }

    #[test]
    fn non_finite_time_never_reaches_the_rig() {
        let mut rig = MemoryRig::with_full_vocabulary();
        let mut sched = TransitionScheduler::default();
        let mut out = Outputs::default();
        let target = quat_from_euler(0.5, 0.0, 0.0);

        assert!(!sched.set_target(&rig, BoneId::Head, rot(target), 1000.0, f64::NAN));
        assert!(!sched.set_target(&rig, BoneId::Head, rot(target), 1000.0, f64::INFINITY));
        assert!(sched.is_idle());

        sched.set_target(&rig, BoneId::Head, rot(target), 1000.0, 0.0);
        sched.tick(&mut rig, f64::NAN, &mut out);
        assert!(out.changes.is_empty());
        assert_eq!(live_rot(&rig, BoneId::Head), IDENTITY_QUAT);
        assert!(matches!(out.events[0], PoseEvent::TransitionStarted { .. }));

        out.clear();
        sched.tick(&mut rig, 1000.0, &mut out);
        assert_eq!(live_rot(&rig, BoneId::Head), target);
        assert!(sched.is_idle());
    }

    #[test]
    fn event_limit_can_change_mid_flight() {
        let mut rig = MemoryRig::with_full_vocabulary();
        let mut sched = TransitionScheduler::new(1);
        let mut out = Outputs::default();
        sched.set_target(&rig, BoneId::Head, rot(IDENTITY_QUAT), 100.0, 0.0);
        sched.set_target(&rig, BoneId::Neck, rot(IDENTITY_QUAT), 100.0, 0.0);
        sched.set_max_events_per_tick(16);
        assert_eq!(sched.len(), 2);

        sched.tick(&mut rig, 100.0, &mut out);
        assert!(sched.is_idle());
        let completed = out
            .events
            .iter()
            .filter(|e| matches!(e, PoseEvent::TransitionCompleted { .. }))
            .count();
        assert_eq!(completed, 2);
    }

    #[test]
    fn position_lerps_for_translatable_bones() {
        let mut rig = MemoryRig::with_full_vocabulary();
        let mut sched = TransitionScheduler::default();
        let mut out = Outputs::default();
        let target = BoneTransform {
            position: Some([0.0, -4.0, 2.0]),
            rotation: IDENTITY_QUAT,
        };
        sched.set_target(&rig, BoneId::Center, target, 1000.0, 0.0);
        sched.tick(&mut rig, 250.0, &mut out);
        let p = rig.live_transform(BoneId::Center).unwrap().position.unwrap();
        assert!((p[1] + 1.0).abs() < 1e-5);
        assert!((p[2] - 0.5).abs() < 1e-5);
    }
}
