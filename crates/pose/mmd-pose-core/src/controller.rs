//! Per-rig controller: owns the rig, its vocabulary, the transition scheduler
//! and the configuration. One controller per loaded model; nothing is global.

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::config::PoseConfig;
use crate::error::{json_kind, PoseError};
use crate::export;
use crate::normalize::{Diagnostic, Normalizer};
use crate::outputs::Outputs;
use crate::pose::{BoneTransform, Pose};
use crate::response;
use crate::rig::Rig;
use crate::scheduler::TransitionScheduler;
use crate::vocab::{BoneId, Vocabulary};

/// Summary of one `apply_*` call.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    pub diagnostics: Vec<Diagnostic>,
    /// Transitions started or retargeted.
    pub targets_set: usize,
    /// Pose bones the rig has not loaded; their targets were skipped.
    pub missing_bones: Vec<BoneId>,
}

pub struct RigController<R: Rig> {
    rig: R,
    normalizer: Normalizer,
    scheduler: TransitionScheduler,
    config: PoseConfig,
    outputs: Outputs,
}

impl<R: Rig> RigController<R> {
    pub fn new(rig: R, config: PoseConfig) -> Result<Self, PoseError> {
        config.validate()?;
        let vocab = Vocabulary::from_names(rig.known_bones(), rig.known_morphs());
        Ok(Self {
            rig,
            normalizer: Normalizer::new(vocab),
            scheduler: TransitionScheduler::new(config.max_events_per_tick),
            config,
            outputs: Outputs::default(),
        })
    }

    pub fn rig(&self) -> &R {
        &self.rig
    }

    /// Direct rig access for hosts that load bones incrementally; call
    /// [`Self::refresh_vocabulary`] afterwards.
    pub fn rig_mut(&mut self) -> &mut R {
        &mut self.rig
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        self.normalizer.vocabulary()
    }

    pub fn config(&self) -> &PoseConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PoseConfig) -> Result<(), PoseError> {
        config.validate()?;
        self.scheduler.set_max_events_per_tick(config.max_events_per_tick);
        self.config = config;
        Ok(())
    }

    /// Rebuild the vocabulary from the rig's current bone and morph lists.
    pub fn refresh_vocabulary(&mut self) {
        let vocab = Vocabulary::from_names(self.rig.known_bones(), self.rig.known_morphs());
        log::debug!(
            "vocabulary refreshed: {} bones, {} morphs",
            vocab.bones().count(),
            vocab.morphs().count()
        );
        self.normalizer.set_vocabulary(vocab);
    }

    /// Apply a normalized pose at `now_ms`.
    ///
    /// Morphs are reset to zero and set instantly. Bones named in the pose
    /// transition to their targets; every other known bone relaxes to rest.
    /// A non-finite `now_ms` is refused and the rig is left untouched.
    pub fn apply_pose(&mut self, pose: &Pose, now_ms: f64) -> ApplyReport {
        let mut report = ApplyReport::default();
        if !now_ms.is_finite() {
            log::warn!("apply_pose: non-finite timestamp {now_ms}; pose ignored");
            return report;
        }
        let vocab = self.normalizer.vocabulary();

        for morph in vocab.morphs() {
            self.rig.set_morph_weight(morph, 0.0);
        }
        for (morph, weight) in &pose.morphs {
            if vocab.contains_morph(*morph) {
                self.rig.set_morph_weight(*morph, weight.clamp(0.0, 1.0));
            } else {
                log::debug!("apply_pose: morph '{morph}' not in rig; skipped");
            }
        }

        for bone in vocab.bones() {
            if pose.bones.contains_key(&bone) {
                continue;
            }
            let at_rest = self
                .rig
                .live_transform(bone)
                .map_or(true, |t| t.is_rest(self.config.rest_epsilon));
            if at_rest && self.scheduler.in_flight(bone).is_none() {
                continue;
            }
            if self.scheduler.set_target(
                &self.rig,
                bone,
                BoneTransform::rest(bone),
                self.config.reset_duration_ms,
                now_ms,
            ) {
                report.targets_set += 1;
            }
        }

        for (bone, target) in &pose.bones {
            let started = self.scheduler.set_target(
                &self.rig,
                *bone,
                target.resolve(*bone),
                self.config.transition_duration_ms,
                now_ms,
            );
            if started {
                report.targets_set += 1;
            } else {
                log::warn!("apply_pose: bone '{bone}' is not loaded; target skipped");
                report.missing_bones.push(*bone);
            }
        }

        log::debug!(
            "apply_pose: {} morphs, {} transitions, {} missing",
            pose.morphs.len(),
            report.targets_set,
            report.missing_bones.len()
        );
        report
    }

    /// Normalize an untrusted payload and apply it.
    pub fn apply_json(&mut self, raw: &JsonValue, now_ms: f64) -> Result<ApplyReport, PoseError> {
        if !raw.is_object() {
            return Err(PoseError::InvalidPayload {
                found: json_kind(raw),
            });
        }
        let (pose, diagnostics) = self.normalizer.normalize_pose(raw).into_parts();
        let mut report = self.apply_pose(&pose, now_ms);
        report.diagnostics = diagnostics;
        Ok(report)
    }

    /// Parse model output and apply it. On error the rig is left untouched.
    pub fn apply_response_text(
        &mut self,
        text: &str,
        now_ms: f64,
    ) -> Result<ApplyReport, PoseError> {
        let raw = response::parse_response_text(text)?;
        self.apply_json(&raw, now_ms)
    }

    /// Advance all transitions to `now_ms`.
    pub fn tick(&mut self, now_ms: f64) -> &Outputs {
        self.outputs.clear();
        self.scheduler.tick(&mut self.rig, now_ms, &mut self.outputs);
        &self.outputs
    }

    pub fn export_pose(&self, description: Option<String>) -> Pose {
        export::export_pose(
            &self.rig,
            self.normalizer.vocabulary(),
            &self.config,
            description,
        )
    }

    pub fn is_settled(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn scheduler(&self) -> &TransitionScheduler {
        &self.scheduler
    }

    /// Drop every in-flight transition. The rig keeps its last written values.
    pub fn teardown(&mut self) {
        self.scheduler.clear();
        self.outputs.clear();
    }

    pub fn into_rig(self) -> R {
        self.rig
    }
}
