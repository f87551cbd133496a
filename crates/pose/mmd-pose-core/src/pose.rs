//! Canonical pose model and its wire form.
//!
//! Wire schema (the single one this crate writes):
//! ```json
//! { "description": "optional",
//!   "face": { "にこり": 0.8 },
//!   "movableBones": { "センター": [0.0, -1.0, 0.0] },
//!   "rotatableBones": { "頭": [0.0, 0.0, 0.0, 1.0] } }
//! ```
//! Older shapes are accepted on input by the normalizer and converted there.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::math::{self, IDENTITY_QUAT, ZERO_VEC3};
use crate::vocab::{BoneId, MorphId};

/// Sparse per-bone target. At least one component is present.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 3]>,
    /// Unit quaternion (x, y, z, w).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
}

impl BoneTarget {
    pub fn rotation(q: [f32; 4]) -> Self {
        Self {
            position: None,
            rotation: Some(q),
        }
    }

    pub fn position(p: [f32; 3]) -> Self {
        Self {
            position: Some(p),
            rotation: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.rotation.is_none()
    }

    /// Full transform for `bone`, taking missing components from rest.
    pub fn resolve(&self, bone: BoneId) -> BoneTransform {
        let rest = BoneTransform::rest(bone);
        BoneTransform {
            position: if bone.is_translatable() {
                Some(self.position.unwrap_or(ZERO_VEC3))
            } else {
                rest.position
            },
            rotation: self.rotation.unwrap_or(rest.rotation),
        }
    }
}

/// Live local transform of one bone, relative to its rest pose.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneTransform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 3]>,
    pub rotation: [f32; 4],
}

impl BoneTransform {
    pub const IDENTITY: BoneTransform = BoneTransform {
        position: None,
        rotation: IDENTITY_QUAT,
    };

    /// Rest transform: zero offset (translatable bones only) and identity rotation.
    pub fn rest(bone: BoneId) -> Self {
        Self {
            position: bone.is_translatable().then_some(ZERO_VEC3),
            rotation: IDENTITY_QUAT,
        }
    }

    pub fn is_rest(&self, eps: f32) -> bool {
        math::is_identity_quat(self.rotation, eps)
            && self.position.map_or(true, |p| math::is_zero_vec3(p, eps))
    }
}

/// Normalized pose: morph weights in [0,1] and sparse bone targets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pose {
    pub description: Option<String>,
    pub morphs: BTreeMap<MorphId, f32>,
    pub bones: BTreeMap<BoneId, BoneTarget>,
}

impl Pose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_morph(mut self, morph: MorphId, weight: f32) -> Self {
        self.morphs.insert(morph, weight.clamp(0.0, 1.0));
        self
    }

    pub fn with_bone(mut self, bone: BoneId, target: BoneTarget) -> Self {
        self.bones.insert(bone, target);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.morphs.is_empty() && self.bones.is_empty()
    }

    /// Left/right mirror image driven by the per-bone mirror table.
    pub fn mirrored(&self) -> Pose {
        let mut bones = BTreeMap::new();
        for (bone, target) in &self.bones {
            let rule = bone.mirror_rule();
            let position = target.position.map(|p| {
                [
                    p[0] * rule.position_sign[0],
                    p[1] * rule.position_sign[1],
                    p[2] * rule.position_sign[2],
                ]
            });
            let rotation = target.rotation.map(|q| {
                [
                    q[0] * rule.rotation_sign[0],
                    q[1] * rule.rotation_sign[1],
                    q[2] * rule.rotation_sign[2],
                    q[3] * rule.rotation_sign[3],
                ]
            });
            bones.insert(rule.counterpart, BoneTarget { position, rotation });
        }
        // Single-sided morphs would need their own table; weights carry over as-is.
        Pose {
            description: self.description.clone(),
            morphs: self.morphs.clone(),
            bones,
        }
    }

    /// Round every float to `places` decimals (compact dataset output).
    /// Rotations are re-normalized afterwards.
    pub fn quantized(&self, places: u32) -> Pose {
        let scale = 10f32.powi(places as i32);
        let round = |v: f32| (v * scale).round() / scale;
        let morphs = self
            .morphs
            .iter()
            .map(|(m, w)| (*m, round(*w)))
            .filter(|(_, w)| *w != 0.0)
            .collect();
        let bones = self
            .bones
            .iter()
            .map(|(b, t)| {
                let position = t.position.map(|p| p.map(round));
                let rotation = t
                    .rotation
                    .map(|q| math::normalize_quat(q.map(round)).unwrap_or(IDENTITY_QUAT));
                (*b, BoneTarget { position, rotation })
            })
            .collect();
        Pose {
            description: self.description.clone(),
            morphs,
            bones,
        }
    }

    /// Canonical wire document.
    pub fn to_wire(&self) -> PoseDocument {
        let mut doc = PoseDocument {
            description: self.description.clone(),
            ..PoseDocument::default()
        };
        doc.face = self.morphs.clone();
        for (bone, target) in &self.bones {
            if let (true, Some(p)) = (bone.is_translatable(), target.position) {
                doc.movable_bones.insert(*bone, p);
            }
            if let Some(q) = target.rotation {
                doc.rotatable_bones.insert(*bone, q);
            }
        }
        doc
    }

    pub fn from_wire(doc: PoseDocument) -> Pose {
        doc.into_pose()
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self.to_wire()).unwrap_or(serde_json::Value::Null)
    }

    pub fn to_json_string_pretty(&self) -> Result<String, crate::PoseError> {
        serde_json::to_string_pretty(&self.to_wire())
            .map_err(|e| crate::PoseError::Serialize(e.to_string()))
    }
}

/// Serialized form of a [`Pose`] in the canonical schema.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub face: BTreeMap<MorphId, f32>,
    #[serde(default, rename = "movableBones")]
    pub movable_bones: BTreeMap<BoneId, [f32; 3]>,
    #[serde(default, rename = "rotatableBones")]
    pub rotatable_bones: BTreeMap<BoneId, [f32; 4]>,
}

impl PoseDocument {
    /// Trusted conversion (the document was produced by this crate).
    pub fn into_pose(self) -> Pose {
        let mut bones: BTreeMap<BoneId, BoneTarget> = BTreeMap::new();
        for (bone, p) in self.movable_bones {
            if bone.is_translatable() {
                bones.entry(bone).or_insert(BoneTarget::position(p)).position = Some(p);
            }
        }
        for (bone, q) in self.rotatable_bones {
            let q = math::normalize_quat(q).unwrap_or(IDENTITY_QUAT);
            bones.entry(bone).or_insert(BoneTarget::rotation(q)).rotation = Some(q);
        }
        Pose {
            description: self.description,
            morphs: self
                .face
                .into_iter()
                .map(|(m, w)| (m, w.clamp(0.0, 1.0)))
                .collect(),
            bones,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quat_from_euler;

    #[test]
    fn resolve_fills_rest_components() {
        let t = BoneTarget::rotation(quat_from_euler(0.1, 0.0, 0.0));
        let center = t.resolve(BoneId::Center);
        assert_eq!(center.position, Some(ZERO_VEC3));
        let head = t.resolve(BoneId::Head);
        assert_eq!(head.position, None);
        let resolved = BoneTarget::position([1.0, 0.0, 0.0]).resolve(BoneId::Head);
        assert_eq!(resolved.rotation, IDENTITY_QUAT);
    }

    #[test]
    fn wire_document_splits_movable_and_rotatable() {
        let pose = Pose::new()
            .with_morph(MorphId::Smile, 0.8)
            .with_bone(BoneId::Center, BoneTarget::position([0.0, -1.0, 0.0]))
            .with_bone(BoneId::Head, BoneTarget::rotation(IDENTITY_QUAT));
        let json = pose.to_json_value();
        assert_eq!(json["face"]["にこり"], serde_json::json!(0.8f32));
        assert_eq!(json["movableBones"]["センター"][1], serde_json::json!(-1.0));
        assert_eq!(json["rotatableBones"]["頭"][3], serde_json::json!(1.0));
        assert!(json.get("description").is_none());

        let back: PoseDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back.into_pose(), pose);
    }

    #[test]
    fn mirrored_swaps_sides_and_flips_signs() {
        let q = quat_from_euler(0.0, 0.3, 0.2);
        let pose = Pose::new()
            .with_bone(BoneId::LeftArm, BoneTarget::rotation(q))
            .with_bone(BoneId::LeftLegIk, BoneTarget::position([1.0, 2.0, 3.0]));
        let m = pose.mirrored();
        assert!(m.bones.get(&BoneId::LeftArm).is_none());
        let arm = m.bones[&BoneId::RightArm].rotation.unwrap();
        assert_eq!(arm, [q[0], -q[1], -q[2], q[3]]);
        assert_eq!(
            m.bones[&BoneId::RightLegIk].position,
            Some([-1.0, 2.0, 3.0])
        );
        assert_eq!(m.mirrored(), pose);
    }

    #[test]
    fn quantized_rounds_and_drops_zeroed_morphs() {
        let pose = Pose::new()
            .with_morph(MorphId::A, 0.004)
            .with_morph(MorphId::O, 0.6049)
            .with_bone(BoneId::Center, BoneTarget::position([-3.3512, 7.4449, 0.4]));
        let q = pose.quantized(2);
        assert!(!q.morphs.contains_key(&MorphId::A));
        assert_eq!(q.morphs[&MorphId::O], 0.6);
        assert_eq!(q.bones[&BoneId::Center].position, Some([-3.35, 7.44, 0.4]));
    }
}
