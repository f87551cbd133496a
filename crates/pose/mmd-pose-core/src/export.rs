//! Pose export: read the rig's current state back into a canonical [`Pose`].
//!
//! Local transforms are recovered from world matrices as
//! `inverse(parent_world) * world`, so rigs whose live values are not directly
//! readable (engine adapters) still export correctly.

use crate::config::PoseConfig;
use crate::math;
use crate::pose::{BoneTarget, BoneTransform, Pose};
use crate::rig::Rig;
use crate::vocab::Vocabulary;

/// Snapshot every vocabulary bone and morph. Bones at rest and morphs at zero
/// are omitted.
pub fn export_pose<R: Rig + ?Sized>(
    rig: &R,
    vocab: &Vocabulary,
    config: &PoseConfig,
    description: Option<String>,
) -> Pose {
    let mut pose = Pose {
        description,
        ..Pose::default()
    };

    for morph in vocab.morphs() {
        let Some(weight) = rig.morph_weight(morph) else {
            continue;
        };
        if weight > config.morph_epsilon {
            pose.morphs.insert(morph, weight.clamp(0.0, 1.0));
        }
    }

    for bone in vocab.bones() {
        let (Some(world), Some(parent_world)) =
            (rig.world_matrix(bone), rig.parent_world_matrix(bone))
        else {
            continue;
        };
        let Some(local) = math::local_from_world(&parent_world, &world) else {
            log::warn!("export: parent matrix of '{bone}' is not invertible; bone skipped");
            continue;
        };
        let Some(parts) = math::decompose(&local) else {
            log::warn!("export: local matrix of '{bone}' is degenerate; bone skipped");
            continue;
        };

        let rotation = math::canonical_quat(
            math::normalize_quat(parts.rotation).unwrap_or(math::IDENTITY_QUAT),
        );
        let position = bone.is_translatable().then(|| {
            let bind = rig.bind_offset(bone);
            [
                parts.translation[0] - bind[0],
                parts.translation[1] - bind[1],
                parts.translation[2] - bind[2],
            ]
        });
        let transform = BoneTransform { position, rotation };
        if transform.is_rest(config.rest_epsilon) {
            continue;
        }

        let eps = config.rest_epsilon;
        let target = BoneTarget {
            position: position.filter(|p| !math::is_zero_vec3(*p, eps)),
            rotation: (!math::is_identity_quat(rotation, eps)).then_some(rotation),
        };
        pose.bones.insert(bone, target);
    }

    log::debug!(
        "export: {} morphs, {} bones",
        pose.morphs.len(),
        pose.bones.len()
    );
    pose
}
