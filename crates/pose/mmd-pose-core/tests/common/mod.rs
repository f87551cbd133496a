#![allow(dead_code)]

use mmd_pose_core::math::quat_angle_between;
use mmd_pose_core::{BoneId, MemoryRig, MorphId, PoseConfig, Rig, RigController};

pub fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

pub fn assert_quat_close(a: [f32; 4], b: [f32; 4], eps: f32) {
    let angle = quat_angle_between(a, b);
    assert!(angle <= eps, "quaternions {a:?} and {b:?} differ by {angle} rad");
}

/// Small humanoid hierarchy with bind offsets; remaining vocabulary bones are
/// roots at the origin.
pub fn skeleton_rig() -> MemoryRig {
    use BoneId::*;
    let chain: &[(BoneId, Option<BoneId>, [f32; 3])] = &[
        (Center, None, [0.0, 8.0, 0.0]),
        (LowerBody, Some(Center), [0.0, 2.0, 0.0]),
        (UpperBody, Some(Center), [0.0, 2.5, 0.0]),
        (UpperBody2, Some(UpperBody), [0.0, 1.5, 0.0]),
        (Neck, Some(UpperBody2), [0.0, 2.0, 0.0]),
        (Head, Some(Neck), [0.0, 1.0, 0.0]),
        (LeftShoulder, Some(UpperBody2), [0.5, 1.8, 0.0]),
        (LeftArm, Some(LeftShoulder), [1.0, 0.0, 0.0]),
        (LeftElbow, Some(LeftArm), [2.0, -0.5, 0.0]),
        (LeftWrist, Some(LeftElbow), [2.0, -0.3, 0.0]),
        (RightShoulder, Some(UpperBody2), [-0.5, 1.8, 0.0]),
        (RightArm, Some(RightShoulder), [-1.0, 0.0, 0.0]),
        (RightElbow, Some(RightArm), [-2.0, -0.5, 0.0]),
        (RightWrist, Some(RightElbow), [-2.0, -0.3, 0.0]),
        (LeftLeg, Some(LowerBody), [0.9, -1.0, 0.0]),
        (LeftKnee, Some(LeftLeg), [0.0, -3.5, 0.0]),
        (LeftAnkle, Some(LeftKnee), [0.0, -3.5, 0.0]),
        (RightLeg, Some(LowerBody), [-0.9, -1.0, 0.0]),
        (RightKnee, Some(RightLeg), [0.0, -3.5, 0.0]),
        (RightAnkle, Some(RightKnee), [0.0, -3.5, 0.0]),
        (LeftLegIk, None, [0.9, 1.2, 0.0]),
        (LeftToeIk, Some(LeftLegIk), [0.0, -1.0, -1.5]),
        (RightLegIk, None, [-0.9, 1.2, 0.0]),
        (RightToeIk, Some(RightLegIk), [0.0, -1.0, -1.5]),
    ];
    let mut rig = MemoryRig::new();
    for (bone, parent, bind) in chain {
        rig.add_bone(*bone, *parent, *bind);
    }
    for bone in BoneId::ALL {
        if !rig.contains_bone(*bone) {
            rig.add_bone(*bone, None, [0.0; 3]);
        }
    }
    for morph in MorphId::ALL {
        rig.add_morph(*morph);
    }
    rig
}

pub fn controller() -> RigController<MemoryRig> {
    RigController::new(skeleton_rig(), PoseConfig::default()).expect("default config")
}

/// Tick in 16ms frames from `from` to `to` inclusive of `to`.
pub fn run_frames(ctl: &mut RigController<MemoryRig>, from: f64, to: f64) {
    let mut t = from;
    while t < to {
        t = (t + 16.0).min(to);
        ctl.tick(t);
    }
}

/// Compare the live state of two rigs bone by bone.
pub fn assert_rigs_match(a: &MemoryRig, b: &MemoryRig, eps: f32) {
    for bone in BoneId::ALL {
        let (Some(ta), Some(tb)) = (a.live_transform(*bone), b.live_transform(*bone)) else {
            continue;
        };
        assert_quat_close(ta.rotation, tb.rotation, eps);
        if let (Some(pa), Some(pb)) = (ta.position, tb.position) {
            for i in 0..3 {
                approx(pa[i], pb[i], eps);
            }
        }
    }
    for morph in MorphId::ALL {
        approx(
            a.morph_weight(*morph).unwrap_or(0.0),
            b.morph_weight(*morph).unwrap_or(0.0),
            eps,
        );
    }
}
