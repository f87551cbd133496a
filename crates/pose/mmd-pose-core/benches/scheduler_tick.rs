use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mmd_pose_core::math::quat_from_euler;
use mmd_pose_core::{BoneId, BoneTarget, MemoryRig, Pose, PoseConfig, RigController};

fn full_body_pose() -> Pose {
    BoneId::ALL
        .iter()
        .enumerate()
        .fold(Pose::new(), |pose, (i, bone)| {
            let angle = 0.01 * i as f32;
            let mut target = BoneTarget::rotation(quat_from_euler(angle, -angle, angle * 0.5));
            if bone.is_translatable() {
                target.position = Some([angle, -angle, 0.0]);
            }
            pose.with_bone(*bone, target)
        })
}

fn bench_tick(c: &mut Criterion) {
    let pose = full_body_pose();

    c.bench_function("tick_all_bones_in_flight", |b| {
        let mut ctl =
            RigController::new(MemoryRig::with_full_vocabulary(), PoseConfig::default())
                .expect("default config is valid");
        let mut now = 0.0;
        b.iter(|| {
            if ctl.is_settled() {
                ctl.apply_pose(&pose, now);
            }
            now += 16.0;
            black_box(ctl.tick(now).changes.len());
        })
    });

    c.bench_function("apply_then_export", |b| {
        let mut ctl =
            RigController::new(MemoryRig::with_full_vocabulary(), PoseConfig::default())
                .expect("default config is valid");
        b.iter(|| {
            ctl.apply_pose(&pose, 0.0);
            ctl.tick(1000.0);
            black_box(ctl.export_pose(None));
        })
    });
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
