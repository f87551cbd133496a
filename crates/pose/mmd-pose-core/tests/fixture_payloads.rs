mod common;

use common::{approx, assert_quat_close, controller, run_frames};
use mmd_pose_core::dataset::{self, DEFAULT_SYSTEM_PROMPT};
use mmd_pose_core::math::{quat_from_euler, IDENTITY_QUAT};
use mmd_pose_core::{
    BoneId, Diagnostic, MorphId, Normalizer, PoseDocument, PoseError, Rig, UNLABELED_DESCRIPTION,
};
use serde_json::Value;

fn load(name: &str) -> Value {
    mmd_pose_test_fixtures::poses::load(name).expect("pose fixture")
}

#[test]
fn every_pose_fixture_applies() {
    for name in mmd_pose_test_fixtures::poses::keys() {
        let mut ctl = controller();
        let report = ctl
            .apply_json(&load(&name), 0.0)
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert!(report.missing_bones.is_empty(), "{name}");
        run_frames(&mut ctl, 0.0, 1000.0);
        assert!(ctl.is_settled(), "{name}");
    }
}

#[test]
fn legacy_morph_only_payload_sets_face() {
    let mut ctl = controller();
    let report = ctl.apply_json(&load("legacy-morphs"), 0.0).unwrap();
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.targets_set, 0);
    approx(ctl.rig().morph_weight(MorphId::Smile).unwrap(), 0.8, 1e-6);
    approx(ctl.rig().morph_weight(MorphId::Blink).unwrap(), 1.0, 1e-6);
    approx(ctl.rig().morph_weight(MorphId::A).unwrap(), 0.3, 1e-6);
}

#[test]
fn object_form_vectors_are_accepted() {
    let (pose, diagnostics) = Normalizer::default()
        .normalize_pose(&load("arms-forward"))
        .into_parts();
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    assert_eq!(pose.morphs[&MorphId::O], 0.6);
    let center = pose.bones[&BoneId::Center];
    assert_eq!(center.position, Some([-3.35, 7.44, 0.4]));
    assert_eq!(center.rotation, None);
    let head = pose.bones[&BoneId::Head].rotation.unwrap();
    let len = head.iter().map(|c| c * c).sum::<f32>().sqrt();
    approx(len, 1.0, 1e-6);
}

#[test]
fn unified_body_map_carries_position_and_rotation() {
    let mut ctl = controller();
    ctl.apply_json(&load("unified-body"), 0.0).unwrap();
    ctl.tick(1000.0);

    let center = ctl.rig().live_transform(BoneId::Center).unwrap();
    assert_eq!(center.position, Some([0.0, -1.5, 0.5]));
    assert_quat_close(center.rotation, quat_from_euler(0.0, 0.2, 0.0), 1e-6);
    let arm = ctl.rig().live_transform(BoneId::LeftArm).unwrap();
    assert_quat_close(arm.rotation, quat_from_euler(0.0, 0.0, 0.5), 1e-6);
}

#[test]
fn noisy_fixture_reports_but_applies() {
    let mut ctl = controller();
    let report = ctl.apply_json(&load("noisy"), 0.0).unwrap();
    assert!(report
        .diagnostics
        .contains(&Diagnostic::UnknownBone { name: "しっぽ".into() }));
    assert!(report
        .diagnostics
        .contains(&Diagnostic::PositionIgnored { bone: BoneId::Head }));
    assert_eq!(report.targets_set, 1);
}

#[test]
fn fenced_model_response_is_extracted() {
    let text = mmd_pose_test_fixtures::responses::text("fenced").unwrap();
    let mut ctl = controller();
    ctl.apply_response_text(&text, 0.0).expect("response contains a pose");
    ctl.tick(500.0);
    approx(ctl.rig().morph_weight(MorphId::Surprised).unwrap(), 0.9, 1e-6);
    approx(ctl.rig().morph_weight(MorphId::O).unwrap(), 0.7, 1e-6);
    assert_quat_close(
        ctl.rig().live_transform(BoneId::Head).unwrap().rotation,
        IDENTITY_QUAT,
        1e-6,
    );
}

#[test]
fn refusal_response_fails_without_touching_the_rig() {
    let mut ctl = controller();
    ctl.apply_json(&load("legacy-morphs"), 0.0).unwrap();

    let text = mmd_pose_test_fixtures::responses::text("refusal").unwrap();
    let err = ctl.apply_response_text(&text, 10.0).unwrap_err();
    assert!(matches!(err, PoseError::ResponseNotJson { .. }));
    approx(ctl.rig().morph_weight(MorphId::Smile).unwrap(), 0.8, 1e-6);
    assert!(ctl.is_settled());
}

#[test]
fn mirroring_twice_is_identity() {
    let (pose, _) = Normalizer::default()
        .normalize_pose(&load("arms-forward"))
        .into_parts();
    let mirrored = pose.mirrored();
    assert_eq!(
        mirrored.bones[&BoneId::RightArm].rotation.map(|q| q[0]),
        pose.bones[&BoneId::LeftArm].rotation.map(|q| q[0])
    );
    assert_eq!(mirrored.mirrored(), pose);
}

#[test]
fn quantized_pose_survives_the_wire() {
    let (pose, _) = Normalizer::default()
        .normalize_pose(&load("arms-forward"))
        .into_parts();
    let compact = pose.quantized(2);
    let doc: PoseDocument =
        serde_json::from_value(compact.to_json_value()).expect("canonical document");
    let back = doc.into_pose();
    assert_eq!(back.bones.len(), compact.bones.len());
    assert_eq!(back.morphs, compact.morphs);
}

#[test]
fn dataset_directory_converts_and_validates() {
    let samples = dataset::load_samples_from_dir(
        mmd_pose_test_fixtures::poses::dir(),
        &Normalizer::default(),
    )
    .expect("fixture dir readable");
    assert_eq!(samples.len(), mmd_pose_test_fixtures::poses::keys().len());
    assert!(samples
        .iter()
        .any(|s| s.description == UNLABELED_DESCRIPTION));

    let jsonl = dataset::write_chat_jsonl(&samples, DEFAULT_SYSTEM_PROMPT).unwrap();
    let report = dataset::validate_chat_jsonl(&jsonl);
    assert!(report.is_valid(), "{:?}", report.issues);
    assert_eq!(report.valid_examples, samples.len());
}
