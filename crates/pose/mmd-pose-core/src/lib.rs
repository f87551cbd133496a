//! MMD Pose Core (engine-agnostic)
//!
//! Normalizes loosely-typed pose payloads against a rig's bone/morph
//! vocabulary, schedules per-bone transitions toward the normalized target and
//! reads the rig back into the canonical pose schema. Rendering, model loading
//! and upstream requests live in the host; the host talks to this crate
//! through the [`Rig`] trait and a per-frame [`RigController::tick`].

pub mod config;
pub mod controller;
pub mod dataset;
pub mod error;
pub mod export;
pub mod math;
pub mod normalize;
pub mod outputs;
pub mod pose;
pub mod response;
pub mod rig;
pub mod scheduler;
pub mod vocab;

// Re-exports for consumers (hosts and adapters)
pub use config::PoseConfig;
pub use controller::{ApplyReport, RigController};
pub use dataset::{DatasetReport, TrainingSample, UNLABELED_DESCRIPTION};
pub use error::PoseError;
pub use export::export_pose;
pub use normalize::{Diagnostic, Normalized, Normalizer};
pub use outputs::{Change, Outputs, PoseEvent};
pub use pose::{BoneTarget, BoneTransform, Pose, PoseDocument};
pub use response::{extract_json_object, parse_response_text};
pub use rig::{MemoryRig, Rig};
pub use scheduler::{Transition, TransitionScheduler};
pub use vocab::{BoneId, MorphId, Vocabulary};
