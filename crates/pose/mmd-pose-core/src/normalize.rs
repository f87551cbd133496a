//! Pose normalizer: untrusted JSON payload -> canonical [`Pose`].
//!
//! Partial success is the contract. A malformed morph or bone entry is dropped
//! on its own and reported as a [`Diagnostic`]; the rest of the payload still
//! applies.
//!
//! Accepted payload shapes:
//! - canonical: `face` / `movableBones` / `rotatableBones` (+ optional `description`)
//! - unified per-bone map under `bones` or `body`: `{ "<bone>": { "position"?, "rotation"? } }`
//! - legacy morph-only object: top-level keys are morph names
//!
//! Vectors may be arrays or `{x,y,z[,w]}` objects. Rotations with three
//! components are Euler radians `[pitch, yaw, roll]`; four components are a
//! quaternion `(x, y, z, w)`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::error::json_kind;
use crate::math;
use crate::pose::{BoneTarget, Pose};
use crate::vocab::{BoneId, MorphId, Vocabulary};

const STRUCTURED_KEYS: &[&str] = &[
    "description",
    "face",
    "movableBones",
    "rotatableBones",
    "bones",
    "body",
];

/// Non-fatal problem found while normalizing one field.
#[derive(Clone, Debug, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error("unknown morph '{name}' dropped")]
    UnknownMorph { name: String },
    #[error("unknown bone '{name}' dropped")]
    UnknownBone { name: String },
    #[error("morph '{name}' dropped: {reason}")]
    MalformedMorph { name: String, reason: String },
    #[error("bone '{name}' {field} dropped: {reason}")]
    MalformedBone {
        name: String,
        field: &'static str,
        reason: String,
    },
    #[error("morph '{morph}' weight {raw} clamped into [0, 1]")]
    MorphClamped { morph: MorphId, raw: f64 },
    #[error("position on non-translatable bone '{bone}' ignored")]
    PositionIgnored { bone: BoneId },
    #[error("unknown section '{key}' ignored")]
    UnknownSection { key: String },
    #[error("section '{section}' must be an object, got {found}")]
    SectionNotObject {
        section: String,
        found: &'static str,
    },
}

impl Diagnostic {
    /// Informational diagnostics do not lose any caller data.
    pub fn is_informational(&self) -> bool {
        matches!(self, Diagnostic::MorphClamped { .. })
    }
}

/// A normalized value plus everything that was dropped on the way.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalized<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Normalized<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    fn push(&mut self, diag: Diagnostic) {
        if diag.is_informational() {
            log::debug!("pose normalize: {diag}");
        } else {
            log::warn!("pose normalize: {diag}");
        }
        self.diagnostics.push(diag);
    }

    fn absorb<U>(&mut self, other: Normalized<U>) -> U {
        self.diagnostics.extend(other.diagnostics);
        other.value
    }

    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }
}

/// Which component a bare vector in a bone entry stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum EntryKind {
    /// `movableBones` entries: vector is a position.
    Position,
    /// `rotatableBones` entries and bare unified entries: vector is a rotation.
    Rotation,
}

/// Validates payloads against the vocabulary of one rig.
#[derive(Clone, Debug)]
pub struct Normalizer {
    vocab: Vocabulary,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Vocabulary::full())
    }
}

impl Normalizer {
    pub fn new(vocab: Vocabulary) -> Self {
        Self { vocab }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn set_vocabulary(&mut self, vocab: Vocabulary) {
        self.vocab = vocab;
    }

    /// Known morphs clamped into [0,1]. `None` yields an empty map, which the
    /// controller treats as "reset every morph".
    pub fn normalize_morphs(&self, raw: Option<&JsonValue>) -> Normalized<BTreeMap<MorphId, f32>> {
        let mut out = Normalized::new(BTreeMap::new());
        let obj = match raw {
            None | Some(JsonValue::Null) => return out,
            Some(JsonValue::Object(obj)) => obj,
            Some(other) => {
                out.push(Diagnostic::SectionNotObject {
                    section: "face".into(),
                    found: json_kind(other),
                });
                return out;
            }
        };
        for (name, value) in obj {
            let Some(morph) = self.vocab.morph(name) else {
                out.push(Diagnostic::UnknownMorph { name: name.clone() });
                continue;
            };
            let raw = match value.as_f64() {
                Some(v) if v.is_finite() => v,
                _ => {
                    out.push(Diagnostic::MalformedMorph {
                        name: name.clone(),
                        reason: format!("expected a finite number, got {}", json_kind(value)),
                    });
                    continue;
                }
            };
            let clamped = raw.clamp(0.0, 1.0);
            if clamped != raw {
                out.push(Diagnostic::MorphClamped { morph, raw });
            }
            out.value.insert(morph, clamped as f32);
        }
        out
    }

    /// Normalize one bone entry. A bare vector is a rotation; an object with
    /// `position` / `rotation` keys may carry both. Returns `None` when the
    /// bone is unknown or nothing usable remains.
    pub fn normalize_bone_target(
        &self,
        name: &str,
        raw: &JsonValue,
    ) -> Normalized<Option<(BoneId, BoneTarget)>> {
        self.normalize_entry(name, raw, EntryKind::Rotation)
    }

    fn normalize_entry(
        &self,
        name: &str,
        raw: &JsonValue,
        kind: EntryKind,
    ) -> Normalized<Option<(BoneId, BoneTarget)>> {
        let mut out = Normalized::new(None);
        let Some(bone) = self.vocab.bone(name) else {
            out.push(Diagnostic::UnknownBone {
                name: name.to_string(),
            });
            return out;
        };

        let mut target = BoneTarget {
            position: None,
            rotation: None,
        };
        let explicit = raw
            .as_object()
            .filter(|o| o.contains_key("position") || o.contains_key("rotation"));
        match explicit {
            Some(obj) => {
                if let Some(p) = obj.get("position").filter(|v| !v.is_null()) {
                    target.position = self.position_component(bone, name, p, &mut out);
                }
                if let Some(r) = obj.get("rotation").filter(|v| !v.is_null()) {
                    target.rotation = rotation_component(name, r, &mut out);
                }
            }
            None => match kind {
                EntryKind::Position => {
                    target.position = self.position_component(bone, name, raw, &mut out)
                }
                EntryKind::Rotation => target.rotation = rotation_component(name, raw, &mut out),
            },
        }

        if !target.is_empty() {
            out.value = Some((bone, target));
        }
        out
    }

    fn position_component<T>(
        &self,
        bone: BoneId,
        name: &str,
        raw: &JsonValue,
        out: &mut Normalized<T>,
    ) -> Option<[f32; 3]> {
        if !bone.is_translatable() {
            out.push(Diagnostic::PositionIgnored { bone });
            return None;
        }
        match parse_vector(raw) {
            Ok(v) if v.len() == 3 => Some([v[0], v[1], v[2]]),
            Ok(v) => {
                out.push(Diagnostic::MalformedBone {
                    name: name.to_string(),
                    field: "position",
                    reason: format!("expected 3 components, got {}", v.len()),
                });
                None
            }
            Err(reason) => {
                out.push(Diagnostic::MalformedBone {
                    name: name.to_string(),
                    field: "position",
                    reason,
                });
                None
            }
        }
    }

    /// Normalize a whole payload, detecting which schema variant it uses.
    pub fn normalize_pose(&self, raw: &JsonValue) -> Normalized<Pose> {
        let mut out = Normalized::new(Pose::default());
        let Some(obj) = raw.as_object() else {
            out.push(Diagnostic::SectionNotObject {
                section: "pose".into(),
                found: json_kind(raw),
            });
            return out;
        };

        let structured = obj.keys().any(|k| STRUCTURED_KEYS.contains(&k.as_str()));
        if !structured {
            // First prompt revision: the model answers with morph weights only.
            let morphs = self.normalize_morphs(Some(raw));
            out.value.morphs = out.absorb(morphs);
            return out;
        }

        for key in obj.keys() {
            if !STRUCTURED_KEYS.contains(&key.as_str()) {
                out.push(Diagnostic::UnknownSection { key: key.clone() });
            }
        }

        out.value.description = obj
            .get("description")
            .and_then(|d| d.as_str())
            .map(str::to_owned);

        let morphs = self.normalize_morphs(obj.get("face"));
        out.value.morphs = out.absorb(morphs);

        let sections = [
            ("movableBones", EntryKind::Position),
            ("rotatableBones", EntryKind::Rotation),
            ("bones", EntryKind::Rotation),
            ("body", EntryKind::Rotation),
        ];
        for (section, kind) in sections {
            let Some(value) = obj.get(section) else {
                continue;
            };
            let entries = match section_object(section, value, &mut out) {
                Some(entries) => entries,
                None => continue,
            };
            for (name, entry) in entries {
                let normalized = self.normalize_entry(name, entry, kind);
                if let Some((bone, target)) = out.absorb(normalized) {
                    merge_target(&mut out.value.bones, bone, target);
                }
            }
        }
        out
    }

    /// Deserialize-free entry point for raw JSON text that is already known
    /// to be valid JSON (see [`crate::response`] for model output).
    pub fn normalize_pose_str(&self, s: &str) -> Result<Normalized<Pose>, crate::PoseError> {
        let raw: JsonValue =
            serde_json::from_str(s).map_err(|e| crate::PoseError::ResponseNotJson {
                reason: e.to_string(),
            })?;
        Ok(self.normalize_pose(&raw))
    }
}

fn section_object<'a, T>(
    section: &str,
    value: &'a JsonValue,
    out: &mut Normalized<T>,
) -> Option<&'a Map<String, JsonValue>> {
    match value {
        JsonValue::Object(entries) => Some(entries),
        JsonValue::Null => None,
        other => {
            out.push(Diagnostic::SectionNotObject {
                section: section.to_string(),
                found: json_kind(other),
            });
            None
        }
    }
}

fn merge_target(bones: &mut BTreeMap<BoneId, BoneTarget>, bone: BoneId, target: BoneTarget) {
    let slot = bones.entry(bone).or_insert(BoneTarget {
        position: None,
        rotation: None,
    });
    if target.position.is_some() {
        if slot.position.is_some() {
            log::debug!("bone '{bone}' position given twice; later section wins");
        }
        slot.position = target.position;
    }
    if target.rotation.is_some() {
        if slot.rotation.is_some() {
            log::debug!("bone '{bone}' rotation given twice; later section wins");
        }
        slot.rotation = target.rotation;
    }
}

fn rotation_component<T>(name: &str, raw: &JsonValue, out: &mut Normalized<T>) -> Option<[f32; 4]> {
    let malformed = |reason: String| Diagnostic::MalformedBone {
        name: name.to_string(),
        field: "rotation",
        reason,
    };
    match parse_vector(raw) {
        Ok(v) if v.len() == 4 => match math::normalize_quat([v[0], v[1], v[2], v[3]]) {
            Some(q) => Some(q),
            None => {
                out.push(malformed("zero-length quaternion".into()));
                None
            }
        },
        Ok(v) if v.len() == 3 => Some(math::quat_from_euler(v[0], v[1], v[2])),
        Ok(v) => {
            out.push(malformed(format!(
                "expected 3 (euler) or 4 (quaternion) components, got {}",
                v.len()
            )));
            None
        }
        Err(reason) => {
            out.push(malformed(reason));
            None
        }
    }
}

/// Numeric vector from `[..]` or `{x, y, z[, w]}`. Every component must be finite as f32.
fn parse_vector(raw: &JsonValue) -> Result<Vec<f32>, String> {
    let components: Vec<&JsonValue> = match raw {
        JsonValue::Array(items) => items.iter().collect(),
        JsonValue::Object(obj) => {
            let mut comps = Vec::with_capacity(4);
            for key in ["x", "y", "z"] {
                match obj.get(key) {
                    Some(v) => comps.push(v),
                    None => return Err(format!("missing '{key}' component")),
                }
            }
            if let Some(w) = obj.get("w") {
                comps.push(w);
            }
            comps
        }
        other => return Err(format!("expected an array or object, got {}", json_kind(other))),
    };
    components
        .into_iter()
        .enumerate()
        .map(|(i, c)| match c.as_f64().map(|v| v as f32) {
            Some(v) if v.is_finite() => Ok(v),
            Some(_) => Err(format!("component {i} is not finite")),
            None => Err(format!("component {i} is {}, not a number", json_kind(c))),
        })
        .collect()
}
