use js_sys::JSON;
use serde::Serialize;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;

use mmd_pose_core::{
    BoneId, MemoryRig, MorphId, PoseConfig, Rig, RigController, UNLABELED_DESCRIPTION,
};

/// Pose engine over an in-memory rig. The host registers its model's bones and
/// morphs, applies poses, calls `tick` once per rendered frame and copies the
/// returned changes onto its own skeleton.
#[wasm_bindgen]
pub struct MmdPoseEngine {
    core: RigController<MemoryRig>,
}

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

/// Plain JS objects (not `Map`s) so results can be passed to `JSON.stringify`.
fn to_js<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<JsValue, JsError> {
    value
        .serialize(&swb::Serializer::json_compatible())
        .map_err(|e| JsError::new(&format!("{what} error: {e}")))
}

fn to_json_value(value: &JsValue, what: &str) -> Result<serde_json::Value, JsError> {
    // Stringify so the core normalizer sees exactly what the host sent.
    let s = JSON::stringify(value)
        .map_err(|e| JsError::new(&format!("{what} stringify error: {:?}", e)))?
        .as_string()
        .ok_or_else(|| JsError::new(&format!("{what}: stringify produced non-string")))?;
    serde_json::from_str(&s).map_err(|e| JsError::new(&format!("{what} parse error: {e}")))
}

fn config_from_js(config: &JsValue) -> Result<PoseConfig, JsError> {
    let raw = to_json_value(config, "config")?;
    PoseConfig::from_json_value(&raw).map_err(|e| JsError::new(&e.to_string()))
}

fn vec3_from_js(v: &JsValue, what: &str) -> Result<[f32; 3], JsError> {
    if jsvalue_is_undefined_or_null(v) {
        return Ok([0.0; 3]);
    }
    swb::from_value(v.clone()).map_err(|e| JsError::new(&format!("{what} error: {e}")))
}

#[wasm_bindgen]
impl MmdPoseEngine {
    /// Create an engine. Pass a config object or undefined/null for defaults.
    /// Example:
    ///   new MmdPoseEngine({ transition_duration_ms: 800 })
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<MmdPoseEngine, JsError> {
        console_error_panic_hook::set_once();

        let cfg: PoseConfig = if jsvalue_is_undefined_or_null(&config) {
            PoseConfig::default()
        } else {
            config_from_js(&config)?
        };
        let core = RigController::new(MemoryRig::new(), cfg)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(MmdPoseEngine { core })
    }

    /// Register a model bone. Returns false for names outside the pose
    /// vocabulary, which poses can never address.
    /// `bind_offset` is `[x, y, z]` relative to the parent (defaults to zero).
    #[wasm_bindgen(js_name = add_bone)]
    pub fn add_bone(
        &mut self,
        name: &str,
        parent: Option<String>,
        bind_offset: JsValue,
    ) -> Result<bool, JsError> {
        let Some(bone) = BoneId::from_name(name) else {
            return Ok(false);
        };
        let parent = parent.as_deref().and_then(BoneId::from_name);
        let offset = vec3_from_js(&bind_offset, "bind_offset")?;
        self.core.rig_mut().add_bone(bone, parent, offset);
        self.core.refresh_vocabulary();
        Ok(true)
    }

    /// Register a model morph. Returns false for names outside the vocabulary.
    #[wasm_bindgen(js_name = add_morph)]
    pub fn add_morph(&mut self, name: &str) -> bool {
        let Some(morph) = MorphId::from_name(name) else {
            return false;
        };
        self.core.rig_mut().add_morph(morph);
        self.core.refresh_vocabulary();
        true
    }

    /// Apply a pose object (any accepted payload shape). Returns the apply
    /// report `{ diagnostics, targets_set, missing_bones }`.
    #[wasm_bindgen(js_name = apply_pose)]
    pub fn apply_pose(&mut self, pose: JsValue, now_ms: f64) -> Result<JsValue, JsError> {
        if jsvalue_is_undefined_or_null(&pose) {
            return Err(JsError::new("apply_pose: pose is null/undefined"));
        }
        let raw = to_json_value(&pose, "apply_pose")?;
        let report = self
            .core
            .apply_json(&raw, now_ms)
            .map_err(|e| JsError::new(&e.to_string()))?;
        to_js(&report, "report")
    }

    /// Apply raw model output text. Throws when no JSON object can be found;
    /// the rig is unchanged in that case.
    #[wasm_bindgen(js_name = apply_response_text)]
    pub fn apply_response_text(&mut self, text: &str, now_ms: f64) -> Result<JsValue, JsError> {
        let report = self
            .core
            .apply_response_text(text, now_ms)
            .map_err(|e| JsError::new(&e.to_string()))?;
        to_js(&report, "report")
    }

    /// Advance transitions to `now_ms`. Returns `{ changes, events }`.
    #[wasm_bindgen]
    pub fn tick(&mut self, now_ms: f64) -> Result<JsValue, JsError> {
        let out = self.core.tick(now_ms);
        to_js(out, "outputs")
    }

    /// Current rig state in the canonical schema. Unlabeled exports get the
    /// fixed dataset description.
    #[wasm_bindgen(js_name = export_pose)]
    pub fn export_pose(&self, description: Option<String>) -> Result<JsValue, JsError> {
        let pose = self
            .core
            .export_pose(Some(description.unwrap_or_else(|| UNLABELED_DESCRIPTION.into())));
        to_js(&pose.to_wire(), "export")
    }

    /// Same as `export_pose`, as pretty-printed JSON text (file download).
    #[wasm_bindgen(js_name = export_pose_json)]
    pub fn export_pose_json(&self, description: Option<String>) -> Result<String, JsError> {
        self.core
            .export_pose(Some(description.unwrap_or_else(|| UNLABELED_DESCRIPTION.into())))
            .to_json_string_pretty()
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Live local transform `{ position?, rotation }`, or undefined for unknown bones.
    #[wasm_bindgen(js_name = bone_transform)]
    pub fn bone_transform(&self, name: &str) -> Result<JsValue, JsError> {
        match BoneId::from_name(name).and_then(|b| self.core.rig().live_transform(b)) {
            Some(t) => to_js(&t, "bone_transform"),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    #[wasm_bindgen(js_name = morph_weight)]
    pub fn morph_weight(&self, name: &str) -> Option<f32> {
        MorphId::from_name(name).and_then(|m| self.core.rig().morph_weight(m))
    }

    #[wasm_bindgen(js_name = set_config)]
    pub fn set_config(&mut self, config: JsValue) -> Result<(), JsError> {
        let cfg = config_from_js(&config)?;
        self.core
            .set_config(cfg)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = is_settled)]
    pub fn is_settled(&self) -> bool {
        self.core.is_settled()
    }

    /// Drop all in-flight transitions (scene teardown or model swap).
    #[wasm_bindgen]
    pub fn teardown(&mut self) {
        self.core.teardown();
    }
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
