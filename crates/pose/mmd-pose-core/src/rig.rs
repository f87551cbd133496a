//! Rig accessor contract and an in-memory rig.
//!
//! Hosts (wasm bridge, engine adapters) implement [`Rig`] over their own
//! skeleton. Transforms are local and relative to rest: `position` is an offset
//! from the bone's bind translation, `rotation` is the local pose rotation.

use hashbrown::HashMap;
use nalgebra::Matrix4;

use crate::math::{self, ZERO_VEC3};
use crate::pose::BoneTransform;
use crate::vocab::{BoneId, MorphId};

pub trait Rig {
    /// Every bone name the loaded model exposes.
    fn known_bones(&self) -> Vec<String>;
    /// Every morph name the loaded model exposes.
    fn known_morphs(&self) -> Vec<String>;

    /// Current local transform, or `None` while the bone is not (yet) loaded.
    fn live_transform(&self, bone: BoneId) -> Option<BoneTransform>;
    fn write_transform(&mut self, bone: BoneId, transform: &BoneTransform);

    fn morph_weight(&self, morph: MorphId) -> Option<f32>;
    fn set_morph_weight(&mut self, morph: MorphId, weight: f32);

    /// World matrix of the bone after the latest write.
    fn world_matrix(&self, bone: BoneId) -> Option<Matrix4<f32>>;
    /// World matrix of the bone's parent; identity for root bones.
    fn parent_world_matrix(&self, bone: BoneId) -> Option<Matrix4<f32>>;
    /// Bind (rest) translation of the bone relative to its parent.
    fn bind_offset(&self, bone: BoneId) -> [f32; 3] {
        let _ = bone;
        ZERO_VEC3
    }
}

#[derive(Clone, Debug)]
struct RigBone {
    parent: Option<BoneId>,
    bind_offset: [f32; 3],
    local: BoneTransform,
}

/// Self-contained rig: bone hierarchy, bind offsets, live local transforms and
/// morph weights. World matrices are composed on demand.
#[derive(Clone, Debug, Default)]
pub struct MemoryRig {
    bones: HashMap<BoneId, RigBone>,
    order: Vec<BoneId>,
    morphs: HashMap<MorphId, f32>,
    morph_order: Vec<MorphId>,
}

impl MemoryRig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every vocabulary bone as a root with zero bind offset, plus every morph.
    pub fn with_full_vocabulary() -> Self {
        let mut rig = Self::new();
        for bone in BoneId::ALL {
            rig.add_bone(*bone, None, ZERO_VEC3);
        }
        for morph in MorphId::ALL {
            rig.add_morph(*morph);
        }
        rig
    }

    /// Register a bone. The parent must already be registered; an unknown
    /// parent makes the bone a root.
    pub fn add_bone(&mut self, bone: BoneId, parent: Option<BoneId>, bind_offset: [f32; 3]) {
        let parent = parent.filter(|p| {
            if !self.bones.contains_key(p) {
                log::warn!("rig bone '{bone}': parent '{p}' not registered, treating as root");
                return false;
            }
            if self.is_ancestor_or_self(bone, *p) {
                log::warn!("rig bone '{bone}': parent '{p}' would form a cycle, treating as root");
                return false;
            }
            true
        });
        let entry = RigBone {
            parent,
            bind_offset,
            local: BoneTransform::rest(bone),
        };
        if self.bones.insert(bone, entry).is_none() {
            self.order.push(bone);
        }
    }

    pub fn add_morph(&mut self, morph: MorphId) {
        if self.morphs.insert(morph, 0.0).is_none() {
            self.morph_order.push(morph);
        }
    }

    fn is_ancestor_or_self(&self, candidate: BoneId, of: BoneId) -> bool {
        let mut cursor = Some(of);
        while let Some(b) = cursor {
            if b == candidate {
                return true;
            }
            cursor = self.parent(b);
        }
        false
    }

    pub fn contains_bone(&self, bone: BoneId) -> bool {
        self.bones.contains_key(&bone)
    }

    pub fn parent(&self, bone: BoneId) -> Option<BoneId> {
        self.bones.get(&bone).and_then(|b| b.parent)
    }

    fn local_matrix(&self, bone: &RigBone) -> Matrix4<f32> {
        let offset = bone.local.position.unwrap_or(ZERO_VEC3);
        let translation = [
            bone.bind_offset[0] + offset[0],
            bone.bind_offset[1] + offset[1],
            bone.bind_offset[2] + offset[2],
        ];
        math::compose_tr(translation, bone.local.rotation)
    }
}

impl Rig for MemoryRig {
    fn known_bones(&self) -> Vec<String> {
        self.order.iter().map(|b| b.name().to_string()).collect()
    }

    fn known_morphs(&self) -> Vec<String> {
        self.morph_order.iter().map(|m| m.name().to_string()).collect()
    }

    fn live_transform(&self, bone: BoneId) -> Option<BoneTransform> {
        self.bones.get(&bone).map(|b| b.local)
    }

    fn write_transform(&mut self, bone: BoneId, transform: &BoneTransform) {
        if let Some(b) = self.bones.get_mut(&bone) {
            b.local.rotation = transform.rotation;
            if bone.is_translatable() {
                b.local.position = Some(transform.position.unwrap_or(ZERO_VEC3));
            }
        }
    }

    fn morph_weight(&self, morph: MorphId) -> Option<f32> {
        self.morphs.get(&morph).copied()
    }

    fn set_morph_weight(&mut self, morph: MorphId, weight: f32) {
        if let Some(w) = self.morphs.get_mut(&morph) {
            *w = weight;
        }
    }

    fn world_matrix(&self, bone: BoneId) -> Option<Matrix4<f32>> {
        let mut current = self.bones.get(&bone)?;
        let mut world = self.local_matrix(current);
        // add_bone rejects parents that would close a cycle.
        while let Some(parent) = current.parent.and_then(|p| self.bones.get(&p)) {
            world = self.local_matrix(parent) * world;
            current = parent;
        }
        Some(world)
    }

    fn parent_world_matrix(&self, bone: BoneId) -> Option<Matrix4<f32>> {
        let entry = self.bones.get(&bone)?;
        match entry.parent {
            Some(parent) => self.world_matrix(parent),
            None => Some(Matrix4::identity()),
        }
    }

    fn bind_offset(&self, bone: BoneId) -> [f32; 3] {
        self.bones
            .get(&bone)
            .map(|b| b.bind_offset)
            .unwrap_or(ZERO_VEC3)
    }
}
