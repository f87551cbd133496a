//! Closed bone and morph vocabularies.
//!
//! Rig names are matched against these tables exactly once, at the boundary
//! (normalizer, rig vocabulary refresh). Everything past that point works with
//! `BoneId`/`MorphId` values.

use std::collections::BTreeSet;
use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

macro_rules! name_table {
    (
        $(#[$meta:meta])*
        pub enum $ty:ident { $($variant:ident => $name:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $ty {
            $($variant),+
        }

        impl $ty {
            /// Every identifier, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Rig-facing name.
            pub fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.name())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                $ty::from_name(&s).ok_or_else(|| {
                    de::Error::custom(format!(concat!("unknown ", stringify!($ty), " '{}'"), s))
                })
            }
        }
    };
}

name_table! {
    /// Facial morph identifiers understood by the pose pipeline.
    pub enum MorphId {
        Serious => "真面目",
        Troubled => "困る",
        Smile => "にこり",
        Angry => "怒り",
        Blink => "まばたき",
        LaughingEyes => "笑い",
        Wink => "ウィンク",
        WinkRight => "ウィンク右",
        Wink2 => "ウィンク２",
        Wink2Right => "ｳｨﾝｸ２右",
        Calm => "なごみ",
        Surprised => "びっくり",
        Dreadful => "恐ろしい子！",
        HachuEyes => "はちゅ目",
        Hau => "はぅ",
        Kiri => "ｷﾘｯ",
        UpperEyelid => "眼睑上",
        LowerEyeCorner => "眼角下",
        JitoEyes => "じと目",
        JitoEyes1 => "じと目1",
        A => "あ",
        I => "い",
        U => "う",
        E => "え",
        O => "お",
        O1 => "お1",
        MouthCornersUp => "口角上げ",
        MouthCornersDown => "口角下げ",
        MouthCornersDown1 => "口角下げ1",
        MouthNarrow => "口横缩げ",
        MouthWide => "口横広げ",
        Grin2 => "にやり２",
        Grin2Alt => "にやり２1",
        Embarrassed => "照れ",
        SurprisedEyes => "驚き",
        NarrowEyes => "細め",
        BrowUp => "眉上",
        BrowDown => "眉下",
        BrowAngry => "眉怒り",
        BrowTroubled => "眉困る",
        Goofy => "アホ",
        Sweat => "汗",
        Tears => "涙",
        Smug => "ドヤ",
        EyesClosed => "目閉じ",
    }
}

name_table! {
    /// Skeleton bones a pose may address.
    pub enum BoneId {
        Center => "センター",
        LeftLegIk => "左足ＩＫ",
        RightLegIk => "右足ＩＫ",
        LeftToeIk => "左つま先ＩＫ",
        RightToeIk => "右つま先ＩＫ",
        UpperBody => "上半身",
        UpperBody2 => "上半身2",
        LowerBody => "下半身",
        Neck => "首",
        Head => "頭",
        BothEyes => "両目",
        LeftEye => "左目",
        RightEye => "右目",
        LeftShoulder => "左肩",
        RightShoulder => "右肩",
        LeftArm => "左腕",
        RightArm => "右腕",
        LeftElbow => "左ひじ",
        RightElbow => "右ひじ",
        LeftWrist => "左手首",
        RightWrist => "右手首",
        LeftThumb1 => "左親指１",
        LeftThumb2 => "左親指２",
        LeftIndex1 => "左人指１",
        LeftIndex2 => "左人指２",
        LeftIndex3 => "左人指３",
        LeftMiddle1 => "左中指１",
        LeftMiddle2 => "左中指２",
        LeftMiddle3 => "左中指３",
        LeftRing1 => "左薬指１",
        LeftRing2 => "左薬指２",
        LeftRing3 => "左薬指３",
        LeftPinky1 => "左小指１",
        LeftPinky2 => "左小指２",
        LeftPinky3 => "左小指３",
        RightThumb1 => "右親指１",
        RightThumb2 => "右親指２",
        RightIndex1 => "右人指１",
        RightIndex2 => "右人指２",
        RightIndex3 => "右人指３",
        RightMiddle1 => "右中指１",
        RightMiddle2 => "右中指２",
        RightMiddle3 => "右中指３",
        RightRing1 => "右薬指１",
        RightRing2 => "右薬指２",
        RightRing3 => "右薬指３",
        RightPinky1 => "右小指１",
        RightPinky2 => "右小指２",
        RightPinky3 => "右小指３",
        LeftLeg => "左足",
        RightLeg => "右足",
        LeftKnee => "左ひざ",
        RightKnee => "右ひざ",
        LeftAnkle => "左足首",
        RightAnkle => "右足首",
    }
}

impl BoneId {
    /// Root and IK end-effectors: the only bones that take a position offset.
    pub const TRANSLATABLE: &'static [BoneId] = &[
        BoneId::Center,
        BoneId::LeftLegIk,
        BoneId::RightLegIk,
        BoneId::LeftToeIk,
        BoneId::RightToeIk,
    ];

    #[inline]
    pub fn is_translatable(self) -> bool {
        Self::TRANSLATABLE.contains(&self)
    }

    /// Mirror rule for this bone (self-mirroring with the default signs when the
    /// bone sits on the centre line).
    pub fn mirror_rule(self) -> MirrorRule {
        MIRROR_RULES
            .iter()
            .find_map(|rule| {
                if rule.bone == self {
                    Some(*rule)
                } else if rule.counterpart == self {
                    Some(MirrorRule {
                        bone: self,
                        counterpart: rule.bone,
                        ..*rule
                    })
                } else {
                    None
                }
            })
            .unwrap_or(MirrorRule {
                bone: self,
                counterpart: self,
                position_sign: MIRROR_POSITION_SIGN,
                rotation_sign: MIRROR_ROTATION_SIGN,
            })
    }
}

/// Reflection across the character's sagittal (YZ) plane.
const MIRROR_POSITION_SIGN: [f32; 3] = [-1.0, 1.0, 1.0];
/// Quaternion (x,y,z,w) components under the same reflection.
const MIRROR_ROTATION_SIGN: [f32; 4] = [1.0, -1.0, -1.0, 1.0];

/// One row of the left/right mirror table.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MirrorRule {
    pub bone: BoneId,
    pub counterpart: BoneId,
    pub position_sign: [f32; 3],
    pub rotation_sign: [f32; 4],
}

macro_rules! mirror_pairs {
    ($($left:ident <=> $right:ident),+ $(,)?) => {
        &[$(MirrorRule {
            bone: BoneId::$left,
            counterpart: BoneId::$right,
            position_sign: MIRROR_POSITION_SIGN,
            rotation_sign: MIRROR_ROTATION_SIGN,
        }),+]
    };
}

static MIRROR_RULES: &[MirrorRule] = mirror_pairs! {
    LeftLegIk <=> RightLegIk,
    LeftToeIk <=> RightToeIk,
    LeftEye <=> RightEye,
    LeftShoulder <=> RightShoulder,
    LeftArm <=> RightArm,
    LeftElbow <=> RightElbow,
    LeftWrist <=> RightWrist,
    LeftThumb1 <=> RightThumb1,
    LeftThumb2 <=> RightThumb2,
    LeftIndex1 <=> RightIndex1,
    LeftIndex2 <=> RightIndex2,
    LeftIndex3 <=> RightIndex3,
    LeftMiddle1 <=> RightMiddle1,
    LeftMiddle2 <=> RightMiddle2,
    LeftMiddle3 <=> RightMiddle3,
    LeftRing1 <=> RightRing1,
    LeftRing2 <=> RightRing2,
    LeftRing3 <=> RightRing3,
    LeftPinky1 <=> RightPinky1,
    LeftPinky2 <=> RightPinky2,
    LeftPinky3 <=> RightPinky3,
    LeftLeg <=> RightLeg,
    LeftKnee <=> RightKnee,
    LeftAnkle <=> RightAnkle,
};

/// The subset of bones and morphs present in one loaded rig.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vocabulary {
    bones: BTreeSet<BoneId>,
    morphs: BTreeSet<MorphId>,
}

impl Vocabulary {
    /// Every identifier in the closed tables.
    pub fn full() -> Self {
        Self {
            bones: BoneId::ALL.iter().copied().collect(),
            morphs: MorphId::ALL.iter().copied().collect(),
        }
    }

    /// Build from the rig's own name lists. Names outside the closed tables
    /// are not addressable by poses and are skipped.
    pub fn from_names<B, M>(bones: B, morphs: M) -> Self
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        let mut vocab = Self::default();
        for name in bones {
            match BoneId::from_name(name.as_ref()) {
                Some(id) => {
                    vocab.bones.insert(id);
                }
                None => log::trace!("rig bone '{}' is outside the pose vocabulary", name.as_ref()),
            }
        }
        for name in morphs {
            match MorphId::from_name(name.as_ref()) {
                Some(id) => {
                    vocab.morphs.insert(id);
                }
                None => log::trace!("rig morph '{}' is outside the pose vocabulary", name.as_ref()),
            }
        }
        vocab
    }

    #[inline]
    pub fn bone(&self, name: &str) -> Option<BoneId> {
        BoneId::from_name(name).filter(|id| self.bones.contains(id))
    }

    #[inline]
    pub fn morph(&self, name: &str) -> Option<MorphId> {
        MorphId::from_name(name).filter(|id| self.morphs.contains(id))
    }

    #[inline]
    pub fn contains_bone(&self, bone: BoneId) -> bool {
        self.bones.contains(&bone)
    }

    #[inline]
    pub fn contains_morph(&self, morph: MorphId) -> bool {
        self.morphs.contains(&morph)
    }

    pub fn bones(&self) -> impl Iterator<Item = BoneId> + '_ {
        self.bones.iter().copied()
    }

    pub fn morphs(&self) -> impl Iterator<Item = MorphId> + '_ {
        self.morphs.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty() && self.morphs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup() {
        for bone in BoneId::ALL {
            assert_eq!(BoneId::from_name(bone.name()), Some(*bone));
        }
        for morph in MorphId::ALL {
            assert_eq!(MorphId::from_name(morph.name()), Some(*morph));
        }
        assert_eq!(BoneId::from_name("fakeBone"), None);
    }

    #[test]
    fn translatable_set_is_root_and_ik() {
        assert!(BoneId::Center.is_translatable());
        assert!(BoneId::RightToeIk.is_translatable());
        assert!(!BoneId::Head.is_translatable());
        assert_eq!(
            BoneId::ALL.iter().filter(|b| b.is_translatable()).count(),
            5
        );
    }

    #[test]
    fn mirror_table_is_symmetric() {
        for bone in BoneId::ALL {
            let rule = bone.mirror_rule();
            assert_eq!(rule.bone, *bone);
            assert_eq!(rule.counterpart.mirror_rule().counterpart, *bone);
        }
        assert_eq!(BoneId::LeftArm.mirror_rule().counterpart, BoneId::RightArm);
        assert_eq!(BoneId::Head.mirror_rule().counterpart, BoneId::Head);
    }

    #[test]
    fn vocabulary_filters_unknown_names() {
        let vocab = Vocabulary::from_names(["頭", "全ての親", "左腕"], ["にこり", "謎"]);
        assert_eq!(vocab.bone("頭"), Some(BoneId::Head));
        assert_eq!(vocab.bone("右腕"), None);
        assert_eq!(vocab.morph("にこり"), Some(MorphId::Smile));
        assert_eq!(vocab.bones().count(), 2);
        assert_eq!(vocab.morphs().count(), 1);
    }

    #[test]
    fn ids_serialize_as_rig_names() {
        let s = serde_json::to_string(&BoneId::Head).unwrap();
        assert_eq!(s, "\"頭\"");
        let m: MorphId = serde_json::from_str("\"びっくり\"").unwrap();
        assert_eq!(m, MorphId::Surprised);
        assert!(serde_json::from_str::<MorphId>("\"nope\"").is_err());
    }
}
