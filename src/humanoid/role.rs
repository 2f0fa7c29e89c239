//! 人形骨骼角色词表（VRM humanoid，55 个）

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// 人形骨骼角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HumanoidBone {
    Hips,
    LeftUpperLeg,
    RightUpperLeg,
    LeftLowerLeg,
    RightLowerLeg,
    LeftFoot,
    RightFoot,
    Spine,
    Chest,
    Neck,
    Head,
    LeftShoulder,
    RightShoulder,
    LeftUpperArm,
    RightUpperArm,
    LeftLowerArm,
    RightLowerArm,
    LeftHand,
    RightHand,
    LeftToes,
    RightToes,
    LeftEye,
    RightEye,
    Jaw,
    LeftThumbProximal,
    LeftThumbIntermediate,
    LeftThumbDistal,
    LeftIndexProximal,
    LeftIndexIntermediate,
    LeftIndexDistal,
    LeftMiddleProximal,
    LeftMiddleIntermediate,
    LeftMiddleDistal,
    LeftRingProximal,
    LeftRingIntermediate,
    LeftRingDistal,
    LeftLittleProximal,
    LeftLittleIntermediate,
    LeftLittleDistal,
    RightThumbProximal,
    RightThumbIntermediate,
    RightThumbDistal,
    RightIndexProximal,
    RightIndexIntermediate,
    RightIndexDistal,
    RightMiddleProximal,
    RightMiddleIntermediate,
    RightMiddleDistal,
    RightRingProximal,
    RightRingIntermediate,
    RightRingDistal,
    RightLittleProximal,
    RightLittleIntermediate,
    RightLittleDistal,
    UpperChest,
}

use HumanoidBone::*;

impl HumanoidBone {
    /// 重定向处理顺序：髋部优先，然后由躯干向外
    pub const RETARGET_ORDER: [HumanoidBone; 55] = [
        Hips,
        LeftUpperLeg,
        RightUpperLeg,
        LeftLowerLeg,
        RightLowerLeg,
        LeftFoot,
        RightFoot,
        Spine,
        Chest,
        Neck,
        Head,
        LeftShoulder,
        RightShoulder,
        LeftUpperArm,
        RightUpperArm,
        LeftLowerArm,
        RightLowerArm,
        LeftHand,
        RightHand,
        LeftToes,
        RightToes,
        LeftEye,
        RightEye,
        Jaw,
        LeftThumbProximal,
        LeftThumbIntermediate,
        LeftThumbDistal,
        LeftIndexProximal,
        LeftIndexIntermediate,
        LeftIndexDistal,
        LeftMiddleProximal,
        LeftMiddleIntermediate,
        LeftMiddleDistal,
        LeftRingProximal,
        LeftRingIntermediate,
        LeftRingDistal,
        LeftLittleProximal,
        LeftLittleIntermediate,
        LeftLittleDistal,
        RightThumbProximal,
        RightThumbIntermediate,
        RightThumbDistal,
        RightIndexProximal,
        RightIndexIntermediate,
        RightIndexDistal,
        RightMiddleProximal,
        RightMiddleIntermediate,
        RightMiddleDistal,
        RightRingProximal,
        RightRingIntermediate,
        RightRingDistal,
        RightLittleProximal,
        RightLittleIntermediate,
        RightLittleDistal,
        UpperChest,
    ];

    /// VRM 角色名（camelCase）
    pub fn as_str(self) -> &'static str {
        match self {
            Hips => "hips",
            LeftUpperLeg => "leftUpperLeg",
            RightUpperLeg => "rightUpperLeg",
            LeftLowerLeg => "leftLowerLeg",
            RightLowerLeg => "rightLowerLeg",
            LeftFoot => "leftFoot",
            RightFoot => "rightFoot",
            Spine => "spine",
            Chest => "chest",
            Neck => "neck",
            Head => "head",
            LeftShoulder => "leftShoulder",
            RightShoulder => "rightShoulder",
            LeftUpperArm => "leftUpperArm",
            RightUpperArm => "rightUpperArm",
            LeftLowerArm => "leftLowerArm",
            RightLowerArm => "rightLowerArm",
            LeftHand => "leftHand",
            RightHand => "rightHand",
            LeftToes => "leftToes",
            RightToes => "rightToes",
            LeftEye => "leftEye",
            RightEye => "rightEye",
            Jaw => "jaw",
            LeftThumbProximal => "leftThumbProximal",
            LeftThumbIntermediate => "leftThumbIntermediate",
            LeftThumbDistal => "leftThumbDistal",
            LeftIndexProximal => "leftIndexProximal",
            LeftIndexIntermediate => "leftIndexIntermediate",
            LeftIndexDistal => "leftIndexDistal",
            LeftMiddleProximal => "leftMiddleProximal",
            LeftMiddleIntermediate => "leftMiddleIntermediate",
            LeftMiddleDistal => "leftMiddleDistal",
            LeftRingProximal => "leftRingProximal",
            LeftRingIntermediate => "leftRingIntermediate",
            LeftRingDistal => "leftRingDistal",
            LeftLittleProximal => "leftLittleProximal",
            LeftLittleIntermediate => "leftLittleIntermediate",
            LeftLittleDistal => "leftLittleDistal",
            RightThumbProximal => "rightThumbProximal",
            RightThumbIntermediate => "rightThumbIntermediate",
            RightThumbDistal => "rightThumbDistal",
            RightIndexProximal => "rightIndexProximal",
            RightIndexIntermediate => "rightIndexIntermediate",
            RightIndexDistal => "rightIndexDistal",
            RightMiddleProximal => "rightMiddleProximal",
            RightMiddleIntermediate => "rightMiddleIntermediate",
            RightMiddleDistal => "rightMiddleDistal",
            RightRingProximal => "rightRingProximal",
            RightRingIntermediate => "rightRingIntermediate",
            RightRingDistal => "rightRingDistal",
            RightLittleProximal => "rightLittleProximal",
            RightLittleIntermediate => "rightLittleIntermediate",
            RightLittleDistal => "rightLittleDistal",
            UpperChest => "upperChest",
        }
    }
}

impl fmt::Display for HumanoidBone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未知角色名
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown humanoid role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for HumanoidBone {
    type Err = UnknownRole;

    /// 大小写不敏感
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::RETARGET_ORDER
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_vocabulary_closed() {
        let names: HashSet<_> = HumanoidBone::RETARGET_ORDER.iter().map(|r| r.as_str()).collect();
        assert_eq!(names.len(), 55);
        assert_eq!(HumanoidBone::RETARGET_ORDER[0], HumanoidBone::Hips);
    }

    #[test]
    fn test_parse() {
        assert_eq!("leftHand".parse::<HumanoidBone>(), Ok(HumanoidBone::LeftHand));
        assert_eq!("UPPERCHEST".parse::<HumanoidBone>(), Ok(HumanoidBone::UpperChest));
        assert!("tail".parse::<HumanoidBone>().is_err());
        for role in HumanoidBone::RETARGET_ORDER {
            assert_eq!(role.as_str().parse::<HumanoidBone>(), Ok(role));
        }
    }
}
