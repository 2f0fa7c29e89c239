//! 绑定映射：人体模型（mannequin）骨骼名与平移重定向模式

use crate::skeleton::{ReferenceSkeleton, IK_BONE_NAMES};

use super::{HumanoidBone, HumanoidBoneTable};

use HumanoidBone::*;

/// 人形角色 → 人体模型骨骼名（无对应骨骼的角色返回 None）
pub fn mannequin_name(role: HumanoidBone) -> Option<&'static str> {
    let name = match role {
        Hips => "pelvis",
        Spine => "spine_01",
        Chest => "spine_02",
        UpperChest => "spine_03",
        Neck => "neck_01",
        Head => "head",
        LeftShoulder => "clavicle_l",
        LeftUpperArm => "upperarm_l",
        LeftLowerArm => "lowerarm_l",
        LeftHand => "hand_l",
        RightShoulder => "clavicle_r",
        RightUpperArm => "upperarm_r",
        RightLowerArm => "lowerarm_r",
        RightHand => "hand_r",
        LeftUpperLeg => "thigh_l",
        LeftLowerLeg => "calf_l",
        LeftFoot => "foot_l",
        LeftToes => "ball_l",
        RightUpperLeg => "thigh_r",
        RightLowerLeg => "calf_r",
        RightFoot => "foot_r",
        RightToes => "ball_r",
        LeftThumbProximal => "thumb_01_l",
        LeftThumbIntermediate => "thumb_02_l",
        LeftThumbDistal => "thumb_03_l",
        LeftIndexProximal => "index_01_l",
        LeftIndexIntermediate => "index_02_l",
        LeftIndexDistal => "index_03_l",
        LeftMiddleProximal => "middle_01_l",
        LeftMiddleIntermediate => "middle_02_l",
        LeftMiddleDistal => "middle_03_l",
        LeftRingProximal => "ring_01_l",
        LeftRingIntermediate => "ring_02_l",
        LeftRingDistal => "ring_03_l",
        LeftLittleProximal => "pinky_01_l",
        LeftLittleIntermediate => "pinky_02_l",
        LeftLittleDistal => "pinky_03_l",
        RightThumbProximal => "thumb_01_r",
        RightThumbIntermediate => "thumb_02_r",
        RightThumbDistal => "thumb_03_r",
        RightIndexProximal => "index_01_r",
        RightIndexIntermediate => "index_02_r",
        RightIndexDistal => "index_03_r",
        RightMiddleProximal => "middle_01_r",
        RightMiddleIntermediate => "middle_02_r",
        RightMiddleDistal => "middle_03_r",
        RightRingProximal => "ring_01_r",
        RightRingIntermediate => "ring_02_r",
        RightRingDistal => "ring_03_r",
        RightLittleProximal => "pinky_01_r",
        RightLittleIntermediate => "pinky_02_r",
        RightLittleDistal => "pinky_03_r",
        LeftEye | RightEye | Jaw => return None,
    };
    Some(name)
}

/// 人体模型骨骼名 → 骨架骨骼名映射（用于宿主的绑定资产）
///
/// 缺失的脊柱段（spine_02 / spine_03）用下一段已映射的骨骼补齐，
/// 保证宿主侧脊柱链连续。
pub fn mannequin_mapping(table: &HumanoidBoneTable) -> Vec<(&'static str, String)> {
    let mut out: Vec<(&'static str, String)> = HumanoidBone::RETARGET_ORDER
        .iter()
        .filter_map(|&role| Some((mannequin_name(role)?, table.lookup(role)?.to_string())))
        .collect();

    // 脊柱补齐：upperChest ← chest ← spine
    let spine_chain = [(UpperChest, Chest), (Chest, Spine)];
    for (missing, fallback) in spine_chain {
        if table.contains(missing) {
            continue;
        }
        let (Some(name), Some(target)) = (mannequin_name(missing), mannequin_fallback(table, fallback)) else {
            continue;
        };
        if !out.iter().any(|(n, _)| *n == name) {
            out.push((name, target));
        }
    }
    out
}

fn mannequin_fallback(table: &HumanoidBoneTable, role: HumanoidBone) -> Option<String> {
    table.lookup(role).map(str::to_string).or_else(|| match role {
        Chest => mannequin_fallback(table, Spine),
        _ => None,
    })
}

// ============================================================================
// 平移重定向模式
// ============================================================================

/// 平移重定向模式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranslationRetargetMode {
    /// 使用目标骨架自身的绑定平移
    Skeleton,
    /// 直接使用动画平移
    Animation,
    /// 动画平移按骨架比例缩放
    AnimationScaled,
}

/// 逐骨骼平移模式：全部 Skeleton，髋部 AnimationScaled，髋部祖先与 IK 骨骼 Animation
pub fn translation_modes(skeleton: &ReferenceSkeleton, table: &HumanoidBoneTable) -> Vec<TranslationRetargetMode> {
    let mut modes = vec![TranslationRetargetMode::Skeleton; skeleton.len()];

    if let Some(hips) = table.bone_index(Hips, skeleton) {
        modes[hips] = TranslationRetargetMode::AnimationScaled;
        for a in skeleton.ancestors(hips) {
            modes[a] = TranslationRetargetMode::Animation;
        }
    }
    for name in IK_BONE_NAMES {
        if let Some(i) = skeleton.find_bone(name) {
            modes[i] = TranslationRetargetMode::Animation;
        }
    }
    modes
}
