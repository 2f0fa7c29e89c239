//! 无元数据时的人形映射推断
//!
//! 按骨骼名子串匹配（动捕 BVH、通用 FBX 骨架等）：
//! - "neck" → neck，沿父链回填 upperChest / chest / spine / hips
//! - "head" → head
//! - "hand" + 左右标记 → Hand，沿父链回填 LowerArm / UpperArm / Shoulder
//! - "foot" + 左右标记 → Foot，第一个子骨骼 → Toes，沿父链回填 LowerLeg / UpperLeg
//!
//! 已解析的角色不会被覆盖。MMD 日文骨骼名先按固定表精确匹配。

use crate::skeleton::ReferenceSkeleton;

use super::{HumanoidBone, HumanoidBoneTable};

use HumanoidBone::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// MMD 标准骨骼名
const MMD_BONE_NAMES: [(&str, HumanoidBone); 21] = [
    ("下半身", Hips),
    ("上半身", Spine),
    ("上半身2", Chest),
    ("首", Neck),
    ("頭", Head),
    ("左肩", LeftShoulder),
    ("左腕", LeftUpperArm),
    ("左ひじ", LeftLowerArm),
    ("左手首", LeftHand),
    ("右肩", RightShoulder),
    ("右腕", RightUpperArm),
    ("右ひじ", RightLowerArm),
    ("右手首", RightHand),
    ("左足", LeftUpperLeg),
    ("左ひざ", LeftLowerLeg),
    ("左足首", LeftFoot),
    ("左つま先", LeftToes),
    ("右足", RightUpperLeg),
    ("右ひざ", RightLowerLeg),
    ("右足首", RightFoot),
    ("右つま先", RightToes),
];

/// 手指骨骼关键字（排除 "LeftHandIndex1" 之类）
const FINGER_WORDS: [&str; 7] = ["thumb", "index", "middle", "ring", "pinky", "little", "finger"];

/// 推断人形映射
pub fn auto_map(skeleton: &ReferenceSkeleton) -> HumanoidBoneTable {
    let mut table = HumanoidBoneTable::new();

    for (name, role) in MMD_BONE_NAMES {
        if let Some(i) = skeleton.find_bone(name) {
            try_insert(&mut table, skeleton, role, i);
        }
    }

    // 躯干直接命名
    for (i, bone) in skeleton.bones().iter().enumerate() {
        let lower = bone.name.to_lowercase();
        let role = if lower.contains("hips") || lower.contains("pelvis") {
            Hips
        } else if lower.contains("upperchest") {
            UpperChest
        } else if lower.contains("chest") {
            Chest
        } else if lower.contains("spine") {
            Spine
        } else {
            continue;
        };
        try_insert(&mut table, skeleton, role, i);
    }

    for (i, bone) in skeleton.bones().iter().enumerate() {
        let lower = bone.name.to_lowercase();

        if lower.contains("neck") {
            if try_insert(&mut table, skeleton, Neck, i) {
                backfill(&mut table, skeleton, i, &[UpperChest, Chest, Spine, Hips]);
            }
        } else if lower.contains("head") {
            try_insert(&mut table, skeleton, Head, i);
        } else if lower.contains("hand") && !FINGER_WORDS.iter().any(|w| lower.contains(w)) {
            let Some(side) = side_of(&bone.name) else { continue };
            let (hand, chain) = match side {
                Side::Right => (RightHand, [RightLowerArm, RightUpperArm, RightShoulder]),
                Side::Left => (LeftHand, [LeftLowerArm, LeftUpperArm, LeftShoulder]),
            };
            if try_insert(&mut table, skeleton, hand, i) {
                backfill(&mut table, skeleton, i, &chain);
            }
        } else if lower.contains("foot") {
            let Some(side) = side_of(&bone.name) else { continue };
            let (foot, toes, chain) = match side {
                Side::Right => (RightFoot, RightToes, [RightLowerLeg, RightUpperLeg]),
                Side::Left => (LeftFoot, LeftToes, [LeftLowerLeg, LeftUpperLeg]),
            };
            if try_insert(&mut table, skeleton, foot, i) {
                if let Some(&child) = skeleton.children(i).first() {
                    try_insert(&mut table, skeleton, toes, child);
                }
                backfill(&mut table, skeleton, i, &chain);
            }
        }
    }

    log::info!("[人形映射] 推断完成: {} 个角色", table.len());
    table
}

/// 未解析的角色才插入
fn try_insert(table: &mut HumanoidBoneTable, skeleton: &ReferenceSkeleton, role: HumanoidBone, bone: usize) -> bool {
    if table.contains(role) {
        return false;
    }
    match skeleton.bone(bone) {
        Some(b) => table.insert(role, b.name.as_str()),
        None => false,
    }
}

/// 沿父链按位置回填角色，不回填到骨架根
fn backfill(table: &mut HumanoidBoneTable, skeleton: &ReferenceSkeleton, start: usize, roles: &[HumanoidBone]) {
    let ancestors = skeleton
        .ancestors(start)
        .filter(|&a| skeleton.parent_of(a).is_some());
    for (ancestor, &role) in ancestors.zip(roles) {
        try_insert(table, skeleton, role, ancestor);
    }
}

/// 左右判定（右优先）
///
/// 单字母标记必须带分隔符（hand_r / R_Hand / foot.l），
/// 或是小写字母后的大写后缀（HandR / FootL）。
fn side_of(name: &str) -> Option<Side> {
    let lower = name.to_lowercase();
    if lower.contains("right") {
        return Some(Side::Right);
    }
    if lower.contains("left") {
        return Some(Side::Left);
    }
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.len() > 1 {
        if tokens.contains(&"r") {
            return Some(Side::Right);
        }
        if tokens.contains(&"l") {
            return Some(Side::Left);
        }
    }
    let mut rev = name.chars().rev();
    let (last, prev) = (rev.next()?, rev.next()?);
    if !prev.is_lowercase() {
        return None;
    }
    match last {
        'R' => Some(Side::Right),
        'L' => Some(Side::Left),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{Bone, BoneTransform};

    fn add(skel: &mut ReferenceSkeleton, name: &str, parent: usize) -> usize {
        skel.add_bone(Bone::new(name, Some(parent), BoneTransform::IDENTITY)).unwrap()
    }

    /// 类 UE 人体模型骨架
    fn mannequin() -> ReferenceSkeleton {
        let mut s = ReferenceSkeleton::new();
        s.add_bone(Bone::new("root", None, BoneTransform::IDENTITY));
        let pelvis = add(&mut s, "pelvis", 0);
        let s1 = add(&mut s, "spine_01", pelvis);
        let s2 = add(&mut s, "spine_02", s1);
        let s3 = add(&mut s, "spine_03", s2);
        let neck = add(&mut s, "neck_01", s3);
        add(&mut s, "head", neck);
        let cl = add(&mut s, "clavicle_l", s3);
        let ua = add(&mut s, "upperarm_l", cl);
        let la = add(&mut s, "lowerarm_l", ua);
        let hand = add(&mut s, "hand_l", la);
        add(&mut s, "index_01_l", hand);
        let cr = add(&mut s, "clavicle_r", s3);
        let uar = add(&mut s, "upperarm_r", cr);
        let lar = add(&mut s, "lowerarm_r", uar);
        add(&mut s, "hand_r", lar);
        let th = add(&mut s, "thigh_l", pelvis);
        let calf = add(&mut s, "calf_l", th);
        let foot = add(&mut s, "foot_l", calf);
        add(&mut s, "ball_l", foot);
        s
    }

    #[test]
    fn test_auto_map_mannequin() {
        let skel = mannequin();
        let table = auto_map(&skel);
        assert_eq!(table.lookup(Hips), Some("pelvis"));
        assert_eq!(table.lookup(Spine), Some("spine_01"));
        assert_eq!(table.lookup(Neck), Some("neck_01"));
        assert_eq!(table.lookup(Head), Some("head"));
        assert_eq!(table.lookup(LeftHand), Some("hand_l"));
        assert_eq!(table.lookup(LeftLowerArm), Some("lowerarm_l"));
        assert_eq!(table.lookup(LeftShoulder), Some("clavicle_l"));
        assert_eq!(table.lookup(RightHand), Some("hand_r"));
        assert_eq!(table.lookup(LeftFoot), Some("foot_l"));
        assert_eq!(table.lookup(LeftToes), Some("ball_l"));
        assert_eq!(table.lookup(LeftUpperLeg), Some("thigh_l"));
        // 根骨骼不参与回填
        assert_eq!(table.reverse_lookup("root"), None);
    }

    #[test]
    fn test_auto_map_mmd_names() {
        let mut s = ReferenceSkeleton::new();
        s.add_bone(Bone::new("全ての親", None, BoneTransform::IDENTITY));
        let lower = add(&mut s, "下半身", 0);
        let upper = add(&mut s, "上半身", lower);
        add(&mut s, "首", upper);
        let table = auto_map(&s);
        assert_eq!(table.lookup(Hips), Some("下半身"));
        assert_eq!(table.lookup(Spine), Some("上半身"));
        assert_eq!(table.lookup(Neck), Some("首"));
    }

    #[test]
    fn test_side_detection() {
        assert_eq!(side_of("hand_r"), Some(Side::Right));
        assert_eq!(side_of("mixamorig:lefthand"), Some(Side::Left));
        assert_eq!(side_of("l_foot"), Some(Side::Left));
        assert_eq!(side_of("Foot.L"), Some(Side::Left));
        assert_eq!(side_of("HandR"), Some(Side::Right));
        assert_eq!(side_of("hand"), None);
        // 结尾的 l / r 只是单词的一部分
        assert_eq!(side_of("Eyeball"), None);
        assert_eq!(side_of("Spinal"), None);
        assert_eq!(side_of("handr"), None);
        assert_eq!(side_of("Hand_Holder"), None);
    }
}
