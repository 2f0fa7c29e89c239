//! IK 辅助骨骼
//!
//! 追加一组固定的虚拟骨骼，供宿主的 IK 重定向使用：
//!
//! ```text
//! root
//! ├── ik_foot_root
//! │   ├── ik_foot_l
//! │   └── ik_foot_r
//! └── ik_hand_root
//!     └── ik_hand_gun
//!         ├── ik_hand_l
//!         └── ik_hand_r
//! ```
//!
//! 变换取自人形映射中对应骨骼的组件空间绑定姿势，因此必须在人形表建立后执行。

use glam::Mat4;

use crate::humanoid::{HumanoidBone, HumanoidBoneTable};

use super::{Bone, BoneFlags, BoneTransform, ReferenceSkeleton};

pub const IK_FOOT_ROOT: &str = "ik_foot_root";
pub const IK_FOOT_L: &str = "ik_foot_l";
pub const IK_FOOT_R: &str = "ik_foot_r";
pub const IK_HAND_ROOT: &str = "ik_hand_root";
pub const IK_HAND_GUN: &str = "ik_hand_gun";
pub const IK_HAND_L: &str = "ik_hand_l";
pub const IK_HAND_R: &str = "ik_hand_r";

/// 全部 IK 骨骼名（追加顺序）
pub const IK_BONE_NAMES: [&str; 7] = [
    IK_FOOT_ROOT,
    IK_FOOT_L,
    IK_FOOT_R,
    IK_HAND_ROOT,
    IK_HAND_GUN,
    IK_HAND_L,
    IK_HAND_R,
];

/// 追加 IK 骨骼，返回新增数量
///
/// 骨架中已存在 IK 骨骼时不做任何事。缺少映射的角色对应的 IK 骨骼保持单位变换。
pub fn add_ik_bones(skeleton: &mut ReferenceSkeleton, table: &HumanoidBoneTable) -> usize {
    if skeleton.is_empty() {
        return 0;
    }
    if IK_BONE_NAMES.iter().any(|n| skeleton.contains_name_ignore_case(n)) {
        log::debug!("[IK骨骼] 已存在，跳过");
        return 0;
    }

    let world = skeleton.component_transforms();
    let world_of = |role: HumanoidBone| -> Mat4 {
        table
            .lookup(role)
            .and_then(|name| skeleton.find_bone(name))
            .map(|i| world[i])
            .unwrap_or(Mat4::IDENTITY)
    };

    let gun = world_of(HumanoidBone::RightHand);
    let gun_inv = gun.inverse();
    let plan: [(&str, &str, Mat4); 7] = [
        (IK_FOOT_ROOT, "", Mat4::IDENTITY),
        (IK_FOOT_L, IK_FOOT_ROOT, world_of(HumanoidBone::LeftFoot)),
        (IK_FOOT_R, IK_FOOT_ROOT, world_of(HumanoidBone::RightFoot)),
        (IK_HAND_ROOT, "", Mat4::IDENTITY),
        (IK_HAND_GUN, IK_HAND_ROOT, gun),
        (IK_HAND_L, IK_HAND_GUN, gun_inv * world_of(HumanoidBone::LeftHand)),
        (IK_HAND_R, IK_HAND_GUN, gun_inv * world_of(HumanoidBone::RightHand)),
    ];

    let mut added = 0;
    for (name, parent_name, local) in plan {
        // 空父名表示挂在骨骼 0 下
        let parent = if parent_name.is_empty() {
            Some(0)
        } else {
            skeleton.find_bone(parent_name)
        };
        let Some(parent) = parent else { continue };
        let bone = Bone::new(name, Some(parent), BoneTransform::from_matrix(local))
            .with_flags(BoneFlags::IK_AUXILIARY);
        if skeleton.add_bone(bone).is_some() {
            added += 1;
        }
    }

    log::info!("[IK骨骼] 追加 {} 个", added);
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_ik_bones_follow_humanoid() {
        let mut skel = ReferenceSkeleton::new();
        skel.add_bone(Bone::new("root", None, BoneTransform::IDENTITY));
        skel.add_bone(Bone::new("J_Hips", Some(0), BoneTransform::from_translation(Vec3::Z * 90.0)));
        skel.add_bone(Bone::new("J_Foot_L", Some(1), BoneTransform::from_translation(Vec3::new(10.0, 0.0, -80.0))));
        skel.add_bone(Bone::new("J_Hand_R", Some(1), BoneTransform::from_translation(Vec3::new(-60.0, 0.0, 50.0))));
        skel.add_bone(Bone::new("J_Hand_L", Some(1), BoneTransform::from_translation(Vec3::new(60.0, 0.0, 50.0))));

        let mut table = HumanoidBoneTable::new();
        table.insert(HumanoidBone::Hips, "J_Hips");
        table.insert(HumanoidBone::LeftFoot, "J_Foot_L");
        table.insert(HumanoidBone::RightHand, "J_Hand_R");
        table.insert(HumanoidBone::LeftHand, "J_Hand_L");

        assert_eq!(add_ik_bones(&mut skel, &table), 7);
        let world = skel.component_transforms();

        let foot_l = skel.find_bone(IK_FOOT_L).unwrap();
        assert!((world[foot_l].w_axis.truncate() - Vec3::new(10.0, 0.0, 10.0)).length() < 1e-3);

        // 缺失的 rightFoot → 单位变换
        let foot_r = skel.find_bone(IK_FOOT_R).unwrap();
        assert!(skel.bones()[foot_r].bind_pose.is_identity(1e-5));

        // ik_hand_l 的世界位置等于左手
        let hand_l = skel.find_bone(IK_HAND_L).unwrap();
        assert!((world[hand_l].w_axis.truncate() - Vec3::new(60.0, 0.0, 140.0)).length() < 1e-3);
        assert!(skel.bones()[hand_l].flags.contains(BoneFlags::IK_AUXILIARY));

        // 再次调用不重复追加
        assert_eq!(add_ik_bones(&mut skel, &table), 0);
    }
}
