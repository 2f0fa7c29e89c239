//! 骨骼节点
//!
//! Bone 是骨骼系统的基本单元，只保存静态数据：名称、父子关系、绑定姿势。
//! 每帧的动态姿势由 retarget::Pose 单独保存，骨骼本身在导入后不变。

use bitflags::bitflags;

use super::BoneTransform;

// ============================================================================
// 骨骼标志
// ============================================================================

bitflags! {
    /// 骨骼标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BoneFlags: u32 {
        /// 被网格蒙皮引用
        const SKINNED = 1 << 0;
        /// 因重名被加后缀
        const RENAMED_DUPLICATE = 1 << 1;
        /// IK 辅助骨骼（不参与蒙皮）
        const IK_AUXILIARY = 1 << 2;
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点
#[derive(Clone, Debug)]
pub struct Bone {
    /// 骨骼名称（碰撞处理后在骨架内唯一）
    pub name: String,
    /// 父骨骼索引（None 表示根骨骼）
    pub parent: Option<usize>,
    /// 绑定姿势（父空间）
    pub bind_pose: BoneTransform,
    /// 骨骼标志
    pub flags: BoneFlags,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, bind_pose: BoneTransform) -> Self {
        Self {
            name: name.into(),
            parent,
            bind_pose,
            flags: BoneFlags::empty(),
        }
    }

    #[inline]
    pub fn with_flags(mut self, flags: BoneFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
