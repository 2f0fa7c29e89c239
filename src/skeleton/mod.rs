//! 骨骼系统
//!
//! 核心设计思想：
//! - Bone: 单个骨骼节点（名称、父索引、绑定姿势、标志）
//! - ReferenceSkeleton: 管理骨骼层次结构，父骨骼必须先于子骨骼加入
//! - SkeletonSink: 宿主引擎骨骼资产的能力接口
//! - builder: 从场景图构建骨骼
//! - ik_bones: IK 辅助骨骼

mod bone;
mod reference;
mod sink;
pub mod axis;
pub mod builder;
pub mod ik_bones;

pub use bone::{Bone, BoneFlags};
pub use reference::ReferenceSkeleton;
pub use sink::{emit_skeleton, SkeletonSink};
pub use builder::{build_skeleton, convert_transform, SkeletonBuildOptions, SkeletonBuildReport};
pub use ik_bones::{add_ik_bones, IK_BONE_NAMES};

use glam::{Vec3, Quat, Mat4};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 骨骼变换数据
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::IDENTITY }
    }

    #[inline]
    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self { translation, rotation, scale: Vec3::ONE }
    }

    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }

    /// 是否为单位变换（容差比较）
    pub fn is_identity(&self, eps: f32) -> bool {
        self.translation.abs_diff_eq(Vec3::ZERO, eps)
            && self.scale.abs_diff_eq(Vec3::ONE, eps)
            && self.rotation.abs_diff_eq(Quat::IDENTITY, eps)
    }
}
