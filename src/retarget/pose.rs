//! 姿势数据
//!
//! Pose 保存每根骨骼的父空间局部变换，索引与 ReferenceSkeleton 一致。

use glam::{Mat4, Quat, Vec3};

use crate::skeleton::{BoneTransform, ReferenceSkeleton};

/// 骨骼局部姿势
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pose {
    pub locals: Vec<BoneTransform>,
}

/// 输出给动画宿主的骨骼覆盖（未列出的骨骼保持原样）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneOverride {
    pub bone: usize,
    pub rotation: Quat,
    pub translation: Option<Vec3>,
}

impl Pose {
    /// 绑定姿势
    pub fn bind(skeleton: &ReferenceSkeleton) -> Self {
        Self {
            locals: skeleton.bones().iter().map(|b| b.bind_pose).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.locals.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    #[inline]
    pub fn local(&self, bone: usize) -> Option<&BoneTransform> {
        self.locals.get(bone)
    }

    #[inline]
    pub fn set_rotation(&mut self, bone: usize, rotation: Quat) {
        if let Some(t) = self.locals.get_mut(bone) {
            t.rotation = rotation;
        }
    }

    #[inline]
    pub fn set_translation(&mut self, bone: usize, translation: Vec3) {
        if let Some(t) = self.locals.get_mut(bone) {
            t.translation = translation;
        }
    }

    /// 应用覆盖
    pub fn apply(&mut self, overrides: &[BoneOverride]) {
        for o in overrides {
            self.set_rotation(o.bone, o.rotation);
            if let Some(t) = o.translation {
                self.set_translation(o.bone, t);
            }
        }
    }

    /// 组件空间矩阵（复用缓冲区）
    ///
    /// 姿势长度不足时，缺失的骨骼使用绑定姿势。
    pub fn component_transforms_into(&self, skeleton: &ReferenceSkeleton, out: &mut Vec<Mat4>) {
        out.clear();
        out.reserve(skeleton.len());
        for (i, bone) in skeleton.bones().iter().enumerate() {
            let local = self.locals.get(i).unwrap_or(&bone.bind_pose).to_matrix();
            let global = match bone.parent {
                Some(p) => out[p] * local,
                None => local,
            };
            out.push(global);
        }
    }

    /// 组件空间矩阵
    pub fn component_transforms(&self, skeleton: &ReferenceSkeleton) -> Vec<Mat4> {
        let mut out = Vec::new();
        self.component_transforms_into(skeleton, &mut out);
        out
    }
}
