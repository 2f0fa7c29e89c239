//! 导入上下文
//!
//! 所有导入开关显式传入每个阶段，不使用进程级全局状态。

use bitflags::bitflags;

use crate::skeleton::axis::AxisConvention;
use crate::skeleton::SkeletonBuildOptions;

bitflags! {
    /// 导入开关
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ImportFlags: u32 {
        /// 跳过变形目标
        const SKIP_MORPH_TARGET = 1 << 0;
        /// 跳过物理资产
        const SKIP_PHYSICS = 1 << 1;
        /// 同名材质合并
        const MERGE_MATERIAL = 1 << 2;
        /// 剔除未被面引用的顶点
        const OPTIMIZE_VERTEX = 1 << 3;
        /// 移动端骨骼数上限
        const MOBILE_BONE = 1 << 4;
        /// 简单根启发式
        const SIMPLE_ROOT_BONE = 1 << 5;
        /// 只导入根骨骼（诊断用）
        const DEBUG_ONE_BONE = 1 << 6;
        /// 追加 IK 辅助骨骼
        const CREATE_IK_BONE = 1 << 7;
        /// 生成角色名骨架副本
        const CREATE_HUMANOID_RENAMED_MESH = 1 << 8;
        /// 非 ASCII 骨骼名替换
        const NORMALIZE_BONE_NAME = 1 << 9;
    }
}

impl Default for ImportFlags {
    fn default() -> Self {
        Self::SIMPLE_ROOT_BONE | Self::OPTIMIZE_VERTEX | Self::CREATE_IK_BONE
    }
}

/// 导入上下文
#[derive(Clone, Debug)]
pub struct ImportContext {
    pub flags: ImportFlags,
    /// 全局模型缩放，默认 1.0
    pub model_scale: f32,
    /// 源是否为 VRM（决定元数据是否必需及轴约定）
    pub is_vrm: bool,
    /// 移动端每个网格段的骨骼上限，默认 75
    pub mobile_bone_limit: usize,
    /// 资产名（日志与持久化用）
    pub asset_name: String,
}

impl Default for ImportContext {
    fn default() -> Self {
        Self {
            flags: ImportFlags::default(),
            model_scale: 1.0,
            is_vrm: true,
            mobile_bone_limit: 75,
            asset_name: String::from("vrm_model"),
        }
    }
}

impl ImportContext {
    #[inline]
    pub fn has(&self, flag: ImportFlags) -> bool {
        self.flags.contains(flag)
    }

    #[inline]
    pub fn axis(&self) -> AxisConvention {
        AxisConvention::new(self.model_scale, self.is_vrm)
    }

    pub fn skeleton_options(&self) -> SkeletonBuildOptions {
        SkeletonBuildOptions {
            axis: self.axis(),
            simple_root: self.has(ImportFlags::SIMPLE_ROOT_BONE),
            debug_one_bone: self.has(ImportFlags::DEBUG_ONE_BONE),
        }
    }
}
