//! VRM Engine - VRM/glTF 人形模型导入与弹簧骨骼运行时
//!
//! 模块结构：
//! - scene: 场景提供者数据模型（节点、网格、蒙皮权重、VRM 元数据）
//! - skeleton: 骨骼构建（根骨骼启发式、重名处理、坐标系转换、IK 辅助骨骼）
//! - humanoid: 人形骨骼映射表（角色 ↔ 骨骼名）
//! - spring: 弹簧骨骼模拟（Verlet 积分、球体碰撞）
//! - retarget: 姿势重定向（按人形角色复制旋转，髋部平移按身高缩放）
//! - import: 导入流水线（阶段编排、网格转换、物理资产、进度、取消）

pub mod scene;
pub mod skeleton;
pub mod humanoid;
pub mod spring;
pub mod retarget;
pub mod import;

use thiserror::Error;

/// 导入/运行时错误
#[derive(Error, Debug)]
pub enum VrmError {
    #[error("Scene provider returned no scene")]
    NoScene,

    #[error("Skeleton build produced no bones")]
    EmptySkeleton,

    #[error("VRM metadata missing")]
    MissingMetadata,

    #[error("Mesh conversion error: {0}")]
    MeshConversion(String),

    #[error("Import cancelled")]
    Cancelled,

    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed { stage: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, VrmError>;

pub use humanoid::{HumanoidBone, HumanoidBoneTable};
pub use import::{ImportContext, ImportFlags, ImportPipeline, ImportedModel};
pub use retarget::{BoneOverride, Pose, PoseCopyInstance, PoseRetargeter};
pub use scene::{Scene, SceneProvider};
pub use skeleton::{Bone, BoneFlags, BoneTransform, ReferenceSkeleton};
pub use spring::{SpringBoneSimulator, SpringConfig, SpringSetup};
