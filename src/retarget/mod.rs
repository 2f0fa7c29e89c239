//! 姿势重定向
//!
//! - pose: 局部姿势与骨骼覆盖
//! - copier: 人形角色驱动的姿势复制，以及串联弹簧骨骼的运行时实例

mod pose;
pub mod copier;

pub use pose::{BoneOverride, Pose};
pub use copier::{hip_height, PoseCopyInstance, PoseRetargeter};
