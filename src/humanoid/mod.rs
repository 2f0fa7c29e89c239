//! 人形骨骼映射
//!
//! - role: 55 个 VRM 人形角色的封闭词表
//! - table: 角色 ↔ 骨骼名双向表
//! - heuristic: 无元数据时按骨骼名推断
//! - rename: 生成角色名 / 人体模型名骨架副本
//! - rig: 人体模型映射与平移重定向模式

mod role;
mod table;
pub mod heuristic;
pub mod rename;
pub mod rig;

pub use role::{HumanoidBone, UnknownRole};
pub use table::HumanoidBoneTable;
pub use heuristic::auto_map;
pub use rename::{rename_to_humanoid, rename_to_mannequin, RenamedSkeleton};
pub use rig::{mannequin_mapping, mannequin_name, translation_modes, TranslationRetargetMode};
