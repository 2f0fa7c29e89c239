//! 弹簧骨骼（VRM secondary animation）
//!
//! - config: 运行时缩放与开关（全局默认 + 实例副本）
//! - setup: 链与碰撞组定义，按骨架解析为索引
//! - collision: 尖端与球体的位置修正
//! - simulator: 每实例的 Verlet 模拟

pub mod config;
pub mod setup;
pub mod collision;
pub mod simulator;

pub use config::{
    get_default_spring_config, reset_default_spring_config, set_default_spring_config, SpringConfig,
};
pub use setup::{chains_from_metadata, ColliderGroup, SphereCollider, SpringChain, SpringSetup};
pub use simulator::{SimulationState, SpringBoneSimulator, TipState};
