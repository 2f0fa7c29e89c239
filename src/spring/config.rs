//! 弹簧骨骼运行时配置
//!
//! 所有参数扁平化。每个模拟实例在构造时复制一份全局默认值，之后互不影响。

use glam::Vec3;
use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 弹簧骨骼配置（扁平化，不嵌套）
#[derive(Debug, Clone, PartialEq)]
pub struct SpringConfig {
    // ========== 开关 ==========
    /// 是否启用二次运动，默认 true
    pub enabled: bool,
    /// 忽略碰撞组，默认 false
    pub ignore_collision: bool,
    /// 瞬移时不重置模拟状态，默认 false
    pub ignore_reset_on_teleport: bool,

    // ========== 重力 ==========
    /// 重力缩放（乘以链上的 gravityPower），默认 1.0
    pub gravity_scale: f32,
    /// 附加重力向量（加在 gravityDir × gravityPower 上），默认 0
    pub gravity_add: Vec3,

    // ========== 刚度 ==========
    /// 刚度缩放（乘以链上的 stiffness），默认 1.0
    pub stiffness_scale: f32,
    /// 附加刚度，默认 0.0
    pub stiffness_add: f32,

    // ========== 模拟参数 ==========
    /// 力项长度单位的附加倍率（与 SpringSetup::unit_scale 相乘），默认 1.0
    pub unit_scale: f32,
    /// 每帧子步数，默认 1
    pub loop_count: u32,
    /// 根骨骼单帧位移超过此值视为瞬移，默认 100.0（1 米）
    pub teleport_distance: f32,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ignore_collision: false,
            ignore_reset_on_teleport: false,

            gravity_scale: 1.0,
            gravity_add: Vec3::ZERO,

            stiffness_scale: 1.0,
            stiffness_add: 0.0,

            unit_scale: 1.0,
            loop_count: 1,
            teleport_distance: 100.0,

            debug_log: false,
        }
    }
}

impl SpringConfig {
    /// 应用全局缩放后的刚度
    #[inline]
    pub fn effective_stiffness(&self, stiffness: f32) -> f32 {
        (stiffness * self.stiffness_scale + self.stiffness_add).max(0.0)
    }

    /// 应用全局缩放后的重力向量
    #[inline]
    pub fn effective_gravity(&self, dir: Vec3, power: f32) -> Vec3 {
        dir * power * self.gravity_scale + self.gravity_add
    }
}

/// 全局默认配置
static SPRING_CONFIG: Lazy<RwLock<SpringConfig>> = Lazy::new(|| {
    RwLock::new(SpringConfig::default())
});

/// 获取当前默认配置
pub fn get_default_spring_config() -> SpringConfig {
    SPRING_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 设置默认配置（只影响之后创建的实例）
pub fn set_default_spring_config(config: SpringConfig) {
    *SPRING_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_default_spring_config() {
    *SPRING_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = SpringConfig::default();
}
