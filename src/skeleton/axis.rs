//! 坐标系约定
//!
//! 源（glTF，右手 Y-up，米）→ 目标（Z-up，厘米）：
//! `(x, y, z)` → `(-x, z, y) × 100 × model_scale`
//!
//! 这是所有下游模块共享的固定约定：网格顶点、骨骼绑定姿势、碰撞球偏移都经过同一转换。
//! 非 VRM 源再额外翻转一次 X/Y。缩放系数只作用于平移，旋转与缩放只做轴置换。

use glam::{Quat, Vec3};

/// 米 → 厘米
pub const METERS_TO_UNITS: f32 = 100.0;

/// 轴转换参数
#[derive(Clone, Copy, Debug)]
pub struct AxisConvention {
    /// 全局模型缩放
    pub model_scale: f32,
    /// 是否为 VRM 源
    pub is_vrm: bool,
}

impl Default for AxisConvention {
    fn default() -> Self {
        Self { model_scale: 1.0, is_vrm: true }
    }
}

impl AxisConvention {
    pub fn new(model_scale: f32, is_vrm: bool) -> Self {
        Self { model_scale, is_vrm }
    }

    /// 方向向量轴交换（不缩放）
    #[inline]
    pub fn direction(&self, v: Vec3) -> Vec3 {
        if self.is_vrm {
            Vec3::new(-v.x, v.z, v.y)
        } else {
            Vec3::new(v.x, -v.z, v.y)
        }
    }

    /// 位置：轴交换 + 单位缩放
    #[inline]
    pub fn position(&self, v: Vec3) -> Vec3 {
        self.direction(v) * self.length_scale()
    }

    /// 长度缩放（米 → 目标单位 × 模型缩放）
    #[inline]
    pub fn length_scale(&self) -> f32 {
        METERS_TO_UNITS * self.model_scale
    }

    /// 旋转：基变换为真旋转（det = +1），四元数虚部按同一映射变换
    #[inline]
    pub fn rotation(&self, q: Quat) -> Quat {
        let v = self.direction(Vec3::new(q.x, q.y, q.z));
        Quat::from_xyzw(v.x, v.y, v.z, q.w).normalize()
    }

    /// 缩放：只做轴置换
    #[inline]
    pub fn scale(&self, s: Vec3) -> Vec3 {
        Vec3::new(s.x, s.z, s.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_swap() {
        let axis = AxisConvention::default();
        let p = axis.position(Vec3::new(1.0, 2.0, 3.0));
        assert!((p - Vec3::new(-100.0, 300.0, 200.0)).length() < 1e-4);

        // 非 VRM 再翻转 X/Y
        let axis = AxisConvention::new(1.0, false);
        let p = axis.position(Vec3::new(1.0, 2.0, 3.0));
        assert!((p - Vec3::new(100.0, -300.0, 200.0)).length() < 1e-4);
    }

    #[test]
    fn test_rotation_consistent_with_direction() {
        // 转换后的旋转作用于转换后的向量 == 转换旋转后的向量
        let axis = AxisConvention::default();
        let q = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -0.7, 1.1);
        let v = Vec3::new(0.2, -1.0, 0.5);
        let lhs = axis.rotation(q) * axis.direction(v);
        let rhs = axis.direction(q * v);
        assert!((lhs - rhs).length() < 1e-4);
    }
}
