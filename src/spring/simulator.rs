//! 弹簧骨骼模拟器
//!
//! 每个角色实例一个。每帧流程：
//! 1. 瞬移检测（根骨骼世界位置跳变）→ 重新绑定尖端
//! 2. 按姿势计算世界矩阵（复用缓冲区）
//! 3. 逐链、逐关节（父先于子）：Verlet 积分 → 长度约束 → 碰撞修正（全部碰撞球一起求解）→ 写回局部旋转
//!
//! 尖端状态只属于本实例；链与碰撞组数据通过 Arc<SpringSetup> 共享。

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::retarget::{BoneOverride, Pose};
use crate::skeleton::ReferenceSkeleton;

use super::collision::{project_to_length, resolve_spheres};
use super::config::{get_default_spring_config, SpringConfig};
use super::setup::{SpringJoint, SpringSetup};

/// 模拟状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationState {
    /// 刚创建，尚未分配尖端状态
    Uninitialized,
    /// 尖端需在下一帧按绑定姿势重新绑定
    Initialized,
    /// 正常模拟
    Simulating,
    /// 已销毁，不再响应
    Destroyed,
}

/// 单个尖端的 Verlet 状态（世界空间）
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TipState {
    pub current_tail: Vec3,
    pub prev_tail: Vec3,
}

/// 弹簧骨骼模拟器
pub struct SpringBoneSimulator {
    setup: Arc<SpringSetup>,
    config: SpringConfig,
    state: SimulationState,
    /// 每条链的尖端状态在 tips 中的起始下标
    chain_offsets: Vec<usize>,
    tips: Vec<TipState>,
    /// 上一帧根骨骼世界位置
    prev_root_position: Option<Vec3>,

    // --- 预分配缓冲区（避免每帧堆分配） ---
    world_buf: Vec<Mat4>,
    /// 当前关节可见的碰撞球（世界中心, 半径）
    sphere_buf: Vec<(Vec3, f32)>,
}

impl SpringBoneSimulator {
    /// 使用全局默认配置创建
    pub fn new(setup: Arc<SpringSetup>) -> Self {
        Self::with_config(setup, get_default_spring_config())
    }

    pub fn with_config(setup: Arc<SpringSetup>, config: SpringConfig) -> Self {
        Self {
            setup,
            config,
            state: SimulationState::Uninitialized,
            chain_offsets: Vec::new(),
            tips: Vec::new(),
            prev_root_position: None,
            world_buf: Vec::new(),
            sphere_buf: Vec::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> SimulationState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &SpringConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut SpringConfig {
        &mut self.config
    }

    #[inline]
    pub fn setup(&self) -> &Arc<SpringSetup> {
        &self.setup
    }

    /// 分配尖端状态，Uninitialized → Initialized
    pub fn initialize(&mut self) {
        if self.state != SimulationState::Uninitialized {
            return;
        }
        self.chain_offsets.clear();
        let mut offset = 0;
        for chain in &self.setup.chains {
            self.chain_offsets.push(offset);
            offset += chain.joints.len();
        }
        self.tips = vec![TipState::default(); offset];
        self.state = SimulationState::Initialized;
    }

    /// 瞬移重置：丢弃速度，下一帧按绑定姿势重新绑定
    ///
    /// 配置了 ignore_reset_on_teleport 时忽略。返回是否实际重置。
    pub fn reset(&mut self) -> bool {
        if self.config.ignore_reset_on_teleport || self.state != SimulationState::Simulating {
            return false;
        }
        self.state = SimulationState::Initialized;
        true
    }

    /// 销毁（终态）
    pub fn destroy(&mut self) {
        self.tips.clear();
        self.chain_offsets.clear();
        self.world_buf.clear();
        self.sphere_buf.clear();
        self.state = SimulationState::Destroyed;
    }

    /// 尖端状态
    pub fn tip(&self, chain: usize, joint: usize) -> Option<&TipState> {
        let offset = *self.chain_offsets.get(chain)?;
        if joint >= self.setup.chains.get(chain)?.joints.len() {
            return None;
        }
        self.tips.get(offset + joint)
    }

    /// 推进一帧，返回被覆盖的骨骼
    pub fn step(
        &mut self,
        skeleton: &ReferenceSkeleton,
        pose: &mut Pose,
        dt: f32,
        root_world: Mat4,
    ) -> Vec<BoneOverride> {
        let mut out = Vec::with_capacity(self.setup.joint_count());
        self.step_into(skeleton, pose, dt, root_world, &mut out);
        out
    }

    /// 推进一帧，覆盖写入 `out`（调用方复用缓冲区）
    ///
    /// `dt == 0` 时不改变任何状态。`pose` 中被模拟骨骼的局部旋转被直接改写。
    pub fn step_into(
        &mut self,
        skeleton: &ReferenceSkeleton,
        pose: &mut Pose,
        dt: f32,
        root_world: Mat4,
        out: &mut Vec<BoneOverride>,
    ) {
        out.clear();
        if self.state == SimulationState::Destroyed || !self.config.enabled || dt == 0.0 {
            return;
        }
        if self.state == SimulationState::Uninitialized {
            self.initialize();
        }

        // 瞬移检测
        let root_position = root_world.w_axis.truncate();
        if let Some(prev) = self.prev_root_position {
            if prev.distance(root_position) > self.config.teleport_distance && self.reset() {
                log::debug!("[弹簧骨骼] 检测到瞬移 ({:.1})，重新绑定", prev.distance(root_position));
            }
        }
        self.prev_root_position = Some(root_position);

        pose.component_transforms_into(skeleton, &mut self.world_buf);
        for m in &mut self.world_buf {
            *m = root_world * *m;
        }

        if self.state == SimulationState::Initialized {
            self.bind_tips(pose, root_world);
        }

        let loops = self.config.loop_count.max(1);
        let sub_dt = dt / loops as f32;
        for _ in 0..loops {
            self.integrate(pose, root_world, sub_dt);
        }
        self.state = SimulationState::Simulating;

        let setup = Arc::clone(&self.setup);
        for chain in &setup.chains {
            for joint in &chain.joints {
                if let Some(local) = pose.local(joint.bone) {
                    out.push(BoneOverride {
                        bone: joint.bone,
                        rotation: local.rotation,
                        translation: None,
                    });
                }
            }
        }

        if self.config.debug_log {
            log::debug!("[弹簧骨骼] dt={:.4}, {} 骨骼覆盖", dt, out.len());
        }
    }

    /// 尖端绑定到绑定姿势（相对当前父骨骼）
    fn bind_tips(&mut self, pose: &Pose, root_world: Mat4) {
        let setup = Arc::clone(&self.setup);
        for (ci, chain) in setup.chains.iter().enumerate() {
            let offset = self.chain_offsets[ci];
            for (ji, joint) in chain.joints.iter().enumerate() {
                let Some(local) = pose.local(joint.bone) else { continue };
                let parent_world = self.parent_world(joint, root_world);
                let bind_world = parent_world
                    * Mat4::from_scale_rotation_translation(local.scale, joint.bind_rotation, local.translation);
                self.world_buf[joint.bone] = bind_world;
                let tail = bind_world.transform_point3(joint.tail_offset);
                self.tips[offset + ji] = TipState {
                    current_tail: tail,
                    prev_tail: tail,
                };
            }
        }
    }

    /// 单个子步
    fn integrate(&mut self, pose: &mut Pose, root_world: Mat4, dt: f32) {
        let setup = Arc::clone(&self.setup);
        let unit = self.config.unit_scale * setup.unit_scale;

        for (ci, chain) in setup.chains.iter().enumerate() {
            let offset = self.chain_offsets[ci];
            let stiffness = self.config.effective_stiffness(chain.stiffness);
            let gravity = self.config.effective_gravity(chain.gravity_dir, chain.gravity_power);
            let drag = chain.drag_force;

            for (ji, joint) in chain.joints.iter().enumerate() {
                let Some(&local) = pose.local(joint.bone) else { continue };
                let parent_world = self.parent_world(joint, root_world);
                let parent_rotation = rotation_of(&parent_world);
                let head = (parent_world * local.to_matrix()).w_axis.truncate();

                let rest_rotation = parent_rotation * joint.bind_rotation;
                let rest_dir = (rest_rotation * joint.bone_axis).normalize_or_zero();

                let tip = self.tips[offset + ji];
                let inertia = (tip.current_tail - tip.prev_tail) * (1.0 - drag);
                let next = tip.current_tail
                    + inertia
                    + rest_dir * (stiffness * dt * unit)
                    + gravity * (dt * unit);
                let mut next = project_to_length(next, head, joint.bone_length, rest_dir);

                if !self.config.ignore_collision && !chain.collider_groups.is_empty() {
                    self.sphere_buf.clear();
                    for &g in &chain.collider_groups {
                        let Some(group) = setup.collider_groups.get(g) else { continue };
                        let Some(group_world) = self.world_buf.get(group.bone) else { continue };
                        self.sphere_buf.extend(group.colliders.iter().map(|c| {
                            (group_world.transform_point3(c.offset), chain.hit_radius + c.radius)
                        }));
                    }
                    next = resolve_spheres(next, head, joint.bone_length, &self.sphere_buf);
                }

                self.tips[offset + ji] = TipState {
                    current_tail: next,
                    prev_tail: tip.current_tail,
                };

                // 尖端方向 → 局部旋转
                let rotation = match (next - head).try_normalize() {
                    Some(to) if rest_dir != Vec3::ZERO => Quat::from_rotation_arc(rest_dir, to) * rest_rotation,
                    _ => rest_rotation,
                };
                let local_rotation = (parent_rotation.inverse() * rotation).normalize();
                pose.set_rotation(joint.bone, local_rotation);
                if let Some(updated) = pose.local(joint.bone) {
                    self.world_buf[joint.bone] = parent_world * updated.to_matrix();
                }
            }
        }
    }

    #[inline]
    fn parent_world(&self, joint: &SpringJoint, root_world: Mat4) -> Mat4 {
        joint
            .parent
            .and_then(|p| self.world_buf.get(p).copied())
            .unwrap_or(root_world)
    }
}

#[inline]
fn rotation_of(m: &Mat4) -> Quat {
    let (_, rotation, _) = m.to_scale_rotation_translation();
    rotation
}
