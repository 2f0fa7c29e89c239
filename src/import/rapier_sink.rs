//! Rapier 物理资产后端
//!
//! PhysicsSink 的具体实现：刚体 → RigidBody + 球形 Collider，约束 → SphericalJoint。
//! 逐对禁止碰撞通过 PhysicsHooks 的接触过滤实现（碰撞组只能表达按位分组）。

use std::collections::HashSet;

use glam::Vec3;
use rapier3d::math::Real;
use rapier3d::prelude::*;

use super::physics::{BodyDesc, BodyKind, ConstraintDesc, PhysicsSink};

/// 重力（厘米 / 秒²，Z-up）
const GRAVITY_Z: f32 = -980.0;

/// 接触过滤：collider 的 user_data 存刚体索引
#[derive(Default)]
struct PairFilter {
    disabled: HashSet<(u128, u128)>,
}

impl PhysicsHooks for PairFilter {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        let a = context.colliders.get(context.collider1)?.user_data;
        let b = context.colliders.get(context.collider2)?.user_data;
        if self.disabled.contains(&(a.min(b), a.max(b))) {
            None
        } else {
            Some(SolverFlags::COMPUTE_IMPULSES)
        }
    }
}

/// Rapier 物理世界
pub struct RapierPhysicsSink {
    physics_pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector<Real>,
    hooks: PairFilter,
    /// 刚体索引 → 句柄
    bodies: Vec<RigidBodyHandle>,
    joint_count: usize,
}

impl Default for RapierPhysicsSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RapierPhysicsSink {
    pub fn new() -> Self {
        Self {
            physics_pipeline: PhysicsPipeline::new(),
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: vector![0.0, 0.0, GRAVITY_Z],
            hooks: PairFilter::default(),
            bodies: Vec::new(),
            joint_count: 0,
        }
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    /// 刚体当前位置
    pub fn body_position(&self, body: usize) -> Option<Vec3> {
        let rb = self.rigid_body_set.get(*self.bodies.get(body)?)?;
        let t = rb.translation();
        Some(Vec3::new(t.x, t.y, t.z))
    }

    /// 运动学刚体跟随骨骼
    pub fn set_kinematic_position(&mut self, body: usize, position: Vec3) {
        let Some(&handle) = self.bodies.get(body) else {
            return;
        };
        if let Some(rb) = self.rigid_body_set.get_mut(handle) {
            if rb.is_kinematic() {
                rb.set_next_kinematic_translation(vector![position.x, position.y, position.z]);
            }
        }
    }

    /// 单步推进
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &self.hooks,
            &(),
        );
    }
}

impl PhysicsSink for RapierPhysicsSink {
    fn add_body(&mut self, body: &BodyDesc) -> Option<usize> {
        let p = body.position;
        let builder = match body.kind {
            BodyKind::Kinematic => RigidBodyBuilder::kinematic_position_based(),
            BodyKind::Simulated => RigidBodyBuilder::dynamic(),
        };
        let rb = builder
            .translation(vector![p.x, p.y, p.z])
            .linear_damping(body.linear_damping)
            .angular_damping(body.angular_damping)
            .build();
        let handle = self.rigid_body_set.insert(rb);
        let index = self.bodies.len();

        for sphere in &body.spheres {
            let o = sphere.offset;
            let groups = if body.collision_enabled {
                InteractionGroups::all()
            } else {
                InteractionGroups::none()
            };
            let collider = ColliderBuilder::ball(sphere.radius.max(f32::EPSILON))
                .translation(vector![o.x, o.y, o.z])
                .collision_groups(groups)
                .user_data(index as u128)
                .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS)
                .build();
            self.collider_set.insert_with_parent(collider, handle, &mut self.rigid_body_set);
        }

        self.bodies.push(handle);
        Some(index)
    }

    fn add_constraint(&mut self, c: &ConstraintDesc) -> bool {
        let (Some(&h1), Some(&h2)) = (self.bodies.get(c.parent_body), self.bodies.get(c.child_body)) else {
            return false;
        };
        let (Some(rb1), Some(rb2)) = (self.rigid_body_set.get(h1), self.rigid_body_set.get(h2)) else {
            return false;
        };
        // 锚点转换到两侧刚体的局部坐标（刚体初始无旋转）
        let anchor = vector![c.anchor.x, c.anchor.y, c.anchor.z];
        let a1 = anchor - rb1.translation();
        let a2 = anchor - rb2.translation();

        let swing = c.swing_limit_deg.to_radians();
        let twist = c.twist_limit_deg.to_radians();
        let damping = c.stiffness.max(0.0).sqrt();
        let joint = SphericalJointBuilder::new()
            .local_anchor1(point![a1.x, a1.y, a1.z])
            .local_anchor2(point![a2.x, a2.y, a2.z])
            .contacts_enabled(false)
            .limits(JointAxis::AngX, [-twist, twist])
            .limits(JointAxis::AngY, [-swing, swing])
            .limits(JointAxis::AngZ, [-swing, swing])
            .motor_position(JointAxis::AngY, 0.0, c.stiffness, damping)
            .motor_position(JointAxis::AngZ, 0.0, c.stiffness, damping)
            .build();
        self.impulse_joint_set.insert(h1, h2, joint, true);
        self.joint_count += 1;
        true
    }

    fn disable_collision(&mut self, a: usize, b: usize) {
        let (a, b) = (a as u128, b as u128);
        self.hooks.disabled.insert((a.min(b), a.max(b)));
    }
}
