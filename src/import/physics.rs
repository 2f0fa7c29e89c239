//! 物理资产生成
//!
//! 把弹簧链与碰撞组转换成刚体 + 约束描述：
//! - 每个链根：运动学头部球体（半径 hit_radius，阻尼 10 × drag），不参与碰撞
//! - 链根的每个后代：模拟刚体，用球形约束挂到父刚体上（刚度 100 × stiffness）
//! - 弹簧挂点子树内的刚体两两禁止碰撞（SpringSetup::collision_disabled_pairs）
//! - 碰撞组：带球体的运动学刚体
//! - 主要人形骨骼上补一个半径 1 的运动学球体，防止穿模
//!
//! 结果先收集为 PhysicsAssetData，再通过 PhysicsSink 交给宿主。

use std::collections::{BTreeSet, HashMap};

use glam::{Mat4, Vec3};

use crate::humanoid::{HumanoidBone, HumanoidBoneTable};
use crate::skeleton::ReferenceSkeleton;
use crate::spring::{ColliderGroup, SpringChain, SpringSetup};

/// 头部阻尼系数
const HEAD_DAMPING_SCALE: f32 = 10.0;
/// 约束刚度系数
const CONSTRAINT_STIFFNESS_SCALE: f32 = 100.0;
/// 摆动/扭转限制（度）
const DEFAULT_LIMIT_DEG: f32 = 10.0;
/// 防穿模球半径
const CLIP_RADIUS: f32 = 1.0;

/// 补防穿模球的人形角色
const CLIP_ROLES: [HumanoidBone; 14] = [
    HumanoidBone::Hips,
    HumanoidBone::Head,
    HumanoidBone::LeftHand,
    HumanoidBone::RightHand,
    HumanoidBone::LeftMiddleDistal,
    HumanoidBone::RightMiddleDistal,
    HumanoidBone::LeftFoot,
    HumanoidBone::RightFoot,
    HumanoidBone::LeftToes,
    HumanoidBone::RightToes,
    HumanoidBone::LeftLowerArm,
    HumanoidBone::RightLowerArm,
    HumanoidBone::LeftLowerLeg,
    HumanoidBone::RightLowerLeg,
];

// ============================================================================
// 描述
// ============================================================================

/// 刚体类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// 跟随骨骼
    Kinematic,
    /// 物理驱动
    Simulated,
}

/// 球体形状（相对刚体原点，组件空间朝向）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereShape {
    pub offset: Vec3,
    pub radius: f32,
}

/// 刚体描述
#[derive(Clone, Debug, PartialEq)]
pub struct BodyDesc {
    pub bone_name: String,
    pub bone: usize,
    pub kind: BodyKind,
    /// 绑定姿势下的组件空间位置
    pub position: Vec3,
    pub spheres: Vec<SphereShape>,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub collision_enabled: bool,
}

/// 球形约束描述
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstraintDesc {
    pub parent_body: usize,
    pub child_body: usize,
    /// 约束锚点（组件空间，子刚体所在骨骼的位置）
    pub anchor: Vec3,
    pub swing_limit_deg: f32,
    pub twist_limit_deg: f32,
    pub stiffness: f32,
}

/// 物理资产写入接口
pub trait PhysicsSink {
    /// 返回宿主侧刚体索引
    fn add_body(&mut self, body: &BodyDesc) -> Option<usize>;
    fn add_constraint(&mut self, constraint: &ConstraintDesc) -> bool;
    fn disable_collision(&mut self, a: usize, b: usize);
}

/// 物理资产（内存实现）
#[derive(Clone, Debug, Default)]
pub struct PhysicsAssetData {
    pub bodies: Vec<BodyDesc>,
    pub constraints: Vec<ConstraintDesc>,
    /// 小索引在前
    pub disabled_pairs: BTreeSet<(usize, usize)>,
}

impl PhysicsSink for PhysicsAssetData {
    fn add_body(&mut self, body: &BodyDesc) -> Option<usize> {
        self.bodies.push(body.clone());
        Some(self.bodies.len() - 1)
    }

    fn add_constraint(&mut self, constraint: &ConstraintDesc) -> bool {
        let n = self.bodies.len();
        if constraint.parent_body >= n || constraint.child_body >= n {
            return false;
        }
        self.constraints.push(*constraint);
        true
    }

    fn disable_collision(&mut self, a: usize, b: usize) {
        if a != b {
            self.disabled_pairs.insert((a.min(b), a.max(b)));
        }
    }
}

impl PhysicsAssetData {
    /// 骨骼 → 刚体
    pub fn body_of_bone(&self, bone: usize) -> Option<usize> {
        self.bodies.iter().position(|b| b.bone == bone)
    }

    #[inline]
    pub fn is_collision_disabled(&self, a: usize, b: usize) -> bool {
        self.disabled_pairs.contains(&(a.min(b), a.max(b)))
    }

    /// 转交给另一个 PhysicsSink；刚体索引按宿主返回值重映射
    pub fn emit<S: PhysicsSink + ?Sized>(&self, sink: &mut S) -> bool {
        let mut remap = Vec::with_capacity(self.bodies.len());
        for body in &self.bodies {
            match sink.add_body(body) {
                Some(i) => remap.push(i),
                None => {
                    log::warn!("[物理] 宿主拒绝刚体 '{}'", body.bone_name);
                    return false;
                }
            }
        }
        for c in &self.constraints {
            let mapped = ConstraintDesc {
                parent_body: remap[c.parent_body],
                child_body: remap[c.child_body],
                ..*c
            };
            if !sink.add_constraint(&mapped) {
                return false;
            }
        }
        for &(a, b) in &self.disabled_pairs {
            sink.disable_collision(remap[a], remap[b]);
        }
        true
    }
}

// ============================================================================
// 生成
// ============================================================================

struct AssetBuilder<'a> {
    skeleton: &'a ReferenceSkeleton,
    world: Vec<Mat4>,
    data: PhysicsAssetData,
    bone_to_body: HashMap<usize, usize>,
}

impl<'a> AssetBuilder<'a> {
    fn add(&mut self, bone: usize, kind: BodyKind, spheres: Vec<SphereShape>, damping: f32, collision: bool) -> usize {
        let desc = BodyDesc {
            bone_name: self.skeleton.bones()[bone].name.clone(),
            bone,
            kind,
            position: self.world[bone].w_axis.truncate(),
            spheres,
            linear_damping: damping,
            angular_damping: damping,
            collision_enabled: collision,
        };
        let index = self.data.bodies.len();
        self.data.bodies.push(desc);
        self.bone_to_body.insert(bone, index);
        index
    }
}

/// 生成物理资产
pub fn build_physics_asset(
    skeleton: &ReferenceSkeleton,
    chains: &[SpringChain],
    groups: &[ColliderGroup],
    table: &HumanoidBoneTable,
) -> PhysicsAssetData {
    let mut b = AssetBuilder {
        skeleton,
        world: skeleton.component_transforms(),
        data: PhysicsAssetData::default(),
        bone_to_body: HashMap::new(),
    };
    let mut swing_bodies: Vec<usize> = Vec::new();

    // 弹簧链
    for chain in chains {
        let damping = HEAD_DAMPING_SCALE * chain.drag_force;
        let sphere = vec![SphereShape { offset: Vec3::ZERO, radius: chain.hit_radius }];

        for root_name in &chain.bone_names {
            let Some(root) = skeleton.find_bone(root_name) else {
                log::debug!("[物理] 弹簧骨骼 '{}' 不存在，跳过", root_name);
                continue;
            };
            if b.bone_to_body.contains_key(&root) {
                continue;
            }
            let head = b.add(root, BodyKind::Kinematic, sphere.clone(), damping, false);
            swing_bodies.push(head);

            // 先序遍历，父刚体先于子刚体
            let mut stack: Vec<usize> = skeleton.children(root).iter().rev().copied().collect();
            while let Some(bone) = stack.pop() {
                stack.extend(skeleton.children(bone).iter().rev());
                if b.bone_to_body.contains_key(&bone) {
                    continue;
                }
                let Some(&parent_body) = skeleton.parent_of(bone).and_then(|p| b.bone_to_body.get(&p)) else {
                    continue;
                };
                let child = b.add(bone, BodyKind::Simulated, sphere.clone(), damping, true);
                swing_bodies.push(child);
                b.data.constraints.push(ConstraintDesc {
                    parent_body,
                    child_body: child,
                    anchor: b.data.bodies[child].position,
                    swing_limit_deg: DEFAULT_LIMIT_DEG,
                    twist_limit_deg: DEFAULT_LIMIT_DEG,
                    stiffness: CONSTRAINT_STIFFNESS_SCALE * chain.stiffness,
                });
                b.data.disable_collision(parent_body, child);
            }
        }
    }

    let setup = SpringSetup::resolve(skeleton, chains, groups);
    for &(x, y) in setup.collision_disabled_pairs() {
        if let (Some(&bx), Some(&by)) = (b.bone_to_body.get(&x), b.bone_to_body.get(&y)) {
            b.data.disable_collision(bx, by);
        }
    }

    // 碰撞组
    for group in groups {
        let Some(bone) = skeleton.find_bone(&group.bone_name) else {
            log::debug!("[物理] 碰撞组骨骼 '{}' 不存在，跳过", group.bone_name);
            continue;
        };
        let rotation = b.world[bone].to_scale_rotation_translation().1;
        let spheres: Vec<SphereShape> = group
            .colliders
            .iter()
            .map(|c| SphereShape { offset: rotation * c.offset, radius: c.radius })
            .collect();
        match b.bone_to_body.get(&bone) {
            Some(&body) => b.data.bodies[body].spheres.extend(spheres),
            None => {
                b.add(bone, BodyKind::Kinematic, spheres, 0.0, true);
            }
        }
    }

    // 防穿模球
    let mut clip_count = 0;
    for role in CLIP_ROLES {
        let Some(bone) = table.bone_index(role, skeleton) else {
            continue;
        };
        if b.bone_to_body.contains_key(&bone) {
            continue;
        }
        let sphere = vec![SphereShape { offset: Vec3::ZERO, radius: CLIP_RADIUS }];
        b.add(bone, BodyKind::Kinematic, sphere, 0.0, true);
        clip_count += 1;
    }

    log::info!(
        "[物理] 资产生成: {} 刚体 ({} 摆动, {} 防穿模), {} 约束, {} 对禁止碰撞",
        b.data.bodies.len(),
        swing_bodies.len(),
        clip_count,
        b.data.constraints.len(),
        b.data.disabled_pairs.len()
    );
    b.data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{Bone, BoneTransform};
    use crate::spring::SphereCollider;

    fn skeleton() -> ReferenceSkeleton {
        let mut s = ReferenceSkeleton::new();
        s.add_bone(Bone::new("root", None, BoneTransform::IDENTITY));
        s.add_bone(Bone::new("hips", Some(0), BoneTransform::from_translation(Vec3::Z * 90.0)));
        s.add_bone(Bone::new("head", Some(1), BoneTransform::from_translation(Vec3::Z * 60.0)));
        s.add_bone(Bone::new("hair1", Some(2), BoneTransform::from_translation(Vec3::X * 5.0)));
        s.add_bone(Bone::new("hair2", Some(3), BoneTransform::from_translation(Vec3::Z * -10.0)));
        s.add_bone(Bone::new("hair3", Some(4), BoneTransform::from_translation(Vec3::Z * -10.0)));
        s
    }

    fn table() -> HumanoidBoneTable {
        HumanoidBoneTable::from_metadata(&[("hips", "hips"), ("head", "head")])
    }

    #[test]
    fn test_chain_bodies_and_constraints() {
        let skel = skeleton();
        let chains = vec![SpringChain {
            stiffness: 0.5,
            drag_force: 0.3,
            hit_radius: 2.0,
            bone_names: vec!["hair1".into()],
            ..Default::default()
        }];
        let data = build_physics_asset(&skel, &chains, &[], &table());

        let head = data.body_of_bone(3).unwrap();
        assert_eq!(data.bodies[head].kind, BodyKind::Kinematic);
        assert!(!data.bodies[head].collision_enabled);
        assert!((data.bodies[head].linear_damping - 3.0).abs() < 1e-6);

        let h2 = data.body_of_bone(4).unwrap();
        let h3 = data.body_of_bone(5).unwrap();
        assert_eq!(data.bodies[h3].kind, BodyKind::Simulated);
        assert_eq!(data.constraints.len(), 2);
        assert_eq!(data.constraints[0].parent_body, head);
        assert_eq!(data.constraints[0].child_body, h2);
        assert!((data.constraints[0].stiffness - 50.0).abs() < 1e-6);
        assert!((data.constraints[1].anchor - Vec3::new(5.0, 0.0, 130.0)).length() < 1e-4);

        assert!(data.is_collision_disabled(head, h3));
        assert!(data.is_collision_disabled(h2, h3));
    }

    #[test]
    fn test_disabled_pairs_follow_spring_setup() {
        let mut skel = skeleton();
        let ribbon = skel
            .add_bone(Bone::new("ribbon1", Some(2), BoneTransform::from_translation(Vec3::X * -5.0)))
            .unwrap();
        skel.add_bone(Bone::new("ribbon2", Some(ribbon), BoneTransform::from_translation(Vec3::Z * -8.0)));
        let chains = vec![
            SpringChain { bone_names: vec!["hair1".into()], ..Default::default() },
            SpringChain { bone_names: vec!["ribbon1".into()], ..Default::default() },
        ];
        let data = build_physics_asset(&skel, &chains, &[], &table());
        let setup = SpringSetup::resolve(&skel, &chains, &[]);

        assert_eq!(data.disabled_pairs.len(), setup.collision_disabled_pairs().len());
        for &(a, b) in setup.collision_disabled_pairs() {
            let (ba, bb) = (data.body_of_bone(a).unwrap(), data.body_of_bone(b).unwrap());
            assert!(data.is_collision_disabled(ba, bb));
        }
        // 跨链
        let hair3 = data.body_of_bone(5).unwrap();
        let ribbon2 = data.body_of_bone(7).unwrap();
        assert!(data.is_collision_disabled(hair3, ribbon2));
        // 防穿模球不在列表中
        let hips = data.body_of_bone(1).unwrap();
        assert!(!data.is_collision_disabled(hips, hair3));
    }

    #[test]
    fn test_collider_group_and_clip_bodies() {
        let skel = skeleton();
        let groups = vec![ColliderGroup {
            bone_name: "head".into(),
            colliders: vec![SphereCollider { offset: Vec3::Z * 5.0, radius: 8.0 }],
        }];
        let data = build_physics_asset(&skel, &[], &groups, &table());

        // head 已有碰撞组刚体，只给 hips 补防穿模球
        assert_eq!(data.bodies.len(), 2);
        let head = data.body_of_bone(2).unwrap();
        assert_eq!(data.bodies[head].spheres[0].radius, 8.0);
        let hips = data.body_of_bone(1).unwrap();
        assert_eq!(data.bodies[hips].spheres[0].radius, CLIP_RADIUS);
        assert!(data.constraints.is_empty());
    }

    #[test]
    fn test_emit_remaps_indices() {
        struct Offset(PhysicsAssetData);
        impl PhysicsSink for Offset {
            fn add_body(&mut self, body: &BodyDesc) -> Option<usize> {
                self.0.add_body(body).map(|i| i + 100)
            }
            fn add_constraint(&mut self, c: &ConstraintDesc) -> bool {
                c.parent_body >= 100 && c.child_body >= 100
            }
            fn disable_collision(&mut self, a: usize, b: usize) {
                assert!(a >= 100 && b >= 100);
            }
        }

        let skel = skeleton();
        let chains = vec![SpringChain { bone_names: vec!["hair1".into()], ..Default::default() }];
        let data = build_physics_asset(&skel, &chains, &[], &table());
        let mut sink = Offset(PhysicsAssetData::default());
        assert!(data.emit(&mut sink));
        assert_eq!(sink.0.bodies.len(), data.bodies.len());
    }
}
