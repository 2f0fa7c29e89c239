//! 弹簧链与碰撞组定义，以及按骨架解析后的只读模拟数据
//!
//! SpringChain / ColliderGroup 使用目标坐标系（已经过轴转换），按骨骼名引用。
//! SpringSetup 在构建时把名称解析成索引，之后跨实例以 Arc 共享。

use std::collections::{BTreeSet, HashSet};

use glam::{Quat, Vec3};

use crate::scene::VrmMetadata;
use crate::skeleton::axis::AxisConvention;
use crate::skeleton::ReferenceSkeleton;

// ============================================================================
// 配置数据
// ============================================================================

/// 弹簧链
#[derive(Clone, Debug, PartialEq)]
pub struct SpringChain {
    pub stiffness: f32,
    pub gravity_power: f32,
    /// 单位向量
    pub gravity_dir: Vec3,
    /// [0, 1]
    pub drag_force: f32,
    pub hit_radius: f32,
    /// 链根骨骼名；每个根向下展开其全部后代
    pub bone_names: Vec<String>,
    /// 碰撞组索引
    pub collider_groups: Vec<usize>,
}

impl Default for SpringChain {
    fn default() -> Self {
        Self {
            stiffness: 1.0,
            gravity_power: 0.0,
            gravity_dir: Vec3::new(0.0, 0.0, -1.0),
            drag_force: 0.4,
            hit_radius: 2.0,
            bone_names: Vec::new(),
            collider_groups: Vec::new(),
        }
    }
}

/// 碰撞球（骨骼局部偏移 + 半径）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereCollider {
    pub offset: Vec3,
    pub radius: f32,
}

/// 碰撞组
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColliderGroup {
    pub bone_name: String,
    pub colliders: Vec<SphereCollider>,
}

/// 元数据 → 目标坐标系的弹簧链与碰撞组
pub fn chains_from_metadata(meta: &VrmMetadata, axis: &AxisConvention) -> (Vec<SpringChain>, Vec<ColliderGroup>) {
    let scale = axis.length_scale();

    let chains = meta
        .springs
        .iter()
        .map(|s| SpringChain {
            stiffness: s.stiffness,
            gravity_power: s.gravity_power,
            gravity_dir: axis.direction(s.gravity_dir).normalize_or_zero(),
            drag_force: s.drag_force.clamp(0.0, 1.0),
            hit_radius: s.hit_radius * scale,
            bone_names: s.bone_names.clone(),
            collider_groups: s.collider_groups.clone(),
        })
        .collect();

    let groups = meta
        .collider_groups
        .iter()
        .map(|g| ColliderGroup {
            bone_name: g.node_name.clone(),
            colliders: g
                .colliders
                .iter()
                .map(|c| SphereCollider {
                    offset: axis.position(c.offset),
                    radius: c.radius * scale,
                })
                .collect(),
        })
        .collect();

    (chains, groups)
}

// ============================================================================
// 解析结果
// ============================================================================

/// 单个模拟关节：bone 绕自身旋转，使 tail 指向模拟位置
#[derive(Clone, Copy, Debug)]
pub struct SpringJoint {
    pub bone: usize,
    /// 关节的父骨骼（None 表示关节是骨架根）
    pub parent: Option<usize>,
    /// 尖端骨骼（第一个子骨骼）
    pub tail: usize,
    /// 绑定姿势下关节到尖端的长度
    pub bone_length: f32,
    /// 关节局部空间中指向尖端的单位向量
    pub bone_axis: Vec3,
    /// 尖端在关节局部空间的绑定偏移
    pub tail_offset: Vec3,
    /// 关节绑定局部旋转
    pub bind_rotation: Quat,
}

/// 解析后的弹簧链
#[derive(Clone, Debug)]
pub struct ResolvedChain {
    pub stiffness: f32,
    pub gravity_power: f32,
    pub gravity_dir: Vec3,
    pub drag_force: f32,
    pub hit_radius: f32,
    /// 父先于子
    pub joints: Vec<SpringJoint>,
    /// 解析后的碰撞组索引（指向 SpringSetup::collider_groups）
    pub collider_groups: Vec<usize>,
}

/// 解析后的碰撞组
#[derive(Clone, Debug)]
pub struct ResolvedColliderGroup {
    pub bone: usize,
    pub colliders: Vec<SphereCollider>,
}

/// 按骨架解析后的弹簧骨骼数据（只读，可共享）
#[derive(Clone, Debug)]
pub struct SpringSetup {
    pub chains: Vec<ResolvedChain>,
    pub collider_groups: Vec<ResolvedColliderGroup>,
    /// 链参数所在坐标系的长度缩放（导入为厘米时为 100 × 模型缩放）
    pub unit_scale: f32,
    /// 弹簧挂点子树内的骨骼两两成对（小索引在前），之间不做碰撞
    disabled_pairs: BTreeSet<(usize, usize)>,
}

impl Default for SpringSetup {
    fn default() -> Self {
        Self {
            chains: Vec::new(),
            collider_groups: Vec::new(),
            unit_scale: 1.0,
            disabled_pairs: BTreeSet::new(),
        }
    }
}

impl SpringSetup {
    /// 解析名称；找不到的骨骼与碰撞组被跳过
    pub fn resolve(skeleton: &ReferenceSkeleton, chains: &[SpringChain], groups: &[ColliderGroup]) -> Self {
        // 碰撞组：旧索引 → 新索引
        let mut group_remap = vec![None; groups.len()];
        let mut collider_groups = Vec::with_capacity(groups.len());
        for (i, g) in groups.iter().enumerate() {
            match skeleton.find_bone(&g.bone_name) {
                Some(bone) => {
                    group_remap[i] = Some(collider_groups.len());
                    collider_groups.push(ResolvedColliderGroup {
                        bone,
                        colliders: g.colliders.clone(),
                    });
                }
                None => log::debug!("[弹簧骨骼] 碰撞组骨骼 '{}' 不存在，跳过", g.bone_name),
            }
        }

        let world = skeleton.component_transforms();
        let mut swing_bones: Vec<usize> = Vec::new();
        let mut swing_seen = HashSet::new();
        let mut resolved = Vec::with_capacity(chains.len());

        for chain in chains {
            let mut joints = Vec::new();
            let mut seen = HashSet::new();

            for root_name in &chain.bone_names {
                let Some(root) = skeleton.find_bone(root_name) else {
                    log::debug!("[弹簧骨骼] 骨骼 '{}' 不存在，跳过", root_name);
                    continue;
                };

                // 先序展开挂点子树，父先于子
                let mut subtree = Vec::new();
                let mut stack = vec![root];
                while let Some(b) = stack.pop() {
                    subtree.push(b);
                    stack.extend(skeleton.children(b).iter().rev());
                }

                swing_bones.extend(subtree.iter().copied().filter(|&b| swing_seen.insert(b)));

                for &bone in &subtree {
                    if !seen.insert(bone) {
                        continue;
                    }
                    // 叶骨骼没有尖端，不模拟
                    let Some(&tail) = skeleton.children(bone).first() else {
                        continue;
                    };
                    let head_pos = world[bone].w_axis.truncate();
                    let tail_pos = world[tail].w_axis.truncate();
                    let bone_length = head_pos.distance(tail_pos);
                    let local_tail = skeleton.bones()[tail].bind_pose.translation;
                    let Some(bone_axis) = local_tail.try_normalize() else {
                        continue;
                    };
                    joints.push(SpringJoint {
                        bone,
                        parent: skeleton.parent_of(bone),
                        tail,
                        bone_length,
                        bone_axis,
                        tail_offset: local_tail,
                        bind_rotation: skeleton.bones()[bone].bind_pose.rotation,
                    });
                }
            }

            resolved.push(ResolvedChain {
                stiffness: chain.stiffness.max(0.0),
                gravity_power: chain.gravity_power,
                gravity_dir: chain.gravity_dir.normalize_or_zero(),
                drag_force: chain.drag_force.clamp(0.0, 1.0),
                hit_radius: chain.hit_radius,
                joints,
                collider_groups: chain
                    .collider_groups
                    .iter()
                    .filter_map(|&g| group_remap.get(g).copied().flatten())
                    .collect(),
            });
        }

        let mut disabled_pairs = BTreeSet::new();
        for (i, &a) in swing_bones.iter().enumerate() {
            for &b in &swing_bones[i + 1..] {
                disabled_pairs.insert((a.min(b), a.max(b)));
            }
        }

        let joint_count: usize = resolved.iter().map(|c| c.joints.len()).sum();
        log::info!(
            "[弹簧骨骼] 解析完成: {} 链, {} 关节, {} 碰撞组",
            resolved.len(),
            joint_count,
            collider_groups.len()
        );

        Self {
            chains: resolved,
            collider_groups,
            unit_scale: 1.0,
            disabled_pairs,
        }
    }

    /// 指定链参数的长度缩放
    pub fn with_unit_scale(mut self, unit_scale: f32) -> Self {
        self.unit_scale = unit_scale;
        self
    }

    /// 禁止碰撞的骨骼对
    #[inline]
    pub fn collision_disabled_pairs(&self) -> &BTreeSet<(usize, usize)> {
        &self.disabled_pairs
    }

    #[inline]
    pub fn is_collision_disabled(&self, a: usize, b: usize) -> bool {
        self.disabled_pairs.contains(&(a.min(b), a.max(b)))
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.chains.iter().map(|c| c.joints.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{Bone, BoneTransform};

    fn hair_skeleton() -> ReferenceSkeleton {
        let mut s = ReferenceSkeleton::new();
        s.add_bone(Bone::new("root", None, BoneTransform::IDENTITY));
        s.add_bone(Bone::new("head", Some(0), BoneTransform::from_translation(Vec3::Z * 150.0)));
        s.add_bone(Bone::new("hair1", Some(1), BoneTransform::from_translation(Vec3::X * 5.0)));
        s.add_bone(Bone::new("hair2", Some(2), BoneTransform::from_translation(Vec3::Z * -10.0)));
        s.add_bone(Bone::new("hair3", Some(3), BoneTransform::from_translation(Vec3::Z * -10.0)));
        s
    }

    #[test]
    fn test_resolve_chain() {
        let skel = hair_skeleton();
        let chains = vec![SpringChain {
            bone_names: vec!["hair1".into(), "missing".into()],
            collider_groups: vec![0, 1],
            ..Default::default()
        }];
        let groups = vec![
            ColliderGroup { bone_name: "nope".into(), colliders: vec![] },
            ColliderGroup {
                bone_name: "head".into(),
                colliders: vec![SphereCollider { offset: Vec3::ZERO, radius: 8.0 }],
            },
        ];
        let setup = SpringSetup::resolve(&skel, &chains, &groups);

        assert_eq!(setup.collider_groups.len(), 1);
        assert_eq!(setup.chains[0].collider_groups, vec![0]);
        // hair1、hair2 有尖端，hair3 为叶
        let joints = &setup.chains[0].joints;
        assert_eq!(joints.len(), 2);
        assert_eq!(joints[0].bone, 2);
        assert!((joints[0].bone_length - 10.0).abs() < 1e-4);
        assert!((joints[0].bone_axis - Vec3::NEG_Z).length() < 1e-6);

        assert!(setup.is_collision_disabled(2, 4));
        assert!(setup.is_collision_disabled(4, 3));
        assert!(!setup.is_collision_disabled(1, 2));
    }

    #[test]
    fn test_disabled_pairs_span_chains() {
        let mut skel = hair_skeleton();
        skel.add_bone(Bone::new("ribbon1", Some(1), BoneTransform::from_translation(Vec3::X * -5.0)));
        skel.add_bone(Bone::new("ribbon2", Some(5), BoneTransform::from_translation(Vec3::Z * -8.0)));
        let chains = vec![
            SpringChain { bone_names: vec!["hair1".into()], ..Default::default() },
            SpringChain { bone_names: vec!["ribbon1".into()], ..Default::default() },
        ];
        let setup = SpringSetup::resolve(&skel, &chains, &[]);

        // hair1..3 与 ribbon1..2 共 5 根骨骼，两两成对
        assert_eq!(setup.collision_disabled_pairs().len(), 10);
        assert!(setup.is_collision_disabled(3, 6));
        assert!(!setup.is_collision_disabled(1, 5));
        assert_eq!(setup.unit_scale, 1.0);
        assert_eq!(setup.with_unit_scale(100.0).unit_scale, 100.0);
    }

    #[test]
    fn test_empty_chain_resolves() {
        let skel = hair_skeleton();
        let chains = vec![SpringChain { bone_names: vec!["missing".into()], ..Default::default() }];
        let setup = SpringSetup::resolve(&skel, &chains, &[]);
        assert_eq!(setup.joint_count(), 0);
    }
}
