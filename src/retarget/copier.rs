//! 姿势复制（人形重定向）
//!
//! 对每个人形角色（按 RETARGET_ORDER）：
//! - 旋转只传递相对绑定姿势的增量：dst = dst_bind × (src_cur × src_bind⁻¹)
//! - 髋部额外传递平移，按两侧髋高（髋部到根的绑定 Z 偏移之和）之比缩放
//!
//! 骨骼对与髋高比例在构造时解析一次，每帧不再按名查找。

use std::sync::Arc;

use glam::Mat4;

use crate::humanoid::{HumanoidBone, HumanoidBoneTable};
use crate::skeleton::ReferenceSkeleton;
use crate::spring::{SpringBoneSimulator, SpringSetup};

use super::{BoneOverride, Pose};

/// 髋高过小时不缩放
const MIN_HIP_HEIGHT: f32 = 1e-4;

/// 预解析的重定向器
#[derive(Clone, Debug)]
pub struct PoseRetargeter {
    /// (角色, 源骨骼, 目标骨骼)
    pairs: Vec<(HumanoidBone, usize, usize)>,
    /// 目标髋高 / 源髋高
    hip_scale: f32,
}

impl PoseRetargeter {
    pub fn new(
        src_skeleton: &ReferenceSkeleton,
        src_table: &HumanoidBoneTable,
        dst_skeleton: &ReferenceSkeleton,
        dst_table: &HumanoidBoneTable,
    ) -> Self {
        let pairs: Vec<_> = HumanoidBone::RETARGET_ORDER
            .iter()
            .filter_map(|&role| {
                let src = src_table.bone_index(role, src_skeleton)?;
                let dst = dst_table.bone_index(role, dst_skeleton)?;
                Some((role, src, dst))
            })
            .collect();

        let src_height = src_table
            .bone_index(HumanoidBone::Hips, src_skeleton)
            .map(|i| hip_height(src_skeleton, i))
            .unwrap_or(0.0);
        let dst_height = dst_table
            .bone_index(HumanoidBone::Hips, dst_skeleton)
            .map(|i| hip_height(dst_skeleton, i))
            .unwrap_or(0.0);
        let hip_scale = if src_height.abs() < MIN_HIP_HEIGHT {
            1.0
        } else {
            dst_height / src_height
        };

        log::debug!(
            "[重定向] {} 个角色对, 髋高比例 {:.4} ({:.2} → {:.2})",
            pairs.len(),
            hip_scale,
            src_height,
            dst_height
        );

        Self { pairs, hip_scale }
    }

    #[inline]
    pub fn hip_scale(&self) -> f32 {
        self.hip_scale
    }

    #[inline]
    pub fn role_count(&self) -> usize {
        self.pairs.len()
    }

    /// 复制姿势到 `dst_pose`，被改写的骨骼写入 `out`
    pub fn copy_into(
        &self,
        src_skeleton: &ReferenceSkeleton,
        src_pose: &Pose,
        dst_skeleton: &ReferenceSkeleton,
        dst_pose: &mut Pose,
        out: &mut Vec<BoneOverride>,
    ) {
        for &(role, src, dst) in &self.pairs {
            let (Some(src_bone), Some(dst_bone)) = (src_skeleton.bone(src), dst_skeleton.bone(dst)) else {
                continue;
            };
            let Some(src_cur) = src_pose.local(src) else { continue };

            let delta = src_cur.rotation * src_bone.bind_pose.rotation.inverse();
            let rotation = (dst_bone.bind_pose.rotation * delta).normalize();
            dst_pose.set_rotation(dst, rotation);

            let translation = (role == HumanoidBone::Hips).then(|| {
                let offset = src_cur.translation - src_bone.bind_pose.translation;
                dst_bone.bind_pose.translation + offset * self.hip_scale
            });
            if let Some(t) = translation {
                dst_pose.set_translation(dst, t);
            }

            out.push(BoneOverride {
                bone: dst,
                rotation,
                translation,
            });
        }
    }

    /// 复制姿势，返回完整的目标姿势（未映射骨骼保持绑定姿势）
    pub fn copy(
        &self,
        src_skeleton: &ReferenceSkeleton,
        src_pose: &Pose,
        dst_skeleton: &ReferenceSkeleton,
    ) -> Pose {
        let mut dst_pose = Pose::bind(dst_skeleton);
        let mut out = Vec::with_capacity(self.pairs.len());
        self.copy_into(src_skeleton, src_pose, dst_skeleton, &mut dst_pose, &mut out);
        dst_pose
    }
}

/// 髋高：髋部及其所有祖先的绑定平移 Z 之和
pub fn hip_height(skeleton: &ReferenceSkeleton, hips: usize) -> f32 {
    std::iter::once(hips)
        .chain(skeleton.ancestors(hips))
        .filter_map(|i| skeleton.bone(i))
        .map(|b| b.bind_pose.translation.z)
        .sum()
}

// ============================================================================
// 运行时实例
// ============================================================================

/// 每角色的姿势复制实例：重定向 → 弹簧骨骼后处理
pub struct PoseCopyInstance {
    src_skeleton: Arc<ReferenceSkeleton>,
    dst_skeleton: Arc<ReferenceSkeleton>,
    retargeter: PoseRetargeter,
    spring: Option<SpringBoneSimulator>,
    /// 跳过弹簧骨骼（每帧开始时检查一次）
    pub ignore_spring_bones: bool,

    // --- 预分配缓冲区 ---
    pose: Pose,
    overrides: Vec<BoneOverride>,
    spring_buf: Vec<BoneOverride>,
}

impl PoseCopyInstance {
    pub fn new(
        src_skeleton: Arc<ReferenceSkeleton>,
        src_table: &HumanoidBoneTable,
        dst_skeleton: Arc<ReferenceSkeleton>,
        dst_table: &HumanoidBoneTable,
        spring_setup: Option<Arc<SpringSetup>>,
    ) -> Self {
        let retargeter = PoseRetargeter::new(&src_skeleton, src_table, &dst_skeleton, dst_table);
        let pose = Pose::bind(&dst_skeleton);
        Self {
            src_skeleton,
            dst_skeleton,
            retargeter,
            spring: spring_setup.map(SpringBoneSimulator::new),
            ignore_spring_bones: false,
            pose,
            overrides: Vec::new(),
            spring_buf: Vec::new(),
        }
    }

    #[inline]
    pub fn retargeter(&self) -> &PoseRetargeter {
        &self.retargeter
    }

    #[inline]
    pub fn spring_mut(&mut self) -> Option<&mut SpringBoneSimulator> {
        self.spring.as_mut()
    }

    /// 当前目标姿势
    #[inline]
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// 评估一帧，返回目标骨架上的覆盖（同一骨骼只出现一次）
    pub fn evaluate(&mut self, src_pose: &Pose, dt: f32, root_world: Mat4) -> &[BoneOverride] {
        self.overrides.clear();
        self.pose.locals.clear();
        self.pose
            .locals
            .extend(self.dst_skeleton.bones().iter().map(|b| b.bind_pose));

        self.retargeter.copy_into(
            &self.src_skeleton,
            src_pose,
            &self.dst_skeleton,
            &mut self.pose,
            &mut self.overrides,
        );

        if !self.ignore_spring_bones {
            if let Some(spring) = self.spring.as_mut() {
                spring.step_into(&self.dst_skeleton, &mut self.pose, dt, root_world, &mut self.spring_buf);
                for o in &self.spring_buf {
                    match self.overrides.iter_mut().find(|e| e.bone == o.bone) {
                        Some(existing) => existing.rotation = o.rotation,
                        None => self.overrides.push(*o),
                    }
                }
            }
        }

        &self.overrides
    }

    /// 瞬移重置
    pub fn reset(&mut self) -> bool {
        self.spring.as_mut().map_or(false, SpringBoneSimulator::reset)
    }
}

impl Drop for PoseCopyInstance {
    fn drop(&mut self) {
        if let Some(spring) = self.spring.as_mut() {
            spring.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{Bone, BoneTransform};
    use crate::spring::SpringChain;
    use glam::{Quat, Vec3};

    /// root → hips(z=hip) → spine → head
    fn humanoid(prefix: &str, hip: f32, spine_rot: Quat) -> (ReferenceSkeleton, HumanoidBoneTable) {
        let mut s = ReferenceSkeleton::new();
        s.add_bone(Bone::new(format!("{prefix}root"), None, BoneTransform::IDENTITY));
        s.add_bone(Bone::new(format!("{prefix}hips"), Some(0), BoneTransform::from_translation(Vec3::Z * hip)));
        s.add_bone(Bone::new(
            format!("{prefix}spine"),
            Some(1),
            BoneTransform::from_rotation_translation(spine_rot, Vec3::Z * 10.0),
        ));
        s.add_bone(Bone::new(format!("{prefix}head"), Some(2), BoneTransform::from_translation(Vec3::Z * 50.0)));
        let mut t = HumanoidBoneTable::new();
        t.insert(HumanoidBone::Hips, format!("{prefix}hips"));
        t.insert(HumanoidBone::Spine, format!("{prefix}spine"));
        t.insert(HumanoidBone::Head, format!("{prefix}head"));
        (s, t)
    }

    #[test]
    fn test_bind_pose_idempotent() {
        let (src, src_t) = humanoid("src_", 90.0, Quat::from_rotation_x(0.3));
        let (dst, dst_t) = humanoid("dst_", 100.0, Quat::from_rotation_y(-0.8));
        let r = PoseRetargeter::new(&src, &src_t, &dst, &dst_t);
        let out = r.copy(&src, &Pose::bind(&src), &dst);
        for (a, b) in out.locals.iter().zip(Pose::bind(&dst).locals.iter()) {
            assert!((a.translation - b.translation).length() < 1e-4);
            assert!(a.rotation.abs_diff_eq(b.rotation, 1e-5) || a.rotation.abs_diff_eq(-b.rotation, 1e-5));
        }
    }

    #[test]
    fn test_hip_translation_scaled() {
        let (src, src_t) = humanoid("src_", 90.0, Quat::IDENTITY);
        let (dst, dst_t) = humanoid("dst_", 100.0, Quat::IDENTITY);
        let r = PoseRetargeter::new(&src, &src_t, &dst, &dst_t);
        assert!((r.hip_scale() - 100.0 / 90.0).abs() < 1e-6);

        let mut pose = Pose::bind(&src);
        pose.set_translation(1, Vec3::new(0.0, 0.0, 95.0));
        let out = r.copy(&src, &pose, &dst);
        let offset = out.locals[1].translation - dst.bones()[1].bind_pose.translation;
        assert!((offset - Vec3::new(0.0, 0.0, 5.0 * 100.0 / 90.0)).length() < 1e-4);
    }

    #[test]
    fn test_rotation_delta_transfers() {
        let (src, src_t) = humanoid("src_", 90.0, Quat::from_rotation_x(0.3));
        let (dst, dst_t) = humanoid("dst_", 100.0, Quat::from_rotation_y(-0.8));
        let r = PoseRetargeter::new(&src, &src_t, &dst, &dst_t);

        let delta = Quat::from_rotation_z(0.5);
        let mut pose = Pose::bind(&src);
        pose.set_rotation(2, delta * src.bones()[2].bind_pose.rotation);
        let out = r.copy(&src, &pose, &dst);
        let expected = dst.bones()[2].bind_pose.rotation * delta;
        assert!(out.locals[2].rotation.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn test_unmapped_roles_skipped() {
        let (src, mut src_t) = humanoid("src_", 90.0, Quat::IDENTITY);
        let (dst, dst_t) = humanoid("dst_", 100.0, Quat::IDENTITY);
        src_t.remove(HumanoidBone::Head);
        let r = PoseRetargeter::new(&src, &src_t, &dst, &dst_t);
        assert_eq!(r.role_count(), 2);
    }

    #[test]
    fn test_instance_runs_spring_after_copy() {
        let (src, src_t) = humanoid("src_", 90.0, Quat::IDENTITY);
        let (mut dst, dst_t) = humanoid("dst_", 100.0, Quat::IDENTITY);
        let hair = dst.add_bone(Bone::new("hair", Some(3), BoneTransform::from_translation(Vec3::X * 5.0))).unwrap();
        dst.add_bone(Bone::new("hair_end", Some(hair), BoneTransform::from_translation(Vec3::X * 10.0)));

        let chain = SpringChain {
            stiffness: 0.0,
            gravity_power: 1.0,
            drag_force: 0.0,
            bone_names: vec!["hair".into()],
            ..Default::default()
        };
        let setup = Arc::new(SpringSetup::resolve(&dst, &[chain], &[]));
        let mut inst = PoseCopyInstance::new(Arc::new(src.clone()), &src_t, Arc::new(dst), &dst_t, Some(setup));

        let overrides = inst.evaluate(&Pose::bind(&src), 1.0, Mat4::IDENTITY).to_vec();
        assert_eq!(overrides.len(), 4);
        assert!(overrides.iter().any(|o| o.bone == hair));

        inst.ignore_spring_bones = true;
        assert_eq!(inst.evaluate(&Pose::bind(&src), 1.0, Mat4::IDENTITY).len(), 3);
    }
}
