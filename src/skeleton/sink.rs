//! 骨骼资产能力接口
//!
//! 宿主引擎通过实现 SkeletonSink 接收导入结果；ReferenceSkeleton 是内存实现。

use super::{Bone, BoneTransform, ReferenceSkeleton};

/// 骨骼资产写入接口
pub trait SkeletonSink {
    /// 添加骨骼，返回新索引；父骨骼不存在时返回 None
    fn add_bone(&mut self, name: &str, parent: Option<usize>, bind_pose: BoneTransform) -> Option<usize>;

    /// 修改父骨骼
    fn set_parent(&mut self, bone: usize, parent: usize) -> bool;

    /// 设置绑定姿势
    fn set_bind_pose(&mut self, bone: usize, bind_pose: BoneTransform);
}

impl SkeletonSink for ReferenceSkeleton {
    fn add_bone(&mut self, name: &str, parent: Option<usize>, bind_pose: BoneTransform) -> Option<usize> {
        ReferenceSkeleton::add_bone(self, Bone::new(name, parent, bind_pose))
    }

    fn set_parent(&mut self, bone: usize, parent: usize) -> bool {
        ReferenceSkeleton::set_parent(self, bone, parent)
    }

    fn set_bind_pose(&mut self, bone: usize, bind_pose: BoneTransform) {
        ReferenceSkeleton::set_bind_pose(self, bone, bind_pose);
    }
}

/// 把构建好的骨架写入任意 SkeletonSink，返回成功写入的骨骼数
pub fn emit_skeleton<S: SkeletonSink + ?Sized>(skeleton: &ReferenceSkeleton, sink: &mut S) -> usize {
    skeleton
        .bones()
        .iter()
        .filter(|bone| sink.add_bone(&bone.name, bone.parent, bone.bind_pose).is_some())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_emit_into_sink() {
        let mut src = ReferenceSkeleton::new();
        src.add_bone(Bone::new("root", None, BoneTransform::IDENTITY));
        src.add_bone(Bone::new("hips", Some(0), BoneTransform::from_translation(Vec3::Z)));

        let mut dst = ReferenceSkeleton::new();
        assert_eq!(emit_skeleton(&src, &mut dst), 2);
        assert_eq!(dst.find_bone("hips"), Some(1));

        let sink: &mut dyn SkeletonSink = &mut dst;
        assert!(sink.add_bone("chest", Some(1), BoneTransform::IDENTITY).is_some());
        assert!(sink.set_parent(2, 0));
        assert!(!sink.set_parent(0, 1));
    }
}
