//! 参考骨架
//!
//! 管理骨骼层次结构。索引 0 为唯一根骨骼，父骨骼必须先于子骨骼加入，
//! 因此按索引顺序遍历即可保证父先于子（计算全局变换时无需递归）。

use std::collections::HashMap;

use glam::Mat4;

use super::{Bone, BoneTransform};

/// 参考骨架（绑定姿势 + 层次结构）
#[derive(Clone, Debug, Default)]
pub struct ReferenceSkeleton {
    bones: Vec<Bone>,
    /// 名称 → 索引
    name_map: HashMap<String, usize>,
    /// 小写名称 → 索引（大小写不敏感查重）
    lower_name_map: HashMap<String, usize>,
    /// 子骨骼缓存（避免每次遍历全部骨骼）
    children_cache: Vec<Vec<usize>>,
}

impl ReferenceSkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // 构建
    // ========================================================================

    /// 添加骨骼
    ///
    /// 拒绝以下情况并返回 None：父索引不存在、已有根骨骼时再加根、名称（大小写不敏感）已存在。
    pub fn add_bone(&mut self, bone: Bone) -> Option<usize> {
        match bone.parent {
            Some(p) if p >= self.bones.len() => {
                log::warn!("[骨架] 骨骼 '{}' 的父索引 {} 不存在，跳过", bone.name, p);
                return None;
            }
            None if !self.bones.is_empty() => {
                log::warn!("[骨架] 多余的根骨骼 '{}'，跳过", bone.name);
                return None;
            }
            _ => {}
        }
        if self.contains_name_ignore_case(&bone.name) {
            log::warn!("[骨架] 骨骼名 '{}' 已存在，跳过", bone.name);
            return None;
        }

        let index = self.bones.len();
        self.name_map.insert(bone.name.clone(), index);
        self.lower_name_map.insert(bone.name.to_lowercase(), index);
        if let Some(p) = bone.parent {
            self.children_cache[p].push(index);
        }
        self.children_cache.push(Vec::new());
        self.bones.push(bone);
        Some(index)
    }

    /// 重命名骨骼（新名称已被其他骨骼占用时返回 false）
    pub fn rename(&mut self, index: usize, new_name: &str) -> bool {
        if index >= self.bones.len() {
            return false;
        }
        if let Some(&other) = self.lower_name_map.get(&new_name.to_lowercase()) {
            if other != index {
                return false;
            }
        }
        let old = std::mem::replace(&mut self.bones[index].name, new_name.to_string());
        self.name_map.remove(&old);
        self.lower_name_map.remove(&old.to_lowercase());
        self.name_map.insert(new_name.to_string(), index);
        self.lower_name_map.insert(new_name.to_lowercase(), index);
        true
    }

    /// 修改父骨骼
    ///
    /// 新父索引必须小于自身（保持父先于子的顺序），根骨骼不可改父。
    pub fn set_parent(&mut self, index: usize, parent: usize) -> bool {
        if parent >= index || index >= self.bones.len() {
            return false;
        }
        let Some(old) = self.bones[index].parent else {
            return false;
        };
        self.children_cache[old].retain(|&c| c != index);
        self.children_cache[parent].push(index);
        self.bones[index].parent = Some(parent);
        true
    }

    /// 设置绑定姿势
    pub fn set_bind_pose(&mut self, index: usize, pose: BoneTransform) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.bind_pose = pose;
        }
    }

    // ========================================================================
    // 查询
    // ========================================================================

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[inline]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub(crate) fn bone_mut(&mut self, index: usize) -> Option<&mut Bone> {
        self.bones.get_mut(index)
    }

    /// 按名称查找（精确匹配）
    #[inline]
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.name_map.get(name).copied()
    }

    /// 按名称查找（大小写不敏感）
    #[inline]
    pub fn find_bone_ignore_case(&self, name: &str) -> Option<usize> {
        self.lower_name_map.get(&name.to_lowercase()).copied()
    }

    #[inline]
    pub fn contains_name_ignore_case(&self, name: &str) -> bool {
        self.lower_name_map.contains_key(&name.to_lowercase())
    }

    #[inline]
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.bones.get(index).and_then(|b| b.parent)
    }

    #[inline]
    pub fn children(&self, index: usize) -> &[usize] {
        self.children_cache.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 祖先链（不含自身，由近及远）
    pub fn ancestors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.parent_of(index), move |&i| self.parent_of(i))
    }

    /// 深度（根为 0）
    pub fn depth(&self, index: usize) -> usize {
        self.ancestors(index).count()
    }

    /// `index` 是否为 `ancestor` 本身或其后代
    pub fn is_same_or_child(&self, ancestor: usize, index: usize) -> bool {
        index == ancestor || self.ancestors(index).any(|a| a == ancestor)
    }

    // ========================================================================
    // 变换
    // ========================================================================

    /// 所有骨骼绑定姿势的组件空间（模型空间）矩阵
    pub fn component_transforms(&self) -> Vec<Mat4> {
        let mut out: Vec<Mat4> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let local = bone.bind_pose.to_matrix();
            let global = match bone.parent {
                Some(p) => out[p] * local,
                None => local,
            };
            out.push(global);
        }
        out
    }

    /// 单个骨骼绑定姿势的组件空间矩阵
    pub fn component_transform(&self, index: usize) -> Mat4 {
        let Some(bone) = self.bones.get(index) else {
            return Mat4::IDENTITY;
        };
        let local = bone.bind_pose.to_matrix();
        match bone.parent {
            Some(p) => self.component_transform(p) * local,
            None => local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn chain() -> ReferenceSkeleton {
        let mut skel = ReferenceSkeleton::new();
        skel.add_bone(Bone::new("root", None, BoneTransform::IDENTITY));
        skel.add_bone(Bone::new("a", Some(0), BoneTransform::from_translation(Vec3::Z * 10.0)));
        skel.add_bone(Bone::new("b", Some(1), BoneTransform::from_translation(Vec3::Z * 5.0)));
        skel
    }

    #[test]
    fn test_add_bone_rules() {
        let mut skel = chain();
        // 父不存在
        assert!(skel.add_bone(Bone::new("x", Some(99), BoneTransform::IDENTITY)).is_none());
        // 第二个根
        assert!(skel.add_bone(Bone::new("r2", None, BoneTransform::IDENTITY)).is_none());
        // 大小写不敏感重名
        assert!(skel.add_bone(Bone::new("A", Some(0), BoneTransform::IDENTITY)).is_none());
        assert_eq!(skel.len(), 3);
    }

    #[test]
    fn test_component_transforms() {
        let skel = chain();
        let m = skel.component_transforms();
        assert!((m[2].w_axis.truncate() - Vec3::Z * 15.0).length() < 1e-5);
        assert!((skel.component_transform(2).w_axis.truncate() - Vec3::Z * 15.0).length() < 1e-5);
    }

    #[test]
    fn test_hierarchy_queries() {
        let skel = chain();
        assert_eq!(skel.children(0), &[1]);
        assert_eq!(skel.depth(2), 2);
        assert!(skel.is_same_or_child(0, 2));
        assert!(!skel.is_same_or_child(2, 1));
        assert_eq!(skel.find_bone_ignore_case("B"), Some(2));
    }

    #[test]
    fn test_rename() {
        let mut skel = chain();
        assert!(skel.rename(1, "spine"));
        assert_eq!(skel.find_bone("spine"), Some(1));
        assert_eq!(skel.find_bone("a"), None);
        assert!(!skel.rename(2, "SPINE"));
    }
}
