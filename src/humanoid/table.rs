//! 人形骨骼映射表
//!
//! 角色 → 骨骼名（正向，用于重定向到该骨架）与骨骼名 → 角色（反向，用于从该骨架读取）。
//! 两个方向都是单射：一个角色至多一个骨骼名，一个骨骼名至多被一个角色占用。

use std::collections::{BTreeMap, HashMap};

use crate::skeleton::ReferenceSkeleton;

use super::HumanoidBone;

/// 人形骨骼映射表（导入时建立，运行时只读，可跨实例共享）
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HumanoidBoneTable {
    forward: BTreeMap<HumanoidBone, String>,
    reverse: HashMap<String, HumanoidBone>,
}

impl HumanoidBoneTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从元数据 (角色名, 骨骼名) 对建立
    ///
    /// 未知角色名与空骨骼名被跳过；同一骨骼名被多个角色引用时保留第一个。
    pub fn from_metadata<S: AsRef<str>>(pairs: &[(S, S)]) -> Self {
        let mut table = Self::new();
        for (role, name) in pairs {
            let (role, name) = (role.as_ref(), name.as_ref());
            if name.is_empty() {
                continue;
            }
            match role.parse::<HumanoidBone>() {
                Ok(r) => {
                    if !table.insert(r, name) {
                        log::warn!("[人形映射] 骨骼 '{}' 已被其他角色占用，忽略角色 '{}'", name, role);
                    }
                }
                Err(e) => log::debug!("[人形映射] {}", e),
            }
        }
        table
    }

    /// 插入映射
    ///
    /// 骨骼名已属于其他角色时拒绝并返回 false；同一角色重复插入时替换旧名。
    pub fn insert(&mut self, role: HumanoidBone, name: impl Into<String>) -> bool {
        let name = name.into();
        if let Some(&owner) = self.reverse.get(&name) {
            return owner == role;
        }
        if let Some(old) = self.forward.insert(role, name.clone()) {
            self.reverse.remove(&old);
        }
        self.reverse.insert(name, role);
        true
    }

    /// 移除角色
    pub fn remove(&mut self, role: HumanoidBone) -> Option<String> {
        let name = self.forward.remove(&role)?;
        self.reverse.remove(&name);
        Some(name)
    }

    /// 骨骼改名后同步映射
    pub fn rename_target(&mut self, old: &str, new: &str) -> bool {
        let Some(role) = self.reverse.remove(old) else {
            return false;
        };
        self.forward.insert(role, new.to_string());
        self.reverse.insert(new.to_string(), role);
        true
    }

    #[inline]
    pub fn lookup(&self, role: HumanoidBone) -> Option<&str> {
        self.forward.get(&role).map(String::as_str)
    }

    #[inline]
    pub fn reverse_lookup(&self, name: &str) -> Option<HumanoidBone> {
        self.reverse.get(name).copied()
    }

    #[inline]
    pub fn contains(&self, role: HumanoidBone) -> bool {
        self.forward.contains_key(&role)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// 按重定向顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (HumanoidBone, &str)> {
        self.forward.iter().map(|(r, n)| (*r, n.as_str()))
    }

    /// 解析到骨架索引（不存在的骨骼被跳过）
    pub fn resolve(&self, skeleton: &ReferenceSkeleton) -> Vec<(HumanoidBone, usize)> {
        self.iter()
            .filter_map(|(role, name)| skeleton.find_bone(name).map(|i| (role, i)))
            .collect()
    }

    /// 角色 → 骨骼索引
    #[inline]
    pub fn bone_index(&self, role: HumanoidBone, skeleton: &ReferenceSkeleton) -> Option<usize> {
        self.lookup(role).and_then(|n| skeleton.find_bone(n))
    }
}
