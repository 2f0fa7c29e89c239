//! 材质槽位
//!
//! 纹理与着色器转换在外部完成；这里只决定材质槽位：
//! 同名材质在 MERGE_MATERIAL 下合并为一个槽，否则重名者加序号后缀。

use std::collections::HashMap;

use crate::scene::Scene;

/// 材质槽位表
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialTable {
    /// 槽位名（唯一）
    pub slots: Vec<String>,
    /// 场景材质索引 → 槽位
    pub remap: Vec<usize>,
}

impl MaterialTable {
    /// 网格材质索引 → 槽位（越界时回落到 0）
    #[inline]
    pub fn slot_of(&self, material: usize) -> usize {
        self.remap.get(material).copied().unwrap_or(0)
    }
}

/// 计算材质槽位
pub fn build_material_table(scene: &Scene, merge: bool) -> MaterialTable {
    let mut table = MaterialTable::default();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for (i, mat) in scene.materials.iter().enumerate() {
        let base = if mat.name.is_empty() {
            format!("material_{i}")
        } else {
            mat.name.clone()
        };

        if merge {
            if let Some(&slot) = by_name.get(&base) {
                table.remap.push(slot);
                continue;
            }
        }

        let mut name = base.clone();
        let mut n = 1;
        while by_name.contains_key(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        if name != base {
            log::warn!("[材质] 重名材质 '{}' → '{}'", base, name);
        }

        let slot = table.slots.len();
        by_name.insert(name.clone(), slot);
        table.slots.push(name);
        table.remap.push(slot);
    }

    // 没有材质时保留一个默认槽
    if table.slots.is_empty() {
        table.slots.push(String::from("default"));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneMaterial;

    fn scene(names: &[&str]) -> Scene {
        Scene {
            materials: names.iter().map(|n| SceneMaterial { name: n.to_string() }).collect(),
            ..Scene::new("root")
        }
    }

    #[test]
    fn test_merge_same_names() {
        let t = build_material_table(&scene(&["Body", "Hair", "Body"]), true);
        assert_eq!(t.slots, vec!["Body", "Hair"]);
        assert_eq!(t.remap, vec![0, 1, 0]);
    }

    #[test]
    fn test_rename_without_merge() {
        let t = build_material_table(&scene(&["Body", "Body", ""]), false);
        assert_eq!(t.slots, vec!["Body", "Body_1", "material_2"]);
        assert_eq!(t.slot_of(1), 1);
        assert_eq!(t.slot_of(99), 0);
    }
}
