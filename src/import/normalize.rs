//! 骨骼名规范化
//!
//! 宿主不接受非 ASCII 骨骼名时，把这些节点改名为 `replace_N`，
//! 并同步改写网格权重、弹簧链、碰撞组与人形映射中的引用。

use std::collections::HashMap;

use crate::scene::Scene;

/// 替换名前缀
pub const REPLACE_PREFIX: &str = "replace_";

/// 规范化场景中的骨骼名，返回 旧名 → 新名
pub fn normalize_bone_names(scene: &mut Scene) -> HashMap<String, String> {
    let mut renames: HashMap<String, String> = HashMap::new();
    let mut counter = 0usize;

    for node in &mut scene.nodes {
        if node.name.is_ascii() {
            continue;
        }
        let new_name = match renames.get(&node.name) {
            Some(n) => n.clone(),
            None => {
                let n = format!("{REPLACE_PREFIX}{counter}");
                counter += 1;
                renames.insert(node.name.clone(), n.clone());
                n
            }
        };
        node.name = new_name;
    }

    if renames.is_empty() {
        return renames;
    }

    let lookup = |name: &mut String| {
        if let Some(n) = renames.get(name.as_str()) {
            *name = n.clone();
        }
    };

    for mesh in &mut scene.meshes {
        for bw in &mut mesh.bones {
            lookup(&mut bw.name);
        }
    }
    if let Some(meta) = scene.metadata.as_mut() {
        for (_, name) in &mut meta.humanoid {
            lookup(name);
        }
        for spring in &mut meta.springs {
            for name in &mut spring.bone_names {
                lookup(name);
            }
        }
        for group in &mut meta.collider_groups {
            lookup(&mut group.node_name);
        }
    }

    log::info!("[名称规范化] {} 个非 ASCII 骨骼名被替换", renames.len());
    renames
}
