//! 骨架按角色改名
//!
//! 生成骨骼名规范化的副本骨架：被映射的骨骼改为角色名（或人体模型名），
//! 与目标名冲突的无关骨骼先加 `_renamed` 后缀让位。

use std::collections::HashMap;

use crate::skeleton::ReferenceSkeleton;

use super::{mannequin_name, HumanoidBone, HumanoidBoneTable};

/// 让位后缀
pub const RENAMED_SUFFIX: &str = "_renamed";

/// 改名结果
#[derive(Clone, Debug, Default)]
pub struct RenamedSkeleton {
    pub skeleton: ReferenceSkeleton,
    /// 新骨架对应的人形映射
    pub table: HumanoidBoneTable,
    /// 旧名 → 新名
    pub renames: HashMap<String, String>,
}

/// 映射骨骼改为 VRM 角色名
pub fn rename_to_humanoid(skeleton: &ReferenceSkeleton, table: &HumanoidBoneTable) -> RenamedSkeleton {
    rename_by_role(skeleton, table, |r| Some(r.as_str()))
}

/// 映射骨骼改为人体模型骨骼名
pub fn rename_to_mannequin(skeleton: &ReferenceSkeleton, table: &HumanoidBoneTable) -> RenamedSkeleton {
    rename_by_role(skeleton, table, mannequin_name)
}

fn rename_by_role(
    skeleton: &ReferenceSkeleton,
    table: &HumanoidBoneTable,
    target_name: impl Fn(HumanoidBone) -> Option<&'static str>,
) -> RenamedSkeleton {
    let mut out = skeleton.clone();
    let mut renames = HashMap::new();
    let mut new_table = HumanoidBoneTable::new();

    // 先解析到索引，改名过程中不再按名查找原表
    let resolved = table.resolve(skeleton);

    for &(role, index) in &resolved {
        let Some(target) = target_name(role) else {
            continue;
        };

        if let Some(occupant) = out.find_bone_ignore_case(target) {
            if occupant != index {
                let mut moved = format!("{}{}", out.bones()[occupant].name, RENAMED_SUFFIX);
                while out.contains_name_ignore_case(&moved) {
                    moved.push_str(RENAMED_SUFFIX);
                }
                rename_tracked(&mut out, &mut renames, occupant, &moved);
            }
        }
        rename_tracked(&mut out, &mut renames, index, target);
        new_table.insert(role, target);
    }

    // 让位的骨骼若本身也被映射，同步到新表
    for &(role, index) in &resolved {
        if target_name(role).is_none() {
            new_table.insert(role, out.bones()[index].name.as_str());
        }
    }

    log::info!("[人形改名] {} 根骨骼改名", renames.len());
    RenamedSkeleton {
        skeleton: out,
        table: new_table,
        renames,
    }
}

fn rename_tracked(
    skeleton: &mut ReferenceSkeleton,
    renames: &mut HashMap<String, String>,
    index: usize,
    new_name: &str,
) {
    let old = skeleton.bones()[index].name.clone();
    if old == new_name || !skeleton.rename(index, new_name) {
        return;
    }
    // 链式改名时保留最初的名字作为键
    let original = renames
        .iter()
        .find(|(_, v)| v.as_str() == old)
        .map(|(k, _)| k.clone())
        .unwrap_or(old);
    renames.insert(original, new_name.to_string());
}
