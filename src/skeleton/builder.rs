//! 骨骼构建
//!
//! 从场景节点树生成 ReferenceSkeleton：
//! 1. 选择根（可选的简单根启发式：跳过无意义的 Armature 包装节点）
//! 2. 先序遍历（显式栈），保证父先于子
//! 3. 大小写不敏感的重名处理（`_DUP` 后缀）
//! 4. 坐标系转换（见 axis 模块），根平移移入直接子骨骼，骨骼 0 为单位变换

use std::collections::{HashMap, HashSet};

use glam::{Quat, Vec3};

use crate::scene::Scene;
use crate::{Result, VrmError};

use super::axis::AxisConvention;
use super::{Bone, BoneFlags, BoneTransform, ReferenceSkeleton};

/// 重名后缀
pub const DUPLICATE_SUFFIX: &str = "_DUP";

/// 简单根判定的平移阈值（|x|+|y|+|z|）
const SIMPLE_ROOT_EPSILON: f32 = 1e-8;

/// 构建选项
#[derive(Clone, Copy, Debug, Default)]
pub struct SkeletonBuildOptions {
    pub axis: AxisConvention,
    /// 启用简单根启发式
    pub simple_root: bool,
    /// 只保留根骨骼（诊断用）
    pub debug_one_bone: bool,
}

/// 构建报告
#[derive(Clone, Debug, Default)]
pub struct SkeletonBuildReport {
    /// 实际作为骨骼 0 的场景节点
    pub root_node: usize,
    /// 场景节点 → 骨骼索引
    pub node_to_bone: HashMap<usize, usize>,
    /// 被重命名的节点：节点索引 → 最终骨骼名
    pub renamed: HashMap<usize, String>,
    /// 根平移偏移（已加到根的直接子骨骼上）
    pub root_offset: Vec3,
}

/// 从场景构建参考骨架
pub fn build_skeleton(
    scene: &Scene,
    options: &SkeletonBuildOptions,
) -> Result<(ReferenceSkeleton, SkeletonBuildReport)> {
    if scene.nodes.is_empty() {
        return Err(VrmError::EmptySkeleton);
    }

    let skinned = scene.skinned_bone_names();
    let root_node = if options.simple_root {
        select_simple_root(scene, &skinned).unwrap_or(0)
    } else {
        0
    };

    let order = scene.subtree(root_node);
    let dup_renames = resolve_duplicates(scene, &order);

    let mut skeleton = ReferenceSkeleton::new();
    let mut report = SkeletonBuildReport {
        root_node,
        ..Default::default()
    };

    for &node_index in &order {
        let node = &scene.nodes[node_index];

        let parent_bone = if node_index == root_node {
            None
        } else {
            match node.parent.and_then(|p| report.node_to_bone.get(&p)) {
                Some(&b) => Some(b),
                None => {
                    log::warn!("[骨骼构建] 节点 '{}' 的父节点未生成骨骼，跳过", node.name);
                    continue;
                }
            }
        };

        // 重名处理：先应用预计算的改名，再对仍冲突者追加后缀
        let mut name = dup_renames
            .get(&node_index)
            .cloned()
            .unwrap_or_else(|| node.name.clone());
        while skeleton.contains_name_ignore_case(&name) {
            name.push_str(DUPLICATE_SUFFIX);
        }
        let renamed = name != node.name;
        if renamed {
            log::warn!("[骨骼构建] 重名骨骼 '{}' → '{}'", node.name, name);
            report.renamed.insert(node_index, name.clone());
        }

        let mut local = convert_transform(&node.transform, &options.axis);
        if parent_bone.is_none() {
            report.root_offset = local.translation;
            local = BoneTransform::IDENTITY;
        } else if parent_bone == Some(0) {
            local.translation += report.root_offset;
        }

        let mut bone = Bone::new(name, parent_bone, local);
        if skinned.contains(node.name.as_str()) {
            bone.flags |= BoneFlags::SKINNED;
        }
        if renamed {
            bone.flags |= BoneFlags::RENAMED_DUPLICATE;
        }

        match skeleton.add_bone(bone) {
            Some(index) => {
                report.node_to_bone.insert(node_index, index);
            }
            None => continue,
        }

        if options.debug_one_bone {
            break;
        }
    }

    if skeleton.is_empty() {
        return Err(VrmError::EmptySkeleton);
    }

    log::info!(
        "[骨骼构建] 完成: {} 骨骼 (根节点 '{}', {} 个重名)",
        skeleton.len(),
        scene.nodes[root_node].name,
        report.renamed.len()
    );

    Ok((skeleton, report))
}

/// 源局部变换 → 目标约定
pub fn convert_transform(t: &BoneTransform, axis: &AxisConvention) -> BoneTransform {
    BoneTransform {
        translation: axis.position(t.translation),
        rotation: axis.rotation(t.rotation),
        scale: axis.scale(t.scale),
    }
}

// ============================================================================
// 简单根启发式
// ============================================================================

/// 选择简单根
///
/// 场景根不带网格时，取后代最多的子节点；若其他兄弟子树也含蒙皮骨骼，
/// 或该子节点带平移，则放弃（返回 None）。
fn select_simple_root(scene: &Scene, skinned: &HashSet<&str>) -> Option<usize> {
    let root = scene.root()?;
    if !root.meshes.is_empty() || root.children.is_empty() {
        return None;
    }

    let mut best: Option<(usize, usize)> = None;
    for &child in &root.children {
        let count = scene.subtree(child).len();
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((child, count));
        }
    }
    let (chosen, _) = best?;

    let sibling_skinned = root.children.iter().filter(|&&c| c != chosen).any(|&c| {
        scene
            .subtree(c)
            .iter()
            .any(|&n| skinned.contains(scene.nodes[n].name.as_str()))
    });
    if sibling_skinned {
        log::debug!("[骨骼构建] 其他子树含蒙皮骨骼，禁用简单根");
        return None;
    }

    let t = scene.nodes[chosen].transform.translation;
    if t.x.abs() + t.y.abs() + t.z.abs() >= SIMPLE_ROOT_EPSILON {
        return None;
    }
    if !scene.nodes[chosen].transform.rotation.abs_diff_eq(Quat::IDENTITY, 1e-6) {
        log::debug!("[骨骼构建] 简单根 '{}' 的旋转将被丢弃", scene.nodes[chosen].name);
    }
    Some(chosen)
}

// ============================================================================
// 重名处理
// ============================================================================

/// 预计算重名改名表
///
/// 原始名完全相同的一组节点中，最深的保留原名，较浅的加 `_DUP`。
/// 仅大小写不同的名字在插入时按先后加后缀。
fn resolve_duplicates(scene: &Scene, order: &[usize]) -> HashMap<usize, String> {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for &n in order {
        groups.entry(scene.nodes[n].name.as_str()).or_default().push(n);
    }

    let mut renames = HashMap::new();
    for (name, nodes) in groups {
        if nodes.len() < 2 {
            continue;
        }
        let keep = nodes
            .iter()
            .copied()
            .max_by_key(|&n| scene.depth(n))
            .unwrap_or(nodes[0]);
        for &n in &nodes {
            if n != keep {
                renames.insert(n, format!("{name}{DUPLICATE_SUFFIX}"));
            }
        }
    }
    renames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{BoneWeights, SceneMesh};

    fn t(x: f32, y: f32, z: f32) -> BoneTransform {
        BoneTransform::from_translation(Vec3::new(x, y, z))
    }

    fn skin(scene: &mut Scene, names: &[&str]) {
        scene.meshes.push(SceneMesh {
            bones: names
                .iter()
                .map(|n| BoneWeights { name: n.to_string(), weights: vec![(0, 1.0)] })
                .collect(),
            ..Default::default()
        });
    }

    #[test]
    fn test_root_identity_and_offset() {
        let mut scene = Scene::new("Root");
        scene.nodes[0].transform = t(0.0, 1.0, 0.0);
        let hips = scene.add_node("hips", 0, t(0.0, 0.5, 0.0));
        scene.add_node("spine", hips, t(0.0, 0.1, 0.0));

        let (skel, report) = build_skeleton(&scene, &SkeletonBuildOptions::default()).unwrap();
        assert_eq!(skel.len(), 3);
        assert!(skel.bones()[0].bind_pose.is_identity(1e-6));
        // 根平移 (0,1,0)m → (0,0,100)，加到 hips 上
        assert!((report.root_offset - Vec3::new(0.0, 0.0, 100.0)).length() < 1e-4);
        let hips_t = skel.bones()[1].bind_pose.translation;
        assert!((hips_t - Vec3::new(0.0, 0.0, 150.0)).length() < 1e-3);
        // 孙骨骼不加偏移
        let spine_t = skel.bones()[2].bind_pose.translation;
        assert!((spine_t - Vec3::new(0.0, 0.0, 10.0)).length() < 1e-3);
    }

    #[test]
    fn test_parent_precedes_child() {
        let mut scene = Scene::new("Root");
        let a = scene.add_node("a", 0, BoneTransform::IDENTITY);
        let b = scene.add_node("b", 0, BoneTransform::IDENTITY);
        scene.add_node("a1", a, BoneTransform::IDENTITY);
        scene.add_node("b1", b, BoneTransform::IDENTITY);

        let (skel, _) = build_skeleton(&scene, &SkeletonBuildOptions::default()).unwrap();
        for (i, bone) in skel.bones().iter().enumerate() {
            if let Some(p) = bone.parent {
                assert!(p < i);
            }
        }
    }

    #[test]
    fn test_simple_root() {
        let mut scene = Scene::new("Scene");
        let armature = scene.add_node("Armature", 0, BoneTransform::IDENTITY);
        let hips = scene.add_node("hips", armature, t(0.0, 1.0, 0.0));
        scene.add_node("spine", hips, BoneTransform::IDENTITY);
        scene.add_node("Face", 0, BoneTransform::IDENTITY);
        skin(&mut scene, &["hips", "spine"]);

        let opts = SkeletonBuildOptions { simple_root: true, ..Default::default() };
        let (skel, report) = build_skeleton(&scene, &opts).unwrap();
        assert_eq!(report.root_node, armature);
        assert_eq!(skel.bones()[0].name, "Armature");
        // Face 不可达，不生成骨骼
        assert!(skel.find_bone("Face").is_none());
        assert!(skel.bones()[1].flags.contains(BoneFlags::SKINNED));
    }

    #[test]
    fn test_simple_root_disabled_by_skinned_sibling() {
        let mut scene = Scene::new("Scene");
        let armature = scene.add_node("Armature", 0, BoneTransform::IDENTITY);
        scene.add_node("hips", armature, BoneTransform::IDENTITY);
        scene.add_node("spine", 1, BoneTransform::IDENTITY);
        scene.add_node("extra", 0, BoneTransform::IDENTITY);
        skin(&mut scene, &["hips", "extra"]);

        let opts = SkeletonBuildOptions { simple_root: true, ..Default::default() };
        let (_, report) = build_skeleton(&scene, &opts).unwrap();
        assert_eq!(report.root_node, 0);
    }

    #[test]
    fn test_simple_root_disabled_by_translation() {
        let mut scene = Scene::new("Scene");
        let armature = scene.add_node("Armature", 0, t(0.0, 0.1, 0.0));
        scene.add_node("hips", armature, BoneTransform::IDENTITY);

        let opts = SkeletonBuildOptions { simple_root: true, ..Default::default() };
        let (_, report) = build_skeleton(&scene, &opts).unwrap();
        assert_eq!(report.root_node, 0);
    }

    #[test]
    fn test_duplicate_names_unique() {
        let mut scene = Scene::new("Root");
        let a = scene.add_node("hair", 0, BoneTransform::IDENTITY);
        let b = scene.add_node("head", 0, BoneTransform::IDENTITY);
        let deep = scene.add_node("hair", b, BoneTransform::IDENTITY);
        scene.add_node("HAIR", b, BoneTransform::IDENTITY);

        let (skel, report) = build_skeleton(&scene, &SkeletonBuildOptions::default()).unwrap();
        assert_eq!(skel.len(), 5);

        let mut names: Vec<String> = skel.bones().iter().map(|b| b.name.to_lowercase()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);

        // 较浅的加后缀，较深的保留原名
        assert_eq!(report.renamed.get(&a).map(String::as_str), Some("hair_DUP"));
        assert!(!report.renamed.contains_key(&deep));
        assert_eq!(skel.bones()[report.node_to_bone[&deep]].name, "hair");
    }

    #[test]
    fn test_debug_one_bone() {
        let mut scene = Scene::new("Root");
        scene.add_node("hips", 0, BoneTransform::IDENTITY);
        let opts = SkeletonBuildOptions { debug_one_bone: true, ..Default::default() };
        let (skel, _) = build_skeleton(&scene, &opts).unwrap();
        assert_eq!(skel.len(), 1);
    }

    #[test]
    fn test_empty_scene_fails() {
        let scene = Scene::default();
        assert!(matches!(
            build_skeleton(&scene, &SkeletonBuildOptions::default()),
            Err(VrmError::EmptySkeleton)
        ));
    }
}
