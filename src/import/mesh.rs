//! 网格转换
//!
//! 每个场景网格生成一个段（section）：
//! - 顶点流轴转换（位置、法线、切线），UV 的 V 翻转为左上原点
//! - OPTIMIZE_VERTEX：剔除未被面引用的顶点并重映射索引与权重
//! - 蒙皮：每顶点至多 8 个影响，权重量化为 u8 且总和归一到 255
//! - MOBILE_BONE：段内骨骼超过上限时，把累计权重最小的骨骼并入最近的存活祖先
//!
//! 逐顶点计算使用 rayon 并行，输出与串行完全一致（每个顶点只读共享输入）。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{Vec2, Vec3, Vec4};
use rayon::prelude::*;

use crate::scene::{Scene, SceneMesh};
use crate::skeleton::{ReferenceSkeleton, SkeletonBuildReport};
use crate::{Result, VrmError};

use super::context::{ImportContext, ImportFlags};
use super::material::MaterialTable;

/// 每顶点最大影响数
pub const MAX_INFLUENCES: usize = 8;

/// 权重量化总和
const WEIGHT_TOTAL: u32 = 255;

/// 权重缺口达到此值时记为质量下降
const WEIGHT_DEFICIT_WARN: u32 = 8;

/// 权重警告日志上限
const MAX_WEIGHT_WARNINGS: usize = 50;

// ============================================================================
// 数据结构
// ============================================================================

/// 单顶点蒙皮影响（bones 为段内骨骼表下标）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SkinInfluence {
    pub bones: [u16; MAX_INFLUENCES],
    pub weights: [u8; MAX_INFLUENCES],
}

impl SkinInfluence {
    /// 权重总和
    pub fn total(&self) -> u32 {
        self.weights.iter().map(|&w| w as u32).sum()
    }
}

/// 网格段
#[derive(Clone, Debug, Default)]
pub struct MeshSection {
    pub name: String,
    pub material_slot: usize,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec4>,
    pub uvs: Vec<Vec2>,
    pub colors: Vec<Vec4>,
    pub indices: Vec<u32>,
    /// 源顶点是否被面引用（长度为源顶点数）
    pub vertex_used: Vec<bool>,
    /// 段内骨骼表：下标 → 骨架骨骼索引
    pub bone_map: Vec<usize>,
    pub influences: Vec<SkinInfluence>,
}

/// 转换统计
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshConversionReport {
    pub sections: usize,
    pub vertices: usize,
    pub dropped_vertices: usize,
    /// 权重被明显补齐的顶点数
    pub degraded_weights: usize,
    /// 因移动端上限被合并的骨骼数
    pub merged_bones: usize,
}

/// 转换结果
#[derive(Clone, Debug, Default)]
pub struct MeshConversion {
    pub sections: Vec<MeshSection>,
    pub report: MeshConversionReport,
}

/// 网格资产写入接口
pub trait MeshSink {
    fn set_vertex_buffers(&mut self, section: usize, data: &MeshSection) -> bool;
    fn set_skin_weights(&mut self, section: usize, bone_map: &[usize], influences: &[SkinInfluence]) -> bool;
}

/// 内存实现
#[derive(Clone, Debug, Default)]
pub struct CollectedMesh {
    pub sections: Vec<MeshSection>,
}

impl MeshSink for CollectedMesh {
    fn set_vertex_buffers(&mut self, section: usize, data: &MeshSection) -> bool {
        if section > self.sections.len() {
            return false;
        }
        let copy = MeshSection {
            bone_map: Vec::new(),
            influences: Vec::new(),
            ..data.clone()
        };
        if section == self.sections.len() {
            self.sections.push(copy);
        } else {
            self.sections[section] = copy;
        }
        true
    }

    fn set_skin_weights(&mut self, section: usize, bone_map: &[usize], influences: &[SkinInfluence]) -> bool {
        let Some(s) = self.sections.get_mut(section) else {
            return false;
        };
        if influences.len() != s.positions.len() {
            return false;
        }
        s.bone_map = bone_map.to_vec();
        s.influences = influences.to_vec();
        true
    }
}

impl MeshConversion {
    /// 写入 MeshSink；任一段被拒绝时返回 false
    pub fn emit<S: MeshSink + ?Sized>(&self, sink: &mut S) -> bool {
        self.sections.iter().enumerate().all(|(i, s)| {
            sink.set_vertex_buffers(i, s) && sink.set_skin_weights(i, &s.bone_map, &s.influences)
        })
    }
}

// ============================================================================
// 转换
// ============================================================================

/// 转换场景中所有网格
pub fn convert_meshes(
    scene: &Scene,
    skeleton: &ReferenceSkeleton,
    build: &SkeletonBuildReport,
    materials: &MaterialTable,
    ctx: &ImportContext,
) -> Result<MeshConversion> {
    let bone_lookup = bone_name_lookup(scene, build);
    let warnings = AtomicUsize::new(0);
    let mut result = MeshConversion::default();

    for mesh in &scene.meshes {
        let section = convert_mesh(mesh, skeleton, &bone_lookup, materials, ctx, &warnings, &mut result.report)?;
        result.report.vertices += section.positions.len();
        result.sections.push(section);
    }
    result.report.sections = result.sections.len();
    result.report.degraded_weights = warnings.load(Ordering::Relaxed);

    if result.report.degraded_weights > MAX_WEIGHT_WARNINGS {
        log::warn!(
            "[网格] 共 {} 个顶点权重被补齐（仅显示前 {} 条）",
            result.report.degraded_weights,
            MAX_WEIGHT_WARNINGS
        );
    }
    log::info!(
        "[网格] 完成: {} 段, {} 顶点 (剔除 {}), 合并骨骼 {}",
        result.report.sections,
        result.report.vertices,
        result.report.dropped_vertices,
        result.report.merged_bones
    );
    Ok(result)
}

/// 权重记录中的节点名 → 骨骼索引
///
/// 重名节点优先匹配保留原名的骨骼。
fn bone_name_lookup<'a>(scene: &'a Scene, build: &SkeletonBuildReport) -> HashMap<&'a str, usize> {
    let mut lookup = HashMap::new();
    let mut renamed = Vec::new();
    for (node, &bone) in &build.node_to_bone {
        let name = scene.nodes[*node].name.as_str();
        if build.renamed.contains_key(node) {
            renamed.push((name, bone));
        } else {
            lookup.insert(name, bone);
        }
    }
    for (name, bone) in renamed {
        lookup.entry(name).or_insert(bone);
    }
    lookup
}

fn convert_mesh(
    mesh: &SceneMesh,
    skeleton: &ReferenceSkeleton,
    bone_lookup: &HashMap<&str, usize>,
    materials: &MaterialTable,
    ctx: &ImportContext,
    warnings: &AtomicUsize,
    report: &mut MeshConversionReport,
) -> Result<MeshSection> {
    let vertex_count = mesh.positions.len();
    let axis = ctx.axis();

    // 面引用标记
    let mut vertex_used = vec![false; vertex_count];
    for face in &mesh.faces {
        for &v in face {
            let Some(flag) = vertex_used.get_mut(v as usize) else {
                return Err(VrmError::MeshConversion(format!(
                    "mesh '{}' face index {} out of range ({} vertices)",
                    mesh.name, v, vertex_count
                )));
            };
            *flag = true;
        }
    }

    // 源顶点 → 新顶点
    let optimize = ctx.has(ImportFlags::OPTIMIZE_VERTEX);
    let mut remap: Vec<Option<u32>> = vec![None; vertex_count];
    let mut kept: Vec<usize> = Vec::with_capacity(vertex_count);
    for (i, &used) in vertex_used.iter().enumerate() {
        if used || !optimize {
            remap[i] = Some(kept.len() as u32);
            kept.push(i);
        }
    }
    report.dropped_vertices += vertex_count - kept.len();

    let indices: Vec<u32> = mesh
        .faces
        .iter()
        .flat_map(|f| f.iter().filter_map(|&v| remap[v as usize]))
        .collect();

    // 顶点流（并行，保持顺序）
    let positions: Vec<Vec3> = kept.par_iter().map(|&i| axis.position(mesh.positions[i])).collect();
    let normals: Vec<Vec3> = if mesh.normals.len() == vertex_count {
        kept.par_iter().map(|&i| axis.direction(mesh.normals[i]).normalize_or_zero()).collect()
    } else {
        Vec::new()
    };
    let tangents: Vec<Vec4> = if mesh.tangents.len() == vertex_count {
        kept.par_iter()
            .map(|&i| {
                let t = mesh.tangents[i];
                axis.direction(t.truncate()).normalize_or_zero().extend(t.w)
            })
            .collect()
    } else {
        Vec::new()
    };
    let uvs: Vec<Vec2> = if mesh.uvs.len() == vertex_count {
        kept.par_iter().map(|&i| flip_uv(mesh.uvs[i])).collect()
    } else {
        Vec::new()
    };
    let colors: Vec<Vec4> = if mesh.colors.len() == vertex_count {
        kept.iter().map(|&i| mesh.colors[i]).collect()
    } else {
        Vec::new()
    };

    // 原始影响：新顶点 → [(骨骼, 权重)]
    let mut raw: Vec<Vec<(usize, f32)>> = vec![Vec::new(); kept.len()];
    let mut resolved_any = mesh.bones.is_empty();
    for bw in &mesh.bones {
        let Some(&bone) = bone_lookup.get(bw.name.as_str()) else {
            log::debug!("[网格] '{}' 引用的骨骼 '{}' 不存在，跳过", mesh.name, bw.name);
            continue;
        };
        resolved_any = true;
        for &(v, w) in &bw.weights {
            // 被剔除顶点的权重丢弃
            if let Some(Some(nv)) = remap.get(v as usize) {
                if w > 0.0 {
                    raw[*nv as usize].push((bone, w));
                }
            }
        }
    }
    if !resolved_any {
        return Err(VrmError::MeshConversion(format!(
            "mesh '{}' skin references no bone of the skeleton",
            mesh.name
        )));
    }

    // 量化（并行）
    let mut quantized: Vec<Vec<(usize, u8)>> = raw
        .par_iter()
        .map(|inf| quantize_influences(inf, warnings))
        .collect();

    // 移动端骨骼上限
    if ctx.has(ImportFlags::MOBILE_BONE) {
        let merged = cap_bone_count(&mut quantized, skeleton, ctx.mobile_bone_limit);
        if merged > 0 {
            log::warn!("[网格] '{}' 骨骼数超过 {}，合并 {} 根", mesh.name, ctx.mobile_bone_limit, merged);
        }
        report.merged_bones += merged;
    }

    // 段内骨骼表
    let mut bone_map: Vec<usize> = quantized
        .iter()
        .flat_map(|v| v.iter().map(|&(b, _)| b))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    bone_map.sort_unstable();
    if bone_map.is_empty() {
        bone_map.push(0);
    }
    let local_index: HashMap<usize, u16> = bone_map.iter().enumerate().map(|(i, &b)| (b, i as u16)).collect();

    let influences: Vec<SkinInfluence> = quantized
        .par_iter()
        .map(|inf| {
            let mut out = SkinInfluence::default();
            for (slot, &(bone, w)) in inf.iter().enumerate().take(MAX_INFLUENCES) {
                out.bones[slot] = local_index.get(&bone).copied().unwrap_or(0);
                out.weights[slot] = w;
            }
            out
        })
        .collect();

    Ok(MeshSection {
        name: mesh.name.clone(),
        material_slot: materials.slot_of(mesh.material),
        positions,
        normals,
        tangents,
        uvs,
        colors,
        indices,
        vertex_used,
        bone_map,
        influences,
    })
}

/// 源 UV 为左下原点
#[inline]
fn flip_uv(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x, 1.0 - uv.y)
}

/// 取权重最大的 8 个影响，归一化后量化为 u8，总和恰为 255
///
/// 先除以浮点总和再逐个截断，舍入余量补到最大权重上，量化为 0 的影响被丢弃。
/// 原始总和偏离 1 较多时计为质量下降。没有正权重的顶点绑定到骨骼 0。
pub fn quantize_influences(raw: &[(usize, f32)], warnings: &AtomicUsize) -> Vec<(usize, u8)> {
    // 同一骨骼的多条记录先合并
    let mut merged: Vec<(usize, f32)> = Vec::with_capacity(raw.len());
    for &(bone, w) in raw {
        match merged.iter_mut().find(|(b, _)| *b == bone) {
            Some(e) => e.1 += w,
            None => merged.push((bone, w)),
        }
    }
    merged.retain(|&(_, w)| w.is_finite() && w > 0.0);
    merged.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    merged.truncate(MAX_INFLUENCES);

    let sum: f32 = merged.iter().map(|&(_, w)| w).sum();
    if merged.is_empty() || sum <= 0.0 {
        return vec![(0, WEIGHT_TOTAL as u8)];
    }

    let deviation = ((sum - 1.0).abs() * WEIGHT_TOTAL as f32) as u32;
    if deviation >= WEIGHT_DEFICIT_WARN {
        let n = warnings.fetch_add(1, Ordering::Relaxed);
        if n < MAX_WEIGHT_WARNINGS {
            log::warn!("[网格] 顶点权重总和 {:.3} 偏离 1，已归一化", sum);
        }
    }

    // 截断后各项之和不超过 255
    let mut out: Vec<(usize, u8)> = merged
        .iter()
        .map(|&(b, w)| (b, ((w / sum) * WEIGHT_TOTAL as f32).floor().clamp(0.0, 255.0) as u8))
        .collect();
    let total: u32 = out.iter().map(|&(_, w)| w as u32).sum();
    // out 已按权重降序，下标 0 即最大权重
    out[0].1 = (out[0].1 as u32 + WEIGHT_TOTAL.saturating_sub(total)).min(WEIGHT_TOTAL) as u8;
    if total > WEIGHT_TOTAL {
        out[0].1 = out[0].1.saturating_sub((total - WEIGHT_TOTAL) as u8);
    }
    out.retain(|&(_, w)| w > 0);
    out
}

/// 移动端骨骼上限：反复移除累计权重最小的骨骼（保留第一根），
/// 其影响并入骨架上最近的存活祖先。返回被合并的骨骼数。
pub fn cap_bone_count(influences: &mut [Vec<(usize, u8)>], skeleton: &ReferenceSkeleton, limit: usize) -> usize {
    let mut totals: HashMap<usize, u64> = HashMap::new();
    for inf in influences.iter() {
        for &(b, w) in inf {
            *totals.entry(b).or_default() += w as u64;
        }
    }
    if totals.len() <= limit || limit == 0 {
        return 0;
    }

    // 累计权重升序；骨骼索引最小者（最靠近根）永不移除
    let keep_first = totals.keys().copied().min().unwrap_or(0);
    let mut order: Vec<(usize, u64)> = totals.iter().map(|(&b, &t)| (b, t)).collect();
    order.sort_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));

    let mut alive: HashSet<usize> = totals.keys().copied().collect();
    let mut removed = Vec::new();
    for &(bone, _) in &order {
        if alive.len() <= limit {
            break;
        }
        if bone == keep_first {
            continue;
        }
        alive.remove(&bone);
        removed.push(bone);
    }

    // 被移除骨骼 → 最近的存活祖先
    let target: HashMap<usize, usize> = removed
        .iter()
        .map(|&b| {
            let t = skeleton.ancestors(b).find(|a| alive.contains(a)).unwrap_or(keep_first);
            (b, t)
        })
        .collect();

    influences.par_iter_mut().for_each(|inf| {
        let mut merged: Vec<(usize, u8)> = Vec::with_capacity(inf.len());
        for &(b, w) in inf.iter() {
            let b = target.get(&b).copied().unwrap_or(b);
            match merged.iter_mut().find(|(mb, _)| *mb == b) {
                Some(e) => e.1 = e.1.saturating_add(w),
                None => merged.push((b, w)),
            }
        }
        *inf = merged;
    });

    removed.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{BoneWeights, SceneMaterial};
    use crate::skeleton::{build_skeleton, Bone, BoneTransform};

    fn triangle_scene() -> Scene {
        let mut scene = Scene::new("Root");
        let hips = scene.add_node("hips", 0, BoneTransform::IDENTITY);
        scene.add_node("spine", hips, BoneTransform::IDENTITY);
        scene.materials.push(SceneMaterial { name: "Body".into() });
        scene.meshes.push(SceneMesh {
            name: "Body".into(),
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(9.0, 9.0, 9.0),
            ],
            normals: vec![Vec3::Z; 4],
            uvs: vec![Vec2::new(0.25, 0.25); 4],
            faces: vec![[0, 1, 2]],
            bones: vec![
                BoneWeights { name: "hips".into(), weights: vec![(0, 1.0), (1, 0.5), (3, 1.0)] },
                BoneWeights { name: "spine".into(), weights: vec![(1, 0.5), (2, 0.9)] },
            ],
            material: 0,
            ..Default::default()
        });
        scene
    }

    fn convert(scene: &Scene, ctx: &ImportContext) -> Result<MeshConversion> {
        let (skel, report) = build_skeleton(scene, &ctx.skeleton_options())?;
        let mats = super::super::material::build_material_table(scene, false);
        convert_meshes(scene, &skel, &report, &mats, ctx)
    }

    #[test]
    fn test_optimize_drops_unused_vertex() {
        let scene = triangle_scene();
        let ctx = ImportContext::default();
        let out = convert(&scene, &ctx).unwrap();
        let s = &out.sections[0];
        assert_eq!(s.positions.len(), 3);
        assert_eq!(out.report.dropped_vertices, 1);
        assert_eq!(s.vertex_used, vec![true, true, true, false]);
        assert_eq!(s.indices, vec![0, 1, 2]);
        // (1,0,0)m → (-100,0,0)
        assert!((s.positions[1] - Vec3::new(-100.0, 0.0, 0.0)).length() < 1e-4);
        assert!((s.uvs[0] - Vec2::new(0.25, 0.75)).length() < 1e-6);
        // 法线 (0,0,1) → (0,1,0)
        assert!((s.normals[0] - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_weights_sum_to_255() {
        let scene = triangle_scene();
        let out = convert(&scene, &ImportContext::default()).unwrap();
        for inf in &out.sections[0].influences {
            assert_eq!(inf.total(), 255);
        }
        // 顶点 2 只有 0.9 → 补齐，计为质量下降
        assert_eq!(out.report.degraded_weights, 1);
    }

    #[test]
    fn test_without_optimize_keeps_all() {
        let scene = triangle_scene();
        let ctx = ImportContext { flags: ImportFlags::empty(), ..Default::default() };
        let out = convert(&scene, &ctx).unwrap();
        assert_eq!(out.sections[0].positions.len(), 4);
        assert_eq!(out.report.dropped_vertices, 0);
    }

    #[test]
    fn test_bad_face_index_fails() {
        let mut scene = triangle_scene();
        scene.meshes[0].faces.push([0, 1, 42]);
        assert!(matches!(convert(&scene, &ImportContext::default()), Err(VrmError::MeshConversion(_))));
    }

    #[test]
    fn test_unresolved_skin_fails() {
        let mut scene = triangle_scene();
        for bw in &mut scene.meshes[0].bones {
            bw.name = format!("{}_missing", bw.name);
        }
        assert!(matches!(convert(&scene, &ImportContext::default()), Err(VrmError::MeshConversion(_))));
    }

    #[test]
    fn test_quantize_excess_and_empty() {
        let warnings = AtomicUsize::new(0);
        // 0.6 + 0.6 → 归一化为各 0.5
        let q = quantize_influences(&[(1, 0.6), (2, 0.6)], &warnings);
        assert_eq!(q, vec![(1, 128), (2, 127)]);
        assert_eq!(quantize_influences(&[], &warnings), vec![(0, 255)]);
        assert_eq!(quantize_influences(&[(3, 0.0), (4, -1.0)], &warnings), vec![(0, 255)]);
        assert_eq!(warnings.load(Ordering::Relaxed), 1);

        // 超过 8 个影响只保留最大的 8 个
        let many: Vec<(usize, f32)> = (0..10).map(|i| (i, 0.1 + i as f32 * 0.001)).collect();
        let q = quantize_influences(&many, &warnings);
        assert_eq!(q.len(), 8);
        assert!(q.iter().all(|&(b, _)| b >= 2));
        assert_eq!(q.iter().map(|&(_, w)| w as u32).sum::<u32>(), 255);
    }

    #[test]
    fn test_quantize_unnormalized_weights() {
        let warnings = AtomicUsize::new(0);
        let total = |q: &[(usize, u8)]| q.iter().map(|&(_, w)| w as u32).sum::<u32>();

        // 总和 3.0
        let q = quantize_influences(&[(1, 1.0), (2, 1.0), (3, 1.0)], &warnings);
        assert_eq!(q, vec![(1, 85), (2, 85), (3, 85)]);

        // 总和 1.5，排序不被打乱
        let q = quantize_influences(&[(1, 0.5), (2, 0.5), (3, 0.5)], &warnings);
        assert_eq!(total(&q), 255);
        assert!(q.iter().all(|&(_, w)| w >= 85));

        // 总和低于 1
        let q = quantize_influences(&[(1, 0.3), (2, 0.1)], &warnings);
        assert_eq!(q, vec![(1, 192), (2, 63)]);

        // 重的骨骼保持最重，不出现 0 权重
        let q = quantize_influences(&[(5, 2.0), (6, 0.5), (7, 0.001)], &warnings);
        assert_eq!(total(&q), 255);
        assert_eq!(q[0].0, 5);
        assert!(q.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!(q.iter().all(|&(_, w)| w > 0));

        assert_eq!(warnings.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_mobile_cap_merges_into_ancestor() {
        let mut skel = ReferenceSkeleton::new();
        skel.add_bone(Bone::new("root", None, BoneTransform::IDENTITY));
        for i in 1..6 {
            skel.add_bone(Bone::new(format!("b{i}"), Some(i - 1), BoneTransform::IDENTITY));
        }
        // 骨骼 1..5 各带一个顶点，骨骼 5 最轻
        let mut inf: Vec<Vec<(usize, u8)>> = vec![
            vec![(1, 255)],
            vec![(2, 255)],
            vec![(3, 255)],
            vec![(4, 200), (5, 55)],
        ];
        let merged = cap_bone_count(&mut inf, &skel, 4);
        assert_eq!(merged, 1);
        assert_eq!(inf[3], vec![(4, 255)]);

        let used: HashSet<usize> = inf.iter().flatten().map(|&(b, _)| b).collect();
        assert!(used.len() <= 4);
    }
}
