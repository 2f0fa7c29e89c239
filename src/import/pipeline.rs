//! 导入流水线
//!
//! 阶段顺序：名称规范化 → 骨骼 → 材质 → 元数据 → 网格 → 人形映射/IK → 变形目标 → 物理 → 角色名骨架。
//! 必需阶段失败即中止；可选阶段失败只记录警告。取消标记在每个阶段开始前检查。

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use crate::humanoid::{auto_map, mannequin_mapping, rename_to_humanoid, translation_modes, HumanoidBoneTable};
use crate::scene::{Scene, SceneProvider};
use crate::skeleton::{add_ik_bones, build_skeleton, emit_skeleton, SkeletonSink};
use crate::spring::chains_from_metadata;
use crate::{Result, VrmError};

use super::asset::{ImportReport, ImportedModel, VrmMeta};
use super::context::{ImportContext, ImportFlags};
use super::material::build_material_table;
use super::mesh::{convert_meshes, MeshSink};
use super::normalize::normalize_bone_names;
use super::physics::{build_physics_asset, PhysicsSink};
use super::progress::{CancelToken, ProgressSink};

const STAGE_NORMALIZE: &str = "normalize";
const STAGE_SKELETON: &str = "skeleton";
const STAGE_MATERIAL: &str = "material";
const STAGE_METADATA: &str = "metadata";
const STAGE_MESH: &str = "mesh";
const STAGE_RIG: &str = "rig";
const STAGE_MORPH: &str = "morph";
const STAGE_PHYSICS: &str = "physics";
const STAGE_HUMANOID_RENAME: &str = "humanoid_rename";
const STAGE_DONE: &str = "done";

/// 宿主提供的资产写入端（均可缺省）
#[derive(Default)]
pub struct ImportSinks<'a> {
    pub skeleton: Option<&'a mut dyn SkeletonSink>,
    pub mesh: Option<&'a mut dyn MeshSink>,
    pub physics: Option<&'a mut dyn PhysicsSink>,
}

/// 导入流水线
pub struct ImportPipeline<'a, G: ProgressSink + ?Sized> {
    ctx: &'a ImportContext,
    progress: &'a mut G,
    cancel: &'a CancelToken,
    report: ImportReport,
}

impl<'a, G: ProgressSink + ?Sized> ImportPipeline<'a, G> {
    /// 执行一次完整导入
    pub fn run<P: SceneProvider + ?Sized>(
        provider: &P,
        ctx: &'a ImportContext,
        sinks: &mut ImportSinks<'_>,
        progress: &'a mut G,
        cancel: &'a CancelToken,
    ) -> Result<ImportedModel> {
        let pipeline = Self {
            ctx,
            progress,
            cancel,
            report: ImportReport::default(),
        };
        pipeline.execute(provider, sinks)
    }

    fn execute<P: SceneProvider + ?Sized>(mut self, provider: &P, sinks: &mut ImportSinks<'_>) -> Result<ImportedModel> {
        let ctx = self.ctx;
        let started = Instant::now();
        let source = provider.scene().ok_or(VrmError::NoScene)?;
        log::info!(
            "[导入] 开始 '{}': {} 节点, {} 网格 (VRM={}, 缩放={})",
            ctx.asset_name,
            source.nodes.len(),
            source.meshes.len(),
            ctx.is_vrm,
            ctx.model_scale
        );

        // 1. 名称规范化
        let scene: Cow<'_, Scene> = if ctx.has(ImportFlags::NORMALIZE_BONE_NAME) {
            self.required(STAGE_NORMALIZE, 0, |report| {
                if source.nodes.iter().all(|n| n.name.is_ascii()) {
                    return Ok(Cow::Borrowed(source));
                }
                let mut owned = source.clone();
                report.normalized_names = normalize_bone_names(&mut owned).len();
                Ok(Cow::Owned(owned))
            })?
        } else {
            self.skip(STAGE_NORMALIZE);
            Cow::Borrowed(source)
        };

        // 2. 骨骼
        let (mut skeleton, build) = self.required(STAGE_SKELETON, 20, |report| {
            let (skeleton, build) = build_skeleton(&scene, &ctx.skeleton_options())?;
            report.renamed_bones = build.renamed.len();
            if let Some(sink) = sinks.skeleton.as_deref_mut() {
                let written = emit_skeleton(&skeleton, sink);
                if written != skeleton.len() {
                    return Err(VrmError::StageFailed {
                        stage: STAGE_SKELETON,
                        reason: format!("sink accepted {} of {} bones", written, skeleton.len()),
                    });
                }
            }
            Ok((skeleton, build))
        })?;

        // 3. 材质
        let materials = self.required(STAGE_MATERIAL, 20, |_| {
            Ok(build_material_table(&scene, ctx.has(ImportFlags::MERGE_MATERIAL)))
        })?;

        // 4. 元数据
        let mut meta = self.required(STAGE_METADATA, 40, |_| match scene.metadata.as_ref() {
            Some(m) => {
                let (spring_chains, collider_groups) = chains_from_metadata(m, &ctx.axis());
                Ok(VrmMeta {
                    spring_chains,
                    collider_groups,
                    license: m.license.clone(),
                    spring_unit_scale: ctx.axis().length_scale(),
                    ..Default::default()
                })
            }
            None if ctx.is_vrm => Err(VrmError::MissingMetadata),
            None => Ok(VrmMeta {
                spring_unit_scale: ctx.axis().length_scale(),
                ..Default::default()
            }),
        })?;

        // 5. 网格
        let mesh = self.required(STAGE_MESH, 40, |report| {
            let mesh = convert_meshes(&scene, &skeleton, &build, &materials, ctx)?;
            report.dropped_vertices = mesh.report.dropped_vertices;
            report.degraded_weights = mesh.report.degraded_weights;
            report.merged_bones = mesh.report.merged_bones;
            if let Some(sink) = sinks.mesh.as_deref_mut() {
                if !mesh.emit(sink) {
                    return Err(VrmError::StageFailed {
                        stage: STAGE_MESH,
                        reason: String::from("sink rejected a mesh section"),
                    });
                }
            }
            Ok(mesh)
        })?;

        // 6. 人形映射与 IK 骨骼
        self.required(STAGE_RIG, 60, |report| {
            let declared = scene.metadata.as_ref().filter(|m| !m.humanoid.is_empty());
            let (table, inferred) = match declared {
                Some(m) => (HumanoidBoneTable::from_metadata(m.humanoid.as_slice()), false),
                None => (auto_map(&skeleton), true),
            };
            if table.is_empty() {
                log::warn!("[导入] 未能建立任何人形映射");
            }

            let before = skeleton.len();
            if ctx.has(ImportFlags::CREATE_IK_BONE) {
                report.ik_bones_added = add_ik_bones(&mut skeleton, &table);
            }
            if let Some(sink) = sinks.skeleton.as_deref_mut() {
                for bone in &skeleton.bones()[before..] {
                    if sink.add_bone(&bone.name, bone.parent, bone.bind_pose).is_none() {
                        return Err(VrmError::StageFailed {
                            stage: STAGE_RIG,
                            reason: format!("sink rejected bone '{}'", bone.name),
                        });
                    }
                }
            }

            meta.mannequin = mannequin_mapping(&table);
            meta.translation_modes = translation_modes(&skeleton, &table);
            meta.humanoid = table;
            meta.humanoid_inferred = inferred;
            Ok(())
        })?;

        // 7. 变形目标（由宿主转换）
        if ctx.has(ImportFlags::SKIP_MORPH_TARGET) {
            self.skip(STAGE_MORPH);
        } else {
            self.optional(STAGE_MORPH, 60, |_| {
                log::debug!("[导入] 变形目标交由宿主转换");
                Ok(())
            })?;
        }

        // 8. 物理资产
        let physics = if ctx.has(ImportFlags::SKIP_PHYSICS) {
            self.skip(STAGE_PHYSICS);
            None
        } else {
            self.optional(STAGE_PHYSICS, 80, |_| {
                let data = build_physics_asset(&skeleton, &meta.spring_chains, &meta.collider_groups, &meta.humanoid);
                if let Some(sink) = sinks.physics.as_deref_mut() {
                    if !data.emit(sink) {
                        return Err(VrmError::StageFailed {
                            stage: STAGE_PHYSICS,
                            reason: String::from("sink rejected a body or constraint"),
                        });
                    }
                }
                Ok(data)
            })?
        };

        // 9. 角色名骨架副本
        let humanoid_skeleton = if ctx.has(ImportFlags::CREATE_HUMANOID_RENAMED_MESH) {
            self.optional(STAGE_HUMANOID_RENAME, 80, |_| Ok(rename_to_humanoid(&skeleton, &meta.humanoid)))?
        } else {
            self.skip(STAGE_HUMANOID_RENAME);
            None
        };

        if self.cancel.is_cancelled() {
            return Err(VrmError::Cancelled);
        }
        self.progress.report(100, STAGE_DONE);
        log::info!(
            "[导入] 完成 '{}': {} 骨骼, {} 网格段, 耗时 {:.1}ms",
            ctx.asset_name,
            skeleton.len(),
            mesh.sections.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        let mut model = ImportedModel {
            name: ctx.asset_name.clone(),
            skeleton,
            build,
            meta: Arc::new(meta),
            materials,
            mesh,
            physics,
            humanoid_skeleton,
            report: self.report,
        };
        model.report.assets = model.assets();
        for (kind, name) in &model.report.assets {
            log::debug!("[导入] 产出 {:?}: {}", kind, name);
        }
        Ok(model)
    }

    // ========================================================================
    // 阶段执行
    // ========================================================================

    fn stage<T>(
        &mut self,
        stage: &'static str,
        percent: u8,
        f: impl FnOnce(&mut ImportReport) -> Result<T>,
    ) -> Result<T> {
        if self.cancel.is_cancelled() {
            log::warn!("[导入] '{}' 在阶段 {} 前被取消", self.ctx.asset_name, stage);
            return Err(VrmError::Cancelled);
        }
        self.progress.report(percent, stage);

        let start = Instant::now();
        let result = f(&mut self.report);
        let elapsed = start.elapsed();
        log::debug!("[导入] 阶段 {} 耗时 {:.2}ms", stage, elapsed.as_secs_f64() * 1000.0);
        self.report.stage_timings.push((stage, elapsed));
        result
    }

    /// 失败即中止
    fn required<T>(
        &mut self,
        stage: &'static str,
        percent: u8,
        f: impl FnOnce(&mut ImportReport) -> Result<T>,
    ) -> Result<T> {
        self.stage(stage, percent, f).map_err(|e| {
            if !matches!(e, VrmError::Cancelled) {
                log::error!("[导入] 阶段 {} 失败: {}", stage, e);
            }
            e
        })
    }

    /// 失败时记录并继续；取消仍然中止
    fn optional<T>(
        &mut self,
        stage: &'static str,
        percent: u8,
        f: impl FnOnce(&mut ImportReport) -> Result<T>,
    ) -> Result<Option<T>> {
        match self.stage(stage, percent, f) {
            Ok(v) => Ok(Some(v)),
            Err(VrmError::Cancelled) => Err(VrmError::Cancelled),
            Err(e) => {
                log::warn!("[导入] 可选阶段 {} 失败: {}", stage, e);
                self.report.optional_failures.push((stage, e.to_string()));
                Ok(None)
            }
        }
    }

    fn skip(&mut self, stage: &'static str) {
        log::debug!("[导入] 跳过阶段 {}", stage);
        self.report.skipped_stages.push(stage);
    }
}
