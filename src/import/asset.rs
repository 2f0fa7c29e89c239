//! 导入产物
//!
//! VrmMeta 是持久化的只读元数据，运行时以 Arc 在多个角色实例之间共享。
//! ImportedModel 汇总一次导入的全部结果。

use std::sync::Arc;
use std::time::Duration;

use crate::humanoid::{HumanoidBoneTable, RenamedSkeleton, TranslationRetargetMode};
use crate::skeleton::{ReferenceSkeleton, SkeletonBuildReport};
use crate::spring::{ColliderGroup, SpringChain, SpringSetup};

use super::material::MaterialTable;
use super::mesh::MeshConversion;
use super::physics::PhysicsAssetData;

/// 资产类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Skeleton,
    SkeletalMesh,
    Material,
    Metadata,
    PhysicsAsset,
    /// 角色名骨架副本
    HumanoidSkeleton,
}

impl AssetKind {
    /// 资产名前缀
    pub fn prefix(&self) -> &'static str {
        match self {
            AssetKind::Skeleton => "SKEL_",
            AssetKind::SkeletalMesh => "SK_",
            AssetKind::Material => "M_",
            AssetKind::Metadata => "VM_",
            AssetKind::PhysicsAsset => "PHYS_",
            AssetKind::HumanoidSkeleton => "SKEL_humanoid_",
        }
    }

    /// 带前缀的资产名
    pub fn asset_name(&self, base: &str) -> String {
        format!("{}{}", self.prefix(), base)
    }
}

/// VRM 元数据（持久化）
#[derive(Clone, Debug)]
pub struct VrmMeta {
    pub humanoid: HumanoidBoneTable,
    /// 人形映射是否由启发式推断
    pub humanoid_inferred: bool,
    pub spring_chains: Vec<SpringChain>,
    pub collider_groups: Vec<ColliderGroup>,
    pub license: Vec<(String, String)>,
    /// 人体模型骨骼名 → 源骨骼名
    pub mannequin: Vec<(&'static str, String)>,
    /// 逐骨骼平移重定向模式
    pub translation_modes: Vec<TranslationRetargetMode>,
    /// 弹簧链力项的长度缩放（与骨架的轴转换缩放一致）
    pub spring_unit_scale: f32,
}

impl Default for VrmMeta {
    fn default() -> Self {
        Self {
            humanoid: HumanoidBoneTable::default(),
            humanoid_inferred: false,
            spring_chains: Vec::new(),
            collider_groups: Vec::new(),
            license: Vec::new(),
            mannequin: Vec::new(),
            translation_modes: Vec::new(),
            spring_unit_scale: 1.0,
        }
    }
}

impl VrmMeta {
    /// 针对骨架解析弹簧骨骼数据
    pub fn spring_setup(&self, skeleton: &ReferenceSkeleton) -> Arc<SpringSetup> {
        Arc::new(
            SpringSetup::resolve(skeleton, &self.spring_chains, &self.collider_groups)
                .with_unit_scale(self.spring_unit_scale),
        )
    }

    pub fn license_value(&self, key: &str) -> Option<&str> {
        self.license
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// 导入统计
#[derive(Clone, Debug, Default)]
pub struct ImportReport {
    /// (阶段, 耗时)
    pub stage_timings: Vec<(&'static str, Duration)>,
    pub skipped_stages: Vec<&'static str>,
    /// 可选阶段的失败原因
    pub optional_failures: Vec<(&'static str, String)>,
    pub normalized_names: usize,
    pub renamed_bones: usize,
    pub ik_bones_added: usize,
    pub dropped_vertices: usize,
    pub degraded_weights: usize,
    pub merged_bones: usize,
    /// 产出的资产（类型, 名称）
    pub assets: Vec<(AssetKind, String)>,
}

impl ImportReport {
    pub fn total_time(&self) -> Duration {
        self.stage_timings.iter().map(|(_, d)| *d).sum()
    }

    /// 指定类型的资产数
    pub fn asset_count(&self, kind: AssetKind) -> usize {
        self.assets.iter().filter(|(k, _)| *k == kind).count()
    }
}

/// 一次导入的全部结果
#[derive(Clone, Debug)]
pub struct ImportedModel {
    pub name: String,
    pub skeleton: ReferenceSkeleton,
    pub build: SkeletonBuildReport,
    pub meta: Arc<VrmMeta>,
    pub materials: MaterialTable,
    pub mesh: MeshConversion,
    /// SKIP_PHYSICS 时为 None
    pub physics: Option<PhysicsAssetData>,
    /// CREATE_HUMANOID_RENAMED_MESH 时生成
    pub humanoid_skeleton: Option<RenamedSkeleton>,
    pub report: ImportReport,
}

impl ImportedModel {
    /// 产出的资产（类型, 名称）
    pub fn assets(&self) -> Vec<(AssetKind, String)> {
        let mut out = vec![
            (AssetKind::Skeleton, AssetKind::Skeleton.asset_name(&self.name)),
            (AssetKind::SkeletalMesh, AssetKind::SkeletalMesh.asset_name(&self.name)),
            (AssetKind::Metadata, AssetKind::Metadata.asset_name(&self.name)),
        ];
        out.extend(
            self.materials
                .slots
                .iter()
                .map(|s| (AssetKind::Material, AssetKind::Material.asset_name(s))),
        );
        if self.physics.is_some() {
            out.push((AssetKind::PhysicsAsset, AssetKind::PhysicsAsset.asset_name(&self.name)));
        }
        if self.humanoid_skeleton.is_some() {
            out.push((AssetKind::HumanoidSkeleton, AssetKind::HumanoidSkeleton.asset_name(&self.name)));
        }
        out
    }

    /// 运行时弹簧数据
    pub fn spring_setup(&self) -> Arc<SpringSetup> {
        self.meta.spring_setup(&self.skeleton)
    }
}
