//! 导入流水线
//!
//! - context: 导入开关与参数
//! - progress: 进度回调与取消
//! - normalize: 非 ASCII 骨骼名替换
//! - material: 材质槽位
//! - mesh: 网格转换与蒙皮权重量化
//! - physics: 弹簧骨骼物理资产描述
//! - rapier_sink: 基于 rapier3d 的物理资产后端
//! - asset: 导入产物
//! - pipeline: 阶段编排

mod context;
mod progress;
pub mod normalize;
pub mod material;
pub mod mesh;
pub mod physics;
pub mod rapier_sink;
mod asset;
mod pipeline;

pub use context::{ImportContext, ImportFlags};
pub use progress::{CancelToken, LogProgress, NoProgress, ProgressSink};
pub use material::MaterialTable;
pub use mesh::{CollectedMesh, MeshConversion, MeshSection, MeshSink, SkinInfluence};
pub use physics::{BodyDesc, BodyKind, ConstraintDesc, PhysicsAssetData, PhysicsSink};
pub use rapier_sink::RapierPhysicsSink;
pub use asset::{AssetKind, ImportReport, ImportedModel, VrmMeta};
pub use pipeline::{ImportPipeline, ImportSinks};
