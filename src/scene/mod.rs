//! 场景提供者数据模型
//!
//! 文件格式解析在本库之外完成，这里只定义解析结果的只读形状：
//! 节点树（名称、父子、局部变换、网格引用）、网格（顶点流、面、蒙皮权重）、材质列表，
//! 以及可选的 VRM 元数据（人形映射、弹簧链、碰撞组、许可信息）。
//!
//! 所有数值使用源坐标系（glTF：右手 Y-up，米）。

use glam::{Vec2, Vec3, Vec4};

use crate::skeleton::BoneTransform;

// ============================================================================
// 节点与网格
// ============================================================================

/// 场景节点
#[derive(Clone, Debug, Default)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// 局部变换（源坐标系）
    pub transform: BoneTransform,
    /// 引用的网格索引
    pub meshes: Vec<usize>,
}

/// 单根骨骼对网格的权重记录
#[derive(Clone, Debug, Default)]
pub struct BoneWeights {
    /// 骨骼（节点）名
    pub name: String,
    /// (顶点索引, 权重)
    pub weights: Vec<(u32, f32)>,
}

/// 网格
#[derive(Clone, Debug, Default)]
pub struct SceneMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// xyz 切线 + w 副切线符号
    pub tangents: Vec<Vec4>,
    pub uvs: Vec<Vec2>,
    pub colors: Vec<Vec4>,
    pub faces: Vec<[u32; 3]>,
    pub bones: Vec<BoneWeights>,
    /// 材质索引
    pub material: usize,
}

/// 材质（只用到名称，纹理转换在外部完成）
#[derive(Clone, Debug, Default)]
pub struct SceneMaterial {
    pub name: String,
}

// ============================================================================
// VRM 元数据
// ============================================================================

/// 弹簧链定义（源单位）
#[derive(Clone, Debug)]
pub struct SpringMeta {
    pub stiffness: f32,
    pub gravity_power: f32,
    pub gravity_dir: Vec3,
    pub drag_force: f32,
    pub hit_radius: f32,
    /// 链根骨骼名（每个根向下展开为链）
    pub bone_names: Vec<String>,
    /// 碰撞组索引
    pub collider_groups: Vec<usize>,
}

impl Default for SpringMeta {
    fn default() -> Self {
        Self {
            stiffness: 1.0,
            gravity_power: 0.0,
            gravity_dir: Vec3::new(0.0, -1.0, 0.0),
            drag_force: 0.4,
            hit_radius: 0.02,
            bone_names: Vec::new(),
            collider_groups: Vec::new(),
        }
    }
}

/// 碰撞球（源单位）
#[derive(Clone, Copy, Debug)]
pub struct ColliderMeta {
    pub offset: Vec3,
    pub radius: f32,
}

/// 碰撞组
#[derive(Clone, Debug, Default)]
pub struct ColliderGroupMeta {
    pub node_name: String,
    pub colliders: Vec<ColliderMeta>,
}

/// VRM 元数据
#[derive(Clone, Debug, Default)]
pub struct VrmMetadata {
    /// (角色名, 节点名)
    pub humanoid: Vec<(String, String)>,
    pub springs: Vec<SpringMeta>,
    pub collider_groups: Vec<ColliderGroupMeta>,
    /// (键, 值)，如 title / author / licenseName
    pub license: Vec<(String, String)>,
}

// ============================================================================
// 场景
// ============================================================================

/// 解析后的场景（节点 0 为场景根）
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub nodes: Vec<SceneNode>,
    pub meshes: Vec<SceneMesh>,
    pub materials: Vec<SceneMaterial>,
    pub metadata: Option<VrmMetadata>,
}

impl Scene {
    /// 创建只有根节点的场景
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![SceneNode {
                name: root_name.into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// 添加节点，父节点必须已存在
    pub fn add_node(&mut self, name: impl Into<String>, parent: usize, transform: BoneTransform) -> usize {
        let index = self.nodes.len();
        self.nodes.push(SceneNode {
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
            transform,
            meshes: Vec::new(),
        });
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(index);
        }
        index
    }

    #[inline]
    pub fn root(&self) -> Option<&SceneNode> {
        self.nodes.first()
    }

    /// 按名称查找节点
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// 节点深度（根为 0）
    pub fn depth(&self, node: usize) -> usize {
        std::iter::successors(self.nodes.get(node).and_then(|n| n.parent), |&p| {
            self.nodes.get(p).and_then(|n| n.parent)
        })
        .count()
    }

    /// 子树节点（先序，含自身），显式栈遍历
    pub fn subtree(&self, node: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            let Some(current) = self.nodes.get(n) else { continue };
            out.push(n);
            stack.extend(current.children.iter().rev());
        }
        out
    }

    /// 被任何网格蒙皮引用的骨骼名集合
    pub fn skinned_bone_names(&self) -> std::collections::HashSet<&str> {
        self.meshes
            .iter()
            .flat_map(|m| m.bones.iter().map(|b| b.name.as_str()))
            .collect()
    }
}

/// 场景提供者
pub trait SceneProvider {
    /// 解析失败时返回 None
    fn scene(&self) -> Option<&Scene>;
}

impl SceneProvider for Scene {
    fn scene(&self) -> Option<&Scene> {
        Some(self)
    }
}

impl SceneProvider for Option<Scene> {
    fn scene(&self) -> Option<&Scene> {
        self.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtree_preorder() {
        let mut scene = Scene::new("root");
        let a = scene.add_node("a", 0, BoneTransform::IDENTITY);
        let b = scene.add_node("b", 0, BoneTransform::IDENTITY);
        let a1 = scene.add_node("a1", a, BoneTransform::IDENTITY);
        assert_eq!(scene.subtree(0), vec![0, a, a1, b]);
        assert_eq!(scene.depth(a1), 2);
        assert_eq!(scene.find_node("b"), Some(b));
    }
}
