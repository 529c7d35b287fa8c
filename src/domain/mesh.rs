// src/domain/mesh.rs

//! 非结构化柔性网格数据模型
//!
//! 节点、单元（三角形/四边形）、节点编码与投影描述。
//! 网格一经构建即不可变；几何算法见 [`crate::geo::geometry`]。

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geo::geometry;
use crate::infra::error::{FmError, FmResult};

/// 经纬度（未投影）网格的投影标识
pub const LONG_LAT_PROJECTION: &str = "LONG/LAT";

/// 网格单元
///
/// 按节点数区分三角形与四边形；节点索引为 0 基，
/// 存储方 1 基表的转换在 IO 边界完成。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Element {
    /// 三节点三角形
    Triangle([usize; 3]),
    /// 四节点四边形
    Quad([usize; 4]),
}

impl Element {
    /// 由 0 基节点索引列表构建单元
    pub fn from_nodes(nodes: &[usize]) -> FmResult<Self> {
        match nodes {
            [a, b, c] => Ok(Self::Triangle([*a, *b, *c])),
            [a, b, c, d] => Ok(Self::Quad([*a, *b, *c, *d])),
            _ => Err(FmError::invalid_mesh(format!(
                "单元节点数 {} 无效 (仅支持 3 或 4)",
                nodes.len()
            ))),
        }
    }

    /// 节点索引切片
    #[inline]
    pub fn nodes(&self) -> &[usize] {
        match self {
            Self::Triangle(n) => n,
            Self::Quad(n) => n,
        }
    }

    /// 节点数
    #[inline]
    pub fn n_nodes(&self) -> usize {
        match self {
            Self::Triangle(_) => 3,
            Self::Quad(_) => 4,
        }
    }
}

/// 不可变非结构化网格
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    nodes: Vec<DVec3>,
    node_codes: Vec<i32>,
    elements: Vec<Element>,
    projection: String,
}

impl Mesh {
    /// 构建并校验网格
    ///
    /// 校验节点与编码数量一致、每个单元索引落在节点范围内，
    /// 失败返回 [`FmError::InvalidMesh`]。
    pub fn new(
        nodes: Vec<DVec3>,
        node_codes: Vec<i32>,
        elements: Vec<Element>,
        projection: impl Into<String>,
    ) -> FmResult<Self> {
        if nodes.is_empty() {
            return Err(FmError::invalid_mesh("网格不包含节点"));
        }
        if node_codes.len() != nodes.len() {
            return Err(FmError::invalid_mesh(format!(
                "节点编码数 {} 与节点数 {} 不一致",
                node_codes.len(),
                nodes.len()
            )));
        }
        if elements.is_empty() {
            return Err(FmError::invalid_mesh("网格不包含单元"));
        }
        for (idx, element) in elements.iter().enumerate() {
            for &nidx in element.nodes() {
                if nidx >= nodes.len() {
                    return Err(FmError::invalid_mesh(format!(
                        "单元 {} 引用的节点 {} 超出范围 (节点数 {})",
                        idx,
                        nidx,
                        nodes.len()
                    )));
                }
            }
        }

        Ok(Self {
            nodes,
            node_codes,
            elements,
            projection: projection.into(),
        })
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn nodes(&self) -> &[DVec3] {
        &self.nodes
    }

    #[inline]
    pub fn node_codes(&self) -> &[i32] {
        &self.node_codes
    }

    #[inline]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    #[inline]
    pub fn projection(&self) -> &str {
        &self.projection
    }

    /// 是否为经纬度（LONG/LAT）网格
    #[inline]
    pub fn is_geographic(&self) -> bool {
        self.projection == LONG_LAT_PROJECTION
    }

    /// 节点坐标，可按编码过滤
    ///
    /// `filter` 给定时仅返回对应编码的节点（保持原顺序）；
    /// 编码不存在于网格中时返回 [`FmError::InvalidCode`]。
    pub fn node_coordinates(&self, filter: Option<i32>) -> FmResult<Vec<DVec3>> {
        let Some(code) = filter else {
            return Ok(self.nodes.clone());
        };

        if !self.node_codes.contains(&code) {
            let mut valid = self.node_codes.clone();
            valid.sort_unstable();
            valid.dedup();
            return Err(FmError::InvalidCode { code, valid });
        }

        Ok(self
            .nodes
            .iter()
            .zip(&self.node_codes)
            .filter(|(_, &c)| c == code)
            .map(|(node, _)| *node)
            .collect())
    }

    /// 单元形心（成员节点坐标的算术平均）
    pub fn element_coordinates(&self) -> Vec<DVec3> {
        geometry::element_coordinates(self)
    }

    /// 单元水平面积，始终非负
    pub fn element_areas(&self) -> Vec<f64> {
        geometry::element_areas(self)
    }

    /// 最近单元索引（按形心平方距离，距离相同取最小索引）
    pub fn find_closest_element(&self, x: f64, y: f64, z: Option<f64>) -> usize {
        geometry::find_closest_element(self, x, y, z)
    }

    /// 网格统计信息
    pub fn statistics(&self) -> MeshStatistics {
        let areas = self.element_areas();
        let mut min_area = f64::MAX;
        let mut max_area: f64 = 0.0;
        let mut total_area = 0.0;
        for &area in &areas {
            min_area = min_area.min(area);
            max_area = max_area.max(area);
            total_area += area;
        }

        let n_triangles = self
            .elements
            .iter()
            .filter(|e| matches!(e, Element::Triangle(_)))
            .count();

        MeshStatistics {
            n_nodes: self.nodes.len(),
            n_elements: self.elements.len(),
            n_triangles,
            n_quads: self.elements.len() - n_triangles,
            total_area,
            min_element_area: min_area,
            max_element_area: max_area,
        }
    }
}

/// 网格统计信息
#[derive(Debug, Clone)]
pub struct MeshStatistics {
    pub n_nodes: usize,
    pub n_elements: usize,
    pub n_triangles: usize,
    pub n_quads: usize,
    pub total_area: f64,
    pub min_element_area: f64,
    pub max_element_area: f64,
}

impl fmt::Display for MeshStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== 网格统计 ===")?;
        writeln!(f, "节点数: {}", self.n_nodes)?;
        writeln!(
            f,
            "单元数: {} (三角形: {}, 四边形: {})",
            self.n_elements, self.n_triangles, self.n_quads
        )?;
        writeln!(f, "总面积: {:.2} m²", self.total_area)?;
        write!(
            f,
            "单元面积: [{:.2}, {:.2}] m²",
            self.min_element_area, self.max_element_area
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Mesh {
        Mesh::new(
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
            ],
            vec![1, 1, 0, 1],
            vec![Element::Quad([0, 1, 2, 3])],
            "UTM-33",
        )
        .unwrap()
    }

    #[test]
    fn test_element_from_nodes() {
        assert!(matches!(
            Element::from_nodes(&[0, 1, 2]),
            Ok(Element::Triangle(_))
        ));
        assert!(matches!(
            Element::from_nodes(&[0, 1, 2, 3]),
            Ok(Element::Quad(_))
        ));
        assert!(Element::from_nodes(&[0, 1]).is_err());
        assert!(Element::from_nodes(&[0, 1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_mesh_validation() {
        let nodes = vec![DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0)];

        // 编码数不一致
        assert!(Mesh::new(
            nodes.clone(),
            vec![0],
            vec![Element::Triangle([0, 1, 1])],
            ""
        )
        .is_err());

        // 单元索引越界
        assert!(Mesh::new(
            nodes,
            vec![0, 0],
            vec![Element::Triangle([0, 1, 2])],
            ""
        )
        .is_err());
    }

    #[test]
    fn test_node_filter() {
        let mesh = unit_square();

        let all = mesh.node_coordinates(None).unwrap();
        assert_eq!(all.len(), 4);

        let coded = mesh.node_coordinates(Some(1)).unwrap();
        assert_eq!(coded.len(), 3);
        assert_eq!(coded[2], DVec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_node_filter_invalid_code() {
        let mesh = unit_square();
        let err = mesh.node_coordinates(Some(9)).unwrap_err();
        match err {
            FmError::InvalidCode { code, valid } => {
                assert_eq!(code, 9);
                assert_eq!(valid, vec![0, 1]);
            }
            other => panic!("意外错误: {other}"),
        }
    }

    #[test]
    fn test_is_geographic() {
        let mesh = unit_square();
        assert!(!mesh.is_geographic());

        let geo = Mesh::new(
            mesh.nodes().to_vec(),
            mesh.node_codes().to_vec(),
            mesh.elements().to_vec(),
            LONG_LAT_PROJECTION,
        )
        .unwrap();
        assert!(geo.is_geographic());
    }

    #[test]
    fn test_statistics() {
        let stats = unit_square().statistics();
        assert_eq!(stats.n_elements, 1);
        assert_eq!(stats.n_quads, 1);
        assert!((stats.total_area - 1.0).abs() < 1e-12);
        assert!(stats.to_string().contains("网格统计"));
    }
}
