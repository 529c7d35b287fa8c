// src/geo/spatial_index.rs

//! 基于 R-tree 的单元形心空间索引
//!
//! 对同一网格的批量近邻查询比逐次线性扫描高效；
//! 单次查询直接用 [`Mesh::find_closest_element`] 即可。

use glam::DVec2;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::domain::mesh::Mesh;
use crate::geo::geometry;

/// R-tree 条目: 单元形心包络
#[derive(Debug, Clone)]
pub struct ElementEnvelope {
    pub element_index: usize,
    pub center: DVec2,
}

impl RTreeObject for ElementEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.center.x, self.center.y])
    }
}

impl PointDistance for ElementEnvelope {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.center.x - point[0];
        let dy = self.center.y - point[1];
        dx * dx + dy * dy
    }
}

/// 单元形心空间索引
#[derive(Debug)]
pub struct MeshSpatialIndex {
    tree: RTree<ElementEnvelope>,
}

impl MeshSpatialIndex {
    /// 由网格构建索引
    pub fn build(mesh: &Mesh) -> Self {
        let envelopes = geometry::element_coordinates(mesh)
            .iter()
            .enumerate()
            .map(|(idx, center)| ElementEnvelope {
                element_index: idx,
                center: DVec2::new(center.x, center.y),
            })
            .collect();

        Self {
            tree: RTree::bulk_load(envelopes),
        }
    }

    /// 最近的 `count` 个单元及其形心距离，按距离升序
    pub fn nearest_elements(&self, x: f64, y: f64, count: usize) -> Vec<(usize, f64)> {
        self.tree
            .nearest_neighbor_iter(&[x, y])
            .take(count)
            .map(|env| {
                let dx = env.center.x - x;
                let dy = env.center.y - y;
                (env.element_index, (dx * dx + dy * dy).sqrt())
            })
            .collect()
    }

    /// 索引的单元数
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mesh::Element;
    use glam::DVec3;

    fn two_triangle_mesh() -> Mesh {
        Mesh::new(
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
                DVec3::new(10.0, 10.0, 0.0),
                DVec3::new(11.0, 10.0, 0.0),
                DVec3::new(10.0, 11.0, 0.0),
            ],
            vec![0; 6],
            vec![
                Element::Triangle([0, 1, 2]),
                Element::Triangle([3, 4, 5]),
            ],
            "UTM-33",
        )
        .unwrap()
    }

    #[test]
    fn test_nearest_elements_order() {
        let mesh = two_triangle_mesh();
        let index = MeshSpatialIndex::build(&mesh);
        assert_eq!(index.len(), 2);

        let nearest = index.nearest_elements(0.0, 0.0, 2);
        assert_eq!(nearest.len(), 2);
        assert_eq!(nearest[0].0, 0);
        assert_eq!(nearest[1].0, 1);
        assert!(nearest[0].1 <= nearest[1].1);
    }

    #[test]
    fn test_nearest_agrees_with_linear_scan() {
        let mesh = two_triangle_mesh();
        let index = MeshSpatialIndex::build(&mesh);

        for &(x, y) in &[(0.5, 0.5), (10.2, 10.4), (-3.0, 7.0)] {
            let from_index = index.nearest_elements(x, y, 1)[0].0;
            let from_scan = mesh.find_closest_element(x, y, None);
            assert_eq!(from_index, from_scan);
        }
    }
}
