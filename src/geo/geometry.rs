// src/geo/geometry.rs

//! 网格几何算法
//!
//! 单元形心、单元水平面积（含经纬度网格的米制修正）、最近单元查找。
//!
//! # 面积近似说明
//!
//! 经纬度网格的面积修正采用局部切平面近似：以单元节点纬度均值处的
//! cos 缩放东西向边长，再按平面公式求有向面积。这不是测地线计算，
//! 大单元或高纬度情形误差增大，属既定近似而非缺陷。

use glam::{DVec2, DVec3};
use std::f64::consts::PI;

use crate::domain::mesh::{Element, Mesh};

/// 面积修正采用的地球半径 (m)
pub const EARTH_RADIUS: f64 = 6_366_707.0;

/// 角度转弧度
#[inline]
fn deg_to_rad(deg: f64) -> f64 {
    deg * PI / 180.0
}

/// 单元形心（成员节点坐标的算术平均，3 点或 4 点）
pub fn element_coordinates(mesh: &Mesh) -> Vec<DVec3> {
    let nodes = mesh.nodes();
    mesh.elements()
        .iter()
        .map(|element| {
            let mut acc = DVec3::ZERO;
            for &nidx in element.nodes() {
                acc += nodes[nidx];
            }
            acc / element.n_nodes() as f64
        })
        .collect()
}

/// 单元水平面积，始终非负
///
/// 三角形 (a,b,c): 有向面积 = ½(abx·acy − aby·acx)，ab/ac 为自 a 出发的
/// 边向量；四边形 (a,b,c,d) 分解为 (a,b,c) + (a,c,d)。
/// 经纬度网格先将每个边向量分量按 [`EARTH_RADIUS`] 换算为近似米制长度。
pub fn element_areas(mesh: &Mesh) -> Vec<f64> {
    let nodes = mesh.nodes();
    let geographic = mesh.is_geographic();
    let scale = EARTH_RADIUS * PI / 180.0;

    mesh.elements()
        .iter()
        .map(|element| {
            let idx = element.nodes();
            let a = nodes[idx[0]];
            let b = nodes[idx[1]];
            let c = nodes[idx[2]];

            let mut ab = DVec2::new(b.x - a.x, b.y - a.y);
            let mut ac = DVec2::new(c.x - a.x, c.y - a.y);
            let mut ad = match element {
                Element::Quad(q) => {
                    let d = nodes[q[3]];
                    Some(DVec2::new(d.x - a.x, d.y - a.y))
                }
                Element::Triangle(_) => None,
            };

            if geographic {
                // 单元节点纬度均值处的 cos 修正东西向边长
                let lat_mean =
                    idx.iter().map(|&n| nodes[n].y).sum::<f64>() / idx.len() as f64;
                let cos_lat = deg_to_rad(lat_mean).cos();

                ab = DVec2::new(scale * ab.x * cos_lat, scale * ab.y);
                ac = DVec2::new(scale * ac.x * cos_lat, scale * ac.y);
                ad = ad.map(|v| DVec2::new(scale * v.x * cos_lat, scale * v.y));
            }

            let mut area = 0.5 * (ab.x * ac.y - ab.y * ac.x);
            if let Some(ad) = ad {
                area += 0.5 * (ac.x * ad.y - ac.y * ad.x);
            }
            area.abs()
        })
        .collect()
}

/// 最近单元查找（按形心平方欧氏距离，距离相同取最小索引）
///
/// `z` 缺省时仅在水平面内比较，给定时按三维距离比较。
pub fn find_closest_element(mesh: &Mesh, x: f64, y: f64, z: Option<f64>) -> usize {
    let centers = element_coordinates(mesh);

    let mut best_idx = 0;
    let mut best_d2 = f64::INFINITY;
    for (idx, center) in centers.iter().enumerate() {
        let dx = center.x - x;
        let dy = center.y - y;
        let d2 = match z {
            None => dx * dx + dy * dy,
            Some(zq) => {
                let dz = center.z - zq;
                dx * dx + dy * dy + dz * dz
            }
        };
        if d2 < best_d2 {
            best_d2 = d2;
            best_idx = idx;
        }
    }
    best_idx
}
