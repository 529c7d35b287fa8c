// src/io/mesh_loader.rs

//! 文本网格文件加载
//!
//! DHI 风格 ASCII 网格格式：
//!
//! ```text
//! 100079 1000 4 LONG/LAT
//! 1 0.0 0.0 -10.0 1
//! 2 1.0 0.0 -10.0 1
//! 3 1.0 1.0 -10.0 0
//! 4 0.0 1.0 -10.0 1
//! 1 4 25
//! 1 1 2 3 4
//! ```
//!
//! 首行：物理量编码、单位编码、节点数，其后整行余下部分为投影描述；
//! 节点行：编号 x y z 编码；单元头：单元数、单元最大节点数、编码；
//! 单元行：编号 + 1 基节点编号（尾部 0 占位表示三角形）。

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use glam::DVec3;

use crate::domain::mesh::{Element, Mesh};
use crate::infra::error::{FmError, FmResult};
use crate::io::traits::MeshLoader;

/// 文本网格加载器
pub struct TextMeshLoader;

impl TextMeshLoader {
    fn parse(path: &Path) -> FmResult<Mesh> {
        let file = File::open(path).map_err(|e| {
            FmError::container_open(path, format!("无法打开网格文件: {e}"))
        })?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        // 首行: 物理量 单位 节点数 投影
        let header = next_line(&mut lines, "网格头部")?;
        let tokens: Vec<&str> = header.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(FmError::invalid_mesh(format!(
                "网格头部格式错误: '{header}'"
            )));
        }
        let n_nodes: usize = tokens[2]
            .parse()
            .map_err(|_| FmError::invalid_mesh(format!("节点数无效: '{}'", tokens[2])))?;
        let projection = tokens[3..].join(" ");

        // 节点段
        let mut nodes = Vec::with_capacity(n_nodes);
        let mut node_codes = Vec::with_capacity(n_nodes);
        for _ in 0..n_nodes {
            let line = next_line(&mut lines, "节点行")?;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 {
                return Err(FmError::invalid_mesh(format!("节点行格式错误: '{line}'")));
            }
            let coords: Option<(f64, f64, f64)> = (|| {
                Some((
                    parts[1].parse().ok()?,
                    parts[2].parse().ok()?,
                    parts[3].parse().ok()?,
                ))
            })();
            let code: Option<i32> = parts[4].parse().ok();
            match (coords, code) {
                (Some((x, y, z)), Some(code)) => {
                    nodes.push(DVec3::new(x, y, z));
                    node_codes.push(code);
                }
                _ => {
                    return Err(FmError::invalid_mesh(format!(
                        "节点行数值无效: '{line}'"
                    )))
                }
            }
        }

        // 单元头: 单元数 最大节点数 编码
        let elem_header = next_line(&mut lines, "单元头部")?;
        let parts: Vec<usize> = elem_header
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 2 {
            return Err(FmError::invalid_mesh(format!(
                "单元头部格式错误: '{elem_header}'"
            )));
        }
        let n_elements = parts[0];

        // 单元段: 1 基编号在此转换为 0 基
        let mut elements = Vec::with_capacity(n_elements);
        for _ in 0..n_elements {
            let line = next_line(&mut lines, "单元行")?;
            let numbers: Vec<usize> = line
                .split_whitespace()
                .skip(1)
                .filter_map(|s| s.parse().ok())
                .collect();

            let zero_based: Vec<usize> = numbers
                .iter()
                .filter(|&&n| n != 0)
                .map(|&n| n - 1)
                .collect();
            elements.push(Element::from_nodes(&zero_based)?);
        }

        let mesh = Mesh::new(nodes, node_codes, elements, projection)?;

        log::info!(
            "网格加载完成: {} ({} 节点, {} 单元)",
            path.display(),
            mesh.n_nodes(),
            mesh.n_elements()
        );

        Ok(mesh)
    }
}

impl MeshLoader for TextMeshLoader {
    fn load(&self, path: &Path) -> FmResult<Mesh> {
        Self::parse(path)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        ext.eq_ignore_ascii_case("mesh")
    }
}

fn next_line(
    lines: &mut impl Iterator<Item = std::io::Result<String>>,
    context: &str,
) -> FmResult<String> {
    lines
        .next()
        .transpose()?
        .ok_or_else(|| FmError::invalid_mesh(format!("{context}缺失")))
}
