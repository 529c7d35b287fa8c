// src/io/snapshot.rs

//! 快照容器驱动
//!
//! 以 bincode 序列化的单文件容器，完整实现存储方接口，
//! 供测试与小规模作业使用。外部二进制容器格式不在本库范围内，
//! 由各自的驱动实现同一组 trait 接入。

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::domain::eum::{EumUnit, ItemInfo};
use crate::domain::mesh::{Element, Mesh};
use crate::infra::error::{FmError, FmResult};
use crate::io::traits::{
    ContainerBuilder, ContainerDriver, ContainerRead, ContainerWrite, GeometryKind,
};

/// 默认缺失值哨兵（单精度容器惯例）
pub const DEFAULT_DELETE_VALUE: f64 = 1.0e-35;

/// 快照文件体
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotBody {
    version: String,
    title: String,
    geometry: GeometryKind,
    mesh: Mesh,
    items: Vec<ItemInfo>,
    start_time: DateTime<Utc>,
    dt_seconds: f64,
    n_time_steps: usize,
    z_unit: EumUnit,
    delete_value: f64,
    /// 行存储，索引 = 时间步 * 条目数 + 条目
    rows: Vec<Vec<f64>>,
}

impl SnapshotBody {
    fn load(path: &Path) -> FmResult<Self> {
        let file = File::open(path)
            .map_err(|e| FmError::container_open(path, e.to_string()))?;
        let reader = BufReader::new(file);
        let body: Self = bincode::deserialize_from(reader)
            .map_err(|e| FmError::container_open(path, format!("快照解析失败: {e}")))?;
        body.validate()?;
        Ok(body)
    }

    fn save(&self, path: &Path) -> FmResult<()> {
        let file = File::create(path)
            .map_err(|e| FmError::io(format!("创建快照 {}", path.display()), e))?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, self)
            .map_err(|e| FmError::Serialization(format!("快照保存失败: {e}")))?;
        Ok(())
    }

    fn validate(&self) -> FmResult<()> {
        FmError::check_shape(
            "快照记录数",
            self.n_time_steps * self.items.len(),
            self.rows.len(),
        )?;
        let n_elements = self.mesh.n_elements();
        for row in &self.rows {
            FmError::check_shape("快照样本数", n_elements, row.len())?;
        }
        Ok(())
    }
}

/// 快照只读句柄
#[derive(Debug)]
pub struct SnapshotRead {
    body: SnapshotBody,
}

impl ContainerRead for SnapshotRead {
    fn item_count(&self) -> usize {
        self.body.items.len()
    }

    fn time_step_count(&self) -> usize {
        self.body.n_time_steps
    }

    fn element_count(&self) -> usize {
        self.body.mesh.n_elements()
    }

    fn delete_value(&self) -> f64 {
        self.body.delete_value
    }

    fn start_time(&self) -> DateTime<Utc> {
        self.body.start_time
    }

    fn geometry_kind(&self) -> GeometryKind {
        self.body.geometry
    }

    fn items(&self) -> &[ItemInfo] {
        &self.body.items
    }

    fn mesh(&self) -> FmResult<Mesh> {
        Ok(self.body.mesh.clone())
    }

    fn read_item_time_step(
        &mut self,
        item_number: usize,
        time_step: usize,
    ) -> FmResult<(f64, Vec<f64>)> {
        let n_items = self.body.items.len();
        if item_number == 0 || item_number > n_items {
            return Err(FmError::ItemOutOfRange {
                index: item_number,
                n_items,
            });
        }
        if time_step >= self.body.n_time_steps {
            return Err(FmError::InvalidTimeStep {
                index: time_step,
                n_time_steps: self.body.n_time_steps,
            });
        }

        let row = self.body.rows[time_step * n_items + (item_number - 1)].clone();
        Ok((time_step as f64 * self.body.dt_seconds, row))
    }
}

/// 快照可写句柄
///
/// 只支持顺序写；`close` 时才落盘，半途丢弃不改动目标文件。
#[derive(Debug)]
pub struct SnapshotWrite {
    body: SnapshotBody,
    path: PathBuf,
    cursor: usize,
    /// 创建模式下时间轴随写入增长；覆写模式按既有容量写
    append: bool,
}

impl ContainerWrite for SnapshotWrite {
    fn item_count(&self) -> usize {
        self.body.items.len()
    }

    fn time_step_count(&self) -> usize {
        self.body.n_time_steps
    }

    fn element_count(&self) -> usize {
        self.body.mesh.n_elements()
    }

    fn delete_value(&self) -> f64 {
        self.body.delete_value
    }

    fn write_item_time_step_next(&mut self, data: &[f64]) -> FmResult<()> {
        FmError::check_shape("样本数组", self.body.mesh.n_elements(), data.len())?;

        if self.append {
            self.body.rows.push(data.to_vec());
        } else {
            if self.cursor >= self.body.rows.len() {
                return Err(FmError::WriteOverrun {
                    capacity: self.body.rows.len(),
                });
            }
            self.body.rows[self.cursor] = data.to_vec();
        }
        self.cursor += 1;
        Ok(())
    }

    fn close(mut self) -> FmResult<()> {
        if self.append {
            let n_items = self.body.items.len();
            if self.body.rows.len() % n_items != 0 {
                return Err(FmError::shape_mismatch(
                    "快照记录数",
                    format!("{n_items} 的整数倍"),
                    self.body.rows.len(),
                ));
            }
            self.body.n_time_steps = self.body.rows.len() / n_items;
        }
        self.body.save(&self.path)
    }
}

/// 快照构建器
#[derive(Default)]
pub struct SnapshotBuilder {
    nodes: Option<(Vec<f64>, Vec<f64>, Vec<f64>, Vec<i32>)>,
    element_table: Vec<Vec<usize>>,
    projection: String,
    start_time: Option<DateTime<Utc>>,
    dt_seconds: f64,
    z_unit: Option<EumUnit>,
    items: Vec<ItemInfo>,
    title: String,
}

impl ContainerBuilder for SnapshotBuilder {
    type Output = SnapshotWrite;

    fn set_nodes(&mut self, x: &[f64], y: &[f64], z: &[f64], code: &[i32]) {
        self.nodes = Some((x.to_vec(), y.to_vec(), z.to_vec(), code.to_vec()));
    }

    fn set_elements(&mut self, element_table: &[Vec<usize>]) {
        self.element_table = element_table.to_vec();
    }

    fn set_projection(&mut self, projection: &str) {
        self.projection = projection.to_string();
    }

    fn set_time_info(&mut self, start_time: DateTime<Utc>, dt_seconds: f64) {
        self.start_time = Some(start_time);
        self.dt_seconds = dt_seconds;
    }

    fn set_z_unit(&mut self, unit: EumUnit) {
        self.z_unit = Some(unit);
    }

    fn add_dynamic_item(&mut self, item: ItemInfo) {
        self.items.push(item);
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn create_file(self, path: &Path) -> FmResult<SnapshotWrite> {
        let (x, y, z, code) = self
            .nodes
            .ok_or_else(|| FmError::invalid_mesh("构建器未设置节点"))?;
        FmError::check_shape("节点 y 坐标数", x.len(), y.len())?;
        FmError::check_shape("节点 z 坐标数", x.len(), z.len())?;

        let nodes: Vec<DVec3> = x
            .iter()
            .zip(&y)
            .zip(&z)
            .map(|((&x, &y), &z)| DVec3::new(x, y, z))
            .collect();

        // 单元表为 1 基，在此转换
        let elements: Vec<Element> = self
            .element_table
            .iter()
            .map(|row| {
                let zero_based: Vec<usize> = row
                    .iter()
                    .map(|&n| {
                        n.checked_sub(1)
                            .ok_or_else(|| FmError::invalid_mesh("单元表编号为 0 (需 1 基)"))
                    })
                    .collect::<FmResult<_>>()?;
                Element::from_nodes(&zero_based)
            })
            .collect::<FmResult<_>>()?;

        let mesh = Mesh::new(nodes, code, elements, self.projection)?;

        if self.items.is_empty() {
            return Err(FmError::create_failed(path, "未声明任何动态变量"));
        }

        let body = SnapshotBody {
            version: "1.0.0".to_string(),
            title: self.title,
            geometry: GeometryKind::Dfsu2D,
            mesh,
            items: self.items,
            start_time: self.start_time.unwrap_or_else(Utc::now),
            dt_seconds: self.dt_seconds,
            n_time_steps: 0,
            z_unit: self.z_unit.unwrap_or(EumUnit::Meter),
            delete_value: DEFAULT_DELETE_VALUE,
            rows: Vec::new(),
        };

        // 先落盘一次, 目标不可写时及早失败
        body.save(path)?;

        Ok(SnapshotWrite {
            body,
            path: path.to_path_buf(),
            cursor: 0,
            append: true,
        })
    }
}

/// 快照存储驱动
#[derive(Debug, Default, Clone)]
pub struct SnapshotDriver;

impl ContainerDriver for SnapshotDriver {
    type Read = SnapshotRead;
    type Write = SnapshotWrite;
    type Builder = SnapshotBuilder;

    fn open(&self, path: &Path) -> FmResult<SnapshotRead> {
        Ok(SnapshotRead {
            body: SnapshotBody::load(path)?,
        })
    }

    fn open_for_edit(&self, path: &Path) -> FmResult<SnapshotWrite> {
        Ok(SnapshotWrite {
            body: SnapshotBody::load(path)?,
            path: path.to_path_buf(),
            cursor: 0,
            append: false,
        })
    }

    fn builder(&self) -> SnapshotBuilder {
        SnapshotBuilder::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dfsu::{Dfsu, ReadSelection};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap()
    }

    fn build_two_item_container(path: &Path) {
        let mut builder = SnapshotDriver.builder();
        builder.set_nodes(
            &[0.0, 1.0, 0.0],
            &[0.0, 0.0, 1.0],
            &[-5.0, -5.0, -5.0],
            &[1, 1, 1],
        );
        builder.set_elements(&[vec![1, 2, 3]]);
        builder.set_projection("UTM-33");
        builder.set_time_info(t0(), 60.0);
        builder.set_z_unit(EumUnit::Meter);
        builder.add_dynamic_item(ItemInfo::new("Surface elevation"));
        builder.add_dynamic_item(ItemInfo::new("Salinity"));

        let mut handle = builder.create_file(path).unwrap();
        // 2 时间步 × 2 条目, (时间步, 条目) 嵌套顺序
        for value in [1.0, 10.0, 2.0, 20.0] {
            handle.write_item_time_step_next(&[value]).unwrap();
        }
        handle.close().unwrap();
    }

    #[test]
    fn test_builder_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.snap");
        build_two_item_container(&path);

        let mut handle = SnapshotDriver.open(&path).unwrap();
        assert_eq!(handle.item_count(), 2);
        assert_eq!(handle.time_step_count(), 2);
        assert_eq!(handle.element_count(), 1);
        assert_eq!(handle.start_time(), t0());
        assert_eq!(handle.geometry_kind(), GeometryKind::Dfsu2D);

        let (seconds, row) = handle.read_item_time_step(2, 1).unwrap();
        assert_eq!(seconds, 60.0);
        assert_eq!(row, vec![20.0]);
    }

    #[test]
    fn test_open_missing_file() {
        let err = SnapshotDriver.open(Path::new("/no/such.snap")).unwrap_err();
        assert!(matches!(err, FmError::ContainerOpen { .. }));
    }

    #[test]
    fn test_create_into_invalid_path() {
        let mut builder = SnapshotDriver.builder();
        builder.set_nodes(&[0.0, 1.0, 0.0], &[0.0, 0.0, 1.0], &[0.0; 3], &[1; 3]);
        builder.set_elements(&[vec![1, 2, 3]]);
        builder.set_projection("UTM-33");
        builder.set_time_info(t0(), 1.0);
        builder.add_dynamic_item(ItemInfo::new("h"));

        let err = builder
            .create_file(Path::new("/no/such/dir/out.snap"))
            .unwrap_err();
        assert!(matches!(err, FmError::Io { .. }));
    }

    #[test]
    fn test_edit_mode_rejects_overrun() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.snap");
        build_two_item_container(&path);

        let mut handle = SnapshotDriver.open_for_edit(&path).unwrap();
        for _ in 0..4 {
            handle.write_item_time_step_next(&[0.0]).unwrap();
        }
        assert!(matches!(
            handle.write_item_time_step_next(&[0.0]),
            Err(FmError::WriteOverrun { .. })
        ));
    }

    #[test]
    fn test_abandoned_write_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.snap");
        build_two_item_container(&path);

        {
            let mut handle = SnapshotDriver.open_for_edit(&path).unwrap();
            handle.write_item_time_step_next(&[99.0]).unwrap();
            // 不 close, 丢弃
        }

        let mut handle = SnapshotDriver.open(&path).unwrap();
        let (_, row) = handle.read_item_time_step(1, 0).unwrap();
        assert_eq!(row, vec![1.0]);
    }

    #[test]
    fn test_dynamic_z_item_offset() {
        // 手工构造 3D sigma 容器: 首条目为动态 Z 伪变量
        let dir = tempdir().unwrap();
        let path = dir.path().join("sigma.snap");

        let mesh = Mesh::new(
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
            ],
            vec![1; 3],
            vec![Element::Triangle([0, 1, 2])],
            "UTM-33",
        )
        .unwrap();

        let body = SnapshotBody {
            version: "1.0.0".to_string(),
            title: String::new(),
            geometry: GeometryKind::Dfsu3DSigma,
            mesh,
            items: vec![
                ItemInfo::new("Z coordinate"),
                ItemInfo::new("Temperature"),
            ],
            start_time: t0(),
            dt_seconds: 1.0,
            n_time_steps: 1,
            z_unit: EumUnit::Meter,
            delete_value: DEFAULT_DELETE_VALUE,
            rows: vec![vec![-1.0], vec![17.5]],
        };
        body.save(&path).unwrap();

        let dfsu = Dfsu::new(SnapshotDriver);
        let ds = dfsu.read(&path, &ReadSelection::all()).unwrap();

        // 伪变量被跳过, 唯一用户可见条目为 Temperature
        assert_eq!(ds.n_items(), 1);
        assert_eq!(ds.items()[0].name, "Temperature");
        assert_eq!(ds.data()[0][[0, 0]], 17.5);
    }
}
