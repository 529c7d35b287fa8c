// src/io/dfsu.rs

//! 容器读写驱动
//!
//! [`Dfsu`] 封装存储驱动，提供读取、覆写、创建三类操作；
//! [`DfsuFile`] 为打开容器后的会话对象，承载几何查询。
//!
//! 缺失值在内存中统一为 NaN，落盘时换回容器哨兵值；
//! 转换只发生在本模块的读写边界，不会泄漏到几何或数据模型层。

use std::path::Path;

use chrono::{DateTime, Utc};
use glam::DVec3;
use ndarray::Array2;

use crate::domain::dataset::Dataset;
use crate::domain::eum::{EumUnit, ItemInfo};
use crate::domain::mesh::Mesh;
use crate::infra::error::{FmError, FmResult};
use crate::infra::time::{self, TimeStepUnit};
use crate::io::traits::{
    ContainerBuilder, ContainerDriver, ContainerRead, ContainerWrite, GeometryKind, MeshLoader,
};

// ============================================================
// 哨兵值转换（读写边界唯一转换点）
// ============================================================

/// 容器哨兵值 → NaN（就地）
fn mask_deleted(row: &mut [f64], delete_value: f64) {
    for v in row.iter_mut() {
        if *v == delete_value {
            *v = f64::NAN;
        }
    }
}

/// NaN → 容器哨兵值（就地）
fn unmask_deleted(row: &mut [f64], delete_value: f64) {
    for v in row.iter_mut() {
        if v.is_nan() {
            *v = delete_value;
        }
    }
}

// ============================================================
// 条目与时间步选择
// ============================================================

/// 条目选择方式
#[derive(Debug, Clone, Default)]
pub enum ItemSelection {
    /// 全部用户可见条目
    #[default]
    All,
    /// 按 0 基编号选择
    Numbers(Vec<usize>),
    /// 按名称选择（优先于编号）
    Names(Vec<String>),
}

/// 读取选择
#[derive(Debug, Clone, Default)]
pub struct ReadSelection {
    pub items: ItemSelection,
    /// 选择的时间步索引；None 为全部
    pub time_steps: Option<Vec<usize>>,
}

impl ReadSelection {
    /// 全部条目、全部时间步
    pub fn all() -> Self {
        Self::default()
    }

    /// 按 0 基编号选择条目
    pub fn by_numbers(numbers: Vec<usize>) -> Self {
        Self {
            items: ItemSelection::Numbers(numbers),
            time_steps: None,
        }
    }

    /// 按名称选择条目
    pub fn by_names<S: Into<String>>(names: Vec<S>) -> Self {
        Self {
            items: ItemSelection::Names(names.into_iter().map(Into::into).collect()),
            time_steps: None,
        }
    }

    /// 限定时间步
    pub fn with_time_steps(mut self, steps: Vec<usize>) -> Self {
        self.time_steps = Some(steps);
        self
    }
}

// ============================================================
// 创建参数
// ============================================================

/// 创建参数
#[derive(Debug, Clone)]
pub struct CreateParams {
    /// 起始时间；None 取当前 UTC 时刻
    pub start_time: Option<DateTime<Utc>>,
    /// 时间步长，乘以 `time_unit` 换算为秒
    pub dt: f64,
    pub time_unit: TimeStepUnit,
    /// 变量描述；None 时合成 "Item 1"…"Item N"（物理量未定义）
    pub items: Option<Vec<ItemInfo>>,
    pub title: Option<String>,
    /// 目标几何类型；创建操作仅支持 2D
    pub geometry: GeometryKind,
}

impl Default for CreateParams {
    fn default() -> Self {
        Self {
            start_time: None,
            dt: 1.0,
            time_unit: TimeStepUnit::Second,
            items: None,
            title: None,
            geometry: GeometryKind::Dfsu2D,
        }
    }
}

// ============================================================
// 顺序写游标
// ============================================================

/// 顺序写游标
///
/// 存储方只支持 "写下一条"；游标按 (时间步, 条目) 嵌套顺序推进，
/// 拒绝超出容量的写入，并在结束时校验记录数完整。
struct WriteCursor<W: ContainerWrite> {
    handle: W,
    delete_value: f64,
    capacity: usize,
    written: usize,
}

impl<W: ContainerWrite> WriteCursor<W> {
    fn new(handle: W, n_time_steps: usize, n_items: usize) -> Self {
        let delete_value = handle.delete_value();
        Self {
            handle,
            delete_value,
            capacity: n_time_steps * n_items,
            written: 0,
        }
    }

    /// 写入下一条记录（NaN 在此换回哨兵值）
    fn write_next(&mut self, row: &[f64]) -> FmResult<()> {
        if self.written >= self.capacity {
            return Err(FmError::WriteOverrun {
                capacity: self.capacity,
            });
        }

        let mut buf = row.to_vec();
        unmask_deleted(&mut buf, self.delete_value);
        self.handle.write_item_time_step_next(&buf)?;
        self.written += 1;
        Ok(())
    }

    /// 校验写满后落盘关闭
    fn finish(self) -> FmResult<()> {
        FmError::check_shape("写入记录数", self.capacity, self.written)?;
        self.handle.close()
    }
}

// ============================================================
// 会话对象
// ============================================================

/// 已打开容器的会话对象
///
/// 打开时缓存网格与元数据，此后的几何查询不再访问存储方；
/// 底层句柄在 [`Dfsu::open`] 返回前即已释放。
#[derive(Debug, Clone)]
pub struct DfsuFile {
    mesh: Mesh,
    items: Vec<ItemInfo>,
    geometry: GeometryKind,
    n_time_steps: usize,
    start_time: DateTime<Utc>,
}

impl DfsuFile {
    #[inline]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// 全部条目元数据（含 3D 变体的动态 Z 伪变量）
    #[inline]
    pub fn items(&self) -> &[ItemInfo] {
        &self.items
    }

    #[inline]
    pub fn geometry(&self) -> GeometryKind {
        self.geometry
    }

    #[inline]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// 容器的时间步数
    #[inline]
    pub fn n_time_steps(&self) -> usize {
        self.n_time_steps
    }

    /// 节点坐标（可按编码过滤）
    pub fn node_coordinates(&self, code: Option<i32>) -> FmResult<Vec<DVec3>> {
        self.mesh.node_coordinates(code)
    }

    /// 单元形心
    pub fn element_coordinates(&self) -> Vec<DVec3> {
        self.mesh.element_coordinates()
    }

    /// 最近单元索引
    pub fn find_closest_element_index(&self, x: f64, y: f64, z: Option<f64>) -> usize {
        self.mesh.find_closest_element(x, y, z)
    }

    /// 单元水平面积
    pub fn element_areas(&self) -> Vec<f64> {
        self.mesh.element_areas()
    }

    /// 是否经纬度网格
    pub fn is_geographic(&self) -> bool {
        self.mesh.is_geographic()
    }
}

// ============================================================
// 驱动入口
// ============================================================

/// 容器读写入口
pub struct Dfsu<D: ContainerDriver> {
    driver: D,
}

impl<D: ContainerDriver> Dfsu<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// 打开容器，缓存网格与元数据后释放句柄
    pub fn open(&self, path: &Path) -> FmResult<DfsuFile> {
        let handle = self.driver.open(path)?;
        let mesh = handle.mesh()?;

        Ok(DfsuFile {
            mesh,
            items: handle.items().to_vec(),
            geometry: handle.geometry_kind(),
            n_time_steps: handle.time_step_count(),
            start_time: handle.start_time(),
        })
    }

    /// 读取选定条目与时间步
    ///
    /// 3D 变体首条目为动态 Z 伪变量，用户可见编号自动偏移；
    /// 名称选择优先于编号选择。
    pub fn read(&self, path: &Path, selection: &ReadSelection) -> FmResult<Dataset> {
        let mut handle = self.driver.open(path)?;

        let offset = handle.geometry_kind().item_offset();
        if handle.item_count() < offset {
            return Err(FmError::unsupported_geometry(format!(
                "{:?} 容器缺少动态 Z 伪变量",
                handle.geometry_kind()
            )));
        }
        let n_user_items = handle.item_count() - offset;
        let nt = handle.time_step_count();
        let n_elements = handle.element_count();
        let delete_value = handle.delete_value();

        let item_numbers: Vec<usize> = match &selection.items {
            ItemSelection::All => (0..n_user_items).collect(),
            ItemSelection::Numbers(numbers) => {
                for &number in numbers {
                    if number >= n_user_items {
                        return Err(FmError::ItemOutOfRange {
                            index: number,
                            n_items: n_user_items,
                        });
                    }
                }
                numbers.clone()
            }
            ItemSelection::Names(names) => find_items(handle.items(), offset, names)?,
        };

        let time_steps: Vec<usize> = match &selection.time_steps {
            None => (0..nt).collect(),
            Some(steps) => {
                for &step in steps {
                    if step >= nt {
                        return Err(FmError::InvalidTimeStep {
                            index: step,
                            n_time_steps: nt,
                        });
                    }
                }
                steps.clone()
            }
        };

        // 每条目一个 (T, E) 数据块，一次分配，逐行填充
        let mut data: Vec<Array2<f64>> = (0..item_numbers.len())
            .map(|_| Array2::zeros((time_steps.len(), n_elements)))
            .collect();
        let mut elapsed = vec![0.0_f64; time_steps.len()];

        for (row, &step) in time_steps.iter().enumerate() {
            for (slot, &item) in item_numbers.iter().enumerate() {
                let (seconds, mut raw) = handle.read_item_time_step(item + offset + 1, step)?;
                FmError::check_shape("样本数组", n_elements, raw.len())?;

                mask_deleted(&mut raw, delete_value);
                for (dst, &src) in data[slot].row_mut(row).iter_mut().zip(raw.iter()) {
                    *dst = src;
                }
                elapsed[row] = seconds;
            }
        }

        let start_time = handle.start_time();
        let all_items = handle.items();
        let items: Vec<ItemInfo> = item_numbers
            .iter()
            .map(|&number| all_items[number + offset].clone())
            .collect();

        log::debug!(
            "读取完成: {} ({} 条目, {} 时间步, {} 单元)",
            path.display(),
            items.len(),
            time_steps.len(),
            n_elements
        );

        Dataset::new(items, time::time_axis(start_time, &elapsed), data)
    }

    /// 覆写既有容器的变量数据
    ///
    /// 容器的条目数、时间步数与单元数必须与 `data` 一致，
    /// 先校验后写入（[`FmError::ShapeMismatch`]）。
    pub fn write(&self, path: &Path, data: &[Array2<f64>]) -> FmResult<()> {
        let handle = self.driver.open_for_edit(path)?;

        let nt = handle.time_step_count();
        let n_items = handle.item_count();
        let n_elements = handle.element_count();

        validate_block_shapes(data, n_items, Some(nt), Some(n_elements))?;

        let mut cursor = WriteCursor::new(handle, nt, n_items);
        let mut row = vec![0.0_f64; n_elements];
        for step in 0..nt {
            // 嵌套 (时间步, 条目) 顺序与容器声明一致
            for block in data {
                for (dst, &src) in row.iter_mut().zip(block.row(step).iter()) {
                    *dst = src;
                }
                cursor.write_next(&row)?;
            }
        }
        cursor.finish()?;

        log::info!(
            "覆写完成: {} ({} 条目, {} 时间步)",
            path.display(),
            n_items,
            nt
        );
        Ok(())
    }

    /// 从网格定义创建新容器并写入数据
    ///
    /// 节点、编码、单元表与投影复制自网格；时间轴取
    /// `start_time`（缺省为当前时刻）与 `dt`/`time_unit`。
    /// 仅支持 2D 几何，3D 变体返回 [`FmError::UnsupportedGeometry`]；
    /// 目标不可写时返回 [`FmError::CreateFailed`]。
    pub fn create<M: MeshLoader>(
        &self,
        loader: &M,
        mesh_path: &Path,
        path: &Path,
        data: &[Array2<f64>],
        params: &CreateParams,
    ) -> FmResult<()> {
        if params.geometry != GeometryKind::Dfsu2D {
            return Err(FmError::unsupported_geometry(format!(
                "创建操作仅支持 2D 网格, 请求 {:?}",
                params.geometry
            )));
        }

        let n_items = data.len();
        if n_items == 0 {
            return Err(FmError::shape_mismatch("条目数", "至少 1", 0));
        }
        let (n_time_steps, n_elements) = data[0].dim();
        validate_block_shapes(data, n_items, None, None)?;

        let items = match &params.items {
            Some(items) => {
                FmError::check_shape("变量描述数", n_items, items.len())?;
                items.clone()
            }
            None => (1..=n_items)
                .map(|i| ItemInfo::new(format!("Item {i}")))
                .collect(),
        };

        let mesh = loader.load(mesh_path)?;
        FmError::check_shape("单元数", mesh.n_elements(), n_elements)?;

        let start_time = params.start_time.unwrap_or_else(Utc::now);
        let dt_seconds = params.time_unit.to_seconds(params.dt);

        // 头与几何复制自网格定义
        let x: Vec<f64> = mesh.nodes().iter().map(|n| n.x).collect();
        let y: Vec<f64> = mesh.nodes().iter().map(|n| n.y).collect();
        let z: Vec<f64> = mesh.nodes().iter().map(|n| n.z).collect();
        let element_table: Vec<Vec<usize>> = mesh
            .elements()
            .iter()
            .map(|e| e.nodes().iter().map(|&n| n + 1).collect())
            .collect();

        let mut builder = self.driver.builder();
        builder.set_nodes(&x, &y, &z, mesh.node_codes());
        builder.set_elements(&element_table);
        builder.set_projection(mesh.projection());
        builder.set_time_info(start_time, dt_seconds);
        builder.set_z_unit(EumUnit::Meter);
        if let Some(title) = &params.title {
            builder.set_title(title);
        }
        for item in &items {
            builder.add_dynamic_item(item.clone());
        }

        let handle = builder
            .create_file(path)
            .map_err(|e| FmError::create_failed(path, e.to_string()))?;

        let mut cursor = WriteCursor::new(handle, n_time_steps, n_items);
        let mut row = vec![0.0_f64; n_elements];
        for step in 0..n_time_steps {
            for block in data {
                for (dst, &src) in row.iter_mut().zip(block.row(step).iter()) {
                    *dst = src;
                }
                cursor.write_next(&row)?;
            }
        }
        cursor.finish()?;

        log::info!(
            "创建完成: {} ({} 条目, {} 时间步, {} 单元)",
            path.display(),
            n_items,
            n_time_steps,
            n_elements
        );
        Ok(())
    }
}

// ============================================================
// 内部辅助
// ============================================================

/// 按名称解析用户可见条目编号（0 基）
fn find_items(all: &[ItemInfo], offset: usize, names: &[String]) -> FmResult<Vec<usize>> {
    let visible = &all[offset..];
    names
        .iter()
        .map(|name| {
            visible
                .iter()
                .position(|item| item.name == *name)
                .ok_or_else(|| FmError::ItemNotFound {
                    name: name.clone(),
                    available: visible.iter().map(|item| item.name.clone()).collect(),
                })
        })
        .collect()
}

/// 校验数据块数量与形状一致
fn validate_block_shapes(
    data: &[Array2<f64>],
    n_items: usize,
    nt: Option<usize>,
    n_elements: Option<usize>,
) -> FmResult<()> {
    FmError::check_shape("条目数", n_items, data.len())?;

    let Some(first) = data.first() else {
        return Ok(());
    };
    let (t0, e0) = first.dim();

    if let Some(nt) = nt {
        FmError::check_shape("时间步数", nt, t0)?;
    }
    if let Some(ne) = n_elements {
        FmError::check_shape("单元数", ne, e0)?;
    }
    for block in data {
        if block.dim() != (t0, e0) {
            return Err(FmError::shape_mismatch(
                "数据块形状",
                format!("({t0}, {e0})"),
                format!("({}, {})", block.dim().0, block.dim().1),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_roundtrip() {
        let delete_value = 1.0e-35;
        let mut row = vec![1.0, delete_value, 2.5, delete_value];

        mask_deleted(&mut row, delete_value);
        assert_eq!(row[0], 1.0);
        assert!(row[1].is_nan());
        assert_eq!(row[2], 2.5);
        assert!(row[3].is_nan());

        unmask_deleted(&mut row, delete_value);
        assert_eq!(row, vec![1.0, delete_value, 2.5, delete_value]);
    }

    #[test]
    fn test_find_items_precedence_and_missing() {
        let all = vec![
            ItemInfo::new("Z coordinate"),
            ItemInfo::new("Salinity"),
            ItemInfo::new("Temperature"),
        ];

        // 偏移 1: 伪变量不可按名称命中
        let found = find_items(&all, 1, &["Temperature".into()]).unwrap();
        assert_eq!(found, vec![1]);

        let err = find_items(&all, 1, &["Z coordinate".into()]).unwrap_err();
        match err {
            FmError::ItemNotFound { name, available } => {
                assert_eq!(name, "Z coordinate");
                assert_eq!(available, vec!["Salinity", "Temperature"]);
            }
            other => panic!("意外错误: {other}"),
        }
    }

    #[test]
    fn test_validate_block_shapes() {
        let blocks = vec![
            Array2::<f64>::zeros((2, 3)),
            Array2::<f64>::zeros((2, 3)),
        ];
        assert!(validate_block_shapes(&blocks, 2, Some(2), Some(3)).is_ok());
        assert!(validate_block_shapes(&blocks, 3, Some(2), Some(3)).is_err());
        assert!(validate_block_shapes(&blocks, 2, Some(5), Some(3)).is_err());

        let ragged = vec![
            Array2::<f64>::zeros((2, 3)),
            Array2::<f64>::zeros((2, 4)),
        ];
        assert!(validate_block_shapes(&ragged, 2, None, None).is_err());
    }

    // 测试用可写句柄: 记录所有写入的行
    struct RecordingWriter {
        n_items: usize,
        n_time_steps: usize,
        n_elements: usize,
        rows: Vec<Vec<f64>>,
    }

    impl ContainerWrite for RecordingWriter {
        fn item_count(&self) -> usize {
            self.n_items
        }
        fn time_step_count(&self) -> usize {
            self.n_time_steps
        }
        fn element_count(&self) -> usize {
            self.n_elements
        }
        fn delete_value(&self) -> f64 {
            -99.0
        }
        fn write_item_time_step_next(&mut self, data: &[f64]) -> FmResult<()> {
            self.rows.push(data.to_vec());
            Ok(())
        }
        fn close(self) -> FmResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_cursor_rejects_overrun() {
        let writer = RecordingWriter {
            n_items: 1,
            n_time_steps: 1,
            n_elements: 2,
            rows: Vec::new(),
        };
        let mut cursor = WriteCursor::new(writer, 1, 1);

        cursor.write_next(&[1.0, 2.0]).unwrap();
        let err = cursor.write_next(&[3.0, 4.0]).unwrap_err();
        assert!(matches!(err, FmError::WriteOverrun { capacity: 1 }));
    }

    #[test]
    fn test_cursor_finish_requires_full_write() {
        let writer = RecordingWriter {
            n_items: 2,
            n_time_steps: 1,
            n_elements: 1,
            rows: Vec::new(),
        };
        let mut cursor = WriteCursor::new(writer, 1, 2);
        cursor.write_next(&[1.0]).unwrap();

        assert!(matches!(
            cursor.finish(),
            Err(FmError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_cursor_replaces_nan_with_sentinel() {
        let writer = RecordingWriter {
            n_items: 1,
            n_time_steps: 1,
            n_elements: 2,
            rows: Vec::new(),
        };
        let mut cursor = WriteCursor::new(writer, 1, 1);
        cursor.write_next(&[f64::NAN, 5.0]).unwrap();

        assert_eq!(cursor.handle.rows[0], vec![-99.0, 5.0]);
    }
}
