// src/io/traits.rs

//! 存储方与网格来源的窄接口
//!
//! 核心只消费这些 trait，不实现任何容器二进制格式内部；
//! [`crate::io::snapshot::SnapshotDriver`] 提供随库的参考实现。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::eum::{EumUnit, ItemInfo};
use crate::domain::mesh::Mesh;
use crate::infra::error::FmResult;

/// 容器几何类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    /// 2D 柔性网格
    Dfsu2D,
    /// 3D sigma 分层
    Dfsu3DSigma,
    /// 3D sigma-z 混合分层
    Dfsu3DSigmaZ,
}

impl GeometryKind {
    /// 用户可见条目的编号偏移
    ///
    /// 3D 变体的首个条目为动态 Z 伪变量，用户可见条目整体后移一位。
    #[inline]
    pub fn item_offset(self) -> usize {
        match self {
            Self::Dfsu2D => 0,
            Self::Dfsu3DSigma | Self::Dfsu3DSigmaZ => 1,
        }
    }
}

/// 只读容器句柄
///
/// 句柄离开作用域即释放底层资源（RAII）。
pub trait ContainerRead {
    /// 容器内全部条目数（3D 变体含动态 Z 伪变量）
    fn item_count(&self) -> usize;

    fn time_step_count(&self) -> usize;

    fn element_count(&self) -> usize;

    /// 容器的缺失值哨兵
    fn delete_value(&self) -> f64;

    fn start_time(&self) -> DateTime<Utc>;

    fn geometry_kind(&self) -> GeometryKind;

    /// 全部条目元数据，与容器条目一一对应（含伪变量）
    fn items(&self) -> &[ItemInfo];

    /// 容器携带的网格定义
    fn mesh(&self) -> FmResult<Mesh>;

    /// 读取一个条目在一个时间步的原始样本
    ///
    /// `item_number` 为 1 基（存储方原生编号）；
    /// 返回 (该步经过秒数, 原始样本数组)，哨兵值不在此转换。
    fn read_item_time_step(
        &mut self,
        item_number: usize,
        time_step: usize,
    ) -> FmResult<(f64, Vec<f64>)>;
}

/// 可写容器句柄
///
/// 存储方只支持严格顺序写；随机访问写不存在。
pub trait ContainerWrite {
    fn item_count(&self) -> usize;

    fn time_step_count(&self) -> usize;

    fn element_count(&self) -> usize;

    fn delete_value(&self) -> f64;

    /// 追加下一条 (时间步, 条目) 记录
    fn write_item_time_step_next(&mut self, data: &[f64]) -> FmResult<()>;

    /// 落盘并关闭
    ///
    /// 显式关闭以便上报持久化错误；未关闭即丢弃句柄不产生输出。
    fn close(self) -> FmResult<()>;
}

/// 新容器构建器（头与几何先声明，再创建文件）
pub trait ContainerBuilder {
    type Output: ContainerWrite;

    fn set_nodes(&mut self, x: &[f64], y: &[f64], z: &[f64], code: &[i32]);

    /// 单元表为 1 基节点编号（存储方原生表示）
    fn set_elements(&mut self, element_table: &[Vec<usize>]);

    fn set_projection(&mut self, projection: &str);

    fn set_time_info(&mut self, start_time: DateTime<Utc>, dt_seconds: f64);

    fn set_z_unit(&mut self, unit: EumUnit);

    fn add_dynamic_item(&mut self, item: ItemInfo);

    fn set_title(&mut self, title: &str);

    /// 创建目标文件并返回可写句柄
    fn create_file(self, path: &Path) -> FmResult<Self::Output>;
}

/// 存储驱动（容器格式提供方）
pub trait ContainerDriver: Send + Sync {
    type Read: ContainerRead;
    type Write: ContainerWrite;
    type Builder: ContainerBuilder<Output = Self::Write>;

    fn open(&self, path: &Path) -> FmResult<Self::Read>;

    /// 以覆写模式打开既有容器
    fn open_for_edit(&self, path: &Path) -> FmResult<Self::Write>;

    fn builder(&self) -> Self::Builder;
}

/// 网格定义来源（几何提供方）
pub trait MeshLoader: Send + Sync {
    fn load(&self, path: &Path) -> FmResult<Mesh>;

    fn supports_extension(&self, ext: &str) -> bool;
}
