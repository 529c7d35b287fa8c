// src/lib.rs

//! FlexMesh 柔性网格时间序列库
//!
//! 读取、覆写、创建非结构化柔性网格时间序列容器，并提供网格几何查询
//! （单元形心、单元面积、最近单元查找、经纬度网格识别）。
//!
//! # 核心类型
//!
//! - [`Mesh`]: 不可变非结构化网格（节点、单元、节点编码、投影）
//! - [`Dataset`]: 读写单元（变量描述 + 时间轴 + 数据块）
//! - [`Dfsu`]: 容器读写驱动入口
//! - [`DfsuFile`]: 已打开容器的会话对象，承载几何查询
//!
//! # 模块结构
//!
//! - [`infra`]: 错误、时间、日志基础设施
//! - [`domain`]: 网格与数据集数据模型
//! - [`geo`]: 几何算法与空间索引
//! - [`io`]: 存储方接口与参考实现
//!
//! 容器二进制格式由存储驱动（[`io::traits::ContainerDriver`]）提供，
//! 本库只消费其窄接口；[`SnapshotDriver`] 是随库提供的参考驱动。

pub mod domain;
pub mod geo;
pub mod infra;
pub mod io;

pub use domain::dataset::Dataset;
pub use domain::eum::{EumType, EumUnit, ItemInfo};
pub use domain::mesh::{Element, Mesh, MeshStatistics};
pub use geo::spatial_index::MeshSpatialIndex;
pub use infra::error::{FmError, FmResult};
pub use infra::time::TimeStepUnit;
pub use io::dfsu::{CreateParams, Dfsu, DfsuFile, ItemSelection, ReadSelection};
pub use io::mesh_loader::TextMeshLoader;
pub use io::snapshot::SnapshotDriver;
pub use io::traits::{
    ContainerBuilder, ContainerDriver, ContainerRead, ContainerWrite, GeometryKind, MeshLoader,
};
