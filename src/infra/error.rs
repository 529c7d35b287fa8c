// src/infra/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type FmResult<T> = Result<T, FmError>;

/// FlexMesh 错误类型
#[derive(Debug, Error)]
pub enum FmError {
    #[error("IO 错误 ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("容器打开失败 ({path}): {message}")]
    ContainerOpen { path: PathBuf, message: String },

    #[error("容器创建失败 ({path}): {message}")]
    CreateFailed { path: PathBuf, message: String },

    #[error("变量未找到: '{name}' (可用变量: {available:?})")]
    ItemNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("条目编号越界: {index}, 容器条目数 {n_items}")]
    ItemOutOfRange { index: usize, n_items: usize },

    #[error("节点编码 {code} 不存在 (有效编码: {valid:?})")]
    InvalidCode { code: i32, valid: Vec<i32> },

    #[error("形状不匹配: {name} 期望 {expected}, 实际 {actual}")]
    ShapeMismatch {
        name: &'static str,
        expected: String,
        actual: String,
    },

    #[error("不支持的几何类型: {message}")]
    UnsupportedGeometry { message: String },

    #[error("网格错误: {message}")]
    InvalidMesh { message: String },

    #[error("时间步索引越界: {index} >= {n_time_steps}")]
    InvalidTimeStep { index: usize, n_time_steps: usize },

    #[error("顺序写入越界: 容器容量 {capacity} 条记录已写满")]
    WriteOverrun { capacity: usize },

    #[error("序列化错误: {0}")]
    Serialization(String),
}

impl FmError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn container_open(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ContainerOpen {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn create_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CreateFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    pub fn shape_mismatch(
        name: &'static str,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::ShapeMismatch {
            name,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn unsupported_geometry(message: impl Into<String>) -> Self {
        Self::UnsupportedGeometry {
            message: message.into(),
        }
    }

    /// 校验两个长度一致，失败时返回 [`FmError::ShapeMismatch`]
    #[inline]
    pub fn check_shape(name: &'static str, expected: usize, actual: usize) -> FmResult<()> {
        if expected != actual {
            Err(Self::shape_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }
}

impl From<std::io::Error> for FmError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            context: "IO 操作".into(),
            source: e,
        }
    }
}

impl From<bincode::Error> for FmError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
