// src/domain/dataset.rs

//! 数据集: 读写操作的内存单元

use chrono::{DateTime, Utc};
use ndarray::Array2;

use crate::domain::eum::ItemInfo;
use crate::infra::error::{FmError, FmResult};

/// 数据集
///
/// `data[i]` 与 `items[i]` 一一对应，每块形状统一为 (时间步数, 单元数)。
/// 缺失样本在内存中一律以 NaN 表示；容器哨兵值不会出现在这里。
#[derive(Debug, Clone)]
pub struct Dataset {
    items: Vec<ItemInfo>,
    time: Vec<DateTime<Utc>>,
    data: Vec<Array2<f64>>,
}

impl Dataset {
    /// 构建并校验数据集
    ///
    /// 校验条目数与数据块数一致、所有块形状一致、
    /// 首维与时间轴长度一致；失败返回 [`FmError::ShapeMismatch`]。
    pub fn new(
        items: Vec<ItemInfo>,
        time: Vec<DateTime<Utc>>,
        data: Vec<Array2<f64>>,
    ) -> FmResult<Self> {
        FmError::check_shape("条目数", items.len(), data.len())?;

        if let Some(first) = data.first() {
            let (nt, n_elements) = first.dim();
            FmError::check_shape("时间步数", time.len(), nt)?;
            for block in &data {
                if block.dim() != (nt, n_elements) {
                    return Err(FmError::shape_mismatch(
                        "数据块形状",
                        format!("({nt}, {n_elements})"),
                        format!("({}, {})", block.dim().0, block.dim().1),
                    ));
                }
            }
        }

        Ok(Self { items, time, data })
    }

    #[inline]
    pub fn items(&self) -> &[ItemInfo] {
        &self.items
    }

    #[inline]
    pub fn time(&self) -> &[DateTime<Utc>] {
        &self.time
    }

    #[inline]
    pub fn data(&self) -> &[Array2<f64>] {
        &self.data
    }

    /// 条目数
    #[inline]
    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// 时间步数
    #[inline]
    pub fn n_time_steps(&self) -> usize {
        self.time.len()
    }

    /// 每条目的单元数
    pub fn n_elements(&self) -> usize {
        self.data.first().map(|block| block.dim().1).unwrap_or(0)
    }

    /// 按名称取数据块
    pub fn item_by_name(&self, name: &str) -> FmResult<&Array2<f64>> {
        self.items
            .iter()
            .position(|item| item.name == name)
            .map(|idx| &self.data[idx])
            .ok_or_else(|| FmError::ItemNotFound {
                name: name.into(),
                available: self.items.iter().map(|item| item.name.clone()).collect(),
            })
    }
}
