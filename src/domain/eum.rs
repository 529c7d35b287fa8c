// src/domain/eum.rs

//! 动态变量的物理量元数据
//!
//! 每个动态变量携带名称、物理量类型与单位，既作为读取结果的
//! 元数据，也作为创建容器时的变量声明。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 物理量类型（海岸水动力常用子集）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EumType {
    WaterLevel,
    SurfaceElevation,
    CurrentSpeed,
    CurrentDirection,
    Discharge,
    Temperature,
    Salinity,
    Undefined,
}

impl EumType {
    /// 物理量的默认单位
    pub fn default_unit(self) -> EumUnit {
        match self {
            Self::WaterLevel | Self::SurfaceElevation => EumUnit::Meter,
            Self::CurrentSpeed => EumUnit::MeterPerSecond,
            Self::CurrentDirection => EumUnit::Degree,
            Self::Discharge => EumUnit::CubicMeterPerSecond,
            Self::Temperature => EumUnit::DegreeCelsius,
            Self::Salinity => EumUnit::Psu,
            Self::Undefined => EumUnit::Undefined,
        }
    }
}

impl Default for EumType {
    fn default() -> Self {
        Self::Undefined
    }
}

/// 单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EumUnit {
    Meter,
    MeterPerSecond,
    Degree,
    CubicMeterPerSecond,
    DegreeCelsius,
    Psu,
    Undefined,
}

impl Default for EumUnit {
    fn default() -> Self {
        Self::Undefined
    }
}

/// 动态变量描述（名称 + 物理量 + 单位）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub name: String,
    pub item_type: EumType,
    pub unit: EumUnit,
}

impl ItemInfo {
    /// 未定义物理量的变量描述
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_type: EumType::Undefined,
            unit: EumUnit::Undefined,
        }
    }

    /// 带物理量的变量描述，单位取物理量默认单位
    pub fn with_type(name: impl Into<String>, item_type: EumType) -> Self {
        Self {
            name: name.into(),
            item_type,
            unit: item_type.default_unit(),
        }
    }

    /// 完整指定的变量描述
    pub fn with_unit(name: impl Into<String>, item_type: EumType, unit: EumUnit) -> Self {
        Self {
            name: name.into(),
            item_type,
            unit,
        }
    }
}

impl fmt::Display for ItemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{:?}, {:?}>", self.name, self.item_type, self.unit)
    }
}
