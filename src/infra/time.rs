// src/infra/time.rs

//! 时间步单位与时间轴推导
//!
//! 容器按 "起始时间 + 各步经过秒数" 记录时间轴；内部统一使用 UTC。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 时间步单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeStepUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeStepUnit {
    /// 单位对应的秒数
    #[inline]
    pub fn seconds_per_unit(self) -> f64 {
        match self {
            Self::Second => 1.0,
            Self::Minute => 60.0,
            Self::Hour => 3600.0,
            Self::Day => 86400.0,
        }
    }

    /// 将步长换算为秒 (如 dt=5.5, 单位 Minute → 330 秒)
    #[inline]
    pub fn to_seconds(self, dt: f64) -> f64 {
        dt * self.seconds_per_unit()
    }
}

impl Default for TimeStepUnit {
    fn default() -> Self {
        Self::Second
    }
}

/// 基准时间偏移经过秒数（毫秒精度）
#[inline]
pub fn offset_by_seconds(base: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    base + Duration::milliseconds((seconds * 1000.0) as i64)
}

/// 由起始时间与各步经过秒数推导绝对时间轴
pub fn time_axis(start: DateTime<Utc>, elapsed: &[f64]) -> Vec<DateTime<Utc>> {
    elapsed
        .iter()
        .map(|&seconds| offset_by_seconds(start, seconds))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unit_conversion() {
        assert_eq!(TimeStepUnit::Second.to_seconds(2.0), 2.0);
        assert_eq!(TimeStepUnit::Minute.to_seconds(5.5), 330.0);
        assert_eq!(TimeStepUnit::Hour.to_seconds(1.0), 3600.0);
        assert_eq!(TimeStepUnit::Day.to_seconds(0.5), 43200.0);
    }

    #[test]
    fn test_time_axis() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let axis = time_axis(start, &[0.0, 60.0, 120.0]);

        assert_eq!(axis.len(), 3);
        assert_eq!(axis[0], start);
        assert_eq!(axis[1], start + Duration::seconds(60));
        assert!(axis.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_fractional_seconds() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let t = offset_by_seconds(start, 1.5);
        assert_eq!(t, start + Duration::milliseconds(1500));
    }
}
