use serde::{Deserialize, Serialize};

/// 常青内容判定阈值
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EligibilityConfig {
    /// 内容发布后至少经过的月数
    pub minimum_age_months: u32,
    /// 判定为纯常青内容的表现分下限
    pub high_threshold: f64,
    /// 判定为耐用内容的表现分下限
    pub low_threshold: f64,
    /// 季节性内容在周年前后可复用的月数
    pub season_window_months: u32,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            minimum_age_months: 6,
            high_threshold: 75.0,
            low_threshold: 50.0,
            season_window_months: 1,
        }
    }
}

impl EligibilityConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("high_threshold", self.high_threshold),
            ("low_threshold", self.low_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(anyhow::anyhow!("{} 必须在0到100之间: {}", name, value));
            }
        }

        if self.low_threshold > self.high_threshold {
            return Err(anyhow::anyhow!(
                "low_threshold ({}) 不能大于 high_threshold ({})",
                self.low_threshold,
                self.high_threshold
            ));
        }

        Ok(())
    }
}

/// 单一回收类型的频率与上限
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecycleLimits {
    pub frequency_days: u32,
    pub max_recycles: u32,
}

impl RecycleLimits {
    fn validate(&self, name: &str) -> anyhow::Result<()> {
        if self.frequency_days == 0 {
            return Err(anyhow::anyhow!("{} 的回收频率必须大于0天", name));
        }
        if self.max_recycles == 0 {
            return Err(anyhow::anyhow!("{} 的最大回收次数必须大于0", name));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RecyclingConfig {
    pub pure_evergreen: RecycleLimits,
    pub seasonal_evergreen: RecycleLimits,
    pub durable: RecycleLimits,
}

impl Default for RecyclingConfig {
    fn default() -> Self {
        Self {
            pure_evergreen: RecycleLimits {
                frequency_days: 30,
                max_recycles: 6,
            },
            seasonal_evergreen: RecycleLimits {
                frequency_days: 365,
                max_recycles: 3,
            },
            durable: RecycleLimits {
                frequency_days: 60,
                max_recycles: 4,
            },
        }
    }
}

impl RecyclingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.pure_evergreen.validate("pure_evergreen")?;
        self.seasonal_evergreen.validate("seasonal_evergreen")?;
        self.durable.validate("durable")?;
        Ok(())
    }
}
