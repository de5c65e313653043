use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    eligibility::{EligibilityConfig, RecyclingConfig},
    observability::ObservabilityConfig,
    scheduling::{PlatformWindowConfig, SchedulerConfig},
};

/// 默认配置文件查找路径
const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/publisher.toml",
    "publisher.toml",
    "/etc/publisher/config.toml",
];

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub eligibility: EligibilityConfig,
    pub recycling: RecyclingConfig,
    pub platforms: PlatformWindowConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Built-in defaults (`#[serde(default)]` on every section)
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: `PUBLISHER`, separator: `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("PUBLISHER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate().context("调度配置验证失败")?;
        self.eligibility
            .validate()
            .context("回收资格配置验证失败")?;
        self.recycling.validate().context("回收频率配置验证失败")?;
        self.platforms
            .validate()
            .context("平台时间窗口配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.eligibility.minimum_age_months, 6);
        assert_eq!(config.recycling.durable.max_recycles, 4);
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let toml_str = r#"
            [eligibility]
            minimum_age_months = 3
            high_threshold = 80.0

            [platforms]
            twitter = "0 30 9 * * *"
        "#;

        let config = AppConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.eligibility.minimum_age_months, 3);
        assert_eq!(config.eligibility.high_threshold, 80.0);
        assert_eq!(config.eligibility.low_threshold, 50.0);
        assert_eq!(config.platforms.twitter, "0 30 9 * * *");
        assert_eq!(config.platforms.facebook, "0 0 9,13,17 * * *");
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let toml_str = r#"
            [eligibility]
            high_threshold = 40.0
            low_threshold = 60.0
        "#;
        assert!(AppConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_invalid_platform_window_rejected() {
        let toml_str = r#"
            [platforms]
            instagram = "not a cron"
        "#;
        assert!(AppConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_processing_timeout_bounds() {
        assert!(AppConfig::from_toml("[scheduler]\nprocessing_timeout_seconds = 0").is_err());
        assert!(AppConfig::from_toml("[scheduler]\nprocessing_timeout_seconds = 604800").is_ok());
        assert!(AppConfig::from_toml("[scheduler]\nprocessing_timeout_seconds = 604801").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[scheduler]\ndispatch_interval_seconds = 5\n\n[recycling.durable]\nfrequency_days = 14\nmax_recycles = 2"
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.scheduler.dispatch_interval_seconds, 5);
        assert_eq!(config.recycling.durable.frequency_days, 14);
        assert_eq!(config.recycling.durable.max_recycles, 2);
        assert_eq!(config.recycling.pure_evergreen.max_recycles, 6);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/nonexistent/publisher.toml")).is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_windows() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.platforms.instagram, config.platforms.instagram);
    }
}
