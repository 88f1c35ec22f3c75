use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::deleter::{DEFAULT_MARKER_SUFFIX, DeleterConfig};
use crate::error::CleanupError;
use crate::rules::DeletionRuleSet;

/// 默认的等待时间（秒），给自动恢复文件的工具留出时间
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 5;

/// 持久化设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rules: DeletionRuleSet,
    /// 两轮删除之间的等待时间（秒）
    pub settle_delay_secs: u64,
    /// 标记文件后缀
    pub marker_suffix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rules: DeletionRuleSet::default(),
            settle_delay_secs: DEFAULT_SETTLE_DELAY_SECS,
            marker_suffix: DEFAULT_MARKER_SUFFIX.to_string(),
        }
    }
}

impl Settings {
    /// 获取配置文件路径
    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("scrub").join("scrub.toml"))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn deleter_config(&self) -> DeleterConfig {
        DeleterConfig {
            marker_suffix: self.marker_suffix.clone(),
        }
    }
}

/// 从 TOML 文件加载配置
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T, CleanupError> {
    let content = std::fs::read_to_string(path).map_err(|source| CleanupError::SettingsRead {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| CleanupError::SettingsParse {
        path: path.to_path_buf(),
        source,
    })
}

/// 加载配置，文件不存在时使用默认值
///
/// 显式指定的路径必须存在；未指定时使用默认配置文件路径。
pub fn load_or_default<T>(explicit: Option<&Path>) -> Result<T, CleanupError>
where
    T: DeserializeOwned + Default,
{
    if let Some(path) = explicit {
        let value = load_toml(path)?;
        info!("已加载配置文件: {:?}", path);
        return Ok(value);
    }

    if let Some(path) = Settings::config_file_path() {
        if path.exists() {
            let value = load_toml(&path)?;
            info!("已加载配置文件: {:?}", path);
            return Ok(value);
        }
    }

    info!("使用默认配置");
    Ok(T::default())
}
