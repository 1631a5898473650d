//! 设置存储
//!
//! 只持久化保护开关。启动时读取，切换时写回。

use std::cell::Cell;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::moderation::error::ModerationResult;

pub trait SettingsStore {
    /// 读取保护开关；从未保存过时返回 `None`
    fn load_enabled(&self) -> ModerationResult<Option<bool>>;

    fn save_enabled(&self, enabled: bool) -> ModerationResult<()>;
}

/// 内存设置
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    enabled: Cell<Option<bool>>,
}

impl MemorySettingsStore {
    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled: Cell::new(Some(enabled)),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load_enabled(&self) -> ModerationResult<Option<bool>> {
        Ok(self.enabled.get())
    }

    fn save_enabled(&self, enabled: bool) -> ModerationResult<()> {
        self.enabled.set(Some(enabled));
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    enabled: Option<bool>,
}

/// JSON 文件设置
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load_enabled(&self) -> ModerationResult<Option<bool>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let settings: SettingsFile = serde_json::from_str(&content)?;
        Ok(settings.enabled)
    }

    fn save_enabled(&self, enabled: bool) -> ModerationResult<()> {
        let settings = SettingsFile {
            enabled: Some(enabled),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&settings)?)?;
        Ok(())
    }
}
