use crate::error::{Error, Result};
use crate::package_manager::command::{FixedPrivilege, PrivilegePolicy, SystemPrivilege};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 提权方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationMode {
    /// 检测当前进程权限
    #[default]
    Auto,
    /// 需要提权的命令总是经由启动器执行
    Always,
    /// 从不使用启动器
    Never,
}

impl ElevationMode {
    pub fn policy(self) -> Box<dyn PrivilegePolicy> {
        match self {
            ElevationMode::Auto => Box::new(SystemPrivilege),
            ElevationMode::Always => Box::new(FixedPrivilege { elevated: false }),
            ElevationMode::Never => Box::new(FixedPrivilege { elevated: true }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// choco 可执行文件
    pub executable: PathBuf,
    /// 提权启动器，以 choco 路径作为第一个参数
    pub launcher: PathBuf,
    /// 未显式指定 `--source` 时使用的包源
    pub default_source: Option<String>,
    /// 同一 id 的多条记录是否全部保留
    pub allow_multiple: bool,
    pub timeout_secs: Option<u64>,
    pub elevation: ElevationMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            launcher: PathBuf::from(if cfg!(windows) { "gsudo" } else { "sudo" }),
            default_source: None,
            allow_multiple: false,
            timeout_secs: None,
            elevation: ElevationMode::Auto,
        }
    }
}

fn default_executable() -> PathBuf {
    if cfg!(windows) {
        let data = std::env::var("ProgramData").unwrap_or_else(|_| "C:\\ProgramData".to_string());
        PathBuf::from(data).join("chocolatey").join("bin").join("choco.exe")
    } else {
        PathBuf::from("choco")
    }
}

impl Settings {
    /// 默认位置：`~/.config/chocolatey-rs/config.toml`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/chocolatey-rs/config.toml")
    }

    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        log::debug!("已加载配置 {}", path.display());
        Ok(settings)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
