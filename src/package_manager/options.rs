//! 各操作的选项
//!
//! 每个结构体列出该操作认识的固定选项，`options` 字段用于传递其余的
//! choco 参数、`--source` 选择以及执行参数。

use super::command::Options;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutdatedOptions {
    pub ignore_pinned: bool,
    pub ignore_unfound: bool,
    pub options: Options,
}

impl Default for OutdatedOptions {
    fn default() -> Self {
        Self {
            ignore_pinned: true,
            ignore_unfound: true,
            options: Options::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// 返回每个包的所有版本（结果按 id 聚合为列表）
    pub all_versions: bool,
    /// 精确匹配 id，只查询一页
    pub exact: bool,
    pub options: Options,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoOptions {
    pub local_only: bool,
    pub options: Options,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// 默认写入当前目录下的 packages.config
    pub output_file_path: Option<PathBuf>,
    pub include_version_numbers: bool,
    pub options: Options,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_file_path: None,
            include_version_numbers: true,
            options: Options::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    pub yes: bool,
    pub options: Options,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            yes: true,
            options: Options::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOptions {
    pub install_if_not_installed: bool,
    pub yes: bool,
    pub options: Options,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            install_if_not_installed: true,
            yes: true,
            options: Options::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallOptions {
    pub yes: bool,
    pub all_versions: bool,
    pub options: Options,
}

impl Default for UninstallOptions {
    fn default() -> Self {
        Self {
            yes: true,
            all_versions: false,
            options: Options::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackOptions {
    pub output_directory: Option<PathBuf>,
    pub options: Options,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOptions {
    pub yes: bool,
    pub options: Options,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            yes: true,
            options: Options::default(),
        }
    }
}
