//! Chocolatey (choco) 命令行的 Rust 封装
//!
//! - [`package_manager::CommandBuilder`] 负责拼装参数与提权
//! - [`package_manager::parser`] 解析 `--limit-output` 行和 `choco info` 详情块
//! - [`package_manager::Chocolatey`] 对外提供各个操作

pub mod config;
pub mod error;
pub mod package_manager;

pub use config::{ElevationMode, Settings};
pub use error::{Error, Result, ValueError};
pub use package_manager::Chocolatey;
