//! 错误类型定义

use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 字段值无法转换为声明的类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("字段 '{field}' 的值不合法: {value:?}")]
pub struct ValueError {
    pub field: String,
    pub value: String,
}

impl ValueError {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// 所有 facade 操作共用的错误根类型
#[derive(Debug, Error)]
pub enum Error {
    /// 调用方缺少必需的参数，进程尚未启动
    #[error("参数错误: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    InvalidValue(#[from] ValueError),

    /// choco 返回非零退出码
    #[error("命令执行失败 (exit={exit_code}): {command}")]
    ProcessFailed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("命令超时 ({timeout:?}): {command}")]
    Timeout { command: String, timeout: Duration },

    #[error("无法执行命令 '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("配置文件错误: {0}")]
    Config(String),
}

impl Error {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }

    pub fn is_invalid_value(&self) -> bool {
        matches!(self, Error::InvalidValue(_))
    }

    /// 非零退出时附带的 stdout / stderr
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            Error::ProcessFailed { stdout, stderr, .. } => Some((stdout.as_str(), stderr.as_str())),
            _ => None,
        }
    }
}
