//! 进程执行

use super::command::Invocation;
use super::types::CommandResult;
use crate::error::{Error, Result};
use std::time::{Duration, Instant};

/// 执行一次准备好的调用并收集输出
///
/// 实现不检查退出码；是否把非零退出视为错误由调用方根据 `exec.check` 决定。
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<CommandResult>;
}

/// 基于 duct 的实现
#[derive(Debug, Clone)]
pub struct DuctRunner {
    poll_interval: Duration,
}

impl Default for DuctRunner {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl DuctRunner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandRunner for DuctRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandResult> {
        let command_line = invocation.command_line();
        let exec = &invocation.exec;
        log::debug!("执行: {}", command_line);

        let mut expr = duct::cmd(invocation.program.as_path(), &invocation.args).unchecked();
        if exec.capture_output {
            expr = expr.stdout_capture().stderr_capture();
        }
        if let Some(dir) = &exec.cwd {
            expr = expr.dir(dir);
        }
        for (name, value) in &exec.env {
            expr = expr.env(name, value);
        }
        if let Some(input) = &exec.input {
            expr = expr.stdin_bytes(input.as_bytes().to_vec());
        }

        let io_error = |source: std::io::Error| Error::Io {
            command: command_line.clone(),
            source,
        };

        let handle = expr.start().map_err(io_error)?;
        let output = match exec.timeout {
            None => handle.wait().map_err(io_error)?.clone(),
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(output) = handle.try_wait().map_err(io_error)? {
                        break output.clone();
                    }
                    if Instant::now() >= deadline {
                        if let Err(e) = handle.kill() {
                            log::warn!("终止超时进程失败: {}", e);
                        }
                        return Err(Error::Timeout {
                            command: command_line.clone(),
                            timeout,
                        });
                    }
                    std::thread::sleep(self.poll_interval);
                }
            }
        };

        let result = CommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        log::debug!("退出码: {} ({})", result.exit_code, command_line);
        Ok(result)
    }
}
