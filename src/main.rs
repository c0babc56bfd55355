mod cli;

use anyhow::{Context, Result};
use chocolatey::{Chocolatey, Settings};
use clap::Parser;

fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Cli::parse();

    // 加载配置：命令行指定的文件 > 默认位置 > 内置默认值
    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("无法加载配置 {}", path.display()))?,
        None => Settings::load_or_default()?,
    };
    if args.source.is_some() {
        settings.default_source = args.source.clone();
    }
    if let Some(secs) = args.timeout {
        settings.timeout_secs = Some(secs);
    }
    log::debug!("choco: {}", settings.executable.display());

    let choco = Chocolatey::from_settings(&settings);
    cli::run(&choco, args.json, args.command)
}
