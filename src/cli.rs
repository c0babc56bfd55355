//! 命令行入口：把子命令映射到 [`Chocolatey`] 的操作

use anyhow::{bail, Result};
use chocolatey::package_manager::{
    ConfigValue, ExportOptions, InfoOptions, InstallOptions, Options, OutdatedOptions,
    PackOptions, PushOptions, RecordMap, SearchOptions, UninstallOptions, UpgradeOptions,
};
use chocolatey::Chocolatey;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "chocolatey-rs",
    version,
    about = "Chocolatey 包管理器的命令行封装",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// 默认包源
    #[arg(long, global = true)]
    pub source: Option<String>,

    /// 以 JSON 输出结果
    #[arg(long, global = true)]
    pub json: bool,

    /// 配置文件路径（默认 ~/.config/chocolatey-rs/config.toml）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 单次调用超时（秒）
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// 显示 choco 版本
    Version,
    /// 显示 choco 或某个子命令的帮助
    Help { command: Option<String> },
    /// 显示许可证信息
    License,
    /// 显示支持信息
    Support,
    /// 列出本地已安装的包
    List { filters: Vec<String> },
    /// 列出可升级的包
    Outdated {
        /// 包含已 pin 的包
        #[arg(long)]
        include_pinned: bool,
    },
    /// 搜索包
    #[command(alias = "find")]
    Search {
        filter: Option<String>,
        #[arg(long)]
        all_versions: bool,
        #[arg(long)]
        exact: bool,
    },
    /// 显示包详情
    Info {
        id: String,
        #[arg(long)]
        local_only: bool,
    },
    /// 安装包
    Install {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// 升级包
    Upgrade {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// 卸载包
    Uninstall {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        all_versions: bool,
    },
    /// 导出已安装包列表
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// 管理 pin
    Pin {
        #[command(subcommand)]
        action: PinAction,
    },
    /// 管理配置
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// 管理包源
    #[command(alias = "sources")]
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
    /// 管理 feature
    #[command(alias = "features")]
    Feature {
        #[command(subcommand)]
        action: FeatureAction,
    },
    /// 管理 API key
    #[command(alias = "setapikey")]
    Apikey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },
    /// 查看模板
    #[command(alias = "templates")]
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
    /// 本地 HTTP 缓存
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// 打包 nuspec
    Pack {
        nuspec: Option<PathBuf>,
        #[arg(long)]
        output_directory: Option<PathBuf>,
    },
    /// 推送 nupkg
    Push { nupkg: Option<PathBuf> },
    /// 生成新包模板
    New {
        id: String,
        /// `key=value` 形式的模板属性
        properties: Vec<String>,
    },
    /// 原样调用 choco
    Raw {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum PinAction {
    List,
    Add { id: String },
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    List,
    Get { name: String },
    Set { name: String, value: String },
    Unset { name: String },
}

#[derive(Subcommand)]
pub enum SourceAction {
    List,
    Add { name: String, url: String },
    Enable { name: String },
    Disable { name: String },
    Remove { name: String },
}

#[derive(Subcommand)]
pub enum FeatureAction {
    List,
    Get { name: String },
    Enable { name: String },
    Disable { name: String },
}

#[derive(Subcommand)]
pub enum ApiKeyAction {
    List,
    Add { url: String, key: String },
    Remove { url: String },
}

#[derive(Subcommand)]
pub enum TemplateAction {
    List,
    Info { name: String },
}

#[derive(Subcommand)]
pub enum CacheAction {
    List,
    Remove,
}

pub fn run(choco: &Chocolatey, json: bool, command: Command) -> Result<()> {
    let none = Options::new();
    match command {
        Command::Version => println!("{}", choco.version()?),
        Command::Help { command } => print!("{}", choco.help(command.as_deref())?),
        Command::License => print!("{}", choco.license(&none)?),
        Command::Support => print!("{}", choco.support(&none)?),
        Command::List { filters } => {
            let filters: Vec<&str> = filters.iter().map(String::as_str).collect();
            let packages = choco.installed(&filters, &none)?;
            print_records(json, &packages, |p| format!("{} {}", p.id, p.version))?;
        }
        Command::Outdated { include_pinned } => {
            let opts = OutdatedOptions {
                ignore_pinned: !include_pinned,
                ..OutdatedOptions::default()
            };
            let packages = choco.outdated(&opts)?;
            print_records(json, &packages, |p| {
                let available = p.available_version.as_deref().unwrap_or("?");
                let pin = if p.pinned { " [pinned]" } else { "" };
                format!("{} {} -> {}{}", p.id, p.version, available, pin)
            })?;
        }
        Command::Search {
            filter,
            all_versions,
            exact,
        } => {
            let opts = SearchOptions {
                all_versions,
                exact,
                options: Options::new(),
            };
            let packages = choco.search(filter.as_deref(), &opts)?;
            print_records(json, &packages, |p| format!("{} {}", p.id, p.version))?;
        }
        Command::Info { id, local_only } => {
            let opts = InfoOptions {
                local_only,
                options: Options::new(),
            };
            match choco.info(&id, &opts)? {
                Some(info) if json => println!("{}", serde_json::to_string_pretty(&info)?),
                Some(info) => {
                    println!("{} {}", info.id, info.version);
                    for (label, value) in [
                        ("Title", &info.title),
                        ("Published", &info.published),
                        ("Summary", &info.summary),
                        ("Description", &info.description),
                    ] {
                        if !value.is_empty() {
                            println!("  {label}: {value}");
                        }
                    }
                }
                None => bail!("未找到包 {id}"),
            }
        }
        Command::Install { ids } => {
            choco.install(&as_strs(&ids), &InstallOptions::default())?;
        }
        Command::Upgrade { ids } => {
            choco.upgrade(&as_strs(&ids), &UpgradeOptions::default())?;
        }
        Command::Uninstall { ids, all_versions } => {
            let opts = UninstallOptions {
                all_versions,
                ..UninstallOptions::default()
            };
            choco.uninstall(&as_strs(&ids), &opts)?;
        }
        Command::Export { output } => {
            let opts = ExportOptions {
                output_file_path: output,
                ..ExportOptions::default()
            };
            choco.export(&opts)?;
        }
        Command::Pin { action } => match action {
            PinAction::List => {
                let packages = choco.pinned(&none)?;
                print_records(json, &packages, |p| format!("{} {}", p.id, p.version))?;
            }
            PinAction::Add { id } => choco.pin_add(&id, &none)?,
            PinAction::Remove { id } => choco.pin_remove(&id, &none)?,
        },
        Command::Config { action } => match action {
            ConfigAction::List => {
                let entries = choco.config(&none)?;
                print_records(json, &entries, |c| {
                    let value = c.value.as_ref().map(|v| v.to_string()).unwrap_or_default();
                    format!("{} = {}", c.name, value)
                })?;
            }
            ConfigAction::Get { name } => println!("{}", choco.config_get(&name, &none)?),
            ConfigAction::Set { name, value } => {
                choco.config_set(&name, Some(ConfigValue::from_raw(&value)), &none)?
            }
            ConfigAction::Unset { name } => choco.config_unset(&name, &none)?,
        },
        Command::Source { action } => match action {
            SourceAction::List => {
                let sources = choco.sources(&none)?;
                print_records(json, &sources, |s| {
                    let state = if s.disabled { " (disabled)" } else { "" };
                    format!("{} - {} | priority {}{}", s.name, s.value, s.priority, state)
                })?;
            }
            SourceAction::Add { name, url } => choco.source_add(&name, &url, &none)?,
            SourceAction::Enable { name } => choco.source_enable(&name, &none)?,
            SourceAction::Disable { name } => choco.source_disable(&name, &none)?,
            SourceAction::Remove { name } => choco.source_remove(&name, &none)?,
        },
        Command::Feature { action } => match action {
            FeatureAction::List => {
                let features = choco.features(&none)?;
                print_records(json, &features, |f| {
                    let mark = if f.enabled { "x" } else { " " };
                    format!("[{}] {} - {}", mark, f.name, f.description)
                })?;
            }
            FeatureAction::Get { name } => {
                let enabled = choco.feature_get(&name, &none)?;
                println!("{}", if enabled { "Enabled" } else { "Disabled" });
            }
            FeatureAction::Enable { name } => choco.feature_enable(&name, &none)?,
            FeatureAction::Disable { name } => choco.feature_disable(&name, &none)?,
        },
        Command::Apikey { action } => match action {
            ApiKeyAction::List => {
                let keys = choco.apikeys(&none)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&keys)?);
                } else {
                    for key in keys {
                        println!("{} - {}", key.source, key.info);
                    }
                }
            }
            ApiKeyAction::Add { url, key } => choco.apikey_add(&url, &key, &none)?,
            ApiKeyAction::Remove { url } => choco.apikey_remove(&url, &none)?,
        },
        Command::Template { action } => match action {
            TemplateAction::List => {
                let templates = choco.templates(&none)?;
                print_records(json, &templates, |t| format!("{} {}", t.name, t.version))?;
            }
            TemplateAction::Info { name } => match choco.template_info(&name, &none)? {
                Some(t) if json => println!("{}", serde_json::to_string_pretty(&t)?),
                Some(t) => println!("{} {}", t.name, t.version),
                None => bail!("未找到模板 {name}"),
            },
        },
        Command::Cache { action } => match action {
            CacheAction::List => choco.cache_list(&none)?,
            CacheAction::Remove => choco.cache_remove(&none)?,
        },
        Command::Pack {
            nuspec,
            output_directory,
        } => {
            let opts = PackOptions {
                output_directory,
                options: Options::new(),
            };
            choco.pack(nuspec.as_deref(), &opts)?;
        }
        Command::Push { nupkg } => choco.push(nupkg.as_deref(), &PushOptions::default())?,
        Command::New { id, properties } => {
            let mut props = Vec::with_capacity(properties.len());
            for prop in &properties {
                match prop.split_once('=') {
                    Some(pair) => props.push(pair),
                    None => bail!("模板属性格式应为 key=value: {prop}"),
                }
            }
            choco.new_package(&id, &props, &none)?;
        }
        Command::Raw { args } => {
            let options = Options::new().set("check", false);
            let result = choco.choco(&as_strs(&args), &options)?;
            print!("{}", result.stdout);
            eprint!("{}", result.stderr);
            if !result.success() {
                std::process::exit(result.exit_code);
            }
        }
    }
    Ok(())
}

fn as_strs(items: &[String]) -> Vec<&str> {
    items.iter().map(String::as_str).collect()
}

/// 文本模式下每条记录一行；JSON 模式整体输出
fn print_records<T: Serialize>(
    json: bool,
    records: &RecordMap<T>,
    line: impl Fn(&T) -> String,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    for record in records.records() {
        println!("{}", line(record));
    }
    Ok(())
}
