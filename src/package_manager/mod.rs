//! 包管理器模块 — 对 Chocolatey (choco) 的封装

pub mod coerce;
pub mod command;
pub mod options;
pub mod parser;
pub mod runner;
pub mod types;

#[cfg(test)]
mod tests;

// 重新导出常用类型
pub use command::{
    CommandBuilder, ExecOptions, FixedPrivilege, Invocation, OptValue, Options, PrivilegePolicy,
    SourceOverride, Subcommand, SystemPrivilege,
};
pub use options::{
    ExportOptions, InfoOptions, InstallOptions, OutdatedOptions, PackOptions, PushOptions,
    SearchOptions, UninstallOptions, UpgradeOptions,
};
pub use runner::{CommandRunner, DuctRunner};
pub use types::{
    ApiKey, CommandResult, Config, ConfigValue, Feature, Package, PackageInfo, PackageOutdated,
    RecordMap, Source, Template, VersionInfo,
};

use crate::config::Settings;
use crate::error::{Error, Result};
use coerce::{str_to_bool, ENABLED_DISABLED};
use parser::{normalize_text, parse_package_info, parse_records};
use std::path::Path;
use std::time::Duration;

/// 列表类输出不需要的详细模式选项
const LIST_MANAGED: &[&str] = &[
    "limit_output",
    "verbose",
    "detail",
    "detailed",
    "idonly",
    "id_only",
];

/// `--limit-output` 模式下的配置类列表
const CONFIG_MANAGED: &[&str] = &["limit_output", "verbose"];

pub struct Chocolatey {
    builder: CommandBuilder,
    runner: Box<dyn CommandRunner>,
    allow_multiple: bool,
    default_timeout: Option<Duration>,
}

impl Chocolatey {
    /// 使用默认配置，可指定默认包源
    pub fn new(default_source: Option<String>) -> Self {
        let settings = Settings {
            default_source,
            ..Settings::default()
        };
        Self::from_settings(&settings)
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let builder = CommandBuilder::new(
            settings.executable.clone(),
            settings.launcher.clone(),
            settings.default_source.clone(),
            settings.elevation.policy(),
        );
        Self {
            builder,
            runner: Box::new(DuctRunner::new()),
            allow_multiple: settings.allow_multiple,
            default_timeout: settings.timeout(),
        }
    }

    pub fn with_parts(builder: CommandBuilder, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            builder,
            runner,
            allow_multiple: false,
            default_timeout: None,
        }
    }

    /// 设置默认的多记录策略（search 的 all_versions 除外）
    pub fn allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }

    pub fn default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// 实例的默认包源
    pub fn source(&self) -> Option<&str> {
        self.builder.default_source()
    }

    // ===== 内部 =====

    fn run(&self, sub: Subcommand, args: &[String], options: &Options) -> Result<CommandResult> {
        let mut invocation = self.builder.build(sub, args, options)?;
        if invocation.exec.timeout.is_none() {
            invocation.exec.timeout = self.default_timeout;
        }
        let result = self.runner.run(&invocation)?;
        if invocation.exec.check && !result.success() {
            log::warn!(
                "{} 退出码 {}",
                invocation.command_line(),
                result.exit_code
            );
            return Err(Error::ProcessFailed {
                command: invocation.command_line(),
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }

    /// 捕获输出的调用
    fn capture(&self, sub: Subcommand, args: &[String], options: Options) -> Result<String> {
        Ok(self.run(sub, args, &options.captured())?.stdout)
    }

    fn require_ids(operation: &str, pkg_ids: &[&str]) -> Result<Vec<String>> {
        if pkg_ids.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "{operation}() 至少需要一个包 id"
            )));
        }
        Ok(to_args(pkg_ids))
    }

    // ===== 基本信息 =====

    /// choco 版本号
    pub fn version(&self) -> Result<String> {
        let options = Options::new()
            .set("version", true)
            .set("limit_output", true)
            .without_source();
        let stdout = self.capture(Subcommand::Choco, &[], options)?;
        Ok(stdout.trim().to_string())
    }

    pub fn version_info(&self) -> Result<VersionInfo> {
        Ok(VersionInfo::parse(&self.version()?)?)
    }

    /// choco 或某个子命令的帮助文本
    pub fn help(&self, command: Option<&str>) -> Result<String> {
        let stdout = match command {
            None => self.capture(
                Subcommand::Help,
                &[],
                Options::new().set("limit_output", true),
            )?,
            Some(command) => self.capture(
                Subcommand::Choco,
                &[command.to_string()],
                Options::new().set("help", true).set("limit_output", true),
            )?,
        };
        Ok(normalize_text(&stdout))
    }

    /// 当前 Chocolatey CLI 的许可证信息（v2.5.0+）
    pub fn license(&self, options: &Options) -> Result<String> {
        let options = Options::new()
            .set("limit_output", true)
            .merged_with(options, &["limit_output"]);
        Ok(normalize_text(&self.capture(Subcommand::License, &[], options)?))
    }

    /// 支持信息（v2.5.0+）
    pub fn support(&self, options: &Options) -> Result<String> {
        let options = Options::new()
            .set("limit_output", true)
            .merged_with(options, &["limit_output"]);
        Ok(normalize_text(&self.capture(Subcommand::Support, &[], options)?))
    }

    /// 直接调用 choco，返回原始结果
    pub fn choco(&self, args: &[&str], options: &Options) -> Result<CommandResult> {
        let options = Options::new().captured().merged_with(options, &[]);
        self.run(Subcommand::Choco, &to_args(args), &options)
    }

    // ===== 查询 =====

    /// 本地已安装的包
    pub fn installed(&self, filters: &[&str], options: &Options) -> Result<RecordMap<Package>> {
        let mut managed = LIST_MANAGED.to_vec();
        // choco v2 起 list 不再支持 --all-versions
        managed.extend(["all_versions", "local_only"]);
        let options = Options::new()
            .set("limit_output", true)
            .set("local_only", true)
            .without_source()
            .merged_with(options, &managed);
        let stdout = self.capture(Subcommand::List, &to_args(filters), options)?;
        Ok(parse_records(&stdout, self.allow_multiple)?)
    }

    /// 可升级的包；当前版本与可用版本相同的条目会被去掉
    pub fn outdated(&self, opts: &OutdatedOptions) -> Result<RecordMap<PackageOutdated>> {
        let options = Options::new()
            .set("limit_output", true)
            .set("ignore_pinned", opts.ignore_pinned)
            .set("ignore_unfound", opts.ignore_unfound)
            .merged_with(&opts.options, LIST_MANAGED);
        let stdout = self.capture(Subcommand::Outdated, &[], options)?;
        let mut packages: RecordMap<PackageOutdated> = parse_records(&stdout, self.allow_multiple)?;
        packages.retain_records(PackageOutdated::is_outdated);
        Ok(packages)
    }

    /// 搜索远程包，逐页查询直到返回空页；精确查询只查第一页
    pub fn search(&self, filter: Option<&str>, opts: &SearchOptions) -> Result<RecordMap<Package>> {
        let mut managed = LIST_MANAGED.to_vec();
        managed.extend(["page", "page_size"]);
        let args: Vec<String> = filter.map(str::to_string).into_iter().collect();

        let mut output = String::new();
        let mut page = 0u32;
        loop {
            let options = Options::new()
                .set("limit_output", true)
                .set("page", page)
                .set("all_versions", opts.all_versions)
                .set("exact", opts.exact)
                .merged_with(&opts.options, &managed);
            let stdout = self.capture(Subcommand::Search, &args, options)?;
            if stdout.trim().is_empty() {
                break;
            }
            output.push_str(&stdout);
            output.push('\n');
            page += 1;
            if opts.exact {
                break;
            }
        }
        log::debug!("search 共查询 {} 页", page);
        Ok(parse_records(&output, opts.all_versions)?)
    }

    /// 包详情：先取 `id|version`，再解析详细输出补全描述字段
    pub fn info(&self, pkg_id: &str, opts: &InfoOptions) -> Result<Option<PackageInfo>> {
        let args = vec![pkg_id.to_string()];

        let brief = Options::new()
            .set("limit_output", true)
            .set("local_only", opts.local_only)
            .merged_with(&opts.options, &["limit_output", "verbose"]);
        let stdout = self.capture(Subcommand::Info, &args, brief)?;
        if stdout.trim().is_empty() {
            return Ok(None);
        }
        let packages: RecordMap<PackageInfo> = parse_records(&stdout, false)?;
        let Some(pkg) = packages.into_records().into_iter().next() else {
            return Ok(None);
        };

        let detailed = Options::new()
            .set("local_only", opts.local_only)
            .merged_with(&opts.options, &["limit_output", "verbose"]);
        let stdout = self.capture(Subcommand::Info, &args, detailed)?;
        if stdout.trim().is_empty() {
            return Ok(Some(pkg));
        }
        Ok(Some(parse_package_info(&stdout, pkg)))
    }

    // ===== 安装 / 升级 / 卸载 =====

    /// 导出已安装包列表（默认 packages.config）
    pub fn export(&self, opts: &ExportOptions) -> Result<()> {
        let mut options = Options::new();
        if let Some(path) = &opts.output_file_path {
            options.insert("output_file_path", path.as_path());
        }
        let options = options
            .set("include_version_numbers", opts.include_version_numbers)
            .merged_with(&opts.options, &[]);
        self.capture(Subcommand::Export, &[], options)?;
        Ok(())
    }

    pub fn install(&self, pkg_ids: &[&str], opts: &InstallOptions) -> Result<()> {
        let args = Self::require_ids("install", pkg_ids)?;
        let options = Options::new()
            .set("yes", opts.yes)
            .merged_with(&opts.options, &["yes"]);
        self.run(Subcommand::Install, &args, &options)?;
        Ok(())
    }

    pub fn upgrade(&self, pkg_ids: &[&str], opts: &UpgradeOptions) -> Result<()> {
        let args = Self::require_ids("upgrade", pkg_ids)?;
        let options = Options::new()
            .set("install_if_not_installed", opts.install_if_not_installed)
            .set("yes", opts.yes)
            .merged_with(&opts.options, &["install_if_not_installed", "yes"]);
        self.run(Subcommand::Upgrade, &args, &options)?;
        Ok(())
    }

    pub fn uninstall(&self, pkg_ids: &[&str], opts: &UninstallOptions) -> Result<()> {
        let args = Self::require_ids("uninstall", pkg_ids)?;
        let options = Options::new()
            .set("all_versions", opts.all_versions)
            .set("yes", opts.yes)
            .merged_with(&opts.options, &["yes"]);
        self.run(Subcommand::Uninstall, &args, &options)?;
        Ok(())
    }

    // ===== pin =====

    /// 被锁定、不参与升级的包
    pub fn pinned(&self, options: &Options) -> Result<RecordMap<Package>> {
        let options = Options::new()
            .set("limit_output", true)
            .merged_with(options, CONFIG_MANAGED);
        let stdout = self.capture(Subcommand::Pin, &to_args(&["list"]), options)?;
        Ok(parse_records(&stdout, self.allow_multiple)?)
    }

    pub fn pin_add(&self, pkg_id: &str, options: &Options) -> Result<()> {
        // choco 不接受 --reason
        let options = Options::new()
            .set("name", pkg_id)
            .merged_with(options, &["reason"]);
        self.run(Subcommand::Pin, &to_args(&["add"]), &options)?;
        Ok(())
    }

    pub fn pin_remove(&self, pkg_id: &str, options: &Options) -> Result<()> {
        let options = Options::new().set("name", pkg_id).merged_with(options, &[]);
        self.run(Subcommand::Pin, &to_args(&["remove"]), &options)?;
        Ok(())
    }

    // ===== 打包 =====

    /// 把 nuspec 及相关文件打包为 nupkg
    pub fn pack(&self, nuspec_file_path: Option<&Path>, opts: &PackOptions) -> Result<()> {
        let args = path_arg(nuspec_file_path);
        let mut options = Options::new();
        if let Some(dir) = &opts.output_directory {
            options.insert("output_directory", dir.as_path());
        }
        let options = options.merged_with(&opts.options, &[]);
        self.run(Subcommand::Pack, &args, &options)?;
        Ok(())
    }

    /// 推送 nupkg 到包源
    pub fn push(&self, nupkg_file_path: Option<&Path>, opts: &PushOptions) -> Result<()> {
        let args = path_arg(nupkg_file_path);
        let options = Options::new().set("yes", opts.yes).merged_with(&opts.options, &[]);
        self.run(Subcommand::Push, &args, &options)?;
        Ok(())
    }

    /// 生成新包的模板文件；属性以 `"key=value"` 形式追加
    pub fn new_package(
        &self,
        pkg_id: &str,
        properties: &[(&str, &str)],
        options: &Options,
    ) -> Result<()> {
        let mut args = vec![pkg_id.to_string()];
        args.extend(
            properties
                .iter()
                .map(|(prop, value)| format!("\"{prop}={value}\"")),
        );
        let options = Options::new().merged_with(options, &[]);
        self.run(Subcommand::New, &args, &options)?;
        Ok(())
    }

    // ===== config =====

    pub fn config(&self, options: &Options) -> Result<RecordMap<Config>> {
        let options = Options::new()
            .set("limit_output", true)
            .merged_with(options, CONFIG_MANAGED);
        let stdout = self.capture(Subcommand::Config, &to_args(&["list"]), options)?;
        Ok(parse_records(&stdout, false)?)
    }

    /// 单个配置值；未设置时为空文本
    pub fn config_get(&self, name: &str, options: &Options) -> Result<ConfigValue> {
        let options = Options::new()
            .set("name", name)
            .set("limit_output", true)
            .merged_with(options, &[]);
        let stdout = self.capture(Subcommand::Config, &to_args(&["get"]), options)?;
        let value = stdout.strip_suffix('\n').unwrap_or(&stdout);
        let value = value.strip_suffix('\r').unwrap_or(value);
        Ok(ConfigValue::from_raw(value))
    }

    /// 设置配置值；`None` 或空文本等同于 unset
    pub fn config_set(
        &self,
        name: &str,
        value: Option<ConfigValue>,
        options: &Options,
    ) -> Result<()> {
        match value {
            None => self.config_unset(name, options),
            Some(ConfigValue::Text(text)) if text.is_empty() => self.config_unset(name, options),
            Some(value) => {
                let options = Options::new()
                    .set("name", name)
                    .set("value", value.to_string())
                    .captured()
                    .merged_with(options, &[]);
                self.run(Subcommand::Config, &to_args(&["set"]), &options)?;
                Ok(())
            }
        }
    }

    pub fn config_unset(&self, name: &str, options: &Options) -> Result<()> {
        let options = Options::new().set("name", name).merged_with(options, &[]);
        self.capture(Subcommand::Config, &to_args(&["unset"]), options)?;
        Ok(())
    }

    // ===== source =====

    pub fn sources(&self, options: &Options) -> Result<RecordMap<Source>> {
        let options = Options::new()
            .set("limit_output", true)
            .merged_with(options, CONFIG_MANAGED);
        let stdout = self.capture(Subcommand::Source, &to_args(&["list"]), options)?;
        Ok(parse_records(&stdout, false)?)
    }

    /// 添加包源；priority、user 等其余参数通过 `options` 传入
    pub fn source_add(&self, name: &str, source: &str, options: &Options) -> Result<()> {
        let options = Options::new()
            .set("name", name)
            .set("source", source)
            .merged_with(options, &[]);
        self.capture(Subcommand::Source, &to_args(&["add"]), options)?;
        Ok(())
    }

    pub fn source_enable(&self, name: &str, options: &Options) -> Result<()> {
        self.source_action("enable", name, options)
    }

    pub fn source_disable(&self, name: &str, options: &Options) -> Result<()> {
        self.source_action("disable", name, options)
    }

    pub fn source_remove(&self, name: &str, options: &Options) -> Result<()> {
        self.source_action("remove", name, options)
    }

    fn source_action(&self, action: &str, name: &str, options: &Options) -> Result<()> {
        let options = Options::new().set("name", name).merged_with(options, &[]);
        self.capture(Subcommand::Source, &to_args(&[action]), options)?;
        Ok(())
    }

    // ===== feature =====

    pub fn features(&self, options: &Options) -> Result<RecordMap<Feature>> {
        let options = Options::new()
            .set("limit_output", true)
            .merged_with(options, CONFIG_MANAGED);
        let stdout = self.capture(Subcommand::Feature, &to_args(&["list"]), options)?;
        Ok(parse_records(&stdout, false)?)
    }

    pub fn feature_get(&self, name: &str, options: &Options) -> Result<bool> {
        let options = Options::new()
            .set("name", name)
            .set("limit_output", true)
            .merged_with(options, &[]);
        let stdout = self.capture(Subcommand::Feature, &to_args(&["get"]), options)?;
        Ok(str_to_bool("enabled", stdout.trim(), ENABLED_DISABLED)?)
    }

    pub fn feature_enable(&self, name: &str, options: &Options) -> Result<()> {
        let options = Options::new().set("name", name).merged_with(options, &[]);
        self.capture(Subcommand::Feature, &to_args(&["enable"]), options)?;
        Ok(())
    }

    pub fn feature_disable(&self, name: &str, options: &Options) -> Result<()> {
        let options = Options::new().set("name", name).merged_with(options, &[]);
        self.capture(Subcommand::Feature, &to_args(&["disable"]), options)?;
        Ok(())
    }

    // ===== apikey =====

    pub fn apikeys(&self, options: &Options) -> Result<Vec<ApiKey>> {
        let options = Options::new()
            .set("limit_output", true)
            .merged_with(options, CONFIG_MANAGED);
        let stdout = self.capture(Subcommand::ApiKey, &to_args(&["list"]), options)?;
        let keys: RecordMap<ApiKey> = parse_records(&stdout, false)?;
        Ok(keys.into_records())
    }

    pub fn apikey_add(&self, source: &str, api_key: &str, options: &Options) -> Result<()> {
        let options = Options::new()
            .with_source(source)
            .set("api_key", api_key)
            .merged_with(options, &[]);
        self.capture(Subcommand::ApiKey, &to_args(&["add"]), options)?;
        Ok(())
    }

    pub fn apikey_remove(&self, source: &str, options: &Options) -> Result<()> {
        let options = Options::new().with_source(source).merged_with(options, &[]);
        self.capture(Subcommand::ApiKey, &to_args(&["remove"]), options)?;
        Ok(())
    }

    // ===== template =====

    pub fn templates(&self, options: &Options) -> Result<RecordMap<Template>> {
        let options = Options::new()
            .set("limit_output", true)
            .merged_with(options, CONFIG_MANAGED);
        let stdout = self.capture(Subcommand::Template, &to_args(&["list"]), options)?;
        Ok(parse_records(&stdout, false)?)
    }

    pub fn template_info(&self, name: &str, options: &Options) -> Result<Option<Template>> {
        let options = Options::new()
            .set("name", name)
            .set("limit_output", true)
            .merged_with(options, CONFIG_MANAGED);
        let stdout = self.capture(Subcommand::Template, &to_args(&["info"]), options)?;
        let templates: RecordMap<Template> = parse_records(&stdout, false)?;
        Ok(templates.into_records().into_iter().next())
    }

    // ===== cache =====

    /// 显示本地 HTTP 查询缓存信息（v2.1.0+）
    pub fn cache_list(&self, options: &Options) -> Result<()> {
        self.run(Subcommand::Cache, &to_args(&["list"]), options)?;
        Ok(())
    }

    pub fn cache_remove(&self, options: &Options) -> Result<()> {
        self.run(Subcommand::Cache, &to_args(&["remove"]), options)?;
        Ok(())
    }
}

fn to_args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn path_arg(path: Option<&Path>) -> Vec<String> {
    path.map(|p| p.display().to_string()).into_iter().collect()
}
