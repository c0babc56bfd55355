//! choco 命令行构造：子命令、参数、提权

use crate::error::ValueError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 每次调用都附加的参数
pub const COMMON_ARGS: [&str; 2] = ["--accept-license", "--no-progress"];

/// 交给进程执行层、永远不会变成命令行参数的键
pub const RESERVED_EXEC_KEYS: [&str; 14] = [
    "stdin",
    "input",
    "stdout",
    "stderr",
    "capture_output",
    "shell",
    "cwd",
    "timeout",
    "check",
    "encoding",
    "errors",
    "text",
    "env",
    "universal_newlines",
];

/// choco 子命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subcommand {
    /// 不带子命令，直接调用 choco
    Choco,
    Help,
    License,
    Support,
    ApiKey,
    Cache,
    Config,
    Export,
    Feature,
    Search,
    Info,
    List,
    Outdated,
    Install,
    Upgrade,
    Uninstall,
    New,
    Pack,
    Pin,
    Push,
    Source,
    Template,
}

/// 名称（含别名）→ 子命令
const SUBCOMMAND_NAMES: &[(&str, Subcommand)] = &[
    ("help", Subcommand::Help),
    ("license", Subcommand::License),
    ("support", Subcommand::Support),
    ("apikey", Subcommand::ApiKey),
    ("setapikey", Subcommand::ApiKey),
    ("cache", Subcommand::Cache),
    ("config", Subcommand::Config),
    ("export", Subcommand::Export),
    ("feature", Subcommand::Feature),
    ("features", Subcommand::Feature),
    ("search", Subcommand::Search),
    ("find", Subcommand::Search),
    ("info", Subcommand::Info),
    ("list", Subcommand::List),
    ("outdated", Subcommand::Outdated),
    ("install", Subcommand::Install),
    ("upgrade", Subcommand::Upgrade),
    ("uninstall", Subcommand::Uninstall),
    ("new", Subcommand::New),
    ("pack", Subcommand::Pack),
    ("pin", Subcommand::Pin),
    ("push", Subcommand::Push),
    ("source", Subcommand::Source),
    ("sources", Subcommand::Source),
    ("template", Subcommand::Template),
    ("templates", Subcommand::Template),
];

impl Subcommand {
    /// 按名称或别名查找
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        SUBCOMMAND_NAMES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, sub)| *sub)
    }

    /// 命令行中使用的规范名称；`Choco` 没有
    pub fn name(self) -> Option<&'static str> {
        if self == Subcommand::Choco {
            return None;
        }
        SUBCOMMAND_NAMES
            .iter()
            .find(|(_, sub)| *sub == self)
            .map(|(alias, _)| *alias)
    }

    /// 可以用 `--source` 限定包源的子命令
    pub fn accepts_source(self) -> bool {
        matches!(
            self,
            Subcommand::Choco
                | Subcommand::Help
                | Subcommand::ApiKey
                | Subcommand::Search
                | Subcommand::Info
                | Subcommand::List
                | Subcommand::Outdated
                | Subcommand::Install
                | Subcommand::Upgrade
                | Subcommand::Uninstall
                | Subcommand::New
                | Subcommand::Push
        )
    }

    /// 是否需要管理员权限；pin / source / config 的 list 动作是只读的
    pub fn requires_elevation(self, action: Option<&str>) -> bool {
        match self {
            Subcommand::Install | Subcommand::Upgrade | Subcommand::Uninstall | Subcommand::Cache => {
                true
            }
            Subcommand::Pin | Subcommand::Source | Subcommand::Config => action != Some("list"),
            _ => false,
        }
    }
}

/// 选项的值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptValue {
    /// true → `--name`，false → 省略
    Flag(bool),
    /// `--name=value`
    Value(String),
}

impl From<bool> for OptValue {
    fn from(value: bool) -> Self {
        OptValue::Flag(value)
    }
}

impl From<&str> for OptValue {
    fn from(value: &str) -> Self {
        OptValue::Value(value.to_string())
    }
}

impl From<String> for OptValue {
    fn from(value: String) -> Self {
        OptValue::Value(value)
    }
}

impl From<&String> for OptValue {
    fn from(value: &String) -> Self {
        OptValue::Value(value.clone())
    }
}

impl From<u32> for OptValue {
    fn from(value: u32) -> Self {
        OptValue::Value(value.to_string())
    }
}

impl From<i32> for OptValue {
    fn from(value: i32) -> Self {
        OptValue::Value(value.to_string())
    }
}

impl From<u64> for OptValue {
    fn from(value: u64) -> Self {
        OptValue::Value(value.to_string())
    }
}

impl From<&Path> for OptValue {
    fn from(value: &Path) -> Self {
        OptValue::Value(value.display().to_string())
    }
}

impl From<PathBuf> for OptValue {
    fn from(value: PathBuf) -> Self {
        OptValue::Value(value.display().to_string())
    }
}

/// 渲染单个选项：下划线转连字符
pub fn render_flag(key: &str, value: &OptValue) -> Option<String> {
    let name = key.replace('_', "-");
    match value {
        OptValue::Flag(true) => Some(format!("--{name}")),
        OptValue::Flag(false) => None,
        OptValue::Value(v) => Some(format!("--{name}={v}")),
    }
}

fn canonical_key(key: &str) -> String {
    key.replace('-', "_")
}

/// `--source` 的选择
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceOverride {
    /// 使用实例默认源（若有）
    #[default]
    Default,
    Explicit(String),
    /// 不传 `--source`
    Omit,
}

/// 进程执行层的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    pub timeout: Option<Duration>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// 写入子进程 stdin 的文本
    pub input: Option<String>,
    pub capture_output: bool,
    /// 非零退出码视为错误
    pub check: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            cwd: None,
            env: Vec::new(),
            input: None,
            capture_output: false,
            check: true,
        }
    }
}

impl ExecOptions {
    /// 应用一个保留键
    fn apply(&mut self, key: &str, value: &OptValue) -> Result<(), ValueError> {
        let text = match value {
            OptValue::Value(v) => Some(v.as_str()),
            OptValue::Flag(_) => None,
        };
        match key {
            "timeout" => {
                self.timeout = match value {
                    OptValue::Flag(false) => None,
                    OptValue::Flag(true) => return Err(ValueError::new(key, "true")),
                    OptValue::Value(v) => Some(parse_seconds(key, v)?),
                }
            }
            "cwd" => self.cwd = text.map(PathBuf::from),
            "env" => {
                if let Some(pair) = text {
                    let (name, val) = pair
                        .split_once('=')
                        .ok_or_else(|| ValueError::new(key, pair))?;
                    self.env.push((name.to_string(), val.to_string()));
                }
            }
            "input" | "stdin" => self.input = text.map(str::to_string),
            "capture_output" => self.capture_output = flag_value(key, value)?,
            "check" => self.check = flag_value(key, value)?,
            _ => log::debug!("执行参数 {key} 不受支持，已忽略"),
        }
        Ok(())
    }
}

fn parse_seconds(key: &str, raw: &str) -> Result<Duration, ValueError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ValueError::new(key, raw))
}

fn flag_value(key: &str, value: &OptValue) -> Result<bool, ValueError> {
    match value {
        OptValue::Flag(b) => Ok(*b),
        OptValue::Value(v) => {
            super::coerce::str_to_bool(key, v, super::coerce::TRUE_FALSE)
        }
    }
}

/// 一次调用的命名选项
///
/// `flags` 中除了 [`RESERVED_EXEC_KEYS`] 以外的键都会变成命令行参数，
/// 是各操作固定选项之外的原始参数入口。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    flags: Vec<(String, OptValue)>,
    pub source: SourceOverride,
    pub exec: ExecOptions,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置选项；已存在的同名键原位替换
    pub fn set(mut self, key: &str, value: impl Into<OptValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<OptValue>) {
        let key = canonical_key(key);
        let value = value.into();
        match self.flags.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.flags.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptValue> {
        let key = canonical_key(key);
        self.flags.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<OptValue> {
        let key = canonical_key(key);
        let index = self.flags.iter().position(|(k, _)| *k == key)?;
        Some(self.flags.remove(index).1)
    }

    pub fn flags(&self) -> &[(String, OptValue)] {
        &self.flags
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = SourceOverride::Explicit(source.into());
        self
    }

    pub fn without_source(mut self) -> Self {
        self.source = SourceOverride::Omit;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.exec.timeout = Some(timeout);
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exec.cwd = Some(dir.into());
        self
    }

    pub fn captured(mut self) -> Self {
        self.exec.capture_output = true;
        self
    }

    /// 在操作自身的选项之下合并调用方选项
    ///
    /// 调用方对 `managed` 中键的设置被丢弃；与操作选项同名的键以操作为准。
    pub fn merged_with(mut self, caller: &Options, managed: &[&str]) -> Options {
        for (key, value) in &caller.flags {
            if managed.iter().any(|m| canonical_key(m) == *key) {
                log::debug!("选项 {key} 由操作自动管理，忽略调用方的值");
                continue;
            }
            if self.get(key).is_none() {
                self.flags.push((key.clone(), value.clone()));
            }
        }
        if caller.source != SourceOverride::Default {
            self.source = caller.source.clone();
        }
        let exec = &caller.exec;
        self.exec.timeout = exec.timeout.or(self.exec.timeout);
        self.exec.cwd = exec.cwd.clone().or(self.exec.cwd.take());
        self.exec.env.extend(exec.env.iter().cloned());
        self.exec.input = exec.input.clone().or(self.exec.input.take());
        self.exec.capture_output |= exec.capture_output;
        self.exec.check &= exec.check;
        self
    }

    /// 拆分为命令行选项与执行参数；每个键只落入其中一边
    pub fn partition(&self) -> Result<(Vec<(String, OptValue)>, ExecOptions), ValueError> {
        let mut exec = self.exec.clone();
        let mut flags = Vec::new();
        for (key, value) in &self.flags {
            if RESERVED_EXEC_KEYS.contains(&key.as_str()) {
                exec.apply(key, value)?;
            } else {
                flags.push((key.clone(), value.clone()));
            }
        }
        Ok((flags, exec))
    }
}

/// 判断当前进程是否需要借助启动器提权
#[cfg_attr(test, mockall::automock)]
pub trait PrivilegePolicy: Send + Sync {
    fn requires_relaunch(&self) -> bool;
}

/// 根据真实的系统权限判断
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPrivilege;

impl PrivilegePolicy for SystemPrivilege {
    #[cfg(unix)]
    fn requires_relaunch(&self) -> bool {
        // SAFETY: geteuid 没有前置条件，也不会失败
        unsafe { libc::geteuid() != 0 }
    }

    #[cfg(windows)]
    fn requires_relaunch(&self) -> bool {
        // 只有管理员才能执行 `net session`
        duct::cmd!("net", "session")
            .stdout_null()
            .stderr_null()
            .unchecked()
            .run()
            .map(|o| !o.status.success())
            .unwrap_or(true)
    }

    #[cfg(not(any(unix, windows)))]
    fn requires_relaunch(&self) -> bool {
        true
    }
}

/// 固定的权限状态（配置文件指定，或测试使用）
#[derive(Debug, Clone, Copy)]
pub struct FixedPrivilege {
    pub elevated: bool,
}

impl PrivilegePolicy for FixedPrivilege {
    fn requires_relaunch(&self) -> bool {
        !self.elevated
    }
}

/// 准备好的进程调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub exec: ExecOptions,
}

impl Invocation {
    /// 用于日志和错误信息的命令行文本
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

pub struct CommandBuilder {
    executable: PathBuf,
    launcher: PathBuf,
    default_source: Option<String>,
    privilege: Box<dyn PrivilegePolicy>,
}

impl CommandBuilder {
    pub fn new(
        executable: impl Into<PathBuf>,
        launcher: impl Into<PathBuf>,
        default_source: Option<String>,
        privilege: Box<dyn PrivilegePolicy>,
    ) -> Self {
        Self {
            executable: executable.into(),
            launcher: launcher.into(),
            default_source,
            privilege,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn default_source(&self) -> Option<&str> {
        self.default_source.as_deref()
    }

    fn resolve_source(&self, source: &SourceOverride) -> Option<String> {
        match source {
            SourceOverride::Default => self.default_source.as_ref().map(|s| format!("\"{s}\"")),
            SourceOverride::Explicit(s) => Some(s.clone()),
            SourceOverride::Omit => None,
        }
    }

    /// 构造完整的调用：程序路径、参数列表与执行参数
    ///
    /// 参数顺序为 `[choco] <子命令> <位置参数...> [--source=...] <选项...> <公共参数>`，
    /// 需要提权且当前权限不足时由启动器代为执行 choco。
    pub fn build(
        &self,
        sub: Subcommand,
        args: &[String],
        options: &Options,
    ) -> Result<Invocation, ValueError> {
        let (mut flags, exec) = options.partition()?;

        let mut source = options.source.clone();
        if sub.accepts_source() {
            // 原始选项里的 source 等同于显式指定
            if let Some(index) = flags.iter().position(|(k, _)| k == "source") {
                source = match flags.remove(index).1 {
                    OptValue::Flag(false) => SourceOverride::Omit,
                    OptValue::Flag(true) => SourceOverride::Default,
                    OptValue::Value(v) => SourceOverride::Explicit(v),
                };
            }
        } else if source != SourceOverride::Default {
            log::debug!("{:?} 不支持 --source，忽略", sub);
        }

        let action = args.first().map(String::as_str);
        let mut argv = Vec::new();
        let program = if sub.requires_elevation(action) && self.privilege.requires_relaunch() {
            argv.push(self.executable.display().to_string());
            self.launcher.clone()
        } else {
            self.executable.clone()
        };

        if let Some(name) = sub.name() {
            argv.push(name.to_string());
        }
        argv.extend(args.iter().cloned());
        if sub.accepts_source() {
            if let Some(source) = self.resolve_source(&source) {
                argv.push(format!("--source={source}"));
            }
        }
        argv.extend(flags.iter().filter_map(|(k, v)| render_flag(k, v)));
        argv.extend(COMMON_ARGS.iter().map(|s| s.to_string()));

        Ok(Invocation {
            program,
            args: argv,
            exec,
        })
    }
}
