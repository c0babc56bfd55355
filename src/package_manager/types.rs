//! choco 输出对应的数据类型定义

use super::coerce::{
    parse_bool, str_to_bool, str_to_int, str_to_none, ENABLED_DISABLED, TRUE_FALSE,
};
use crate::error::ValueError;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// 一次 choco 调用的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// 从一行 `a|b|c` 按位置构造的记录
pub trait FlatRecord: Sized {
    /// 按位置构造并校验字段；多余字段忽略，缺失的可选字段取默认值
    fn from_fields(fields: &[&str]) -> Result<Self, ValueError>;

    /// 分组用的键（包 id / 源名称 / feature 名称 ...）
    fn identity(&self) -> &str;
}

fn required(fields: &[&str], index: usize, name: &str) -> Result<String, ValueError> {
    fields
        .get(index)
        .map(|s| s.to_string())
        .ok_or_else(|| ValueError::new(name, ""))
}

fn optional(fields: &[&str], index: usize) -> String {
    fields.get(index).map(|s| s.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub id: String,
    pub version: String,
}

impl FlatRecord for Package {
    fn from_fields(fields: &[&str]) -> Result<Self, ValueError> {
        Ok(Self {
            id: required(fields, 0, "id")?,
            version: required(fields, 1, "version")?,
        })
    }

    fn identity(&self) -> &str {
        &self.id
    }
}

/// `choco outdated` 条目：`id|当前版本|可用版本|是否 pin`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageOutdated {
    pub id: String,
    pub version: String,
    pub available_version: Option<String>,
    pub pinned: bool,
}

impl PackageOutdated {
    /// 当前版本与可用版本相同的条目并不算过期
    pub fn is_outdated(&self) -> bool {
        self.available_version.as_deref() != Some(self.version.as_str())
    }
}

impl FlatRecord for PackageOutdated {
    fn from_fields(fields: &[&str]) -> Result<Self, ValueError> {
        let pinned = match fields.get(3) {
            Some(raw) => str_to_bool("pinned", raw, TRUE_FALSE)?,
            None => false,
        };
        Ok(Self {
            id: required(fields, 0, "id")?,
            version: required(fields, 1, "version")?,
            available_version: fields.get(2).map(|s| s.to_string()),
            pinned,
        })
    }

    fn identity(&self) -> &str {
        &self.id
    }
}

/// 包详情，先由 `id|version` 行构造，再由详细信息块补全
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    pub id: String,
    pub version: String,
    pub description: String,
    pub title: String,
    pub summary: String,
    pub published: String,
}

impl FlatRecord for PackageInfo {
    fn from_fields(fields: &[&str]) -> Result<Self, ValueError> {
        Ok(Self {
            id: required(fields, 0, "id")?,
            version: required(fields, 1, "version")?,
            description: optional(fields, 2),
            title: optional(fields, 3),
            summary: optional(fields, 4),
            published: optional(fields, 5),
        })
    }

    fn identity(&self) -> &str {
        &self.id
    }
}

/// 配置项的值：true/false 转为布尔，其余保持原文
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Text(String),
}

impl ConfigValue {
    pub fn from_raw(raw: &str) -> Self {
        match parse_bool(raw, TRUE_FALSE) {
            Some(b) => ConfigValue::Bool(b),
            None => ConfigValue::Text(raw.to_string()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => f.write_str(super::coerce::bool_to_str(*b, TRUE_FALSE)),
            ConfigValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub name: String,
    pub value: Option<ConfigValue>,
    pub description: String,
}

impl FlatRecord for Config {
    fn from_fields(fields: &[&str]) -> Result<Self, ValueError> {
        let value = fields
            .get(1)
            .and_then(|raw| str_to_none(raw))
            .map(|raw| ConfigValue::from_raw(&raw));
        Ok(Self {
            name: required(fields, 0, "name")?,
            value,
            description: optional(fields, 2),
        })
    }

    fn identity(&self) -> &str {
        &self.name
    }
}

/// `choco source list`：
/// `name|url|disabled|user|password|priority|bypass_proxy|self_service|admin_only`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Source {
    pub name: String,
    pub value: String,
    pub disabled: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    pub priority: i32,
    pub bypass_proxy: bool,
    pub self_service: bool,
    pub admin_only: bool,
}

impl FlatRecord for Source {
    fn from_fields(fields: &[&str]) -> Result<Self, ValueError> {
        let flag = |index: usize, name: &str| -> Result<bool, ValueError> {
            match fields.get(index) {
                Some(raw) => str_to_bool(name, raw, TRUE_FALSE),
                None => Ok(false),
            }
        };
        Ok(Self {
            name: required(fields, 0, "name")?,
            value: optional(fields, 1),
            disabled: flag(2, "disabled")?,
            user: fields.get(3).and_then(|raw| str_to_none(raw)),
            password: fields.get(4).and_then(|raw| str_to_none(raw)),
            priority: match fields.get(5) {
                Some(raw) => str_to_int("priority", raw)?,
                None => 0,
            },
            bypass_proxy: flag(6, "bypass_proxy")?,
            self_service: flag(7, "self_service")?,
            admin_only: flag(8, "admin_only")?,
        })
    }

    fn identity(&self) -> &str {
        &self.name
    }
}

/// `choco feature list`：`name|Enabled|description`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    pub name: String,
    pub enabled: bool,
    pub description: String,
}

impl FlatRecord for Feature {
    fn from_fields(fields: &[&str]) -> Result<Self, ValueError> {
        let enabled = match fields.get(1) {
            Some(raw) => str_to_bool("enabled", raw, ENABLED_DISABLED)?,
            None => false,
        };
        Ok(Self {
            name: required(fields, 0, "name")?,
            enabled,
            description: optional(fields, 2),
        })
    }

    fn identity(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKey {
    pub source: String,
    pub info: String,
}

impl FlatRecord for ApiKey {
    fn from_fields(fields: &[&str]) -> Result<Self, ValueError> {
        Ok(Self {
            source: required(fields, 0, "source")?,
            info: required(fields, 1, "info")?,
        })
    }

    fn identity(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub name: String,
    pub version: String,
}

impl FlatRecord for Template {
    fn from_fields(fields: &[&str]) -> Result<Self, ValueError> {
        Ok(Self {
            name: required(fields, 0, "name")?,
            version: required(fields, 1, "version")?,
        })
    }

    fn identity(&self) -> &str {
        &self.name
    }
}

/// choco 版本号，缺失的部分补 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    pub serial: u32,
}

impl VersionInfo {
    pub fn parse(version: &str) -> Result<Self, ValueError> {
        let mut parts = [0u32; 4];
        for (slot, part) in parts.iter_mut().zip(version.trim().split('.')) {
            *slot = part
                .parse()
                .map_err(|_| ValueError::new("version", version.trim()))?;
        }
        let [major, minor, micro, serial] = parts;
        Ok(Self {
            major,
            minor,
            micro,
            serial,
        })
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.micro, self.serial)
    }
}

/// 按键分组的记录集合
///
/// 键的查找和合并不区分大小写。`multiple` 为 false 时同一个键只保留最后一条记录，
/// 键的写法随之更新为该记录的写法；为 true 时按出现顺序累积，键保留首次出现时的写法。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMap<T> {
    multiple: bool,
    entries: Vec<(String, Vec<T>)>,
    /// 小写键 → `entries` 下标
    index: HashMap<String, usize>,
}

impl<T> RecordMap<T> {
    pub fn new(multiple: bool) -> Self {
        Self {
            multiple,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn allows_multiple(&self) -> bool {
        self.multiple
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.index.get(&key.to_lowercase()).copied()
    }

    pub fn insert(&mut self, key: impl Into<String>, record: T) {
        let key = key.into();
        let folded = key.to_lowercase();
        match self.index.get(&folded) {
            Some(&index) if self.multiple => self.entries[index].1.push(record),
            Some(&index) => self.entries[index] = (key, vec![record]),
            None => {
                self.index.insert(folded, self.entries.len());
                self.entries.push((key, vec![record]));
            }
        }
    }

    /// 该键最近插入的一条记录
    pub fn get(&self, key: &str) -> Option<&T> {
        self.get_all(key).and_then(|records| records.last())
    }

    pub fn get_all(&self, key: &str) -> Option<&[T]> {
        self.position(key)
            .map(|index| self.entries[index].1.as_slice())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.entries
            .iter()
            .map(|(key, records)| (key.as_str(), records.as_slice()))
    }

    /// 所有记录，按键的插入顺序展开
    pub fn records(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().flat_map(|(_, records)| records.iter())
    }

    pub fn into_records(self) -> Vec<T> {
        self.entries
            .into_iter()
            .flat_map(|(_, records)| records)
            .collect()
    }

    /// 过滤记录，删除过滤后为空的键
    pub fn retain_records(&mut self, mut keep: impl FnMut(&T) -> bool) {
        for (_, records) in &mut self.entries {
            records.retain(|record| keep(record));
        }
        self.entries.retain(|(_, records)| !records.is_empty());
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (key, _))| (key.to_lowercase(), i))
            .collect();
    }
}

impl<T: Serialize> Serialize for RecordMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, records) in &self.entries {
            if self.multiple {
                map.serialize_entry(key, records)?;
            } else if let Some(record) = records.last() {
                map.serialize_entry(key, record)?;
            }
        }
        map.end()
    }
}
