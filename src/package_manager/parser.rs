//! 输出解析函数

use super::types::{FlatRecord, PackageInfo, RecordMap};
use crate::error::ValueError;
use regex::Regex;

/// 统一换行符：`\r\n` 和单独的 `\r` 都转为 `\n`
pub fn normalize_newlines(output: &str) -> String {
    output.replace("\r\n", "\n").replace('\r', "\n")
}

/// help / license / support 这类纯文本输出
pub fn normalize_text(output: &str) -> String {
    normalize_newlines(output.trim_start())
}

/// 解析 `--limit-output` 模式下的 `a|b|c` 行
///
/// 先按行去掉空白并丢弃空行，再忽略大小写排序，保证与 choco 的输出顺序无关。
/// 每行按 `|` 切分后交给记录类型按位置构造；字段校验失败直接返回错误。
pub fn parse_records<T: FlatRecord>(
    output: &str,
    allow_multiple: bool,
) -> Result<RecordMap<T>, ValueError> {
    let normalized = normalize_newlines(output);
    let mut lines: Vec<&str> = normalized
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines.sort_by_cached_key(|line| line.to_lowercase());

    let mut records = RecordMap::new(allow_multiple);
    for line in lines {
        let fields: Vec<&str> = line.split('|').collect();
        let record = T::from_fields(&fields)?;
        records.insert(record.identity().to_string(), record);
    }
    Ok(records)
}

/// 用 `choco info` 的详细输出补全第一遍得到的记录
///
/// 详细输出形如：
///
/// ```text
/// Chocolatey v2.2.2
/// git 2.43.0 [Approved]
///  Title: Git | Published: 11/21/2023
///  Summary: Git (for Windows) - Fast, scalable, distributed revision control system
///  Description: Git for Windows focuses on offering a lightweight, native set of tools
///   that bring the full feature set of the Git SCM to Windows.
///
/// 1 packages found.
/// ```
///
/// 结构不匹配时原样返回 `pkg`。
pub fn parse_package_info(output: &str, mut pkg: PackageInfo) -> PackageInfo {
    let Some(body) = extract_info_body(output, &pkg.id, &pkg.version) else {
        log::debug!("info 输出结构不匹配，保留 {} 的简要信息", pkg.id);
        return pkg;
    };
    let mut fields = parse_info_fields(&body);

    pkg.description = take_field(&mut fields, "description").unwrap_or_default();
    pkg.title = take_field(&mut fields, "title").unwrap_or_default();
    pkg.summary = take_field(&mut fields, "summary").unwrap_or_default();
    pkg.published = take_field(&mut fields, "published").unwrap_or_default();

    if !fields.is_empty() {
        log::trace!("忽略 {} 个未识别的 info 字段", fields.len());
    }
    pkg
}

/// 取出第一个同名字段（忽略大小写），同名的后续字段一并丢弃
fn take_field(fields: &mut Vec<(String, String)>, key: &str) -> Option<String> {
    let mut found = None;
    fields.retain(|(name, value)| {
        if !name.eq_ignore_ascii_case(key) {
            return true;
        }
        if found.is_none() {
            found = Some(value.clone());
        }
        false
    });
    found
}

/// 去掉 banner、包标题行和结尾的计数行，返回已反缩进的字段正文
fn extract_info_body(output: &str, id: &str, version: &str) -> Option<String> {
    let text = normalize_newlines(output);

    // 同一行里用 `|` 分隔的多个字段拆成多行；Package url 这一项没有值
    let separator = Regex::new(r"[\t ]*\|").ok()?;
    let text = separator.replace_all(&text, "\n");
    let bare_url = Regex::new(r"\n[\t ]*Package url[\t ]*\n").ok()?;
    let text = bare_url.replace_all(&text, "\n Package url: n/a\n");

    let pattern = format!(
        concat!(
            r"^\s*Chocolatey[\t ]+v[^\n]+?(?:[\t ]*\n)+",
            r"\s*{id}[\t ]+{version}(?:[\t ]+\[\w+\])?(?:[\t ]*\n)+",
            r"(?P<info>(?:[^\n]*\n)*)",
            r"\n(?P<found>\d+)[\t ]+packages[\t ]+(?:found|installed)[\t ]*\.",
        ),
        id = regex::escape(id),
        version = regex::escape(version),
    );
    let block = Regex::new(&pattern).ok()?;
    let captures = block.captures(&text)?;
    let info = captures.name("info")?.as_str();

    let mut body = dedent(info);
    if !body.ends_with('\n') {
        body.push('\n');
    }
    Some(body)
}

/// 解析 `key: value` 列表，值可以跨多行（续行以空白开头）
///
/// 字段之间的空行并入上一个值的末尾；遇到既不是字段也不是续行的内容就停止。
fn parse_info_fields(body: &str) -> Vec<(String, String)> {
    let Ok(item) = Regex::new(r"^(?P<key>[^\t :]+(?:[\t ]+[^\t :]+)*)[\t ]*:[\t ]*(?P<value>.*)$")
    else {
        return Vec::new();
    };

    let mut fields: Vec<(String, String)> = Vec::new();
    let mut pending_blank = 0;

    for line in body.lines() {
        if line.trim().is_empty() {
            pending_blank += 1;
            continue;
        }
        let is_continuation = line.starts_with(' ') || line.starts_with('\t');
        if is_continuation {
            let Some(last) = fields.last_mut() else {
                break;
            };
            for _ in 0..pending_blank {
                last.1.push('\n');
            }
            last.1.push('\n');
            last.1.push_str(line);
            pending_blank = 0;
            continue;
        }
        let Some(caps) = item.captures(line) else {
            break;
        };
        // 字段之间的空行归入上一个值
        if let Some(last) = fields.last_mut() {
            for _ in 0..pending_blank {
                last.1.push('\n');
            }
        }
        pending_blank = 0;
        fields.push((caps["key"].to_string(), caps["value"].to_string()));
    }

    fields
}

/// 去掉所有非空行共同的前导空白，空白行变为空行
fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let indent = &line[..line.len() - line.trim_start_matches([' ', '\t']).len()];
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }
    let margin = margin.unwrap_or("");

    let mut result = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (content, newline) = match line.strip_suffix('\n') {
            Some(content) => (content, "\n"),
            None => (line, ""),
        };
        if content.trim().is_empty() {
            result.push_str(newline);
        } else {
            result.push_str(content.strip_prefix(margin).unwrap_or(content));
            result.push_str(newline);
        }
    }
    result
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}
