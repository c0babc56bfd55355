//! 字段类型转换：choco 输出中的字符串 → bool / int / Option

use crate::error::ValueError;

/// 布尔值的一对字面量（真, 假）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoolLiterals {
    pub truthy: &'static str,
    pub falsy: &'static str,
}

pub const TRUE_FALSE: BoolLiterals = BoolLiterals {
    truthy: "true",
    falsy: "false",
};

/// feature 列表使用 Enabled / Disabled
pub const ENABLED_DISABLED: BoolLiterals = BoolLiterals {
    truthy: "enabled",
    falsy: "disabled",
};

/// 宽松转换：不是字面量时返回 None（忽略大小写）
pub fn parse_bool(value: &str, literals: BoolLiterals) -> Option<bool> {
    let lowered = value.to_lowercase();
    if lowered == literals.truthy {
        Some(true)
    } else if lowered == literals.falsy {
        Some(false)
    } else {
        None
    }
}

/// 严格转换：不是字面量时报错
pub fn str_to_bool(field: &str, value: &str, literals: BoolLiterals) -> Result<bool, ValueError> {
    parse_bool(value, literals).ok_or_else(|| ValueError::new(field, value))
}

pub fn bool_to_str(value: bool, literals: BoolLiterals) -> &'static str {
    if value {
        literals.truthy
    } else {
        literals.falsy
    }
}

/// 可带正负号的十进制整数
pub fn str_to_int(field: &str, value: &str) -> Result<i32, ValueError> {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValueError::new(field, value));
    }
    value.parse().map_err(|_| ValueError::new(field, value))
}

/// 空字符串视为缺失
pub fn str_to_none(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
