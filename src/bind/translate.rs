//! Localised validation messages.

use std::str::FromStr;

use super::validate::Rule;
use super::value::ValueKind;

/// One failed rule, as handed to a [`Translator`].
#[derive(Debug)]
pub struct Violation<'a> {
    /// Wire name of the field.
    pub field: &'a str,
    pub rule: &'a Rule,
    pub kind: ValueKind,
}

/// Turns a rule violation into a human-readable message.
pub trait Translator: Send + Sync {
    fn translate(&self, violation: &Violation<'_>) -> String;
}

/// Built-in message tables.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Lang {
    #[default]
    Chinese,
    English,
}

impl FromStr for Lang {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zh" | "cn" | "chinese" => Ok(Self::Chinese),
            "en" | "english" => Ok(Self::English),
            _ => Err(()),
        }
    }
}

impl Translator for Lang {
    fn translate(&self, v: &Violation<'_>) -> String {
        match self {
            Self::Chinese => chinese(v),
            Self::English => english(v),
        }
    }
}

fn sized(kind: ValueKind) -> bool {
    matches!(kind, ValueKind::Text | ValueKind::List)
}

fn english(v: &Violation<'_>) -> String {
    let f = v.field;
    let unit = if v.kind == ValueKind::List { "items" } else { "characters" };
    match v.rule {
        Rule::Required => format!("{f} is a required field"),
        Rule::Min(n) if sized(v.kind) => format!("{f} must be at least {n} {unit} in length"),
        Rule::Min(n) => format!("{f} must be {n} or greater"),
        Rule::Max(n) if sized(v.kind) => format!("{f} must be a maximum of {n} {unit} in length"),
        Rule::Max(n) => format!("{f} must be {n} or less"),
        Rule::Len(n) if sized(v.kind) => format!("{f} must be {n} {unit} in length"),
        Rule::Len(n) => format!("{f} must be equal to {n}"),
        Rule::OneOf(options) => format!("{f} must be one of [{}]", options.join(" ")),
        Rule::Email => format!("{f} must be a valid email address"),
    }
}

fn chinese(v: &Violation<'_>) -> String {
    let f = v.field;
    let unit = if v.kind == ValueKind::List { "项" } else { "个字符" };
    match v.rule {
        Rule::Required => format!("{f}为必填字段"),
        Rule::Min(n) if sized(v.kind) => format!("{f}长度必须至少为{n}{unit}"),
        Rule::Min(n) => format!("{f}最小只能为{n}"),
        Rule::Max(n) if sized(v.kind) => format!("{f}长度不能超过{n}{unit}"),
        Rule::Max(n) => format!("{f}必须小于或等于{n}"),
        Rule::Len(n) if sized(v.kind) => format!("{f}长度必须是{n}{unit}"),
        Rule::Len(n) => format!("{f}必须等于{n}"),
        Rule::OneOf(options) => format!("{f}必须是[{}]中的一个", options.join(" ")),
        Rule::Email => format!("{f}必须是一个有效的邮箱"),
    }
}
