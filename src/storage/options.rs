//! Engine configuration strings.
//!
//! The harness hands strings such as
//! `create,direct_io=[data],buffer_alignment=512B,mmap=false` to the backend
//! untouched. Backends parse them here and pick out what they understand;
//! anything else is accepted and ignored.

use tracing::debug;

use crate::StoreError;
use crate::StoreResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Bare key, e.g. `create`
    Flag,
    /// `key=value`
    Value(String),
    /// `key=[a,b]`
    List(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigString {
    entries: Vec<(String, OptionValue)>,
}

impl ConfigString {
    pub fn parse(input: &str) -> StoreResult<Self> {
        let mut entries = Vec::new();
        for token in split_top_level(input)? {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            let (key, value) = match token.split_once('=') {
                None => (token, OptionValue::Flag),
                Some((key, raw)) => (key.trim(), parse_value(raw.trim())?),
            };
            if key.is_empty() {
                return Err(StoreError::InvalidOption(format!("missing key in `{token}`")));
            }
            entries.push((key.to_string(), value));
        }
        Ok(Self { entries })
    }

    /// Parses an optional string; `None` behaves like an empty configuration.
    pub fn parse_opt(input: Option<&str>) -> StoreResult<Self> {
        input.map(Self::parse).unwrap_or_else(|| Ok(Self::default()))
    }

    /// Later occurrences of a key win.
    pub fn get(
        &self,
        key: &str,
    ) -> Option<&OptionValue> {
        self.entries.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// `key` and `key=true` are set, `key=false` and absence are not.
    pub fn flag(
        &self,
        key: &str,
    ) -> bool {
        self.bool_or(key, false)
    }

    pub fn bool_or(
        &self,
        key: &str,
        default: bool,
    ) -> bool {
        match self.get(key) {
            None => default,
            Some(OptionValue::Flag) => true,
            Some(OptionValue::Value(v)) => !matches!(v.as_str(), "false" | "0"),
            Some(OptionValue::List(items)) => !items.is_empty(),
        }
    }

    pub fn value(
        &self,
        key: &str,
    ) -> Option<&str> {
        match self.get(key) {
            Some(OptionValue::Value(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn list(
        &self,
        key: &str,
    ) -> Option<&[String]> {
        match self.get(key) {
            Some(OptionValue::List(items)) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Byte size with an optional `B`, `KB`, `MB`, `GB` suffix.
    pub fn size(
        &self,
        key: &str,
    ) -> StoreResult<Option<u64>> {
        self.value(key).map(parse_size).transpose()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logs every key a backend did not consume.
    pub(crate) fn log_ignored(
        &self,
        scope: &str,
        understood: &[&str],
    ) {
        for key in self.keys().filter(|k| !understood.contains(k)) {
            debug!(scope, key, "configuration key passed through without effect");
        }
    }
}

fn split_top_level(input: &str) -> StoreResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| StoreError::InvalidOption(format!("unbalanced `{c}` in `{input}`")))?;
            }
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(StoreError::InvalidOption(format!("unclosed bracket in `{input}`")));
    }
    parts.push(&input[start..]);
    Ok(parts)
}

fn parse_value(raw: &str) -> StoreResult<OptionValue> {
    if let Some(inner) = raw.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| StoreError::InvalidOption(format!("malformed list `{raw}`")))?;
        let items = split_top_level(inner)?
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        return Ok(OptionValue::List(items));
    }
    Ok(OptionValue::Value(raw.trim_matches('"').to_string()))
}

pub fn parse_size(raw: &str) -> StoreResult<u64> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let base: u64 = digits
        .parse()
        .map_err(|_| StoreError::InvalidOption(format!("invalid size `{raw}`")))?;
    let multiplier = match unit.to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1 << 10,
        "M" | "MB" => 1 << 20,
        "G" | "GB" => 1 << 30,
        "T" | "TB" => 1 << 40,
        _ => return Err(StoreError::InvalidOption(format!("invalid size unit `{raw}`"))),
    };
    base.checked_mul(multiplier)
        .ok_or_else(|| StoreError::InvalidOption(format!("size overflow `{raw}`")))
}

/// Read visibility requested by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Isolation {
    ReadUncommitted,
    ReadCommitted,
    #[default]
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOptions {
    pub isolation: Isolation,
}

impl SessionOptions {
    pub fn parse(input: Option<&str>) -> StoreResult<Self> {
        let cfg = ConfigString::parse_opt(input)?;
        let isolation = match cfg.value("isolation") {
            None | Some("snapshot") => Isolation::Snapshot,
            Some("read-uncommitted") => Isolation::ReadUncommitted,
            Some("read-committed") => Isolation::ReadCommitted,
            Some(other) => {
                return Err(StoreError::InvalidOption(format!("unknown isolation `{other}`")))
            }
        };
        cfg.log_ignored("session", &["isolation"]);
        Ok(Self { isolation })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableOptions {
    /// Fail if the table already exists
    pub exclusive: bool,
}

impl TableOptions {
    /// Only string keys and values are supported.
    pub fn parse(input: &str) -> StoreResult<Self> {
        let cfg = ConfigString::parse(input)?;
        for format_key in ["key_format", "value_format"] {
            match cfg.value(format_key) {
                None | Some("S") => {}
                Some(other) => {
                    return Err(StoreError::InvalidOption(format!(
                        "{format_key}={other} is not supported, only S"
                    )))
                }
            }
        }
        cfg.log_ignored("table", &["key_format", "value_format", "exclusive"]);
        Ok(Self {
            exclusive: cfg.flag("exclusive"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorOptions {
    /// Append-only loading; keys must be strictly increasing
    pub bulk: bool,
    /// Insert replaces existing values and update creates missing keys
    pub overwrite: bool,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self {
            bulk: false,
            overwrite: true,
        }
    }
}

impl CursorOptions {
    pub fn parse(input: Option<&str>) -> StoreResult<Self> {
        let cfg = ConfigString::parse_opt(input)?;
        cfg.log_ignored("cursor", &["bulk", "overwrite"]);
        Ok(Self {
            bulk: cfg.flag("bulk"),
            overwrite: cfg.bool_or("overwrite", true),
        })
    }
}
