// src/core/qos/limits.rs

//! Limit model and parser (component C1): the `Limits` aggregate, the
//! `name=value` entry parser, the memory-literal grammar, and the
//! command-to-statement-kind classifier used by admission (C5).

use crate::core::commands::command_trait::CommandFlags;
use std::fmt;

/// A parse failure for a single `qos.*` configuration entry. Distinct from
/// `SpinelDBError` so non-strict catalog parsing (§4.2) can drop a malformed
/// entry and keep going without building a `SpinelDBError` for every row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unrecognized qos setting '{0}'")]
    InvalidName(String),
    #[error("invalid value '{value}' for qos setting '{name}'")]
    InvalidValue { name: String, value: String },
    #[error("malformed entry '{0}', expected 'name=value'")]
    Malformed(String),
}

/// `SELECT | UPDATE | DELETE | INSERT`, the four data-manipulation kinds the
/// governor admits independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Update,
    Delete,
    Insert,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Insert => "insert",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an over-limit `work_mem` request is a hard error or a logged cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkMemErrorLevel {
    #[default]
    Warn,
    Error,
}

impl WorkMemErrorLevel {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "warning" => Some(WorkMemErrorLevel::Warn),
            "error" => Some(WorkMemErrorLevel::Error),
            _ => None,
        }
    }

    /// The fold picks the stricter policy when both scopes set one.
    fn is_stricter_than(self, other: Self) -> bool {
        matches!((self, other), (WorkMemErrorLevel::Error, WorkMemErrorLevel::Warn))
    }
}

/// One scope's worth of limits (role-only, database-only, or the folded
/// effective limit). Every field uses `None` for "unset", matching the
/// wire-level `-1` sentinel described by the host mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limits {
    pub work_mem_bytes: Option<u64>,
    pub cpu_core_limit: Option<u32>,
    pub max_concurrent_tx: Option<u32>,
    pub max_concurrent_select: Option<u32>,
    pub max_concurrent_update: Option<u32>,
    pub max_concurrent_delete: Option<u32>,
    pub max_concurrent_insert: Option<u32>,
    pub work_mem_error_level: Option<WorkMemErrorLevel>,
    pub enabled: Option<bool>,
}

impl Limits {
    /// Per-command-kind limit lookup, used by admission to pick the right field.
    pub fn max_concurrent_for(&self, kind: StatementKind) -> Option<u32> {
        match kind {
            StatementKind::Select => self.max_concurrent_select,
            StatementKind::Update => self.max_concurrent_update,
            StatementKind::Delete => self.max_concurrent_delete,
            StatementKind::Insert => self.max_concurrent_insert,
        }
    }

    fn max_concurrent_for_mut(&mut self, kind: StatementKind) -> &mut Option<u32> {
        match kind {
            StatementKind::Select => &mut self.max_concurrent_select,
            StatementKind::Update => &mut self.max_concurrent_update,
            StatementKind::Delete => &mut self.max_concurrent_delete,
            StatementKind::Insert => &mut self.max_concurrent_insert,
        }
    }

    /// The most-restrictive fold (§3 invariant): for each field, take the
    /// smaller of two present values, or whichever is present, or unset.
    pub fn fold_most_restrictive(role: &Limits, database: &Limits) -> Limits {
        fn fold_u64(a: Option<u64>, b: Option<u64>) -> Option<u64> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            }
        }
        fn fold_u32(a: Option<u32>, b: Option<u32>) -> Option<u32> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            }
        }
        Limits {
            work_mem_bytes: fold_u64(role.work_mem_bytes, database.work_mem_bytes),
            cpu_core_limit: fold_u32(role.cpu_core_limit, database.cpu_core_limit),
            max_concurrent_tx: fold_u32(role.max_concurrent_tx, database.max_concurrent_tx),
            max_concurrent_select: fold_u32(role.max_concurrent_select, database.max_concurrent_select),
            max_concurrent_update: fold_u32(role.max_concurrent_update, database.max_concurrent_update),
            max_concurrent_delete: fold_u32(role.max_concurrent_delete, database.max_concurrent_delete),
            max_concurrent_insert: fold_u32(role.max_concurrent_insert, database.max_concurrent_insert),
            work_mem_error_level: match (role.work_mem_error_level, database.work_mem_error_level) {
                (Some(a), Some(b)) => Some(if a.is_stricter_than(b) { a } else { b }),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            },
            enabled: role.enabled.or(database.enabled),
        }
    }
}

const RECOGNIZED_NAMES: &[&str] = &[
    "qos.work_mem_limit",
    "qos.cpu_core_limit",
    "qos.max_concurrent_tx",
    "qos.max_concurrent_select",
    "qos.max_concurrent_update",
    "qos.max_concurrent_delete",
    "qos.max_concurrent_insert",
    "qos.work_mem_error_level",
    "qos.enabled",
];

/// `true` iff `name` (including the `qos.` prefix) is a recognized setting.
pub fn is_valid_name(name: &str) -> bool {
    RECOGNIZED_NAMES.contains(&name)
}

/// Splits a raw catalog entry of the form `"name=value"` into its two halves,
/// trimming whitespace around each. Does not validate the name.
pub fn parse_entry(text: &str) -> Result<(String, String), ParseError> {
    let Some((name, value)) = text.split_once('=') else {
        return Err(ParseError::Malformed(text.to_string()));
    };
    Ok((name.trim().to_string(), value.trim().to_string()))
}

/// Parses a memory literal into bytes: optional sign, decimal integer,
/// optional unit suffix from `{k, kB, m, MB, g, GB}` (case-insensitive). No
/// suffix means kilobytes. The literal `-1` means "unset" and rejects a
/// suffix. Overflow is an error rather than a silent wrap.
pub fn parse_memory(text: &str) -> Result<i64, ParseError> {
    let err = || ParseError::InvalidValue {
        name: "work_mem".to_string(),
        value: text.to_string(),
    };
    let trimmed = text.trim();
    if trimmed == "-1" {
        return Ok(-1);
    }

    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, trimmed),
    };

    let digit_end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if digit_end == 0 {
        return Err(err());
    }
    let (num_part, suffix) = unsigned.split_at(digit_end);
    let magnitude: i64 = num_part.parse().map_err(|_| err())?;
    if sign < 0 {
        // Only the exact literal "-1" is a valid negative value.
        return Err(err());
    }

    let multiplier: i64 = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        _ => return Err(err()),
    };

    magnitude.checked_mul(multiplier).ok_or_else(err)
}

/// Renders a byte count back to the canonical memory-literal form used by
/// non-strict normalization (e.g. `"64MB"`, `"1GB"`).
pub fn format_memory(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;
    if bytes != 0 && bytes % GB == 0 {
        format!("{}GB", bytes / GB)
    } else if bytes != 0 && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes % KB == 0 {
        format!("{}kB", bytes / KB)
    } else {
        bytes.to_string()
    }
}

fn parse_nonneg_u32(name: &str, value: &str) -> Result<Option<u32>, ParseError> {
    let v: i64 = value.trim().parse().map_err(|_| ParseError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })?;
    if v == -1 {
        return Ok(None);
    }
    if v < 0 || v > i64::from(u32::MAX) {
        return Err(ParseError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    Ok(Some(v as u32))
}

/// Applies a single `name=value` pair to `limits`. `strict` selects between
/// the two callers described in §4.1: `true` for direct `QOS SET`/`QOS
/// ALTER` (fails loudly), `false` for parsing persisted catalog entries
/// (silently ignores non-`qos.*` names, drops malformed `qos.*` entries).
pub fn apply_value(limits: &mut Limits, name: &str, value: &str, strict: bool) -> Result<(), ParseError> {
    if !name.starts_with("qos.") {
        if strict {
            return Err(ParseError::InvalidName(name.to_string()));
        }
        return Ok(());
    }
    if !is_valid_name(name) {
        return Err(ParseError::InvalidName(name.to_string()));
    }

    match name {
        "qos.work_mem_limit" => {
            let kb = parse_memory(value)?;
            limits.work_mem_bytes = if kb == -1 { None } else { Some(kb as u64) };
        }
        "qos.cpu_core_limit" => {
            limits.cpu_core_limit = parse_nonneg_u32(name, value)?;
        }
        "qos.max_concurrent_tx" => {
            limits.max_concurrent_tx = parse_nonneg_u32(name, value)?;
        }
        "qos.max_concurrent_select" => {
            *limits.max_concurrent_for_mut(StatementKind::Select) = parse_nonneg_u32(name, value)?;
        }
        "qos.max_concurrent_update" => {
            *limits.max_concurrent_for_mut(StatementKind::Update) = parse_nonneg_u32(name, value)?;
        }
        "qos.max_concurrent_delete" => {
            *limits.max_concurrent_for_mut(StatementKind::Delete) = parse_nonneg_u32(name, value)?;
        }
        "qos.max_concurrent_insert" => {
            *limits.max_concurrent_for_mut(StatementKind::Insert) = parse_nonneg_u32(name, value)?;
        }
        "qos.work_mem_error_level" => {
            let level = WorkMemErrorLevel::parse(value).ok_or_else(|| ParseError::InvalidValue {
                name: name.to_string(),
                value: value.to_string(),
            })?;
            limits.work_mem_error_level = Some(level);
        }
        "qos.enabled" => {
            let b = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => {
                    return Err(ParseError::InvalidValue {
                        name: name.to_string(),
                        value: value.to_string(),
                    });
                }
            };
            limits.enabled = Some(b);
        }
        _ => unreachable!("is_valid_name already filtered unrecognized names"),
    }
    Ok(())
}

/// Maps a command name to a `StatementKind`, or `None` for commands the
/// governor does not admit (reads with no write flag that aren't plain
/// lookups, control commands, etc.). Grounded in each command's
/// `CommandFlags::WRITE` bit plus a curated table for the ambiguous cases
/// (which write commands delete vs. update vs. insert a key) — see
/// DESIGN.md for the exact table and its rationale.
pub fn classify_command(name: &str, flags: CommandFlags) -> Option<StatementKind> {
    let upper = name.to_ascii_uppercase();

    const DELETE_COMMANDS: &[&str] = &[
        "DEL", "UNLINK", "LPOP", "RPOP", "SPOP", "SREM", "ZREM", "HDEL", "XDEL",
        "ZREMRANGEBYSCORE", "ZREMRANGEBYRANK", "ZREMRANGEBYLEX", "FLUSHALL", "FLUSHDB",
        "GETDEL", "LTRIM", "EXPIRE", "PEXPIRE", "EXPIREAT", "PEXPIREAT", "PERSIST",
    ];
    const INSERT_COMMANDS: &[&str] = &[
        "LPUSH", "LPUSHX", "RPUSH", "RPUSHX", "SADD", "ZADD", "HSET", "HSETNX", "HMSET",
        "XADD", "SETNX", "MSETNX", "GEOADD", "PFADD", "RESTORE",
    ];

    if DELETE_COMMANDS.contains(&upper.as_str()) {
        return Some(StatementKind::Delete);
    }
    if INSERT_COMMANDS.contains(&upper.as_str()) {
        return Some(StatementKind::Insert);
    }
    if flags.contains(CommandFlags::WRITE) {
        return Some(StatementKind::Update);
    }
    if flags.contains(CommandFlags::READONLY) {
        return Some(StatementKind::Select);
    }
    None
}
