//! Statement logging via `tracing` (target `sqlweave.sql`).
//!
//! Enable via the crate feature `tracing` (on by default). Without it every
//! hook here compiles to nothing.

use crate::executor::Capability;
use crate::params::Shape;

/// Logging target for all sqlweave events.
pub const TARGET: &str = "sqlweave.sql";

/// The type of SQL operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Other SQL (e.g., DDL, custom)
    Other,
}

impl QueryKind {
    /// Detect query kind from SQL text.
    ///
    /// For CTEs (`WITH ...`), looks past the CTE definitions to the main
    /// statement.
    pub fn from_sql(sql: &str) -> Self {
        let s = strip_sql_prefix(sql);
        if starts_with_keyword(s, "WITH") {
            return Self::detect_after_ctes(s);
        }
        Self::from_keyword(s).unwrap_or(QueryKind::Other)
    }

    fn from_keyword(s: &str) -> Option<Self> {
        [
            ("SELECT", QueryKind::Select),
            ("INSERT", QueryKind::Insert),
            ("UPDATE", QueryKind::Update),
            ("DELETE", QueryKind::Delete),
        ]
        .into_iter()
        .find(|(kw, _)| starts_with_keyword(s, kw))
        .map(|(_, kind)| kind)
    }

    fn detect_after_ctes(sql: &str) -> Self {
        let bytes = sql.as_bytes();
        let mut depth = 0_i32;
        let mut last_top_level = 0;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        last_top_level = i + 1;
                    }
                }
                b'\'' => {
                    i += 1;
                    while i < bytes.len() && bytes[i] != b'\'' {
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Self::from_keyword(sql[last_top_level..].trim_start()).unwrap_or(QueryKind::Select)
    }
}

fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if let Some(rest) = s.strip_prefix("--") {
            s = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = s.strip_prefix("/*") {
            s = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else if let Some(rest) = s.strip_prefix('(') {
            s = rest;
        }
        if s == before {
            return s;
        }
    }
}

fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    s.get(..keyword.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(keyword))
}

pub(crate) fn truncate_sql(sql: &str, max_bytes: Option<usize>) -> String {
    match max_bytes {
        Some(max) if sql.len() > max => {
            let mut end = max;
            while end > 0 && !sql.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &sql[..end])
        }
        _ => sql.to_string(),
    }
}

/// Per-call context attached to every event.
#[derive(Debug, Clone)]
pub(crate) struct CallContext {
    pub capability: Capability,
    pub shape: Shape,
    pub kind: QueryKind,
    pub tag: Option<String>,
    pub sql: String,
}

impl CallContext {
    pub fn new(
        capability: Capability,
        shape: Shape,
        tag: Option<String>,
        sql: &str,
        max_sql_length: Option<usize>,
    ) -> Self {
        Self {
            capability,
            shape,
            kind: QueryKind::from_sql(sql),
            tag,
            sql: truncate_sql(sql, max_sql_length),
        }
    }

    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or("-")
    }
}

pub(crate) fn statement_prepared(ctx: &CallContext) {
    #[cfg(feature = "tracing")]
    tracing::debug!(
        target: TARGET,
        entry = ctx.capability.as_str(),
        shape = ctx.shape.as_str(),
        query_kind = ?ctx.kind,
        tag = ctx.tag(),
        sql = %ctx.sql,
        "statement prepared"
    );
    #[cfg(not(feature = "tracing"))]
    let _ = ctx;
}

pub(crate) fn element_done(ctx: &CallContext, index: usize) {
    #[cfg(feature = "tracing")]
    tracing::trace!(
        target: TARGET,
        entry = ctx.capability.as_str(),
        tag = ctx.tag(),
        index,
        "element executed"
    );
    #[cfg(not(feature = "tracing"))]
    let _ = (ctx, index);
}

pub(crate) fn sequence_halted(ctx: &CallContext, index: usize, err: &crate::WeaveError) {
    #[cfg(feature = "tracing")]
    tracing::debug!(
        target: TARGET,
        entry = ctx.capability.as_str(),
        tag = ctx.tag(),
        index,
        error = %err,
        "sequence halted"
    );
    #[cfg(not(feature = "tracing"))]
    let _ = (ctx, index, err);
}

pub(crate) fn validation_failed(ctx: &CallContext, stage: &'static str, err: &crate::WeaveError) {
    #[cfg(feature = "tracing")]
    tracing::debug!(
        target: TARGET,
        entry = ctx.capability.as_str(),
        tag = ctx.tag(),
        stage,
        error = %err,
        "validation failed"
    );
    #[cfg(not(feature = "tracing"))]
    let _ = (ctx, stage, err);
}
