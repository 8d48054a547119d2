//! SQL guard
//!
//! Text-level checks applied to every statement before it reaches the
//! database. These are filters over the raw string, not a SQL parser.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use tracing::{info, warn};

lazy_static! {
    /// Line comments and block comments (an unterminated block runs to the end)
    static ref COMMENT_RE: Regex = Regex::new(r"(?s)--[^\n]*|/\*.*?(\*/|$)")
        .expect("comment pattern is valid");

    /// Keywords that indicate DML, DDL or privilege changes
    static ref DENY_RE: Regex = Regex::new(
        r"(?i)\b(INSERT|UPDATE|DELETE|ALTER|DROP|CREATE|REPLACE|TRUNCATE|GRANT|REVOKE)\b"
    )
    .expect("deny-list pattern is valid");

    /// A row cap already present at the end of the statement
    static ref LIMIT_TAIL_RE: Regex = Regex::new(
        r"(?is)(\blimit\s+\d+(\s*,\s*\d+|\s+offset\s+\d+)?|\bfetch\s+(first|next)\s+\d+\s+rows?\s+only)\s*$"
    )
    .expect("limit-tail pattern is valid");
}

/// Why a statement was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRejection {
    MultipleStatements,
    NotSelect,
    Mutation,
}

impl fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            GuardRejection::MultipleStatements => "multiple statements are not allowed.",
            GuardRejection::NotSelect => "only SELECT statements are allowed.",
            GuardRejection::Mutation => "DML/DDL detected. Only read-only queries are permitted.",
        };
        f.write_str(message)
    }
}

impl std::error::Error for GuardRejection {}

/// Read-only gate with LIMIT injection
#[derive(Debug, Clone)]
pub struct SqlGuard {
    max_results: u32,
}

impl SqlGuard {
    pub fn new(max_results: u32) -> Self {
        Self { max_results }
    }

    /// Return the statement to execute, or the reason it is refused
    pub fn check(&self, sql: &str) -> Result<String, GuardRejection> {
        let preview: String = sql.chars().take(100).collect();
        info!(sql = %preview, "validating SQL");

        // A trailing comment would swallow the appended LIMIT
        let uncommented = COMMENT_RE.replace_all(sql, " ");
        let trimmed = uncommented.trim();
        let semicolons = trimmed.matches(';').count();
        if semicolons > 1 || (semicolons == 1 && !trimmed.ends_with(';')) {
            warn!("blocked multiple statements");
            return Err(GuardRejection::MultipleStatements);
        }

        let statement = trimmed.trim_end_matches(';').trim_end();

        let starts_with_select = statement
            .get(..6)
            .map(|head| head.eq_ignore_ascii_case("select"))
            .unwrap_or(false);
        if !starts_with_select {
            warn!(sql = %preview, "blocked non-SELECT statement");
            return Err(GuardRejection::NotSelect);
        }

        if DENY_RE.is_match(statement) {
            warn!(sql = %preview, "blocked DML/DDL statement");
            return Err(GuardRejection::Mutation);
        }

        if LIMIT_TAIL_RE.is_match(statement) {
            return Ok(statement.to_string());
        }

        info!(limit = self.max_results, "added LIMIT to query");
        Ok(format!("{} LIMIT {}", statement, self.max_results))
    }
}
