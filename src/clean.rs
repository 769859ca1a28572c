//! Strips markdown code-fence wrapping from model-returned SQL.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SQL_FENCE: Regex = Regex::new(r"```(?:sql)?\n([\s\S]*?)\n```").unwrap();
}

/// Remove a fenced code block around a SQL query if present, otherwise
/// return the input trimmed. Idempotent on already-clean queries.
pub fn clean_sql_query(sql_query: &str) -> String {
    if let Some(caps) = SQL_FENCE.captures(sql_query) {
        return caps[1].trim().to_string();
    }
    sql_query.trim().to_string()
}
