//! DDL schema extraction
//!
//! Scans raw `CREATE TABLE` text into an ordered table/column structure used
//! to ground LLM prompts. This is a best-effort heuristic scan, not a SQL
//! grammar: multi-line comments and dialect-specific syntax are not
//! understood, and composite PRIMARY KEY / FOREIGN KEY clauses are dropped
//! rather than attached to the referencing column.

use serde::{Deserialize, Serialize};

/// Clause-introducer keywords that look like column names but are not.
const CONSTRAINT_INTRODUCERS: [&str; 5] = ["PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "CONSTRAINT"];

/// One parsed column definition, in DDL order within its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    /// Trailing constraint words, joined by single spaces. Empty when none.
    pub constraints: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

/// Extracted schema: tables in DDL order, names unique (a redefinition
/// replaces the earlier entry in place).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    tables: Vec<TableSchema>,
}

impl Schema {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Extract `CREATE TABLE` blocks from raw DDL text.
///
/// Never fails: unmatched or malformed text simply yields no entries, and a
/// file with zero `CREATE TABLE` statements yields an empty [`Schema`].
pub fn extract_schema(ddl: &str) -> Schema {
    let chars: Vec<char> = ddl.chars().collect();
    let mut tables: Vec<TableSchema> = Vec::new();

    let mut i = 0;
    while i < chars.len() {
        match parse_create_table(&chars, i) {
            Some((name, body, next)) => {
                let columns = parse_columns(&body);
                if let Some(existing) = tables.iter_mut().find(|t| t.name == name) {
                    existing.columns = columns;
                } else {
                    tables.push(TableSchema { name, columns });
                }
                i = next;
            }
            None => i += 1,
        }
    }

    Schema { tables }
}

/// Try to parse `CREATE TABLE [IF NOT EXISTS] <name> ( <body> )` starting at
/// `start`. Returns the table name, the raw body between the outer
/// parentheses, and the index just past the closing paren.
fn parse_create_table(chars: &[char], start: usize) -> Option<(String, String, usize)> {
    let mut i = eat_keyword(chars, start, "CREATE")?;
    i = skip_whitespace(chars, i);
    i = eat_keyword(chars, i, "TABLE")?;
    i = skip_whitespace(chars, i);

    if let Some(j) = eat_keyword(chars, i, "IF") {
        let j = skip_whitespace(chars, j);
        let j = eat_keyword(chars, j, "NOT")?;
        let j = skip_whitespace(chars, j);
        let j = eat_keyword(chars, j, "EXISTS")?;
        i = skip_whitespace(chars, j);
    }

    let (name, mut i) = eat_identifier(chars, i)?;
    i = skip_whitespace(chars, i);
    if chars.get(i) != Some(&'(') {
        return None;
    }
    i += 1;

    // Balanced scan to the matching close paren, so nested parentheses in
    // precision specs or CHECK expressions do not end the body early.
    let body_start = i;
    let mut depth = 1usize;
    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let body: String = chars[body_start..i].iter().collect();
                    return Some((name, body, i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }

    // Unterminated body: not a table.
    None
}

/// Match a keyword at `i`, case-insensitive, bounded by non-word characters.
fn eat_keyword(chars: &[char], i: usize, keyword: &str) -> Option<usize> {
    if i > 0 && is_word_char(chars[i - 1]) {
        return None;
    }
    let mut j = i;
    for expected in keyword.chars() {
        let c = *chars.get(j)?;
        if !c.eq_ignore_ascii_case(&expected) {
            return None;
        }
        j += 1;
    }
    if chars.get(j).is_some_and(|c| is_word_char(*c)) {
        return None;
    }
    Some(j)
}

/// Parse an optionally backtick-quoted identifier.
fn eat_identifier(chars: &[char], i: usize) -> Option<(String, usize)> {
    let mut j = i;
    let quoted = chars.get(j) == Some(&'`');
    if quoted {
        j += 1;
    }
    let word_start = j;
    while j < chars.len() && is_word_char(chars[j]) {
        j += 1;
    }
    if j == word_start {
        return None;
    }
    let name: String = chars[word_start..j].iter().collect();
    if quoted {
        if chars.get(j) != Some(&'`') {
            return None;
        }
        j += 1;
    }
    Some((name, j))
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split a table body into column-like clauses and parse each one.
fn parse_columns(body: &str) -> Vec<ColumnDescriptor> {
    split_top_level(body)
        .iter()
        .filter_map(|clause| parse_clause(clause))
        .collect()
}

/// Split on commas at parenthesis depth zero, so `DECIMAL(10,2)` and
/// composite key lists stay inside their clause.
fn split_top_level(body: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in body.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                clauses.push(current.clone());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    clauses.push(current);
    clauses
}

/// Parse `<name> <type>[(...)] [constraint words]*`. Clauses introduced by a
/// constraint keyword, and clauses too short to carry a type, yield nothing.
fn parse_clause(clause: &str) -> Option<ColumnDescriptor> {
    let tokens: Vec<&str> = clause.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }

    let name = tokens[0].trim_matches('`');
    if name.is_empty() || !name.chars().all(is_word_char) {
        return None;
    }
    if CONSTRAINT_INTRODUCERS.contains(&name.to_uppercase().as_str()) {
        return None;
    }

    Some(ColumnDescriptor {
        name: name.to_string(),
        data_type: tokens[1].to_string(),
        constraints: tokens[2..].join(" "),
    })
}
