//! Prompt construction for the generation and correction tasks.

use crate::llm::ChatMessage;
use crate::schema::Schema;

pub const GENERATION_SYSTEM_PROMPT: &str = "You are an expert in converting natural language to SQL. Generate a correct SQL query based on the description provided. Return ONLY the SQL query without any explanation or markdown code blocks.";

pub const CORRECTION_SYSTEM_PROMPT: &str = "You are an expert in SQL. Given an incorrect SQL query and optionally a natural language description, provide the corrected SQL query. Return ONLY the corrected SQL query without any explanation or markdown code blocks.";

/// Render the extracted schema as a fixed-width text block for prompt
/// grounding. Purely presentational; never parsed back.
pub fn schema_description(schema: &Schema) -> String {
    if schema.is_empty() {
        return "The database schema is empty.".to_string();
    }

    let mut description = format!("DATABASE SCHEMA\n{}\n\n", "=".repeat(15));

    for table in schema.tables() {
        description.push_str(&format!("TABLE: {}\n{}\n", table.name, "-".repeat(50)));

        if table.columns.is_empty() {
            description.push_str("  This table has no columns defined.\n\n");
            continue;
        }

        description.push_str(&format!(
            "{:<20} {:<20} {:<30}\n",
            "COLUMN NAME", "DATA TYPE", "CONSTRAINTS"
        ));
        description.push_str(&format!(
            "{:<20} {:<20} {:<30}\n",
            "-".repeat(20),
            "-".repeat(20),
            "-".repeat(30)
        ));

        for column in &table.columns {
            let constraints = if column.constraints.is_empty() {
                "None"
            } else {
                column.constraints.as_str()
            };
            description.push_str(&format!(
                "{:<20} {:<20} {:<30}\n",
                column.name, column.data_type, constraints
            ));
        }

        description.push('\n');
    }

    description
}

/// Two-message conversation for NL -> SQL generation.
pub fn generation_messages(nl_query: &str, schema_description: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(with_schema_context(GENERATION_SYSTEM_PROMPT, schema_description)),
        ChatMessage::user(nl_query),
    ]
}

/// Two-message conversation for SQL correction. The NL description section
/// is omitted when the input record carried none.
pub fn correction_messages(
    incorrect_query: &str,
    nl_query: &str,
    schema_description: &str,
) -> Vec<ChatMessage> {
    let mut user = format!("Incorrect SQL Query: {}\n\n", incorrect_query);
    if !nl_query.is_empty() {
        user.push_str(&format!("Natural Language Description: {}\n\n", nl_query));
    }
    user.push_str("Please provide the correct SQL query:");

    vec![
        ChatMessage::system(with_schema_context(CORRECTION_SYSTEM_PROMPT, schema_description)),
        ChatMessage::user(user),
    ]
}

fn with_schema_context(task_prompt: &str, schema_description: &str) -> String {
    if schema_description.is_empty() {
        return task_prompt.to_string();
    }
    format!(
        "{}\n\nUse the following database schema for reference:\n{}",
        task_prompt, schema_description
    )
}
