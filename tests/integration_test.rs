use serde_json::json;
use sqlscribe::batch::{BatchRunner, NlRecord};
use sqlscribe::llm::{LlmClient, TokenCounter};
use sqlscribe::prompts::schema_description;
use sqlscribe::schema::extract_schema;

/// DDL fixture covering quoting, precision types, and constraint clauses.
const FIXTURE_DDL: &str = r#"
CREATE TABLE users (
    id INT PRIMARY KEY,
    name VARCHAR(50) NOT NULL,
    email VARCHAR(100) UNIQUE
);

CREATE TABLE IF NOT EXISTS `orders` (
    `order_id` BIGINT,
    user_id INT NOT NULL,
    total DECIMAL(10,2),
    PRIMARY KEY (order_id),
    FOREIGN KEY (user_id) REFERENCES users(id),
    CHECK (total >= 0 AND user_id > (0))
);
"#;

fn dummy_client() -> LlmClient {
    LlmClient::new(
        "dummy-api-key".to_string(),
        "llama-3.3-70b-versatile".to_string(),
        "http://localhost".to_string(),
    )
}

#[test]
fn test_schema_pipeline_end_to_end() {
    let schema = extract_schema(FIXTURE_DDL);

    assert_eq!(schema.len(), 2);
    let users = schema.table("users").unwrap();
    assert_eq!(users.columns.len(), 3);
    assert_eq!(users.columns[0].name, "id");
    assert_eq!(users.columns[0].constraints, "PRIMARY KEY");

    // Constraint clauses filtered, backticks stripped, nested parens survive.
    let orders = schema.table("orders").unwrap();
    let names: Vec<&str> = orders.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["order_id", "user_id", "total"]);
    assert_eq!(orders.columns[2].data_type, "DECIMAL(10,2)");

    let description = schema_description(&schema);
    assert!(description.starts_with("DATABASE SCHEMA"));
    assert!(description.contains("TABLE: users"));
    assert!(description.contains("TABLE: orders"));
    assert!(description.contains("None")); // order_id has no constraints
}

#[test]
fn test_empty_ddl_renders_sentinel() {
    let schema = extract_schema("SELECT 1; -- not a CREATE TABLE");
    assert!(schema.is_empty());
    assert_eq!(schema_description(&schema), "The database schema is empty.");
}

#[tokio::test]
async fn test_generation_batch_with_offline_client() {
    let schema = extract_schema(FIXTURE_DDL);
    let description = schema_description(&schema);
    let client = dummy_client();
    let runner = BatchRunner::new(&client, &description);
    let mut tokens = TokenCounter::new();

    let records = vec![
        NlRecord { nl: "How many users are there?".to_string() },
        NlRecord { nl: "Total order value per user".to_string() },
    ];
    let results = runner.generate(records, &mut tokens).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].nl, "How many users are there?");
    // Offline replies are fence-wrapped; the driver must return them clean.
    assert!(results.iter().all(|r| !r.query.contains("```")));
    assert!(results.iter().all(|r| !r.query.is_empty()));
    assert_eq!(tokens.total(), 0);
}

#[tokio::test]
async fn test_correction_batch_with_offline_client() {
    let client = dummy_client();
    let runner = BatchRunner::new(&client, "");
    let mut tokens = TokenCounter::new();

    let records = vec![
        json!({"IncorrectQuery": "SELEC * FROM users"}),
        json!({"Query": "SELET name FROM users", "NL": "names of all users"}),
        json!({"note": "neither key present"}),
    ];
    let report = runner.correct(records, &mut tokens).await;

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.results.len() + report.skipped, 3);
    assert_eq!(report.results[0].incorrect_query, "SELEC * FROM users");
    assert_eq!(report.results[1].incorrect_query, "SELET name FROM users");
}

#[test]
fn test_results_serialize_with_task_keys() {
    let result = sqlscribe::batch::GenerationResult {
        nl: "count users".to_string(),
        query: "SELECT COUNT(*) FROM users".to_string(),
    };
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["NL"], "count users");
    assert_eq!(value["Query"], "SELECT COUNT(*) FROM users");

    let correction = sqlscribe::batch::CorrectionResult {
        incorrect_query: "SELEC 1".to_string(),
        correct_query: "SELECT 1".to_string(),
    };
    let value = serde_json::to_value(&correction).unwrap();
    assert_eq!(value["IncorrectQuery"], "SELEC 1");
    assert_eq!(value["CorrectQuery"], "SELECT 1");
}
