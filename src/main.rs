use anyhow::{ensure, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use sqlscribe::batch::{load_records, write_records, BatchRunner, NlRecord};
use sqlscribe::llm::{LlmClient, TokenCounter};
use sqlscribe::prompts::schema_description;
use sqlscribe::schema::extract_schema;

#[derive(Parser)]
#[command(name = "sqlscribe")]
#[command(about = "Natural-language-to-SQL generation and correction over a chat-completion API")]
#[command(version)]
struct Args {
    /// Generation task input: JSON array of {"NL": ...} records
    #[arg(long, default_value = "train_generate_task.json")]
    generation_input: PathBuf,

    /// Correction task input: JSON array with "Query" or "IncorrectQuery" keys
    #[arg(long, default_value = "train_query_correction_task.json")]
    correction_input: PathBuf,

    /// SQL DDL file used for schema grounding
    #[arg(long, default_value = "required.sql")]
    schema: PathBuf,

    /// Generation task output path
    #[arg(long, default_value = "output_sql_generation_task.json")]
    generation_output: PathBuf,

    /// Correction task output path
    #[arg(long, default_value = "output_sql_correction_task.json")]
    correction_output: PathBuf,

    /// Model identifier sent to the chat-completion endpoint
    #[arg(long, default_value = "llama-3.3-70b-versatile")]
    model: String,

    /// Base URL of the chat-completion API
    #[arg(long, default_value = "https://api.groq.com/openai/v1")]
    base_url: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.1)]
    temperature: f64,

    /// Maximum new tokens per completion
    #[arg(long, default_value_t = 500)]
    max_tokens: u32,

    /// Number of completions requested per call
    #[arg(long, default_value_t = 1)]
    samples: u32,

    /// API key (or set GROQ_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var("GROQ_API_KEY").ok())
        .unwrap_or_else(|| "dummy-api-key".to_string());

    info!("sqlscribe starting");

    let ddl = std::fs::read_to_string(&args.schema)
        .with_context(|| format!("reading schema file {}", args.schema.display()))?;
    let schema = extract_schema(&ddl);
    let description = schema_description(&schema);
    info!(
        "extracted {} table(s) from {}",
        schema.len(),
        args.schema.display()
    );

    let generation_records: Vec<NlRecord> = load_records(&args.generation_input)
        .with_context(|| format!("loading {}", args.generation_input.display()))?;
    let correction_records: Vec<serde_json::Value> = load_records(&args.correction_input)
        .with_context(|| format!("loading {}", args.correction_input.display()))?;
    let generation_total = generation_records.len();

    let client = LlmClient::new(api_key, args.model.clone(), args.base_url.clone())
        .with_sampling(args.temperature, args.max_tokens, args.samples);
    let runner = BatchRunner::new(&client, &description);
    let mut tokens = TokenCounter::new();

    let start = Instant::now();
    let generated = runner.generate(generation_records, &mut tokens).await;
    let generation_time = start.elapsed();

    let start = Instant::now();
    let corrections = runner.correct(correction_records, &mut tokens).await;
    let correction_time = start.elapsed();

    ensure!(
        generated.len() == generation_total,
        "generation produced {} result(s) for {} input record(s)",
        generated.len(),
        generation_total
    );

    write_records(&args.correction_output, &corrections.results)
        .with_context(|| format!("writing {}", args.correction_output.display()))?;
    write_records(&args.generation_output, &generated)
        .with_context(|| format!("writing {}", args.generation_output.display()))?;

    println!("Time taken to generate SQLs: {:.3} seconds", generation_time.as_secs_f64());
    println!("Time taken to correct SQLs: {:.3} seconds", correction_time.as_secs_f64());
    println!("Total tokens: {}", tokens.total());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_match_batch_script() {
        let args = Args::try_parse_from(["sqlscribe"]).unwrap();

        assert_eq!(args.generation_input, PathBuf::from("train_generate_task.json"));
        assert_eq!(
            args.correction_input,
            PathBuf::from("train_query_correction_task.json")
        );
        assert_eq!(args.schema, PathBuf::from("required.sql"));
        assert_eq!(
            args.generation_output,
            PathBuf::from("output_sql_generation_task.json")
        );
        assert_eq!(
            args.correction_output,
            PathBuf::from("output_sql_correction_task.json")
        );
        assert_eq!(args.model, "llama-3.3-70b-versatile");
        assert_eq!(args.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(args.temperature, 0.1);
        assert_eq!(args.max_tokens, 500);
        assert_eq!(args.samples, 1);
        assert!(args.api_key.is_none());
    }
}
