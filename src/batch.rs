//! Batch drivers for the generation and correction tasks.
//!
//! Both tasks share one driver skeleton: iterate records in order, build a
//! prompt, make one LLM call, clean the response, and fall back per task
//! policy when the call fails. Records are processed strictly sequentially.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::clean::clean_sql_query;
use crate::error::Result;
use crate::llm::{ChatMessage, LlmClient, TokenCounter};
use crate::prompts;

/// Generation task input record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NlRecord {
    #[serde(rename = "NL")]
    pub nl: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    #[serde(rename = "NL")]
    pub nl: String,
    /// Empty string when the API call failed.
    #[serde(rename = "Query")]
    pub query: String,
}

/// Correction task input after shape normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionInput {
    pub incorrect_query: String,
    /// Empty when the record carried no NL description.
    pub nl: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionResult {
    #[serde(rename = "IncorrectQuery")]
    pub incorrect_query: String,
    /// Equals `incorrect_query` unchanged when the API call failed.
    #[serde(rename = "CorrectQuery")]
    pub correct_query: String,
}

/// Correction output plus the count of shape-rejected input records, so
/// dropped records are an observable policy rather than a silent one.
#[derive(Debug, Default)]
pub struct CorrectionReport {
    pub results: Vec<CorrectionResult>,
    pub skipped: usize,
}

/// Read a JSON array of records from disk.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write records to disk as a JSON array.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let text = serde_json::to_string(records)?;
    std::fs::write(path, text)?;
    Ok(())
}

pub struct BatchRunner<'a> {
    client: &'a LlmClient,
    schema_description: &'a str,
}

impl<'a> BatchRunner<'a> {
    pub fn new(client: &'a LlmClient, schema_description: &'a str) -> Self {
        Self {
            client,
            schema_description,
        }
    }

    /// Generate a SQL query for every NL record. Never drops records: the
    /// output length always equals the input length, with an empty query
    /// standing in for failed calls.
    pub async fn generate(
        &self,
        records: Vec<NlRecord>,
        counter: &mut TokenCounter,
    ) -> Vec<GenerationResult> {
        info!("generating SQL for {} record(s)", records.len());
        self.run_batch(
            records,
            counter,
            |record| prompts::generation_messages(&record.nl, self.schema_description),
            |record, cleaned| GenerationResult {
                nl: record.nl,
                query: cleaned.unwrap_or_default(),
            },
        )
        .await
    }

    /// Correct each recognizable record, keeping the original query as the
    /// answer when the call fails. Unrecognized shapes are skipped and
    /// counted in the report.
    pub async fn correct(
        &self,
        records: Vec<Value>,
        counter: &mut TokenCounter,
    ) -> CorrectionReport {
        info!("correcting {} record(s)", records.len());
        let (inputs, skipped) = normalize_correction_records(records);
        if skipped > 0 {
            warn!("skipped {} correction record(s) with unrecognized shape", skipped);
        }

        let results = self
            .run_batch(
                inputs,
                counter,
                |input| {
                    prompts::correction_messages(
                        &input.incorrect_query,
                        &input.nl,
                        self.schema_description,
                    )
                },
                |input, cleaned| {
                    let correct_query =
                        cleaned.unwrap_or_else(|| input.incorrect_query.clone());
                    CorrectionResult {
                        incorrect_query: input.incorrect_query,
                        correct_query,
                    }
                },
            )
            .await;

        CorrectionReport { results, skipped }
    }

    /// Shared driver skeleton, parametrized by a prompt builder and a
    /// fallback-applying finalizer. Input order is preserved.
    async fn run_batch<T, O>(
        &self,
        records: Vec<T>,
        counter: &mut TokenCounter,
        build_messages: impl Fn(&T) -> Vec<ChatMessage>,
        finalize: impl Fn(T, Option<String>) -> O,
    ) -> Vec<O> {
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let cleaned = self.complete(build_messages(&record), counter).await;
            results.push(finalize(record, cleaned));
        }
        results
    }

    /// One call: request, count tokens, clean the content. `None` covers
    /// both transport failures and unusable payloads, which the drivers
    /// treat identically.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        counter: &mut TokenCounter,
    ) -> Option<String> {
        match self.client.chat_completion(&messages).await {
            Ok(reply) => {
                counter.add(reply.completion_tokens);
                match reply.content {
                    Some(content) => Some(clean_sql_query(&content)),
                    None => {
                        warn!("API error: {}", reply.raw);
                        None
                    }
                }
            }
            Err(e) => {
                warn!("API error: {}", e);
                None
            }
        }
    }
}

/// Normalize raw correction records, probing `Query` then `IncorrectQuery`.
/// Returns the recognized inputs in order plus the skipped count.
pub fn normalize_correction_records(records: Vec<Value>) -> (Vec<CorrectionInput>, usize) {
    let mut inputs = Vec::with_capacity(records.len());
    let mut skipped = 0usize;
    for record in records {
        match normalize_correction_record(&record) {
            Some(input) => inputs.push(input),
            None => {
                warn!(
                    "correction record has neither Query nor IncorrectQuery, skipping: {}",
                    record
                );
                skipped += 1;
            }
        }
    }
    (inputs, skipped)
}

fn normalize_correction_record(record: &Value) -> Option<CorrectionInput> {
    let object = record.as_object()?;
    let incorrect_query = object
        .get("Query")
        .or_else(|| object.get("IncorrectQuery"))?
        .as_str()?;
    let nl = object.get("NL").and_then(Value::as_str).unwrap_or_default();

    Some(CorrectionInput {
        incorrect_query: incorrect_query.to_string(),
        nl: nl.to_string(),
    })
}
