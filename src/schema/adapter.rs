//! Adapter for feeding affect.input.v1 records into a fusion engine

use crate::error::AffectError;
use crate::fusion::FusionCombiner;
use crate::schema::record::*;
use crate::types::FusionResult;

/// Adapter between input records and a [`FusionCombiner`]
pub struct InputAdapter;

impl InputAdapter {
    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<Vec<InputRecord>, AffectError> {
        let records: Vec<InputRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse one NDJSON line
    pub fn parse_line(line: &str) -> Result<InputRecord, AffectError> {
        serde_json::from_str(line.trim()).map_err(|e| AffectError::ParseError(e.to_string()))
    }

    /// Parse NDJSON (newline-delimited JSON), skipping blank lines
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<InputRecord>, AffectError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<InputRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(AffectError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Validate a batch of records, returning only the failures
    pub fn validate_records(records: &[InputRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record.validate().err().map(|error| ValidationResult {
                    index,
                    record_type: record.type_name(),
                    error,
                })
            })
            .collect()
    }

    /// Apply one record to the engine.
    ///
    /// The engine's timers are first advanced to the record's timestamp.
    /// Returns the result of any analysis the record triggered, whether from
    /// the auto-analysis timer or from the record itself.
    pub fn apply(engine: &mut FusionCombiner, record: &InputRecord) -> Option<FusionResult> {
        let now = record.timestamp;
        let mut analyzed = engine.tick(now);

        if let Some(event) = record.behavior_event() {
            engine.capture(event);
            return analyzed;
        }

        match &record.payload {
            InputPayload::Keystroke { key, field } => {
                engine.capture_key(key, &field.clone().unwrap_or_default(), now);
            }
            InputPayload::Text { text } => analyzed = Some(engine.feed_text(text, now)),
            InputPayload::Manual { label } => {
                engine.set_manual_emotion(*label, now);
                analyzed = Some(engine.result().clone());
            }
            InputPayload::ClearManual => analyzed = Some(engine.clear_manual_emotion(now)),
            _ => {}
        }
        analyzed
    }
}

/// A record that failed validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub record_type: &'static str,
    pub error: ValidationError,
}
