//! Event stream readers
//!
//! Parses JSON arrays or NDJSON into `DanmuEvent`s and reports per-record
//! issues without rejecting the batch.

use serde::Serialize;

use crate::error::ComputeError;
use crate::schema::event::{DanmuEvent, EventIssue};

/// Reader for danmu.event.v1 streams
pub struct EventReader;

impl EventReader {
    /// Parse a JSON string containing an array of events
    pub fn parse_array(json: &str) -> Result<Vec<DanmuEvent>, ComputeError> {
        let events: Vec<DanmuEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing events
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<DanmuEvent>, ComputeError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<DanmuEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Report every event carrying at least one issue
    pub fn validate_events(events: &[DanmuEvent]) -> Vec<ValidationResult> {
        events
            .iter()
            .enumerate()
            .map(|(index, event)| ValidationResult {
                index,
                issues: event.issues(),
            })
            .filter(|r| !r.issues.is_empty())
            .collect()
    }
}

/// Issues found on one event
#[derive(Debug, Serialize)]
pub struct ValidationResult {
    pub index: usize,
    pub issues: Vec<EventIssue>,
}
