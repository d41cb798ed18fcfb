//! ViaggiaTreno (Trenitalia) infomobility client
//!
//! Two endpoints are used:
//!
//! ## Autocomplete listing
//! `GET {listing_url}{train_number}` returns plain text, one run per line:
//! ```text
//! 9 - MILANO CENTRALE - 05/12/24|9-S01700-1733353200000
//! ```
//! The second `|` field is split on `-` into exactly three parts. They are
//! remapped positionally to `{1}/{0}/{2}` and appended to the detail URL.
//! Lines that do not yield three parts are skipped.
//!
//! ## Train progress
//! `GET {detail_url}{remapped}` returns a JSON object. The scan reads
//! `subTitle` (irregularity text, often `null` or empty) and `fermate`
//! (the stop list). `compNumeroTreno` (e.g. `"FR 9"`) and `ritardo` (delay
//! in minutes) are only logged.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::TrainSource;
use crate::error::LookupError;

/// Run reference taken from one listing line, already in request-path form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateDate(String);

impl CandidateDate {
    /// Remap a `a-b-c` listing field to `b/a/c`. Not calendar-aware.
    pub fn from_listing_field(field: &str) -> Option<Self> {
        let parts: Vec<&str> = field.split('-').collect();
        if parts.len() != 3 {
            return None;
        }
        Some(Self(format!("{}/{}/{}", parts[1], parts[0], parts[2])))
    }

    pub fn as_path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse the newline-delimited autocomplete body into candidate dates
pub fn parse_listing(body: &str) -> Vec<CandidateDate> {
    body.lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split('|').nth(1))
        .filter_map(CandidateDate::from_listing_field)
        .collect()
}

/// JSON object returned by the train progress endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord(serde_json::Map<String, Value>);

impl DetailRecord {
    pub fn from_value(value: Value) -> Result<Self, LookupError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(LookupError::Decode(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Named field, `None` when absent
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn sub_title(&self) -> Option<&str> {
        self.field("subTitle").and_then(Value::as_str)
    }

    pub fn stop_count(&self) -> usize {
        self.field("fermate").map(stop_count).unwrap_or(0)
    }

    /// Category and number as shown to passengers, e.g. `FR 9`
    pub fn train_label(&self) -> Option<&str> {
        self.field("compNumeroTreno").and_then(Value::as_str)
    }

    pub fn delay_minutes(&self) -> Option<i64> {
        self.field("ritardo").and_then(Value::as_i64)
    }
}

/// Length of a stop list value; anything that is not an array counts as no stops
pub fn stop_count(value: &Value) -> usize {
    value.as_array().map(Vec::len).unwrap_or(0)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone)]
pub struct ViaggiaTrenoClient {
    client: reqwest::Client,
    listing_url: String,
    detail_url: String,
}

impl ViaggiaTrenoClient {
    pub fn new(
        listing_url: impl Into<String>,
        detail_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            listing_url: listing_url.into(),
            detail_url: detail_url.into(),
        })
    }

    fn listing_request_url(&self, train_number: u32) -> String {
        format!("{}{}", self.listing_url, train_number)
    }

    fn detail_request_url(&self, date: &CandidateDate) -> String {
        format!("{}{}", self.detail_url, date.as_path())
    }
}

#[async_trait]
impl TrainSource for ViaggiaTrenoClient {
    async fn candidate_dates(&self, train_number: u32) -> Result<Vec<CandidateDate>, LookupError> {
        let url = self.listing_request_url(train_number);
        debug!(url = %url, train_number, "Fetching candidate dates");

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(parse_listing(&body))
    }

    async fn detail(
        &self,
        train_number: u32,
        date: &CandidateDate,
    ) -> Result<DetailRecord, LookupError> {
        let url = self.detail_request_url(date);
        debug!(url = %url, train_number, "Fetching train detail");

        let value: Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let record = DetailRecord::from_value(value)?;
        debug!(
            train_number,
            label = record.train_label().unwrap_or("-"),
            delay_minutes = record.delay_minutes(),
            stops = record.stop_count(),
            "Retrieved train detail"
        );

        Ok(record)
    }

    fn request_key(&self, date: &CandidateDate) -> String {
        self.detail_request_url(date)
    }
}
