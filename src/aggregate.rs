use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::providers::viaggiatreno::stop_count;
use crate::providers::TrainSource;
use crate::store::Store;

pub const STATUS_FIELD: &str = "subTitle";
pub const STOPS_FIELD: &str = "fermate";

/// Values of one detail field across all candidate dates of a train,
/// keyed by the detail request that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupResult {
    entries: Vec<(String, Value)>,
    last_issued: Option<String>,
    failed: usize,
}

impl LookupResult {
    /// Record a value; a key seen before keeps its position and takes the new value
    pub fn record(&mut self, key: String, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Entries in the order they were first recorded
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Key of the last detail request sent in this pass, whether or not it succeeded
    pub fn last_issued(&self) -> Option<&str> {
        self.last_issued.as_deref()
    }

    /// Number of detail calls that yielded no data
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// First non-empty text value in insertion order. Later entries are not inspected.
    pub fn first_non_empty_text(&self) -> Option<&str> {
        self.entries
            .iter()
            .find_map(|(_, v)| v.as_str().filter(|s| !s.is_empty()))
    }

    /// Stop-list length under the last issued key, 0 when that call produced nothing
    pub fn last_issued_stop_count(&self) -> usize {
        self.last_issued()
            .and_then(|key| self.get(key))
            .map(stop_count)
            .unwrap_or(0)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for LookupResult {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut result = LookupResult::default();
        for (key, value) in iter {
            let key = key.into();
            result.last_issued = Some(key.clone());
            result.record(key, value);
        }
        result
    }
}

/// One aggregation pass: listing call, then a detail call per candidate date.
///
/// Failed calls are skipped; the pass itself cannot fail.
pub async fn aggregate_parameter(
    source: &dyn TrainSource,
    train_number: u32,
    parameter: &str,
) -> LookupResult {
    let mut result = LookupResult::default();

    let dates = match source.candidate_dates(train_number).await {
        Ok(dates) => dates,
        Err(e) => {
            debug!(train_number, parameter, error = %e, "Listing call failed, no data");
            return result;
        }
    };

    for date in &dates {
        let key = source.request_key(date);
        result.last_issued = Some(key.clone());

        match source.detail(train_number, date).await {
            Ok(detail) => {
                let value = detail.field(parameter).cloned().unwrap_or(Value::Null);
                result.record(key, value);
            }
            Err(e) => {
                debug!(train_number, date = %date, error = %e, "Detail call failed, skipping date");
                result.failed += 1;
            }
        }
    }

    result
}

/// Result of processing one train
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An irregularity was found. `stored` is false if the train was already in the store.
    Saved {
        train_number: u32,
        sub_title: String,
        num_stations: usize,
        stored: bool,
    },
    NoIssue { train_number: u32 },
    NoData { train_number: u32 },
    /// An irregularity was found but could not be written
    StoreFailed { train_number: u32, reason: String },
}

impl Outcome {
    pub fn train_number(&self) -> u32 {
        match self {
            Outcome::Saved { train_number, .. }
            | Outcome::NoIssue { train_number }
            | Outcome::NoData { train_number }
            | Outcome::StoreFailed { train_number, .. } => *train_number,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Saved {
                train_number,
                sub_title,
                num_stations,
                ..
            } => write!(
                f,
                "Saved {} -> {} with {} stations",
                train_number, sub_title, num_stations
            ),
            Outcome::NoIssue { train_number } => write!(f, "{} → no issue found", train_number),
            Outcome::NoData { train_number } => write!(f, "{} → no data", train_number),
            Outcome::StoreFailed {
                train_number,
                reason,
            } => write!(f, "{} → not saved ({})", train_number, reason),
        }
    }
}

/// Fetch, aggregate and conditionally store a single train
pub struct TrainPipeline {
    source: Arc<dyn TrainSource>,
    store: Store,
}

impl TrainPipeline {
    pub fn new(source: Arc<dyn TrainSource>, store: Store) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn process_train(&self, train_number: u32) -> Outcome {
        let statuses = aggregate_parameter(self.source.as_ref(), train_number, STATUS_FIELD).await;
        let stops = aggregate_parameter(self.source.as_ref(), train_number, STOPS_FIELD).await;

        // Attributed to the last stop-list request, not to the date the status came from
        let num_stations = stops.last_issued_stop_count();

        if statuses.is_empty() {
            return Outcome::NoData { train_number };
        }

        let Some(issue) = statuses.first_non_empty_text() else {
            return Outcome::NoIssue { train_number };
        };

        match self.store.insert(train_number, num_stations, issue).await {
            Ok(stored) => Outcome::Saved {
                train_number,
                sub_title: issue.to_string(),
                num_stations,
                stored,
            },
            Err(e) => {
                warn!(train_number, error = %e, "Failed to store train irregularity");
                Outcome::StoreFailed {
                    train_number,
                    reason: e.to_string(),
                }
            }
        }
    }
}
