#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use trainwatch::{CandidateDate, DetailRecord, LookupError, Store, TrainPipeline, TrainSource};

/// One run of a train: the listing field and the detail body, or `None` for a failing call
pub struct FakeRun {
    date: CandidateDate,
    detail: Option<Value>,
}

pub fn run(listing_field: &str, detail: Value) -> FakeRun {
    FakeRun {
        date: CandidateDate::from_listing_field(listing_field).expect("valid listing field"),
        detail: Some(detail),
    }
}

pub fn failing_run(listing_field: &str) -> FakeRun {
    FakeRun {
        date: CandidateDate::from_listing_field(listing_field).expect("valid listing field"),
        detail: None,
    }
}

/// In-memory `TrainSource` that counts calls and concurrent calls
#[derive(Default)]
pub struct FakeSource {
    trains: HashMap<u32, Vec<FakeRun>>,
    failing_listings: HashSet<u32>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_train(mut self, train_number: u32, runs: Vec<FakeRun>) -> Self {
        self.trains.insert(train_number, runs);
        self
    }

    pub fn with_failing_listing(mut self, train_number: u32) -> Self {
        self.failing_listings.insert(train_number);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TrainSource for FakeSource {
    async fn candidate_dates(&self, train_number: u32) -> Result<Vec<CandidateDate>, LookupError> {
        self.enter().await;
        let result = if self.failing_listings.contains(&train_number) {
            Err(LookupError::Network("connection refused".to_string()))
        } else {
            Ok(self
                .trains
                .get(&train_number)
                .map(|runs| runs.iter().map(|r| r.date.clone()).collect())
                .unwrap_or_default())
        };
        self.exit();
        result
    }

    async fn detail(
        &self,
        train_number: u32,
        date: &CandidateDate,
    ) -> Result<DetailRecord, LookupError> {
        self.enter().await;
        let detail = self
            .trains
            .get(&train_number)
            .and_then(|runs| runs.iter().find(|r| &r.date == date))
            .and_then(|r| r.detail.clone());
        self.exit();

        match detail {
            Some(value) => DetailRecord::from_value(value),
            None => Err(LookupError::Timeout),
        }
    }

    fn request_key(&self, date: &CandidateDate) -> String {
        format!("fake://detail/{}", date)
    }
}

pub async fn memory_store() -> Store {
    let store = Store::open("sqlite::memory:", 1).await.unwrap();
    store.init_schema().await.unwrap();
    store
}

pub async fn pipeline(source: Arc<FakeSource>) -> TrainPipeline {
    TrainPipeline::new(source, memory_store().await)
}
