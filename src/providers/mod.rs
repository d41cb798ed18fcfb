pub mod viaggiatreno;

use async_trait::async_trait;

use crate::error::LookupError;
pub use viaggiatreno::{parse_listing, CandidateDate, DetailRecord, ViaggiaTrenoClient};

/// Remote service queried by the scan: a listing call per train and a detail
/// call per candidate date.
#[async_trait]
pub trait TrainSource: Send + Sync {
    /// Candidate dates the service knows for this train number
    async fn candidate_dates(&self, train_number: u32) -> Result<Vec<CandidateDate>, LookupError>;

    /// Detail record for one (train, date) pair
    async fn detail(
        &self,
        train_number: u32,
        date: &CandidateDate,
    ) -> Result<DetailRecord, LookupError>;

    /// Identifier of the detail request for `date`, known before the request is sent
    fn request_key(&self, date: &CandidateDate) -> String;
}
