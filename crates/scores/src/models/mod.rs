//! Domain models for coalition-score entities

mod raw_response;
mod score;

pub use raw_response::RawResponse;
pub use score::ScoreRecord;
