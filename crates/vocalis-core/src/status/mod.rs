//! Request lifecycle tracking

mod manager;
mod types;

pub use manager::{StatusManager, StatusUpdate, HISTORY_CAPACITY};
pub use types::{
    Progress, ProgressSnapshot, ProgressView, RecordView, RequestParameters, RequestRecord,
    RequestState, StatusSnapshot, Statistics,
};
