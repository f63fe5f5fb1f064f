//! Core modules: the transcript model, the value index and provenance
//! tracking, the report types, the aggregator, and the batch driver.

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod provenance;
pub mod report;
pub mod schema;
pub mod time;
pub mod transcript;
pub mod validate;
pub mod value_index;
