pub mod analytics;
pub mod api;
pub mod classifier;
pub mod config;
pub mod dedup;
pub mod extractor;
pub mod fraud;
pub mod labeler;
pub mod pipeline;
pub mod sms;
pub mod training;
