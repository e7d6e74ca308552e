pub mod amount;
pub mod classifier;
pub mod db;
pub mod engine;
pub mod ingest;
pub mod migration;
pub mod models;
pub mod name_normalizer;
pub mod raw_import;
pub mod unit_normalizer;
pub mod units;
