//! pumpsched core - day profiles, prices, datasets and input loading
//!
//! This crate provides the data types shared by the training and CLI crates:
//! aligned 24-hour flow/price series, validated datasets and batches, the
//! CSV-backed profile/price store and a synthetic data generator.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]

pub mod data;
pub mod dataset;
pub mod error;
pub mod synthetic;
pub mod types;

pub use data::TableOptions;
pub use dataset::{Batch, Dataset, InputStats, SeriesStats};
pub use error::{Result, SchedError};
pub use types::{mean_price, ActionVector, DayProfile, PriceSeries, HOURS};
