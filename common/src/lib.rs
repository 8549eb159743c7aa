//! Convertly Common Types
//!
//! This crate contains the shared types used across Convertly: currency
//! codes and catalog records, rate tables, conversion results, time
//! utilities and display formatting.

pub mod currency;
pub mod format;
pub mod rates;
pub mod time;

pub use currency::*;
pub use rates::*;
pub use time::*;
