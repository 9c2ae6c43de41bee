//! Bill parser: turns unread bill emails into time-series records.

pub mod channels;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;
