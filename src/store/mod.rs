//! Persistence layer: time-series storage for bill records.

pub mod influx;
pub mod traits;

pub use influx::{InfluxConfig, InfluxWriter};
pub use traits::RecordSink;
