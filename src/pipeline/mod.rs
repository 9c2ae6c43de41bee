//! Bill extraction pipeline.
//!
//! Every fetched message flows through:
//! 1. `decode::decode_body()`: pick and decode one text part
//! 2. `amount::extract_amount()`: last dollar amount in the text
//! 3. `classify::classify()`: sender address → category
//! 4. `record::build_record()`: validated `Record`
//!
//! `processor::BillProcessor` composes the steps per batch and
//! `runner::run_once()` wraps it with the mailbox and store collaborators.

pub mod amount;
pub mod classify;
pub mod decode;
pub mod processor;
pub mod record;
pub mod runner;
pub mod types;
