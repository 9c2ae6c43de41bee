//! Mail provider I/O.

pub mod gmail;
pub mod gmail_types;
pub mod oauth;

pub use gmail::{GmailClient, GmailConfig};
