//! InfluxDB v2 writer: one line-protocol point per record.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info};

use crate::config::ParserConfig;
use crate::error::StoreError;
use crate::pipeline::types::Record;
use crate::store::traits::RecordSink;

/// Tag attached to every point.
const UNIT_TAG: &str = "unit=dollar";

/// Connection settings for the v2 write API.
#[derive(Debug)]
pub struct InfluxConfig {
    /// Server base URL, e.g. `http://localhost:8086`.
    pub url: String,
    pub token: SecretString,
    pub org: String,
    pub bucket: String,
}

impl InfluxConfig {
    /// Take the store settings out of the parser config.
    pub fn from_parser_config(config: &ParserConfig) -> Self {
        Self {
            url: config.db_url.clone(),
            token: SecretString::from(config.db_token.expose_secret().to_string()),
            org: config.db_org.clone(),
            bucket: config.db_bucket.clone(),
        }
    }

    fn write_url(&self) -> String {
        format!("{}/api/v2/write", self.url.trim_end_matches('/'))
    }
}

/// Blocking-style writer: each record is posted and checked before the next.
pub struct InfluxWriter {
    client: reqwest::Client,
    config: InfluxConfig,
}

impl InfluxWriter {
    pub fn new(config: InfluxConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn write_point(&self, line: String) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.config.write_url())
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.config.token.expose_secret()),
            )
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RecordSink for InfluxWriter {
    async fn write_records(&self, records: &[Record]) -> usize {
        let mut errcount = 0;

        for record in records {
            let result = match to_line_protocol(record) {
                Ok(line) => {
                    debug!(line = %line, "Writing point");
                    self.write_point(line).await
                }
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                error!(
                    category = %record.category,
                    amount = %record.amount,
                    error = %e,
                    "failed to write record to db"
                );
                errcount += 1;
            }
        }

        if errcount == 0 {
            info!("successfully wrote {} records to tsdb", records.len());
        }
        errcount
    }
}

/// Render a record as a line-protocol point with millisecond precision.
///
/// `electric,unit=dollar amount=52.13 1700000000000`
pub fn to_line_protocol(record: &Record) -> Result<String, StoreError> {
    if record.category.is_empty() {
        return Err(StoreError::EmptyMeasurement);
    }
    Ok(format!(
        "{},{} amount={} {}",
        escape_measurement(&record.category),
        UNIT_TAG,
        record.amount,
        record.timestamp.timestamp_millis()
    ))
}

/// Escape commas and spaces, the two characters that end a measurement.
fn escape_measurement(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for ch in name.chars() {
        if matches!(ch, ',' | ' ') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
