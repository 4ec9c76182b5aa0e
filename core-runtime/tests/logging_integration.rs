//! Integration tests for logging setup.
//!
//! `init_logging` installs a process-wide subscriber, so this binary calls it
//! from a single test only.

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

#[test]
fn test_init_logging_forwards_to_sink_and_rejects_second_init() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config).unwrap();

    tracing::info!(target: "core_service::wishlist", isbn = "9780441013593", "Added to wishlist");
    tracing::debug!(target: "core_service::wishlist", "below sink level");
    tracing::info!(target: "some_other_crate", "filtered by EnvFilter");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Added to wishlist");
        assert_eq!(
            entries[0].fields.get("isbn"),
            Some(&"9780441013593".to_string())
        );
    }

    let second = init_logging(LoggingConfig::default());
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_pii_redaction_for_profile_fields() {
    assert_eq!(redact_if_sensitive("database_auth_token", "eyJhbGci"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("mobileNumber", "+47 555 0100"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("homeAddress", "Storgata 1, Oslo"), "[REDACTED]");

    let email = redact_if_sensitive("email", "reader@books.example");
    assert!(email.starts_with('r'));
    assert!(!email.contains("books.example"));

    assert_eq!(redact_if_sensitive("uid", "u_123"), "u_123");
    assert_eq!(redact_if_sensitive("genre", "Science Fiction"), "Science Fiction");
}
