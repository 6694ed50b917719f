//! The shared append-only row sink.
//!
//! Every collector acquires its own sink through a [`SinkConnector`], appends
//! its whole batch in one call and drops the handle. Connections are not
//! shared, so a failure in one collector's connection does not affect the
//! others.
//!
//! # Submodules
//!
//! - [`sheets`]: Google Sheets implementation (first worksheet of one spreadsheet)

pub mod sheets;

use crate::models::{Delivery, Row};
use std::error::Error;
use tracing::{error, info, instrument};

/// A live, writable sink. Appends raw rows; no schema is enforced.
pub trait RowSink {
    /// Append `rows` as a single batch, returning how many rows were written.
    async fn append_rows(&self, rows: &[Row]) -> Result<usize, Box<dyn Error>>;
}

/// Opens fresh [`RowSink`] handles.
pub trait SinkConnector {
    type Sink: RowSink;

    async fn connect(&self) -> Result<Self::Sink, Box<dyn Error>>;
}

/// Open a sink, logging and swallowing connection errors.
#[instrument(level = "info", skip_all)]
pub async fn open_sink<C: SinkConnector>(connector: &C) -> Option<C::Sink> {
    match connector.connect().await {
        Ok(sink) => Some(sink),
        Err(e) => {
            error!(error = %e, "Error connecting to sink");
            None
        }
    }
}

/// Open a sink, append `rows` once, and drop the handle.
///
/// If the sink cannot be opened or the append fails the batch is dropped.
#[instrument(level = "info", skip_all, fields(%collector, rows = rows.len()))]
pub async fn deliver<C: SinkConnector>(connector: &C, collector: &str, rows: &[Row]) -> Delivery {
    let Some(sink) = open_sink(connector).await else {
        error!(collector, dropped = rows.len(), "Sink unavailable; dropping batch");
        return Delivery::SinkUnavailable;
    };

    if rows.is_empty() {
        info!(collector, "No rows to append");
        return Delivery::NothingToAppend;
    }

    match sink.append_rows(rows).await {
        Ok(n) => {
            info!(collector, appended = n, "Data saved to sheet");
            Delivery::Appended(n)
        }
        Err(e) => {
            error!(collector, error = %e, dropped = rows.len(), "Append failed; dropping batch");
            Delivery::AppendFailed(e.to_string())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingConnector;
    use super::*;

    #[tokio::test]
    async fn test_deliver_appends_one_batch() {
        let connector = RecordingConnector::default();
        let rows: Vec<Row> = vec![vec!["a".into()], vec!["b".into()]];

        let delivery = deliver(&connector, "test", &rows).await;

        assert_eq!(delivery, Delivery::Appended(2));
        assert_eq!(connector.batches.borrow().len(), 1);
        assert_eq!(connector.rows(), rows);
    }

    #[tokio::test]
    async fn test_deliver_drops_batch_when_connect_fails() {
        let connector = RecordingConnector::failing();
        let rows: Vec<Row> = vec![vec!["a".into()]];

        let delivery = deliver(&connector, "test", &rows).await;

        assert_eq!(delivery, Delivery::SinkUnavailable);
        assert_eq!(*connector.connects.borrow(), 1);
        assert!(connector.rows().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_empty_batch_still_connects() {
        let connector = RecordingConnector::default();
        let delivery = deliver(&connector, "test", &[]).await;
        assert_eq!(delivery, Delivery::NothingToAppend);
        assert_eq!(*connector.connects.borrow(), 1);
        assert!(connector.batches.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_drops_batch_when_append_fails() {
        let connector = RecordingConnector::failing_append();
        let rows: Vec<Row> = vec![vec!["a".into()], vec!["b".into()]];

        let delivery = deliver(&connector, "test", &rows).await;

        assert!(matches!(delivery, Delivery::AppendFailed(ref e) if e.contains("503")));
        assert_eq!(*connector.connects.borrow(), 1);
        assert!(connector.rows().is_empty());
    }
}
