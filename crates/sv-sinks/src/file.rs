//! The file sink: append the rendered string and a newline. The file is
//! opened, written, flushed, and closed per call — not held open across
//! deliveries.

use std::path::PathBuf;

use async_trait::async_trait;
use sv_common::{Alert, AlertingError, Result};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::Sink;

pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn deliver(&self, _alert: &Alert, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AlertingError::SinkTransient(format!("opening {}: {e}", self.path.display())))?;

        file.write_all(message.as_bytes())
            .await
            .map_err(|e| AlertingError::SinkTransient(format!("writing {}: {e}", self.path.display())))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| AlertingError::SinkTransient(format!("writing {}: {e}", self.path.display())))?;
        file.flush()
            .await
            .map_err(|e| AlertingError::SinkTransient(format!("flushing {}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use sv_common::{DeviationCondition, SignalStrategy};

    fn test_alert() -> Alert {
        Alert::new(
            DeviationCondition {
                signal: "x".to_string(),
                timeframe: Duration::from_secs(60),
                difference: 10,
            },
            "{{signal}}".to_string(),
            None,
            None,
            60,
            SignalStrategy::OldestNewest,
        )
    }

    #[tokio::test]
    async fn appends_each_delivery_on_its_own_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.log");
        let sink = FileSink::new(&path);

        sink.deliver(&test_alert(), "first").await.unwrap();
        sink.deliver(&test_alert(), "second").await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[tokio::test]
    async fn creates_parent_file_if_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.log");
        assert!(!path.exists());

        let sink = FileSink::new(&path);
        sink.deliver(&test_alert(), "hello").await.unwrap();
        assert!(path.exists());
    }
}
