//! The stdout sink: write the rendered string and a newline to standard
//! output.

use async_trait::async_trait;
use sv_common::{Alert, Result};

use crate::Sink;

pub struct StdoutSink;

#[async_trait]
impl Sink for StdoutSink {
    async fn deliver(&self, _alert: &Alert, message: &str) -> Result<()> {
        println!("{message}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use sv_common::{DeviationCondition, SignalStrategy};

    #[tokio::test]
    async fn delivers_without_error() {
        let alert = Alert::new(
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
        );
        StdoutSink.deliver(&alert, "rendered message").await.unwrap();
    }
}
