//! Concurrent sink fan-out

use std::sync::Arc;

use etl_config::{LoadConfig, StreamConfig};
use etl_protocol::TransformedBatch;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::csv::CsvSink;
use crate::dump::DumpSink;
use crate::error::{Result, SinkError};
use crate::otel::OtelSink;
use crate::remote_write::RemoteWriteSink;
use crate::Sink;

/// Owns a pipeline's sinks and fans batches out to all of them
///
/// Sinks run concurrently and are joined before `load` returns; failures
/// are collected so one bad sink never hides the others' outcomes.
pub struct Loader {
    sinks: Vec<Arc<dyn Sink>>,
}

impl Loader {
    /// Build all sinks declared in the load config
    pub fn new(config: &LoadConfig) -> Result<Self> {
        let mut sinks: Vec<Arc<dyn Sink>> = Vec::with_capacity(config.streams.len());
        for stream in &config.streams {
            let sink: Arc<dyn Sink> = match stream {
                StreamConfig::Csv(c) => Arc::new(CsvSink::new(c.clone())),
                StreamConfig::RemoteWrite(c) => {
                    Arc::new(RemoteWriteSink::new(c.clone(), config.metrics.clone())?)
                }
                StreamConfig::Otel(c) => Arc::new(OtelSink::new(c.clone())?),
                StreamConfig::Dump(c) => {
                    Arc::new(DumpSink::new(c.clone(), config.metrics.clone()))
                }
            };
            sinks.push(sink);
        }
        Ok(Self { sinks })
    }

    /// Build a loader from already-constructed sinks
    pub fn from_sinks(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { sinks }
    }

    /// Number of configured sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether any sinks are configured
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver one tick's batches to every sink concurrently
    pub async fn load(
        &self,
        cancel: &CancellationToken,
        batches: Vec<TransformedBatch>,
    ) -> Result<()> {
        if self.sinks.is_empty() || batches.is_empty() {
            return Ok(());
        }

        let batches = Arc::new(batches);
        let (error_tx, mut error_rx) = mpsc::channel::<String>(self.sinks.len());

        let mut tasks = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let batches = Arc::clone(&batches);
            let cancel = cancel.clone();
            let error_tx = error_tx.clone();

            tasks.push(tokio::spawn(async move {
                if let Err(e) = sink.load(&cancel, &batches).await {
                    warn!(sink = sink.kind(), error = %e, "sink load failed");
                    let _ = error_tx.send(format!("{}: {e}", sink.kind())).await;
                }
            }));
        }
        drop(error_tx);

        for task in tasks {
            let _ = task.await;
        }

        let mut errors = Vec::new();
        while let Some(message) = error_rx.recv().await {
            errors.push(message);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SinkError::Multi { errors })
        }
    }

    /// Close every sink, collecting failures
    pub fn close(&self) -> Result<()> {
        let mut errors = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.close() {
                errors.push(format!("{}: {e}", sink.kind()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SinkError::Multi { errors })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use etl_protocol::{ExtractResult, FlatMap, ResultMetadata};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSink {
        kind: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubSink {
        fn new(kind: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Sink for StubSink {
        async fn load(
            &self,
            _cancel: &CancellationToken,
            _batches: &[TransformedBatch],
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SinkError::init("stub failure"))
            } else {
                Ok(())
            }
        }

        fn kind(&self) -> &'static str {
            self.kind
        }
    }

    fn batches() -> Vec<TransformedBatch> {
        let result = ExtractResult {
            timestamp: Utc::now(),
            source: "src".into(),
            data: FlatMap::new(),
            metadata: ResultMetadata {
                endpoint: "src".into(),
                cluster: "c".into(),
                query: "{}".into(),
                original_query: "{}".into(),
                response_bytes: 0,
            },
        };
        vec![TransformedBatch::new(result, FlatMap::new())]
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_suppress_other_sinks() {
        let failing = StubSink::new("bad", true);
        let healthy = StubSink::new("good", false);
        let loader = Loader::from_sinks(vec![
            Arc::clone(&failing) as Arc<dyn Sink>,
            Arc::clone(&healthy) as Arc<dyn Sink>,
        ]);

        let err = loader
            .load(&CancellationToken::new(), batches())
            .await
            .unwrap_err();

        match err {
            SinkError::Multi { errors } => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("bad"));
            }
            other => panic!("expected aggregate error, got {other}"),
        }

        // The healthy sink observed exactly one invocation
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_sinks_succeed() {
        let a = StubSink::new("a", false);
        let b = StubSink::new("b", false);
        let loader = Loader::from_sinks(vec![
            Arc::clone(&a) as Arc<dyn Sink>,
            Arc::clone(&b) as Arc<dyn Sink>,
        ]);

        loader.load(&CancellationToken::new(), batches()).await.unwrap();
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_batches_are_not_dispatched() {
        let sink = StubSink::new("a", false);
        let loader = Loader::from_sinks(vec![Arc::clone(&sink) as Arc<dyn Sink>]);

        loader.load(&CancellationToken::new(), Vec::new()).await.unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_loader_builds_all_stream_kinds() {
        let config: LoadConfig = toml::from_str(
            r#"
[[streams]]
type = "csv"
path = "out/x"

[[streams]]
type = "remote_write"
endpoint = "https://push.example"

[[streams]]
type = "otel"
endpoint = "https://otel.example"

[[streams]]
type = "dump"
path = "out/dump"
"#,
        )
        .unwrap();

        let loader = Loader::new(&config).unwrap();
        assert_eq!(loader.len(), 4);
    }
}
