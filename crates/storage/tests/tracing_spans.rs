//! Integration test verifying that `MemoryBackend` operations produce spans.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use keyset_storage::{MemoryBackend, StorageBackend};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

#[tokio::test]
async fn backend_operations_create_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(collector));

    let backend = MemoryBackend::new();
    backend.set(b"acme/rows/v1".to_vec(), b"{}".to_vec()).await.expect("set");
    let _ = backend.get(b"acme/rows/v1").await;
    let _ = backend.compare_and_set(b"acme/schema", None, b"{}".to_vec()).await;
    let _ = backend.get_range(b"acme/".to_vec()..b"acme0".to_vec()).await;
    let txn = backend.transaction().await.expect("begin");
    txn.commit().await.expect("commit");

    let recorded = spans.lock().expect("lock poisoned");
    for name in ["set", "get", "compare_and_set", "get_range", "transaction", "commit"] {
        assert!(recorded.iter().any(|s| s == name), "expected a '{name}' span, got: {recorded:?}");
    }
}
