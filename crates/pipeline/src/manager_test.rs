use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::post;
use axum::Router;
use etl_config::ExtractConfig;
use etl_metrics::Collector;

use super::*;

/// Test upstream that tracks request concurrency
struct Upstream {
    url: String,
    hits: Arc<AtomicUsize>,
    max_concurrent: Arc<AtomicUsize>,
}

async fn spawn_upstream(delay: Duration) -> Upstream {
    let hits = Arc::new(AtomicUsize::new(0));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_concurrent = Arc::new(AtomicUsize::new(0));

    let handler_hits = Arc::clone(&hits);
    let handler_in_flight = Arc::clone(&in_flight);
    let handler_max = Arc::clone(&max_concurrent);

    let app = Router::new().route(
        "/_search",
        post(move || {
            let hits = Arc::clone(&handler_hits);
            let in_flight = Arc::clone(&handler_in_flight);
            let max = Arc::clone(&handler_max);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                r#"{"took": 1}"#
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Upstream {
        url: format!("http://{addr}"),
        hits,
        max_concurrent,
    }
}

fn pipeline_config(name: &str, url: &str, interval_secs: u64) -> PipelineConfig {
    PipelineConfig {
        name: name.to_string(),
        enabled: true,
        interval_secs,
        extract: ExtractConfig {
            query: "{}".to_string(),
            urls: vec![url.to_string()],
            cluster_names: vec!["test".to_string()],
            timeout_secs: 5,
            max_retries: 0,
            ..ExtractConfig::default()
        },
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn test_slow_ticks_never_overlap() {
    // Each upstream call takes longer than the tick interval; overdue
    // ticks must coalesce instead of stacking executions.
    let upstream = spawn_upstream(Duration::from_millis(1200)).await;
    let manager = Manager::new(Collector::new());

    manager
        .add_pipeline(pipeline_config("slow", &upstream.url, 1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    manager.stop_all().await;

    assert!(upstream.hits.load(Ordering::SeqCst) >= 2);
    assert_eq!(upstream.max_concurrent.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_add_same_name_replaces() {
    let upstream = spawn_upstream(Duration::from_millis(1)).await;
    let manager = Manager::new(Collector::new());

    manager
        .add_pipeline(pipeline_config("latency", &upstream.url, 3600))
        .await
        .unwrap();
    manager
        .add_pipeline(pipeline_config("latency", &upstream.url, 3600))
        .await
        .unwrap();

    let status = manager.status().await;
    assert_eq!(status, vec![("latency".to_string(), true)]);

    manager.stop_all().await;
}

#[tokio::test]
async fn test_remove_unknown_is_noop() {
    let manager = Manager::new(Collector::new());
    manager.remove_pipeline("missing").await;
    assert!(manager.status().await.is_empty());
}

#[tokio::test]
async fn test_update_pipelines_reconciles() {
    let upstream = spawn_upstream(Duration::from_millis(1)).await;
    let manager = Manager::new(Collector::new());

    manager
        .add_pipeline(pipeline_config("a", &upstream.url, 3600))
        .await
        .unwrap();
    manager
        .add_pipeline(pipeline_config("b", &upstream.url, 3600))
        .await
        .unwrap();

    manager
        .update_pipelines(vec![
            pipeline_config("b", &upstream.url, 3600),
            pipeline_config("c", &upstream.url, 3600),
        ])
        .await
        .unwrap();

    let names: Vec<String> = manager.status().await.into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["b", "c"]);

    manager.stop_all().await;
}

#[tokio::test]
async fn test_disabled_pipeline_is_not_scheduled() {
    let upstream = spawn_upstream(Duration::from_millis(1)).await;
    let manager = Manager::new(Collector::new());

    let mut config = pipeline_config("draft", &upstream.url, 1);
    config.enabled = false;
    manager.add_pipeline(config).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
    assert_eq!(manager.status().await, vec![("draft".to_string(), false)]);

    manager.stop_all().await;
}

#[tokio::test]
async fn test_stop_all_halts_scheduling() {
    let upstream = spawn_upstream(Duration::from_millis(1)).await;
    let manager = Manager::new(Collector::new());

    manager
        .add_pipeline(pipeline_config("latency", &upstream.url, 1))
        .await
        .unwrap();

    // Let the immediate first tick land
    tokio::time::sleep(Duration::from_millis(300)).await;
    manager.stop_all().await;
    assert!(manager.status().await.is_empty());

    let after_stop = upstream.hits.load(Ordering::SeqCst);
    assert!(after_stop >= 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(upstream.hits.load(Ordering::SeqCst), after_stop);
}

#[tokio::test]
async fn test_metrics_record_tick_outcomes() {
    let upstream = spawn_upstream(Duration::from_millis(1)).await;
    let collector = Collector::new();
    let manager = Manager::new(collector.clone());

    manager
        .add_pipeline(pipeline_config("latency", &upstream.url, 3600))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    manager.stop_all().await;

    let snapshot = collector.snapshot();
    let p = &snapshot.pipelines[0];
    assert_eq!(p.name, "latency");
    assert!(p.total_runs >= 1);
    assert_eq!(p.successful_runs, p.total_runs);
    assert!(!p.running);
}
