mod common;

use common::{ScriptedEngine, info, serve};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tubefetch::{MetadataFetcher, MetadataPanel, MetadataUpdate, UrlValidator};

const URL_A: &str = "https://www.youtube.com/watch?v=aaaa";
const URL_B: &str = "https://youtu.be/bbbb";

/// Everything that arrives within `window`.
async fn collect(rx: &mut UnboundedReceiver<MetadataUpdate>, window: Duration) -> Vec<MetadataUpdate> {
    let mut updates = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(update)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        updates.push(update);
    }
    updates
}

#[tokio::test]
async fn test_last_request_wins() {
    let mut engine = ScriptedEngine::default();
    engine
        .infos
        .insert(URL_A.to_string(), (Duration::from_millis(300), info("A", None)));
    engine
        .infos
        .insert(URL_B.to_string(), (Duration::from_millis(10), info("B", None)));

    let (fetcher, mut rx) = MetadataFetcher::new(Arc::new(engine), UrlValidator::default());
    let first = fetcher.fetch(URL_A);
    let second = fetcher.fetch(URL_B);
    assert!(second > first);
    assert!(fetcher.is_current(second));

    let updates = collect(&mut rx, Duration::from_millis(600)).await;
    assert!(updates.iter().all(|u| u.generation() == second));

    let mut panel = MetadataPanel::default();
    for update in updates {
        panel.apply(update, fetcher.latest());
    }
    assert_eq!(panel.metadata.as_ref().map(|m| m.title.as_str()), Some("B"));
    assert_eq!(panel.metadata.as_ref().unwrap().duration, "0:03:32");
}

#[tokio::test]
async fn test_invalid_url_hides_without_lookup() {
    let engine = Arc::new(ScriptedEngine::default());
    let (fetcher, mut rx) = MetadataFetcher::new(engine.clone(), UrlValidator::default());

    let generation = fetcher.fetch("https://www.youtube.com/video/123");
    let updates = collect(&mut rx, Duration::from_millis(100)).await;

    assert_eq!(updates.len(), 1);
    assert!(matches!(updates[0], MetadataUpdate::Hidden { generation: g } if g == generation));
    assert_eq!(engine.info_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_lookup_failure_is_a_status() {
    let (fetcher, mut rx) =
        MetadataFetcher::new(Arc::new(ScriptedEngine::default()), UrlValidator::default());
    let generation = fetcher.fetch(URL_A);

    let updates = collect(&mut rx, Duration::from_millis(200)).await;
    let mut panel = MetadataPanel::default();
    for update in updates {
        panel.apply(update, generation);
    }
    assert!(!panel.is_visible());
    assert!(panel.status.unwrap().contains("no such video"));
}

#[tokio::test]
async fn test_thumbnail_follows_metadata() {
    let mut routes = HashMap::new();
    routes.insert("/thumb.jpg".to_string(), b"\xff\xd8jpeg".to_vec());
    let base = serve(routes).await;

    let mut engine = ScriptedEngine::default();
    let thumb = format!("{}/thumb.jpg", base);
    let missing = format!("{}/missing.jpg", base);
    engine
        .infos
        .insert(URL_A.to_string(), (Duration::ZERO, info("A", Some(&thumb))));
    engine
        .infos
        .insert(URL_B.to_string(), (Duration::ZERO, info("B", Some(&missing))));
    let (fetcher, mut rx) = MetadataFetcher::new(Arc::new(engine), UrlValidator::default());

    let generation = fetcher.fetch(URL_A);
    let updates = collect(&mut rx, Duration::from_millis(1500)).await;
    assert!(matches!(updates.first(), Some(MetadataUpdate::Loaded { .. })));

    let mut panel = MetadataPanel::default();
    for update in updates {
        panel.apply(update, generation);
    }
    assert_eq!(panel.thumbnail.as_deref(), Some(&b"\xff\xd8jpeg"[..]));

    // A broken thumbnail only leaves a status message.
    let generation = fetcher.fetch(URL_B);
    let updates = collect(&mut rx, Duration::from_millis(1500)).await;
    for update in updates {
        panel.apply(update, generation);
    }
    assert!(panel.is_visible());
    assert!(panel.thumbnail.is_none());
    assert!(panel.status.is_some());
}
