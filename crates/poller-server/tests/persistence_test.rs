//! Integration tests for the service file

use chrono::{TimeZone, Utc};
use poller::{DeadlineStore, MetricsRegistry, Service, Status, StoreHandle};
use poller_server::persistence::{self, PeriodicSaver, SEED_SERVICES, ServiceFile};
use std::sync::Arc;
use std::time::Duration;

fn store() -> StoreHandle {
    StoreHandle::new(DeadlineStore::new(Duration::from_secs(60)))
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let file = ServiceFile::new(dir.path().join("services.json"));

    let source = store();
    source.add("bing", "https://www.bing.com").await;
    let checked = source.add("google", "http://google.com/").await;
    source
        .update(
            &checked,
            Status::Up,
            Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap(),
        )
        .await;

    file.save(&source.dump().await).await.unwrap();

    let loaded = file.load().await.unwrap();
    let target = store();
    assert_eq!(target.load(loaded).await, 2);

    let mut expected = source.snapshot().await;
    let mut actual = target.snapshot().await;
    expected.sort_by(|a, b| a.id.cmp(&b.id));
    actual.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(expected, actual);
}

#[tokio::test]
async fn test_document_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("services.json");
    let file = ServiceFile::new(&path);

    let store = store();
    store
        .load(vec![Service::new("abc", "bing", "https://www.bing.com")])
        .await;
    file.save(&store.dump().await).await.unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    // Pretty printed
    assert!(contents.contains('\n'));

    let raw: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(
        raw,
        serde_json::json!({
            "services": [{
                "id": "abc",
                "name": "bing",
                "url": "https://www.bing.com",
                "status": "UNKNOWN",
                "lastCheck": "1970-01-01 00:00"
            }]
        })
    );
}

#[tokio::test]
async fn test_save_replaces_previous_contents() {
    let dir = tempfile::tempdir().unwrap();
    let file = ServiceFile::new(dir.path().join("services.json"));

    let store = store();
    let id = store.add("bing", "https://www.bing.com").await;
    file.save(&store.dump().await).await.unwrap();

    store.remove(&id).await;
    file.save(&store.dump().await).await.unwrap();

    assert!(file.load().await.unwrap().is_empty());

    // No temp file left behind
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_save_creates_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let file = ServiceFile::new(dir.path().join("nested/state/services.json"));

    file.save(&store().dump().await).await.unwrap();
    assert!(file.path().is_file());
}

#[tokio::test]
async fn test_missing_file_seeds_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let file = ServiceFile::new(dir.path().join("missing.json"));
    let store = store();

    let count = persistence::load_or_seed(&file, &store, None).await;
    assert_eq!(count, SEED_SERVICES.len());

    let snapshot = store.snapshot().await;
    let names: Vec<_> = snapshot.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["google-ssl", "google", "Spotify", "Centralway"]);
    assert!(snapshot.iter().all(|s| s.status == Status::Unknown));
}

#[tokio::test]
async fn test_corrupt_file_seeds_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("services.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let file = ServiceFile::new(&path);
    let store = store();
    let metrics = MetricsRegistry::new();

    let count = persistence::load_or_seed(&file, &store, Some(&metrics)).await;
    assert_eq!(count, SEED_SERVICES.len());
    assert_eq!(store.len().await, SEED_SERVICES.len());

    let text = metrics.encode().unwrap();
    assert!(text.contains(r#"poller_persistence_errors_total{operation="load"} 1"#));
}

#[tokio::test]
async fn test_bad_timestamp_seeds_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("services.json");
    // 12-hour clock with meridiem is not accepted
    std::fs::write(
        &path,
        r#"{"services":[{"id":"a","name":"a","url":"http://a","status":"UP","lastCheck":"2024-05-01 02:30 PM"}]}"#,
    )
    .unwrap();

    let store = store();
    persistence::load_or_seed(&ServiceFile::new(&path), &store, None).await;
    assert!(store.get("a").await.is_none());
    assert_eq!(store.len().await, SEED_SERVICES.len());
}

#[tokio::test]
async fn test_existing_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("services.json");
    std::fs::write(
        &path,
        r#"{"services":[{"id":"a","name":"api","url":"http://api.example","status":"DOWN","lastCheck":"2024-05-01 14:30"}]}"#,
    )
    .unwrap();

    let store = store();
    let count = persistence::load_or_seed(&ServiceFile::new(&path), &store, None).await;
    assert_eq!(count, 1);

    let service = store.get("a").await.unwrap();
    assert_eq!(service.status, Status::Down);
    assert_eq!(
        service.last_check,
        Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap()
    );
}

#[tokio::test]
async fn test_periodic_saver() {
    let dir = tempfile::tempdir().unwrap();
    let file = ServiceFile::new(dir.path().join("services.json"));
    let store = store();
    store.add("bing", "https://www.bing.com").await;

    let metrics = Arc::new(MetricsRegistry::new());
    let saver = PeriodicSaver::new(
        file.clone(),
        store.clone(),
        Duration::from_secs(1),
        Some(metrics.clone()),
    );
    let handle = saver.start();

    let saved = tokio::time::timeout(Duration::from_secs(5), async {
        while !file.path().exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(saved.is_ok(), "service file was never written");

    saver.stop();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("saver did not stop")
        .unwrap();

    assert_eq!(file.load().await.unwrap().len(), 1);
    assert!(metrics.encode().unwrap().contains("poller_persistence_saves_total"));
}

#[tokio::test]
async fn test_save_now_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the file should be makes the rename fail
    let path = dir.path().join("services.json");
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("keep"), "x").unwrap();

    let metrics = Arc::new(MetricsRegistry::new());
    let saver = PeriodicSaver::new(
        ServiceFile::new(&path),
        store(),
        Duration::from_secs(60),
        Some(metrics.clone()),
    );

    assert!(saver.save_now().await.is_err());
    assert!(
        metrics
            .encode()
            .unwrap()
            .contains(r#"poller_persistence_errors_total{operation="save"} 1"#)
    );
}
