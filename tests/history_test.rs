use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;
use tubefetch::{HistoryRecord, HistoryStore};

fn record(i: usize) -> HistoryRecord {
    HistoryRecord::new(
        &PathBuf::from(format!("/media/item-{}.mp4", i)),
        format!("https://youtu.be/v{}", i),
    )
}

#[test]
fn test_append_keeps_most_recent_hundred() -> Result<()> {
    let dir = TempDir::new()?;
    let store = HistoryStore::new(dir.path().join("history.json"));

    for i in 0..101 {
        store.append(record(i))?;
    }

    let records = store.load();
    assert_eq!(records.len(), 100);
    assert_eq!(records.first().unwrap().url, "https://youtu.be/v1");
    assert_eq!(records.last().unwrap().url, "https://youtu.be/v100");

    let newest = store.newest_first(3);
    let names: Vec<_> = newest.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, vec!["item-100.mp4", "item-99.mp4", "item-98.mp4"]);
    Ok(())
}

#[test]
fn test_corrupt_file_loads_as_empty() -> Result<()> {
    let dir = TempDir::new()?;
    let file = dir.path().join("history.json");
    std::fs::write(&file, r#"[{"filename": "half-written"#)?;

    let store = HistoryStore::new(&file);
    assert!(store.load().is_empty());

    store.append(record(1))?;
    let records = store.load();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "item-1.mp4");

    let content = std::fs::read_to_string(&file)?;
    assert!(content.trim_start().starts_with('['));
    Ok(())
}

#[test]
fn test_missing_file_and_custom_limit() -> Result<()> {
    let dir = TempDir::new()?;
    let store = HistoryStore::with_limit(dir.path().join("nested/dir/history.json"), 2);
    assert!(store.load().is_empty());

    for i in 0..3 {
        store.append(record(i))?;
    }
    let urls: Vec<_> = store.load().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec!["https://youtu.be/v1", "https://youtu.be/v2"]);
    Ok(())
}
