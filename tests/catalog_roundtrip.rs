//! Catalog lifecycle tests: scan, incremental update, persistence.

#![allow(clippy::expect_used)]

use flavia_rs::catalog::{Catalog, CatalogQuery, FileStatus};
use tempfile::TempDir;

fn seeded_vault() -> (TempDir, Catalog) {
    let temp = TempDir::new().expect("temp dir");
    std::fs::create_dir_all(temp.path().join("papers")).expect("mkdir");
    std::fs::write(temp.path().join("papers/deep.pdf"), b"%PDF deep").expect("pdf");
    std::fs::write(temp.path().join("notes.md"), "# Notes\n\nBody.").expect("md");
    std::fs::write(temp.path().join("clip.mp4"), b"video").expect("mp4");

    let mut catalog = Catalog::new(temp.path());
    catalog.build(&[]).expect("build");
    (temp, catalog)
}

#[test]
fn test_full_scan_classifies_files() {
    let (_temp, catalog) = seeded_vault();
    assert_eq!(catalog.files().len(), 3);

    let entry = catalog.files().get("papers/deep.pdf").expect("pdf entry");
    assert_eq!(entry.file_type.as_str(), "binary_document");
    assert_eq!(entry.category, "pdf");
    assert_eq!(entry.checksum_sha256.len(), 64);
    assert_eq!(entry.status, FileStatus::Current);

    let entry = catalog.files().get("clip.mp4").expect("mp4 entry");
    assert_eq!(entry.file_type.as_str(), "video");

    let tree = catalog.directory_tree().expect("tree");
    assert_eq!(tree.file_count, 3);
}

#[test]
fn test_save_load_roundtrip_preserves_entries() {
    let (temp, mut catalog) = seeded_vault();
    {
        let entry = catalog.entry_mut("papers/deep.pdf").expect("entry");
        entry.converted_to = Some(".converted/papers/deep.md".to_string());
        entry.summary = Some("Learned representations".to_string());
        entry.tags = vec!["ml".to_string()];
    }
    catalog.save(&temp.path().join(".flavia")).expect("save");

    let loaded = Catalog::load(&temp.path().join(".flavia")).expect("load");
    assert_eq!(loaded.files().len(), 3);
    let entry = loaded.files().get("papers/deep.pdf").expect("entry");
    assert_eq!(entry.converted_to.as_deref(), Some(".converted/papers/deep.md"));
    assert_eq!(entry.summary.as_deref(), Some("Learned representations"));
    assert_eq!(entry.tags, vec!["ml".to_string()]);

    // Saving the loaded catalog reproduces the same file set.
    loaded.save(&temp.path().join(".flavia")).expect("re-save");
    let reloaded = Catalog::load(&temp.path().join(".flavia")).expect("reload");
    let paths: Vec<&String> = reloaded.files().keys().collect();
    assert_eq!(paths, loaded.files().keys().collect::<Vec<&String>>());
}

#[test]
fn test_incremental_update_lifecycle() {
    let (temp, mut catalog) = seeded_vault();
    {
        let entry = catalog.entry_mut("notes.md").expect("entry");
        entry.converted_to = Some(".converted/notes.md".to_string());
        entry.summary = Some("stale summary".to_string());
    }

    // New file, deleted file, modified file (content + mtime).
    std::fs::write(temp.path().join("fresh.txt"), "fresh").expect("fresh");
    std::fs::remove_file(temp.path().join("clip.mp4")).expect("remove");
    std::fs::write(temp.path().join("notes.md"), "# Notes\n\nChanged body.").expect("modify");
    let future = std::time::SystemTime::now() + std::time::Duration::from_secs(10);
    std::fs::File::options()
        .write(true)
        .open(temp.path().join("notes.md"))
        .expect("open")
        .set_modified(future)
        .expect("set mtime");

    let summary = catalog.update().expect("update");
    assert_eq!(summary.new, vec!["fresh.txt".to_string()]);
    assert_eq!(summary.missing, vec!["clip.mp4".to_string()]);
    assert_eq!(summary.modified, vec!["notes.md".to_string()]);

    // Modified entries keep the conversion link but lose the summary.
    let entry = catalog.files().get("notes.md").expect("entry");
    assert_eq!(entry.status, FileStatus::Modified);
    assert_eq!(entry.converted_to.as_deref(), Some(".converted/notes.md"));
    assert!(entry.summary.is_none());

    // Purge then settle.
    let purged = catalog.remove_missing();
    assert_eq!(purged, vec!["clip.mp4".to_string()]);
    catalog.mark_all_current();
    let pending = catalog.query(&CatalogQuery {
        status: Some(FileStatus::New),
        ..CatalogQuery::default()
    });
    assert!(pending.is_empty());
}

#[test]
fn test_touch_only_refreshes_timestamps() {
    let (temp, mut catalog) = seeded_vault();
    let before = catalog
        .files()
        .get("notes.md")
        .expect("entry")
        .checksum_sha256
        .clone();

    // Same content, newer mtime: not a modification.
    let future = std::time::SystemTime::now() + std::time::Duration::from_secs(10);
    std::fs::File::options()
        .write(true)
        .open(temp.path().join("notes.md"))
        .expect("open")
        .set_modified(future)
        .expect("set mtime");

    let summary = catalog.update().expect("update");
    assert!(summary.modified.is_empty());
    assert!(summary.unchanged.contains(&"notes.md".to_string()));
    let entry = catalog.files().get("notes.md").expect("entry");
    assert_eq!(entry.status, FileStatus::Current);
    assert_eq!(entry.checksum_sha256, before);
}

#[test]
fn test_corrupt_catalog_triggers_rebuild_path() {
    let (temp, catalog) = seeded_vault();
    let config_dir = temp.path().join(".flavia");
    catalog.save(&config_dir).expect("save");
    std::fs::write(config_dir.join("content_catalog.json"), "{ broken").expect("corrupt");

    assert!(Catalog::load(&config_dir).is_none());
    let rebuilt = Catalog::load_or_build(temp.path(), &[]).expect("rebuild");
    assert_eq!(rebuilt.files().len(), 3);
}
