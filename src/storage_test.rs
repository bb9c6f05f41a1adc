use super::*;

// =============================================================
// Helpers
// =============================================================

const KEY: &str = "pawcare.session";

fn make_user() -> UserRecord {
    UserRecord {
        id: "1".to_owned(),
        email: "sarah@example.com".to_owned(),
        first_name: "Sarah".to_owned(),
        last_name: "J".to_owned(),
        role: "owner".to_owned(),
    }
}

fn memory_storage() -> (Arc<MemoryBackend>, SessionStorage) {
    let backend = Arc::new(MemoryBackend::new());
    let storage = SessionStorage::new(backend.clone(), KEY);
    (backend, storage)
}

// =============================================================
// Round trip
// =============================================================

#[test]
fn save_then_load_returns_same_pair() {
    let (_, storage) = memory_storage();
    storage.save("t1", &make_user()).unwrap();
    let loaded = storage.load().unwrap();
    assert_eq!(loaded, StoredSession { token: "t1".to_owned(), user: Some(make_user()) });
}

#[test]
fn clear_then_load_returns_none() {
    let (_, storage) = memory_storage();
    storage.save("t1", &make_user()).unwrap();
    storage.clear().unwrap();
    assert!(storage.load().is_none());
}

#[test]
fn clear_when_empty_is_ok() {
    let (_, storage) = memory_storage();
    assert!(storage.clear().is_ok());
}

#[test]
fn save_overwrites_previous_record() {
    let (_, storage) = memory_storage();
    storage.save("t1", &make_user()).unwrap();
    let other = UserRecord { id: "2".to_owned(), first_name: "Mike".to_owned(), ..make_user() };
    storage.save("t2", &other).unwrap();
    let loaded = storage.load().unwrap();
    assert_eq!(loaded.token, "t2");
    assert_eq!(loaded.user.unwrap().first_name, "Mike");
}

#[test]
fn persisted_layout_is_token_and_user() {
    let (backend, storage) = memory_storage();
    storage.save("t1", &make_user()).unwrap();
    let raw: serde_json::Value = serde_json::from_str(&backend.raw(KEY).unwrap()).unwrap();
    assert_eq!(raw["token"], "t1");
    assert_eq!(raw["user"]["firstName"], "Sarah");
}

// =============================================================
// Resilience
// =============================================================

#[test]
fn first_run_loads_none() {
    let (_, storage) = memory_storage();
    assert!(storage.load().is_none());
}

#[test]
fn corrupt_json_loads_none() {
    let (backend, storage) = memory_storage();
    backend.set_item(KEY, "{not json").unwrap();
    assert!(storage.load().is_none());
}

#[test]
fn non_object_json_loads_none() {
    let (backend, storage) = memory_storage();
    backend.set_item(KEY, "[1, 2, 3]").unwrap();
    assert!(storage.load().is_none());
}

#[test]
fn empty_token_loads_none() {
    let (backend, storage) = memory_storage();
    backend.set_item(KEY, r#"{"token": "  ", "user": null}"#).unwrap();
    assert!(storage.load().is_none());
}

#[test]
fn damaged_user_keeps_token() {
    let (backend, storage) = memory_storage();
    backend.set_item(KEY, r#"{"token": "t1", "user": {"id": 1}}"#).unwrap();
    let loaded = storage.load().unwrap();
    assert_eq!(loaded.token, "t1");
    assert!(loaded.user.is_none());
}

#[test]
fn keys_are_isolated() {
    let backend = Arc::new(MemoryBackend::new());
    let consumer = SessionStorage::new(backend.clone(), "pawcare.session");
    let admin = SessionStorage::new(backend, "pawcare.admin.session");
    consumer.save("t1", &make_user()).unwrap();
    assert!(admin.load().is_none());
}

// =============================================================
// File backend
// =============================================================

#[test]
fn file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SessionStorage::file(dir.path(), KEY);
    storage.save("t1", &make_user()).unwrap();

    let reopened = SessionStorage::file(dir.path(), KEY);
    assert_eq!(reopened.load().unwrap().user, Some(make_user()));

    reopened.clear().unwrap();
    assert!(storage.load().is_none());
}

#[test]
fn file_backend_creates_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    let storage = SessionStorage::file(&nested, KEY);
    storage.save("t1", &make_user()).unwrap();
    assert!(nested.join("pawcare.session.json").exists());
}

#[test]
fn file_backend_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SessionStorage::file(dir.path(), KEY);
    storage.save("t1", &make_user()).unwrap();
    storage.save("t2", &make_user()).unwrap();
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["pawcare.session.json".to_owned()]);
}

#[test]
fn file_backend_corrupt_file_loads_none() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pawcare.session.json"), b"\xff\xfe garbage").unwrap();
    let storage = SessionStorage::file(dir.path(), KEY);
    assert!(storage.load().is_none());
}

#[test]
fn file_stem_replaces_path_separators() {
    assert_eq!(file_stem("../evil/key"), ".._evil_key");
}

#[cfg(unix)]
#[test]
fn file_backend_writes_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let storage = SessionStorage::file(dir.path(), KEY);
    storage.save("t1", &make_user()).unwrap();
    let mode = std::fs::metadata(dir.path().join("pawcare.session.json")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
