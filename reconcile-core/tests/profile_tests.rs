//! Profile error-message, atomic-write-safety, and init integration tests.
//! Storage: ~/.reconcile/profiles/<name>.yaml

use std::fs;
use std::path::PathBuf;

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use reconcile_core::{
    profile::{self, SyncProfile},
    AbstractKey, ProfileError, ProfileName,
};

fn notes() -> ProfileName {
    ProfileName::from("notes")
}

fn init_notes(home: &assert_fs::TempDir) -> SyncProfile {
    profile::init_at(
        home.path(),
        notes(),
        PathBuf::from("/data/notes/local"),
        PathBuf::from("/data/notes/cloud"),
        Some(2_000),
        Some(AbstractKey {
            time_key: "modifiedAt".to_string(),
            unique_key: "uuid".to_string(),
        }),
    )
    .expect("init")
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_profile_mentions_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = profile::load_at(home.path(), &notes()).unwrap_err();
    assert!(matches!(err, ProfileError::ProfileNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("profile not found"));
    assert!(err.to_string().contains("notes.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".reconcile").join("profiles");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("notes.yaml"), b": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = profile::load_at(home.path(), &notes()).unwrap_err();
    assert!(matches!(err, ProfileError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("notes.yaml"));
}

#[test]
fn load_rejects_names_outside_the_profiles_dir() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    // A YAML file one level up must stay unreachable.
    home.child(".reconcile/x.yaml")
        .write_str("name: x\nlocal_dir: /l\ncloud_dir: /c\n")
        .expect("write");

    let err = profile::load_at(home.path(), &ProfileName::from("../x")).unwrap_err();
    assert!(matches!(err, ProfileError::InvalidName { .. }), "got: {err}");
}

#[test]
fn load_fills_defaults_for_optional_fields() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".reconcile").join("profiles");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(
        dir.join("notes.yaml"),
        "name: notes\nlocal_dir: /l\ncloud_dir: /c\ncreated_at: 2024-10-01T00:00:00Z\nupdated_at: 2024-10-01T00:00:00Z\n",
    )
    .expect("write");

    let loaded = profile::load_at(home.path(), &notes()).expect("load");
    assert_eq!(loaded.lock_resolving_ms, profile::DEFAULT_LOCK_RESOLVING_MS);
    assert_eq!(loaded.abstract_key.time_key, "updateAt");
    assert_eq!(loaded.abstract_key.unique_key, "id");
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    init_notes(&home);

    let yaml_path = profile::profile_path_at(home.path(), &notes());
    let original_bytes = fs::read(&yaml_path).expect("read original");

    // Crash between tmp write and rename.
    let tmp = yaml_path.with_file_name("notes.yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    let current_bytes = fs::read(&yaml_path).expect("read after crash");
    assert_eq!(original_bytes, current_bytes);
    let listed = profile::list_at(home.path()).expect("list ignores tmp orphans");
    assert_eq!(listed.len(), 1);
}

// ---------------------------------------------------------------------------
// 3. Init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_profile_yaml_with_0600() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let created = init_notes(&home);

    home.child(".reconcile/profiles/notes.yaml")
        .assert(predicate::path::exists());

    let loaded = profile::load_at(home.path(), &notes()).expect("load");
    assert_eq!(loaded, created);
    assert_eq!(loaded.lock_resolving_ms, 2_000);
    assert_eq!(loaded.abstract_key.unique_key, "uuid");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let path = profile::profile_path_at(home.path(), &notes());
        let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
    }
}

#[test]
fn init_rejects_path_like_names() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = profile::init_at(
        home.path(),
        ProfileName::from("../outside"),
        PathBuf::from("/l"),
        PathBuf::from("/c"),
        None,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, ProfileError::InvalidName { .. }));
    home.child(".reconcile/outside.yaml")
        .assert(predicate::path::missing());
}

// ---------------------------------------------------------------------------
// 4. List
// ---------------------------------------------------------------------------

#[test]
fn list_is_sorted_and_deterministic() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    for name in ["photos", "bookmarks", "notes"] {
        profile::init_at(
            home.path(),
            ProfileName::from(name),
            PathBuf::from("/l"),
            PathBuf::from("/c"),
            None,
            None,
        )
        .expect("init");
    }

    let names: Vec<String> = profile::list_at(home.path())
        .expect("list")
        .into_iter()
        .map(|p| p.name.0)
        .collect();
    assert_eq!(names, vec!["bookmarks", "notes", "photos"]);
}
