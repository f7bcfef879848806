use super::*;
use chrono::TimeZone;

#[test]
fn atomic_write_then_read_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("file.txt");
    atomic_write(&path, b"hello").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
}

#[test]
fn atomic_write_overwrites_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("file.txt");
    atomic_write(&path, b"first").unwrap();
    atomic_write(&path, b"second").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
}

#[test]
fn expand_home_leaves_absolute_paths_unchanged() {
    assert_eq!(expand_home("/etc/hosts"), PathBuf::from("/etc/hosts"));
}

#[test]
fn expand_home_expands_tilde_slash() {
    if let Some(home) = dirs::home_dir() {
        assert_eq!(expand_home("~/x"), home.join("x"));
    }
}

#[test]
fn safe_filename_replaces_path_separators_and_spaces() {
    assert_eq!(safe_filename("a/b c:d"), "a_b_c_d");
}

#[test]
fn timestamped_filename_has_expected_shape() {
    let ts = chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let name = timestamped_filename("out", "My Tool", ts, "json");
    assert_eq!(name, "out_My_Tool_20260102_030405.json");
}
