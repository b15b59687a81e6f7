use std::io::Write;

use serial_test::serial;
use tempfile::tempdir;

use crate::telemetry::*;
use crate::Error;
use crate::LogConfig;

#[test]
fn open_file_for_append_creates_parents_and_appends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/logs/harness.log");

    let mut f = open_file_for_append(&path).unwrap();
    f.write_all(b"one\n").unwrap();
    drop(f);
    let mut f = open_file_for_append(&path).unwrap();
    f.write_all(b"two\n").unwrap();
    drop(f);

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
}

#[test]
#[serial]
fn invalid_fallback_filter_is_rejected() {
    temp_env::with_var_unset("RUST_LOG", || {
        let config = LogConfig {
            dir: None,
            filter: "kvharness=loudest".to_string(),
        };
        let err = init_observability(&config, "test").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    });
}
