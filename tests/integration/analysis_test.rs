//! End-to-end analysis pipeline tests

use netdiff::{AnalysisContext, AnalysisError, Config};
use tempfile::TempDir;

use crate::helpers::write_device;

#[test]
fn analyze_builds_session_from_capture_tree() {
    let tmp = TempDir::new().unwrap();
    write_device(
        tmp.path(),
        "R1",
        "command: show running-config\nhostname R1\ninterface Gi0/1\n",
        "command: show running-config\nhostname R1\ninterface Gi0/1\n description uplink\n",
    );
    write_device(
        tmp.path(),
        "SW1",
        "command: show vlan brief\n10   USERS   active\n",
        "command: show vlan brief\n10   USERS   active\n",
    );

    let ctx = AnalysisContext::new(Config::default());
    let session = ctx.analyze(tmp.path(), None).unwrap();

    assert_eq!(session.devices.len(), 2);
    assert_eq!(session.devices["R1"].commands_with_changes, 1);
    assert_eq!(session.devices["SW1"].commands_with_changes, 0);

    let diff = session.command_diff("R1", "show running-config").unwrap();
    assert_eq!(diff.added_lines, 1);
    assert_eq!(diff.removed_lines, 0);
}

#[test]
fn command_only_in_post_counts_all_lines_added() {
    let tmp = TempDir::new().unwrap();
    write_device(
        tmp.path(),
        "R1",
        "command: show version\nsame\n",
        "command: show version\nsame\ncommand: show logging\nline1\nline2\nline3\n",
    );

    let ctx = AnalysisContext::new(Config::default());
    let session = ctx.analyze(tmp.path(), None).unwrap();

    let diff = session.command_diff("R1", "show logging").unwrap();
    assert!(diff.has_changes);
    assert_eq!(diff.added_lines, 3);
    assert_eq!(diff.removed_lines, 0);
}

#[test]
fn masking_profile_suppresses_volatile_changes() {
    let tmp = TempDir::new().unwrap();
    write_device(
        tmp.path(),
        "R1",
        "command: show clock\n09:00:00 UTC Mon Jan 1 2024\n",
        "command: show clock\n17:30:00 UTC Mon Jan 1 2024\n",
    );

    let ctx = AnalysisContext::new(Config::default());

    let masked = ctx.analyze(tmp.path(), Some("standard")).unwrap();
    assert_eq!(masked.devices["R1"].commands_with_changes, 0);
}

#[test]
fn device_with_only_pre_capture_diffs_against_empty() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("R1");
    std::fs::create_dir(&dir).unwrap();
    std::fs::write(dir.join("pre_check.log"), "command: show arp\n1.1.1.1\n").unwrap();

    let ctx = AnalysisContext::new(Config::default());
    let session = ctx.analyze(tmp.path(), None).unwrap();

    let diff = session.command_diff("R1", "show arp").unwrap();
    assert_eq!(diff.removed_lines, 1);
    assert_eq!(diff.added_lines, 0);
}

#[test]
fn missing_directory_is_invalid_input() {
    let ctx = AnalysisContext::new(Config::default());
    let err = ctx
        .analyze(std::path::Path::new("/does/not/exist"), None)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidInput(_)));
}

#[test]
fn tree_without_captures_is_not_found() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("empty-device")).unwrap();

    let ctx = AnalysisContext::new(Config::default());
    let err = ctx.analyze(tmp.path(), None).unwrap_err();
    assert!(matches!(err, AnalysisError::NotFound(_)));
}
