//! Query engine behavior against analyzed captures

use netdiff::query::facts::ChangeKind;
use netdiff::query::{DeviceFindings, QueryEngine};
use netdiff::{AnalysisContext, Config, Intent};
use tempfile::TempDir;

use crate::helpers::write_device;

fn interface_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_device(
        tmp.path(),
        "R1",
        "command: show ip interface brief\n\
         GigabitEthernet0/1  1.1.1.1  YES  NVRAM  up  up\n",
        "command: show ip interface brief\n\
         GigabitEthernet0/1  1.1.1.1  YES  NVRAM  down  down\n",
    );
    tmp
}

#[test]
fn interface_down_question_finds_the_transition() {
    let tmp = interface_tree();
    let ctx = AnalysisContext::new(Config::default());
    let session = ctx.analyze(tmp.path(), None).unwrap();
    let engine = QueryEngine::new(&session.captures, &session.device_diffs);

    let result = engine.query("what interfaces went down?").unwrap();
    assert_eq!(result.intent, Intent::InterfaceDown);
    assert_eq!(result.devices_affected, vec!["R1"]);
    assert_eq!(result.total_findings, 1);
    assert!(result.summary.contains("GigabitEthernet0/1"));

    match &result.details[0] {
        DeviceFindings::Transitions { interfaces, .. } => {
            assert_eq!(interfaces[0].interface, "GigabitEthernet0/1");
            assert_eq!(interfaces[0].pre_status, "up/up");
            assert_eq!(interfaces[0].post_status, "down/down");
        }
        other => panic!("unexpected findings: {:?}", other),
    }
}

#[test]
fn interface_transition_is_classified_went_down() {
    let tmp = interface_tree();
    let ctx = AnalysisContext::new(Config::default());
    let session = ctx.analyze(tmp.path(), None).unwrap();
    let engine = QueryEngine::new(&session.captures, &session.device_diffs);

    let result = engine.find_interface_changes();
    match &result.details[0] {
        DeviceFindings::Interfaces { changes, .. } => {
            assert_eq!(changes[0].change, ChangeKind::WentDown);
        }
        other => panic!("unexpected findings: {:?}", other),
    }
}

#[test]
fn zero_counter_lines_never_count_as_errors() {
    let tmp = TempDir::new().unwrap();
    write_device(
        tmp.path(),
        "R1",
        "command: show interfaces\nEthernet0/1 is up\n",
        "command: show interfaces\nEthernet0/1 is up, 0 input errors, 0 output errors\n",
    );

    let ctx = AnalysisContext::new(Config::default());
    let session = ctx.analyze(tmp.path(), None).unwrap();
    let engine = QueryEngine::new(&session.captures, &session.device_diffs);

    let result = engine.query("any errors after the change?").unwrap();
    assert_eq!(result.intent, Intent::Errors);
    assert_eq!(result.total_findings, 0);
    assert!(result.summary.contains("No errors found"));
}

#[test]
fn removed_bgp_neighbor_is_reported() {
    let tmp = TempDir::new().unwrap();
    write_device(
        tmp.path(),
        "R1",
        "command: show ip bgp summary\n\
         10.0.0.1        4        65001     100     101        5    0    0 01:02:03 Established\n",
        "command: show ip bgp summary\nno neighbors configured\n",
    );

    let ctx = AnalysisContext::new(Config::default());
    let session = ctx.analyze(tmp.path(), None).unwrap();
    let engine = QueryEngine::new(&session.captures, &session.device_diffs);

    let result = engine.query("did we lose any bgp neighbors?").unwrap();
    assert_eq!(result.total_findings, 1);
    match &result.details[0] {
        DeviceFindings::Neighbors { changes, .. } => {
            assert_eq!(changes[0].neighbor, "10.0.0.1");
            assert_eq!(changes[0].change, ChangeKind::Removed);
            assert_eq!(changes[0].as_number.as_deref(), Some("65001"));
        }
        other => panic!("unexpected findings: {:?}", other),
    }
}

#[test]
fn summaries_are_byte_identical_for_identical_input() {
    let tmp = interface_tree();
    let ctx = AnalysisContext::new(Config::default());
    let session = ctx.analyze(tmp.path(), None).unwrap();
    let engine = QueryEngine::new(&session.captures, &session.device_diffs);

    let questions = [
        "interface status",
        "what changed?",
        "any errors?",
        "bgp neighbors",
        "GigabitEthernet0/1",
    ];
    for q in questions {
        let a = engine.query(q).unwrap();
        let b = engine.query(q).unwrap();
        assert_eq!(a.summary, b.summary, "summary differs for {:?}", q);
    }
}

#[test]
fn search_finds_matches_in_both_phases() {
    let tmp = interface_tree();
    let ctx = AnalysisContext::new(Config::default());
    let session = ctx.analyze(tmp.path(), None).unwrap();
    let engine = QueryEngine::new(&session.captures, &session.device_diffs);

    let result = engine.query("GigabitEthernet0/1").unwrap();
    assert_eq!(result.intent, Intent::Search);
    assert_eq!(result.total_findings, 2);
    assert!(result.summary.contains("[PRE]"));
    assert!(result.summary.contains("[POST]"));
}

#[test]
fn zero_finding_queries_return_neutral_summaries() {
    let tmp = TempDir::new().unwrap();
    write_device(
        tmp.path(),
        "R1",
        "command: show version\nsame\n",
        "command: show version\nsame\n",
    );

    let ctx = AnalysisContext::new(Config::default());
    let session = ctx.analyze(tmp.path(), None).unwrap();
    let engine = QueryEngine::new(&session.captures, &session.device_diffs);

    let result = engine.query("vlan changes?").unwrap();
    assert_eq!(result.total_findings, 0);
    assert!(result.devices_affected.is_empty());
    assert_eq!(result.summary, "No VLAN changes detected.");
}
