//! Fact extraction from semi-structured CLI output.
//!
//! Row patterns are tuned to the common Cisco-style table formats; extraction
//! is best-effort and a capture that matches nothing simply contributes no
//! facts. All maps are ordered by key so downstream summaries render
//! identically on every run.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::parser::DeviceCapture;

/// Interface status row patterns, tried in order per output.
///
/// 1. `show ip interface brief` rows (status + line protocol columns)
/// 2. `show interfaces status` switch rows (connected/notconnect/...)
/// 3. `<intf> is up, line protocol is down` prose lines
static INTERFACE_BRIEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^(\S+)\s+(\S+)\s+\S+\s+\S+\s+(up|down|administratively down)\s+(up|down)")
        .expect("valid pattern")
});
static INTERFACE_SWITCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^(Gi\S+|Fa\S+|Te\S+|Eth\S+)\s+\S*\s+(connected|notconnect|disabled|err-disabled)\s")
        .expect("valid pattern")
});
static INTERFACE_PROSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^(\S+)\s+is\s+(up|down|administratively down),\s+line protocol is\s+(up|down)")
        .expect("valid pattern")
});

/// `show ip bgp summary` neighbor rows: address, AS and state/prefix column.
static BGP_NEIGHBOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\d+\.\d+\.\d+\.\d+)\s+\d+\s+(\d+)\s+\d+\s+\d+\s+\d+\s+\d+\s+\d+\s+(\S+)\s+(\S+)")
        .expect("valid pattern")
});

/// `show ip ospf neighbor` rows: address, state and interface.
static OSPF_NEIGHBOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\d+\.\d+\.\d+\.\d+)\s+\d+\s+(FULL|2WAY|INIT|DOWN)/\S+\s+\S+\s+(\S+)\s+(\S+)")
        .expect("valid pattern")
});

/// `show vlan brief` rows: id, name and status.
static VLAN_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^(\d+)\s+(\S+)\s+(active|suspend)").expect("valid pattern"));

/// Error indicators: generic keywords plus the vendor syslog facility shape
/// (`%LINK-3-UPDOWN:`).
static ERROR_GENERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)error|err-disable|fail|down|warning|critical").expect("valid pattern")
});
static ERROR_SYSLOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)%\w+-\d+-\w+:").expect("valid pattern"));

/// Lines that match the error patterns but never indicate a problem.
const ERROR_FALSE_POSITIVES: &[&str] = &[
    "0 input errors",
    "0 output errors",
    "no error",
    "error count: 0",
    "errors: 0",
];

const DOWN_INDICATORS: &[&str] = &["down", "notconnect", "disabled", "err-disabled", "not present"];
const UP_INDICATORS: &[&str] = &["up", "connected"];

/// How a fact changed between the pre and post captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    CameUp,
    WentDown,
    New,
    Removed,
    Modified,
    StateChange,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::CameUp => "CAME_UP",
            ChangeKind::WentDown => "WENT_DOWN",
            ChangeKind::New => "NEW",
            ChangeKind::Removed => "REMOVED",
            ChangeKind::Modified => "MODIFIED",
            ChangeKind::StateChange => "STATE_CHANGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BgpNeighbor {
    pub as_number: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OspfNeighbor {
    pub state: String,
    pub interface: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VlanInfo {
    pub name: String,
    pub status: String,
}

/// Extract `{interface -> lowercased status}` from every command output in a
/// capture. Later matches for the same interface overwrite earlier ones.
pub fn interface_status(capture: &DeviceCapture) -> BTreeMap<String, String> {
    let mut interfaces = BTreeMap::new();

    for record in &capture.records {
        for caps in INTERFACE_BRIEF.captures_iter(&record.output) {
            let status = format!("{}/{}", &caps[3], &caps[4]);
            interfaces.insert(caps[1].to_string(), status.to_lowercase());
        }
        for caps in INTERFACE_SWITCH.captures_iter(&record.output) {
            interfaces.insert(caps[1].to_string(), caps[2].to_lowercase());
        }
        for caps in INTERFACE_PROSE.captures_iter(&record.output) {
            let status = format!("{}/{}", &caps[2], &caps[3]);
            interfaces.insert(caps[1].to_string(), status.to_lowercase());
        }
    }

    interfaces
}

/// Extract BGP neighbors from commands whose name mentions `bgp`.
pub fn bgp_neighbors(capture: &DeviceCapture) -> BTreeMap<String, BgpNeighbor> {
    let mut neighbors = BTreeMap::new();

    for record in &capture.records {
        if !record.command.to_lowercase().contains("bgp") {
            continue;
        }
        for caps in BGP_NEIGHBOR.captures_iter(&record.output) {
            neighbors.insert(
                caps[1].to_string(),
                BgpNeighbor {
                    as_number: caps[2].to_string(),
                    state: caps[4].to_string(),
                },
            );
        }
    }

    neighbors
}

/// Extract OSPF neighbors from commands whose name mentions `ospf`.
pub fn ospf_neighbors(capture: &DeviceCapture) -> BTreeMap<String, OspfNeighbor> {
    let mut neighbors = BTreeMap::new();

    for record in &capture.records {
        if !record.command.to_lowercase().contains("ospf") {
            continue;
        }
        for caps in OSPF_NEIGHBOR.captures_iter(&record.output) {
            neighbors.insert(
                caps[1].to_string(),
                OspfNeighbor {
                    state: caps[2].to_string(),
                    interface: caps[4].to_string(),
                },
            );
        }
    }

    neighbors
}

/// Extract VLANs from commands whose name mentions `vlan`.
pub fn vlans(capture: &DeviceCapture) -> BTreeMap<String, VlanInfo> {
    let mut result = BTreeMap::new();

    for record in &capture.records {
        if !record.command.to_lowercase().contains("vlan") {
            continue;
        }
        for caps in VLAN_ROW.captures_iter(&record.output) {
            result.insert(
                caps[1].to_string(),
                VlanInfo {
                    name: caps[2].to_string(),
                    status: caps[3].to_string(),
                },
            );
        }
    }

    result
}

/// Lines in an output that look like errors, false positives filtered out.
/// A line matching both indicator patterns is reported once.
pub fn error_lines(output: &str) -> Vec<String> {
    output
        .split('\n')
        .filter(|line| ERROR_GENERIC.is_match(line) || ERROR_SYSLOG.is_match(line))
        .map(|line| line.trim().to_string())
        .filter(|line| !is_false_positive_error(line))
        .collect()
}

pub fn is_false_positive_error(line: &str) -> bool {
    let line = line.to_lowercase();
    ERROR_FALSE_POSITIVES.iter().any(|fp| line.contains(fp))
}

/// Down-like: contains a down indicator (includes "not present").
pub fn is_down(status: &str) -> bool {
    let status = status.to_lowercase();
    DOWN_INDICATORS.iter().any(|ind| status.contains(ind))
}

/// Up-like: contains an up indicator and no `down` substring.
pub fn is_up(status: &str) -> bool {
    let status = status.to_lowercase();
    UP_INDICATORS.iter().any(|ind| status.contains(ind)) && !status.contains("down")
}

/// Classify an interface status transition between phases.
pub fn classify_transition(pre: &str, post: &str) -> ChangeKind {
    if is_down(pre) && is_up(post) {
        ChangeKind::CameUp
    } else if is_up(pre) && is_down(post) {
        ChangeKind::WentDown
    } else if pre == "not present" {
        ChangeKind::New
    } else if post == "not present" {
        ChangeKind::Removed
    } else {
        ChangeKind::Modified
    }
}
