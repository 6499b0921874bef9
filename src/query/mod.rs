//! Natural-language-ish querying over an analyzed change.
//!
//! The engine binds to one change's captures and device diffs and answers
//! questions by classifying intent and running the matching finder. Output is
//! both structured (typed per-device findings) and rendered (a bounded text
//! summary). Summaries are deterministic: capture maps iterate in hostname
//! order and every finding list is built in a fixed order, so the same
//! session data and question always render byte-identical text.

pub mod facts;
pub mod intent;

pub use intent::{classify, Intent};

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::differ::DeviceDiff;
use crate::error::{AnalysisError, Result};
use crate::parser::{CaptureMap, DeviceCapture, Phase};
use facts::ChangeKind;

/// Per-device caps applied to rendered summaries. Fixed by contract so
/// summary text is reproducible in output-matching tests.
const SUMMARY_INTERFACE_CAP: usize = 5;
const SUMMARY_NEIGHBOR_CAP: usize = 5;
const ERRORS_PER_DEVICE_CAP: usize = 10;
const SEARCH_MATCHES_PER_DEVICE: usize = 20;
const SEARCH_SUMMARY_DEVICES: usize = 5;
const SEARCH_SUMMARY_MATCHES: usize = 3;
const ERROR_LINE_WIDTH: usize = 80;
const SEARCH_LINE_WIDTH: usize = 60;
const SEARCH_STORED_LINE_WIDTH: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceChange {
    pub interface: String,
    pub pre_status: String,
    pub post_status: String,
    pub change: ChangeKind,
}

/// An interface transition reported by the directional (up/down) finders,
/// which carry no classification beyond the direction of the query itself.
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceTransition {
    pub interface: String,
    pub pre_status: String,
    pub post_status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NeighborChange {
    pub neighbor: String,
    pub change: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_state: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VlanChange {
    pub vlan: String,
    pub change: ChangeKind,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorFinding {
    pub command: String,
    pub error_line: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandChange {
    pub command: String,
    pub added: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceChangeStats {
    pub hostname: String,
    pub commands_changed: usize,
    pub total_commands: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub phase: Phase,
    pub command: String,
    pub line: String,
}

/// Structured findings for one device, shape depending on the intent.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceFindings {
    Interfaces {
        hostname: String,
        changes: Vec<InterfaceChange>,
    },
    Transitions {
        hostname: String,
        interfaces: Vec<InterfaceTransition>,
    },
    Neighbors {
        hostname: String,
        changes: Vec<NeighborChange>,
    },
    Vlans {
        hostname: String,
        changes: Vec<VlanChange>,
    },
    Errors {
        hostname: String,
        errors: Vec<ErrorFinding>,
    },
    Commands {
        hostname: String,
        changes: Vec<CommandChange>,
    },
    Stats(DeviceChangeStats),
    Search {
        hostname: String,
        matches: Vec<SearchMatch>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub intent: Intent,
    pub summary: String,
    pub devices_affected: Vec<String>,
    pub details: Vec<DeviceFindings>,
    pub total_findings: usize,
}

/// Query engine bound to one analyzed change. Holds no mutable state; a
/// fresh instance per query and a shared one behave identically.
pub struct QueryEngine<'a> {
    captures: &'a CaptureMap,
    diffs: &'a BTreeMap<String, DeviceDiff>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(captures: &'a CaptureMap, diffs: &'a BTreeMap<String, DeviceDiff>) -> Self {
        Self { captures, diffs }
    }

    /// Answer a free-text question about the change.
    pub fn query(&self, question: &str) -> Result<QueryResult> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "question text is empty".to_string(),
            ));
        }

        Ok(match classify(question) {
            Intent::InterfaceStatus => self.find_interface_changes(),
            Intent::InterfaceDown => self.find_interfaces_down(),
            Intent::InterfaceUp => self.find_interfaces_up(),
            Intent::Errors => self.find_errors(),
            Intent::BgpChanges => self.find_bgp_changes(),
            Intent::OspfChanges => self.find_ospf_changes(),
            Intent::RoutingChanges => self.find_routing_changes(),
            Intent::ConfigChanges => self.find_config_changes(),
            Intent::VlanChanges => self.find_vlan_changes(),
            Intent::GeneralDiff => self.change_summary(),
            Intent::Search => self.search(question),
        })
    }

    /// Devices with both phases present, in hostname order.
    fn paired_captures(
        &self,
    ) -> impl Iterator<Item = (&'a String, &'a DeviceCapture, &'a DeviceCapture)> + 'a {
        self.captures.iter().filter_map(|(hostname, pair)| {
            match (&pair.pre, &pair.post) {
                (Some(pre), Some(post)) => Some((hostname, pre, post)),
                _ => None,
            }
        })
    }

    /// All interface status transitions, classified per interface.
    pub fn find_interface_changes(&self) -> QueryResult {
        let mut details = Vec::new();
        let mut affected = Vec::new();

        for (hostname, pre, post) in self.paired_captures() {
            let pre_interfaces = facts::interface_status(pre);
            let post_interfaces = facts::interface_status(post);

            let names: BTreeSet<&String> =
                pre_interfaces.keys().chain(post_interfaces.keys()).collect();

            let mut changes = Vec::new();
            for name in names {
                let pre_status = pre_interfaces
                    .get(name)
                    .map(String::as_str)
                    .unwrap_or("not present");
                let post_status = post_interfaces
                    .get(name)
                    .map(String::as_str)
                    .unwrap_or("not present");

                if pre_status != post_status {
                    changes.push(InterfaceChange {
                        interface: name.clone(),
                        pre_status: pre_status.to_string(),
                        post_status: post_status.to_string(),
                        change: facts::classify_transition(pre_status, post_status),
                    });
                }
            }

            if !changes.is_empty() {
                affected.push(hostname.clone());
                details.push(DeviceFindings::Interfaces {
                    hostname: hostname.clone(),
                    changes,
                });
            }
        }

        let total = details
            .iter()
            .map(|d| match d {
                DeviceFindings::Interfaces { changes, .. } => changes.len(),
                _ => 0,
            })
            .sum();

        let summary = if details.is_empty() {
            "No interface status changes detected across any devices.".to_string()
        } else {
            let mut s = format!(
                "Found {} interface status change(s) across {} device(s):\n",
                total,
                affected.len()
            );
            for d in &details {
                if let DeviceFindings::Interfaces { hostname, changes } = d {
                    let _ = write!(s, "\n**{}**: {} change(s)\n", hostname, changes.len());
                    for c in changes.iter().take(SUMMARY_INTERFACE_CAP) {
                        let _ = write!(
                            s,
                            "  - {}: {} -> {}\n",
                            c.interface, c.pre_status, c.post_status
                        );
                    }
                    if changes.len() > SUMMARY_INTERFACE_CAP {
                        let _ = write!(
                            s,
                            "  ... and {} more\n",
                            changes.len() - SUMMARY_INTERFACE_CAP
                        );
                    }
                }
            }
            s
        };

        QueryResult {
            intent: Intent::InterfaceStatus,
            summary,
            devices_affected: affected,
            details,
            total_findings: total,
        }
    }

    /// Interfaces that went from up-like to down-like.
    pub fn find_interfaces_down(&self) -> QueryResult {
        self.find_transitions(
            Intent::InterfaceDown,
            |pre, post| facts::is_down(post) && !facts::is_down(pre),
            "No interfaces went down during the change.",
            "went DOWN",
        )
    }

    /// Interfaces that went from down-like to up-like.
    pub fn find_interfaces_up(&self) -> QueryResult {
        self.find_transitions(
            Intent::InterfaceUp,
            |pre, post| facts::is_up(post) && !facts::is_up(pre),
            "No interfaces came up during the change.",
            "came UP",
        )
    }

    fn find_transitions(
        &self,
        intent: Intent,
        matches: impl Fn(&str, &str) -> bool,
        empty_summary: &str,
        verb: &str,
    ) -> QueryResult {
        let mut details = Vec::new();
        let mut affected = Vec::new();

        for (hostname, pre, post) in self.paired_captures() {
            let pre_interfaces = facts::interface_status(pre);
            let post_interfaces = facts::interface_status(post);

            let mut interfaces = Vec::new();
            for (name, post_status) in &post_interfaces {
                let pre_status = pre_interfaces
                    .get(name)
                    .map(String::as_str)
                    .unwrap_or("not present");

                if matches(pre_status, post_status) {
                    interfaces.push(InterfaceTransition {
                        interface: name.clone(),
                        pre_status: pre_status.to_string(),
                        post_status: post_status.clone(),
                    });
                }
            }

            if !interfaces.is_empty() {
                affected.push(hostname.clone());
                details.push(DeviceFindings::Transitions {
                    hostname: hostname.clone(),
                    interfaces,
                });
            }
        }

        let total = details
            .iter()
            .map(|d| match d {
                DeviceFindings::Transitions { interfaces, .. } => interfaces.len(),
                _ => 0,
            })
            .sum();

        let summary = if details.is_empty() {
            empty_summary.to_string()
        } else {
            let mut s = format!(
                "{} interface(s) {} across {} device(s):\n",
                total,
                verb,
                affected.len()
            );
            for d in &details {
                if let DeviceFindings::Transitions {
                    hostname,
                    interfaces,
                } = d
                {
                    let _ = write!(s, "\n**{}**:\n", hostname);
                    for iface in interfaces {
                        let _ = write!(
                            s,
                            "  - {}: {} -> {}\n",
                            iface.interface, iface.pre_status, iface.post_status
                        );
                    }
                }
            }
            s
        };

        QueryResult {
            intent,
            summary,
            devices_affected: affected,
            details,
            total_findings: total,
        }
    }

    /// Error indications in post-change output, false positives filtered.
    pub fn find_errors(&self) -> QueryResult {
        let mut details = Vec::new();
        let mut affected = Vec::new();

        for (hostname, pair) in self.captures {
            let Some(post) = &pair.post else { continue };

            let mut errors = Vec::new();
            for record in &post.records {
                for line in facts::error_lines(&record.output) {
                    errors.push(ErrorFinding {
                        command: record.command.clone(),
                        error_line: line,
                    });
                }
            }

            if !errors.is_empty() {
                let found = errors.len();
                errors.truncate(ERRORS_PER_DEVICE_CAP);
                affected.push(hostname.clone());
                details.push((found, DeviceFindings::Errors {
                    hostname: hostname.clone(),
                    errors,
                }));
            }
        }

        let total = details
            .iter()
            .map(|(_, d)| match d {
                DeviceFindings::Errors { errors, .. } => errors.len(),
                _ => 0,
            })
            .sum();

        let summary = if details.is_empty() {
            "No errors found in post-change logs.".to_string()
        } else {
            let mut s = format!(
                "Found {} error indication(s) across {} device(s):\n",
                total,
                affected.len()
            );
            for (found, d) in &details {
                if let DeviceFindings::Errors { hostname, errors } = d {
                    let _ = write!(s, "\n**{}**:\n", hostname);
                    for err in errors {
                        let _ = write!(
                            s,
                            "  - [{}] {}\n",
                            err.command,
                            truncate_chars(&err.error_line, ERROR_LINE_WIDTH)
                        );
                    }
                    if *found > errors.len() {
                        let _ = write!(s, "  ... and {} more\n", found - errors.len());
                    }
                }
            }
            s
        };

        QueryResult {
            intent: Intent::Errors,
            summary,
            devices_affected: affected,
            details: details.into_iter().map(|(_, d)| d).collect(),
            total_findings: total,
        }
    }

    /// BGP neighbor deltas: NEW, REMOVED and state changes.
    pub fn find_bgp_changes(&self) -> QueryResult {
        let mut details = Vec::new();
        let mut affected = Vec::new();

        for (hostname, pre, post) in self.paired_captures() {
            let pre_neighbors = facts::bgp_neighbors(pre);
            let post_neighbors = facts::bgp_neighbors(post);

            let mut changes = Vec::new();
            for (neighbor, data) in &post_neighbors {
                match pre_neighbors.get(neighbor) {
                    None => changes.push(NeighborChange {
                        neighbor: neighbor.clone(),
                        change: ChangeKind::New,
                        as_number: Some(data.as_number.clone()),
                        state: Some(data.state.clone()),
                        interface: None,
                        pre_state: None,
                        post_state: None,
                    }),
                    Some(before) if before.state != data.state => {
                        changes.push(NeighborChange {
                            neighbor: neighbor.clone(),
                            change: ChangeKind::StateChange,
                            as_number: None,
                            state: None,
                            interface: None,
                            pre_state: Some(before.state.clone()),
                            post_state: Some(data.state.clone()),
                        })
                    }
                    Some(_) => {}
                }
            }
            for (neighbor, data) in &pre_neighbors {
                if !post_neighbors.contains_key(neighbor) {
                    changes.push(NeighborChange {
                        neighbor: neighbor.clone(),
                        change: ChangeKind::Removed,
                        as_number: Some(data.as_number.clone()),
                        state: None,
                        interface: None,
                        pre_state: None,
                        post_state: None,
                    });
                }
            }

            if !changes.is_empty() {
                affected.push(hostname.clone());
                details.push(DeviceFindings::Neighbors {
                    hostname: hostname.clone(),
                    changes,
                });
            }
        }

        let total = neighbor_total(&details);

        let summary = if details.is_empty() {
            "No BGP neighbor changes detected.".to_string()
        } else {
            let mut s = format!(
                "Found {} BGP change(s) across {} device(s):\n",
                total,
                affected.len()
            );
            for d in &details {
                if let DeviceFindings::Neighbors { hostname, changes } = d {
                    let _ = write!(s, "\n**{}**:\n", hostname);
                    for c in changes.iter().take(SUMMARY_NEIGHBOR_CAP) {
                        match c.change {
                            ChangeKind::New => {
                                let _ = write!(
                                    s,
                                    "  - NEW neighbor {} (AS {}) - {}\n",
                                    c.neighbor,
                                    c.as_number.as_deref().unwrap_or("?"),
                                    c.state.as_deref().unwrap_or("?")
                                );
                            }
                            ChangeKind::Removed => {
                                let _ = write!(
                                    s,
                                    "  - REMOVED neighbor {} (AS {})\n",
                                    c.neighbor,
                                    c.as_number.as_deref().unwrap_or("?")
                                );
                            }
                            _ => {
                                let _ = write!(
                                    s,
                                    "  - {}: {} -> {}\n",
                                    c.neighbor,
                                    c.pre_state.as_deref().unwrap_or("?"),
                                    c.post_state.as_deref().unwrap_or("?")
                                );
                            }
                        }
                    }
                    if changes.len() > SUMMARY_NEIGHBOR_CAP {
                        let _ = write!(
                            s,
                            "  ... and {} more\n",
                            changes.len() - SUMMARY_NEIGHBOR_CAP
                        );
                    }
                }
            }
            s
        };

        QueryResult {
            intent: Intent::BgpChanges,
            summary,
            devices_affected: affected,
            details,
            total_findings: total,
        }
    }

    /// OSPF neighbor deltas: NEW, REMOVED and state changes.
    pub fn find_ospf_changes(&self) -> QueryResult {
        let mut details = Vec::new();
        let mut affected = Vec::new();

        for (hostname, pre, post) in self.paired_captures() {
            let pre_neighbors = facts::ospf_neighbors(pre);
            let post_neighbors = facts::ospf_neighbors(post);

            let mut changes = Vec::new();
            for (neighbor, data) in &post_neighbors {
                match pre_neighbors.get(neighbor) {
                    None => changes.push(NeighborChange {
                        neighbor: neighbor.clone(),
                        change: ChangeKind::New,
                        as_number: None,
                        state: Some(data.state.clone()),
                        interface: Some(data.interface.clone()),
                        pre_state: None,
                        post_state: None,
                    }),
                    Some(before) if before.state != data.state => {
                        changes.push(NeighborChange {
                            neighbor: neighbor.clone(),
                            change: ChangeKind::StateChange,
                            as_number: None,
                            state: None,
                            interface: None,
                            pre_state: Some(before.state.clone()),
                            post_state: Some(data.state.clone()),
                        })
                    }
                    Some(_) => {}
                }
            }
            for neighbor in pre_neighbors.keys() {
                if !post_neighbors.contains_key(neighbor) {
                    changes.push(NeighborChange {
                        neighbor: neighbor.clone(),
                        change: ChangeKind::Removed,
                        as_number: None,
                        state: None,
                        interface: None,
                        pre_state: None,
                        post_state: None,
                    });
                }
            }

            if !changes.is_empty() {
                affected.push(hostname.clone());
                details.push(DeviceFindings::Neighbors {
                    hostname: hostname.clone(),
                    changes,
                });
            }
        }

        let total = neighbor_total(&details);

        let summary = if details.is_empty() {
            "No OSPF neighbor changes detected.".to_string()
        } else {
            let mut s = format!(
                "Found {} OSPF change(s) across {} device(s):\n",
                total,
                affected.len()
            );
            for d in &details {
                if let DeviceFindings::Neighbors { hostname, changes } = d {
                    let _ = write!(s, "\n**{}**:\n", hostname);
                    for c in changes.iter().take(SUMMARY_NEIGHBOR_CAP) {
                        match c.change {
                            ChangeKind::New => {
                                let _ = write!(
                                    s,
                                    "  - NEW neighbor {} ({}) on {}\n",
                                    c.neighbor,
                                    c.state.as_deref().unwrap_or("?"),
                                    c.interface.as_deref().unwrap_or("?")
                                );
                            }
                            ChangeKind::Removed => {
                                let _ = write!(s, "  - REMOVED neighbor {}\n", c.neighbor);
                            }
                            _ => {
                                let _ = write!(
                                    s,
                                    "  - {}: {} -> {}\n",
                                    c.neighbor,
                                    c.pre_state.as_deref().unwrap_or("?"),
                                    c.post_state.as_deref().unwrap_or("?")
                                );
                            }
                        }
                    }
                    if changes.len() > SUMMARY_NEIGHBOR_CAP {
                        let _ = write!(
                            s,
                            "  ... and {} more\n",
                            changes.len() - SUMMARY_NEIGHBOR_CAP
                        );
                    }
                }
            }
            s
        };

        QueryResult {
            intent: Intent::OspfChanges,
            summary,
            devices_affected: affected,
            details,
            total_findings: total,
        }
    }

    /// VLAN deltas: NEW and REMOVED only, never state changes.
    pub fn find_vlan_changes(&self) -> QueryResult {
        let mut details = Vec::new();
        let mut affected = Vec::new();

        for (hostname, pre, post) in self.paired_captures() {
            let pre_vlans = facts::vlans(pre);
            let post_vlans = facts::vlans(post);

            let mut changes = Vec::new();
            for (vlan, data) in &post_vlans {
                if !pre_vlans.contains_key(vlan) {
                    changes.push(VlanChange {
                        vlan: vlan.clone(),
                        change: ChangeKind::New,
                        name: data.name.clone(),
                    });
                }
            }
            for (vlan, data) in &pre_vlans {
                if !post_vlans.contains_key(vlan) {
                    changes.push(VlanChange {
                        vlan: vlan.clone(),
                        change: ChangeKind::Removed,
                        name: data.name.clone(),
                    });
                }
            }

            if !changes.is_empty() {
                affected.push(hostname.clone());
                details.push(DeviceFindings::Vlans {
                    hostname: hostname.clone(),
                    changes,
                });
            }
        }

        let total = details
            .iter()
            .map(|d| match d {
                DeviceFindings::Vlans { changes, .. } => changes.len(),
                _ => 0,
            })
            .sum();

        let summary = if details.is_empty() {
            "No VLAN changes detected.".to_string()
        } else {
            let mut s = format!(
                "Found {} VLAN change(s) across {} device(s):\n",
                total,
                affected.len()
            );
            for d in &details {
                if let DeviceFindings::Vlans { hostname, changes } = d {
                    let _ = write!(s, "\n**{}**:\n", hostname);
                    for c in changes {
                        match c.change {
                            ChangeKind::New => {
                                let _ = write!(s, "  - NEW VLAN {} ({})\n", c.vlan, c.name);
                            }
                            _ => {
                                let _ = write!(s, "  - REMOVED VLAN {} ({})\n", c.vlan, c.name);
                            }
                        }
                    }
                }
            }
            s
        };

        QueryResult {
            intent: Intent::VlanChanges,
            summary,
            devices_affected: affected,
            details,
            total_findings: total,
        }
    }

    /// Commands with config-looking names that changed.
    pub fn find_config_changes(&self) -> QueryResult {
        let (details, affected, total) = self.changed_commands(&["running-config", "config"]);

        let summary = if details.is_empty() {
            "No configuration changes detected.".to_string()
        } else {
            let mut s = format!(
                "Found configuration changes on {} device(s):\n",
                affected.len()
            );
            for d in &details {
                if let DeviceFindings::Commands { hostname, changes } = d {
                    let _ = write!(s, "\n**{}**:\n", hostname);
                    for c in changes {
                        let _ = write!(
                            s,
                            "  - {}: +{}/-{} lines\n",
                            c.command, c.added, c.removed
                        );
                    }
                }
            }
            s
        };

        QueryResult {
            intent: Intent::ConfigChanges,
            summary,
            devices_affected: affected,
            details,
            total_findings: total,
        }
    }

    /// Commands with routing-looking names that changed.
    pub fn find_routing_changes(&self) -> QueryResult {
        let (details, affected, total) = self.changed_commands(&["route", "routing"]);

        let summary = if details.is_empty() {
            "No routing changes detected.".to_string()
        } else {
            let mut s = format!("Found routing changes on {} device(s):\n", affected.len());
            for d in &details {
                if let DeviceFindings::Commands { hostname, changes } = d {
                    let _ = write!(s, "\n**{}**:\n", hostname);
                    for c in changes {
                        let _ = write!(
                            s,
                            "  - {}: +{}/-{} entries\n",
                            c.command, c.added, c.removed
                        );
                    }
                }
            }
            s
        };

        QueryResult {
            intent: Intent::RoutingChanges,
            summary,
            devices_affected: affected,
            details,
            total_findings: total,
        }
    }

    fn changed_commands(
        &self,
        name_keywords: &[&str],
    ) -> (Vec<DeviceFindings>, Vec<String>, usize) {
        let mut details = Vec::new();
        let mut affected = Vec::new();
        let mut total = 0;

        for (hostname, diff) in self.diffs {
            let changes: Vec<CommandChange> = diff
                .command_diffs
                .iter()
                .filter(|cmd| {
                    let name = cmd.command.to_lowercase();
                    cmd.has_changes && name_keywords.iter().any(|kw| name.contains(kw))
                })
                .map(|cmd| CommandChange {
                    command: cmd.command.clone(),
                    added: cmd.added_lines,
                    removed: cmd.removed_lines,
                })
                .collect();

            if !changes.is_empty() {
                total += changes.len();
                affected.push(hostname.clone());
                details.push(DeviceFindings::Commands {
                    hostname: hostname.clone(),
                    changes,
                });
            }
        }

        (details, affected, total)
    }

    /// Overall per-device change statistics.
    pub fn change_summary(&self) -> QueryResult {
        let mut details = Vec::new();
        let mut affected = Vec::new();

        for (hostname, diff) in self.diffs {
            if diff.commands_with_changes > 0 {
                affected.push(hostname.clone());
                details.push(DeviceChangeStats {
                    hostname: hostname.clone(),
                    commands_changed: diff.commands_with_changes,
                    total_commands: diff.total_commands,
                    lines_added: diff.total_added,
                    lines_removed: diff.total_removed,
                });
            }
        }

        let total = affected.len();

        let mut summary = format!(
            "**Change Summary** ({} devices analyzed):\n\n",
            self.diffs.len()
        );
        if affected.is_empty() {
            summary.push_str("No changes detected on any device.");
        } else {
            let _ = write!(summary, "{} device(s) have changes:\n", total);
            // Busiest devices first; ties stay in hostname order.
            let mut ranked: Vec<&DeviceChangeStats> = details.iter().collect();
            ranked.sort_by(|a, b| b.commands_changed.cmp(&a.commands_changed));
            for d in ranked {
                let _ = write!(summary, "\n**{}**:\n", d.hostname);
                let _ = write!(
                    summary,
                    "  - {}/{} commands changed\n",
                    d.commands_changed, d.total_commands
                );
                let _ = write!(
                    summary,
                    "  - +{} added, -{} removed\n",
                    d.lines_added, d.lines_removed
                );
            }
        }

        QueryResult {
            intent: Intent::GeneralDiff,
            summary,
            devices_affected: affected,
            details: details.into_iter().map(DeviceFindings::Stats).collect(),
            total_findings: total,
        }
    }

    /// Case-insensitive literal search over command names and output lines
    /// of both phases.
    pub fn search(&self, term: &str) -> QueryResult {
        let term = term.trim();
        let pattern = match Regex::new(&format!("(?i){}", regex::escape(term))) {
            Ok(p) => p,
            // A literal that fails to compile degrades to zero matches.
            Err(_) => {
                return QueryResult {
                    intent: Intent::Search,
                    summary: format!("No matches found for '{}'.", term),
                    devices_affected: Vec::new(),
                    details: Vec::new(),
                    total_findings: 0,
                }
            }
        };

        let mut details = Vec::new();
        let mut affected = Vec::new();

        for (hostname, pair) in self.captures {
            let mut matches = Vec::new();

            for capture in [&pair.pre, &pair.post].into_iter().flatten() {
                for record in &capture.records {
                    if !pattern.is_match(&record.output) && !pattern.is_match(&record.command) {
                        continue;
                    }
                    for line in record.output.split('\n') {
                        if pattern.is_match(line) {
                            matches.push(SearchMatch {
                                phase: capture.phase,
                                command: record.command.clone(),
                                line: truncate_chars(line.trim(), SEARCH_STORED_LINE_WIDTH)
                                    .to_string(),
                            });
                        }
                    }
                }
            }

            if !matches.is_empty() {
                matches.truncate(SEARCH_MATCHES_PER_DEVICE);
                affected.push(hostname.clone());
                details.push(DeviceFindings::Search {
                    hostname: hostname.clone(),
                    matches,
                });
            }
        }

        let total = details
            .iter()
            .map(|d| match d {
                DeviceFindings::Search { matches, .. } => matches.len(),
                _ => 0,
            })
            .sum();

        let summary = if details.is_empty() {
            format!("No matches found for '{}'.", term)
        } else {
            let mut s = format!(
                "Found {} match(es) for '{}' across {} device(s):\n",
                total,
                term,
                affected.len()
            );
            for d in details.iter().take(SEARCH_SUMMARY_DEVICES) {
                if let DeviceFindings::Search { hostname, matches } = d {
                    let _ = write!(s, "\n**{}** ({} matches):\n", hostname, matches.len());
                    for m in matches.iter().take(SEARCH_SUMMARY_MATCHES) {
                        let _ = write!(
                            s,
                            "  - [{}] {}: {}...\n",
                            m.phase.as_str(),
                            m.command,
                            truncate_chars(&m.line, SEARCH_LINE_WIDTH)
                        );
                    }
                }
            }
            s
        };

        QueryResult {
            intent: Intent::Search,
            summary,
            devices_affected: affected,
            details,
            total_findings: total,
        }
    }
}

fn neighbor_total(details: &[DeviceFindings]) -> usize {
    details
        .iter()
        .map(|d| match d {
            DeviceFindings::Neighbors { changes, .. } => changes.len(),
            _ => 0,
        })
        .sum()
}

/// Truncate at a character boundary, never mid-codepoint.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::DiffEngine;
    use crate::masker::Masker;
    use crate::parser::{parse_content, CapturePair};

    fn capture(hostname: &str, phase: Phase, content: &str) -> DeviceCapture {
        DeviceCapture {
            hostname: hostname.to_string(),
            change_id: "CHG1".to_string(),
            phase,
            records: parse_content(content),
        }
    }

    fn build(devices: &[(&str, &str, &str)]) -> (CaptureMap, BTreeMap<String, DeviceDiff>) {
        let mut captures = CaptureMap::new();
        for (hostname, pre, post) in devices {
            captures.insert(
                hostname.to_string(),
                CapturePair {
                    pre: Some(capture(hostname, Phase::Pre, pre)),
                    post: Some(capture(hostname, Phase::Post, post)),
                },
            );
        }

        let engine = DiffEngine::new(Masker::disabled(), None);
        let diffs = captures
            .iter()
            .filter_map(|(hostname, pair)| {
                engine.diff_device(pair).map(|d| (hostname.clone(), d))
            })
            .collect();

        (captures, diffs)
    }

    #[test]
    fn empty_question_is_invalid_input() {
        let (captures, diffs) = build(&[]);
        let engine = QueryEngine::new(&captures, &diffs);
        assert!(matches!(
            engine.query("   ").unwrap_err(),
            AnalysisError::InvalidInput(_)
        ));
    }

    #[test]
    fn interface_went_down_is_reported() {
        let pre = "command: show ip interface brief\n\
                   GigabitEthernet0/1  1.1.1.1  YES  NVRAM  up  up\n";
        let post = "command: show ip interface brief\n\
                    GigabitEthernet0/1  1.1.1.1  YES  NVRAM  down  down\n";
        let (captures, diffs) = build(&[("R1", pre, post)]);
        let engine = QueryEngine::new(&captures, &diffs);

        let result = engine.query("what interfaces went down?").unwrap();
        assert_eq!(result.intent, Intent::InterfaceDown);
        assert_eq!(result.devices_affected, vec!["R1"]);
        assert_eq!(result.total_findings, 1);
        match &result.details[0] {
            DeviceFindings::Transitions { interfaces, .. } => {
                assert_eq!(interfaces[0].interface, "GigabitEthernet0/1");
                assert_eq!(interfaces[0].post_status, "down/down");
            }
            other => panic!("unexpected findings: {:?}", other),
        }

        let changes = engine.find_interface_changes();
        match &changes.details[0] {
            DeviceFindings::Interfaces { changes, .. } => {
                assert_eq!(changes[0].change, ChangeKind::WentDown);
            }
            other => panic!("unexpected findings: {:?}", other),
        }
    }

    #[test]
    fn zero_error_counters_are_not_errors() {
        let post = "command: show interfaces\n\
                    Ethernet0/1 is up, 0 input errors, 0 output errors\n";
        let (captures, diffs) = build(&[("R1", "", post)]);
        let engine = QueryEngine::new(&captures, &diffs);

        let result = engine.query("any errors?").unwrap();
        assert_eq!(result.total_findings, 0);
        assert!(result.summary.contains("No errors found"));
    }

    #[test]
    fn real_errors_are_reported_with_command_context() {
        let post = "command: show logging\n\
                    %LINK-3-UPDOWN: Interface Gi0/1, changed state to down\n";
        let (captures, diffs) = build(&[("R1", "", post)]);
        let engine = QueryEngine::new(&captures, &diffs);

        let result = engine.query("any problems?").unwrap();
        assert_eq!(result.total_findings, 1);
        assert!(result.summary.contains("[show logging]"));
    }

    #[test]
    fn removed_bgp_neighbor_is_classified() {
        let pre = "command: show ip bgp summary\n\
                   10.0.0.1        4        65001     100     101        5    0    0 01:02:03 Established\n";
        let post = "command: show ip bgp summary\nno neighbors\n";
        let (captures, diffs) = build(&[("R1", pre, post)]);
        let engine = QueryEngine::new(&captures, &diffs);

        let result = engine.query("bgp neighbors lost?").unwrap();
        assert_eq!(result.intent, Intent::BgpChanges);
        assert_eq!(result.total_findings, 1);
        match &result.details[0] {
            DeviceFindings::Neighbors { changes, .. } => {
                assert_eq!(changes[0].neighbor, "10.0.0.1");
                assert_eq!(changes[0].change, ChangeKind::Removed);
            }
            other => panic!("unexpected findings: {:?}", other),
        }
        assert!(result.summary.contains("REMOVED neighbor 10.0.0.1"));
    }

    #[test]
    fn config_changes_use_diff_counts() {
        let pre = "command: show running-config\nhostname R1\nold line\n";
        let post = "command: show running-config\nhostname R1\nnew line\nextra\n";
        let (captures, diffs) = build(&[("R1", pre, post)]);
        let engine = QueryEngine::new(&captures, &diffs);

        let result = engine.query("config changes?").unwrap();
        assert_eq!(result.intent, Intent::ConfigChanges);
        assert!(result.summary.contains("+2/-1 lines"));
    }

    #[test]
    fn change_summary_ranks_busiest_device_first() {
        let (captures, diffs) = build(&[
            ("R1", "command: a\nx\n", "command: a\ny\n"),
            (
                "R2",
                "command: a\nx\ncommand: b\nx\n",
                "command: a\ny\ncommand: b\ny\n",
            ),
        ]);
        let engine = QueryEngine::new(&captures, &diffs);

        let result = engine.query("what changed?").unwrap();
        assert_eq!(result.intent, Intent::GeneralDiff);
        assert_eq!(result.devices_affected, vec!["R1", "R2"]);
        // R2 changed more commands, so it renders first.
        let r2_pos = result.summary.find("**R2**").unwrap();
        let r1_pos = result.summary.find("**R1**").unwrap();
        assert!(r2_pos < r1_pos);
    }

    #[test]
    fn unchanged_devices_yield_neutral_summary() {
        let (captures, diffs) = build(&[("R1", "command: a\nsame\n", "command: a\nsame\n")]);
        let engine = QueryEngine::new(&captures, &diffs);

        let result = engine.query("what changed?").unwrap();
        assert_eq!(result.total_findings, 0);
        assert!(result.summary.contains("No changes detected"));
    }

    #[test]
    fn search_matches_both_phases() {
        let pre = "command: show version\nuptime is 4 weeks\n";
        let post = "command: show version\nuptime is 1 minute\n";
        let (captures, diffs) = build(&[("R1", pre, post)]);
        let engine = QueryEngine::new(&captures, &diffs);

        let result = engine.query("uptime").unwrap();
        assert_eq!(result.intent, Intent::Search);
        assert_eq!(result.total_findings, 2);
        assert!(result.summary.contains("[PRE]"));
    }

    #[test]
    fn search_term_is_literal_not_a_pattern() {
        let post = "command: show run\ninterface Gi0/1.100\n";
        let (captures, diffs) = build(&[("R1", "", post)]);
        let engine = QueryEngine::new(&captures, &diffs);

        // The dot must not match "Gi0/1x100".
        let result = engine.search("Gi0/1.100");
        assert_eq!(result.total_findings, 1);
        let miss = engine.search("Gi0/1x100");
        assert_eq!(miss.total_findings, 0);
    }

    #[test]
    fn summaries_are_byte_identical_across_calls() {
        let pre = "command: show ip interface brief\n\
                   Gi0/1  1.1.1.1  YES  NVRAM  up  up\n\
                   Gi0/2  1.1.1.2  YES  NVRAM  up  up\n";
        let post = "command: show ip interface brief\n\
                    Gi0/1  1.1.1.1  YES  NVRAM  down  down\n\
                    Gi0/2  1.1.1.2  YES  NVRAM  down  down\n";
        let (captures, diffs) = build(&[("R1", pre, post), ("R2", pre, post)]);
        let engine = QueryEngine::new(&captures, &diffs);

        let a = engine.query("interface status").unwrap();
        let b = engine.query("interface status").unwrap();
        assert_eq!(a.summary, b.summary);
    }

    #[test]
    fn devices_missing_a_phase_are_skipped_by_phase_queries() {
        let mut captures = CaptureMap::new();
        captures.insert(
            "R1".to_string(),
            CapturePair {
                pre: Some(capture(
                    "R1",
                    Phase::Pre,
                    "command: show ip interface brief\nGi0/1  1.1.1.1  YES  NVRAM  up  up\n",
                )),
                post: None,
            },
        );
        let diffs = BTreeMap::new();
        let engine = QueryEngine::new(&captures, &diffs);

        let result = engine.find_interface_changes();
        assert_eq!(result.total_findings, 0);
    }
}
