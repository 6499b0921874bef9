//! Intent classification for free-text questions.
//!
//! Routing is deterministic keyword matching, not language understanding:
//! an ordered route table is scanned top to bottom and the first route whose
//! keywords appear in the lower-cased question wins. Order is load-bearing,
//! e.g. "bgp neighbor status" must hit the interface/status route first
//! because that is the documented priority.

use serde::Serialize;

/// Closed set of question classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    InterfaceStatus,
    InterfaceDown,
    InterfaceUp,
    Errors,
    BgpChanges,
    OspfChanges,
    RoutingChanges,
    ConfigChanges,
    VlanChanges,
    GeneralDiff,
    Search,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::InterfaceStatus => "interface_status",
            Intent::InterfaceDown => "interface_down",
            Intent::InterfaceUp => "interface_up",
            Intent::Errors => "errors",
            Intent::BgpChanges => "bgp_changes",
            Intent::OspfChanges => "ospf_changes",
            Intent::RoutingChanges => "routing_changes",
            Intent::ConfigChanges => "config_changes",
            Intent::VlanChanges => "vlan_changes",
            Intent::GeneralDiff => "general_diff",
            Intent::Search => "search",
        }
    }
}

struct Route {
    keywords: &'static [&'static str],
    resolve: fn(&str) -> Intent,
}

/// Priority-ordered route table. First match wins.
const ROUTES: &[Route] = &[
    Route {
        keywords: &["interface", "port", "status"],
        resolve: interface_intent,
    },
    Route {
        keywords: &["bgp", "neighbor", "peer"],
        resolve: |_| Intent::BgpChanges,
    },
    Route {
        keywords: &["ospf", "routing protocol"],
        resolve: |_| Intent::OspfChanges,
    },
    Route {
        keywords: &["route", "routing"],
        resolve: |_| Intent::RoutingChanges,
    },
    Route {
        keywords: &["error", "fail", "problem", "issue"],
        resolve: |_| Intent::Errors,
    },
    Route {
        keywords: &["vlan", "switch"],
        resolve: |_| Intent::VlanChanges,
    },
    Route {
        keywords: &["config", "configuration", "running"],
        resolve: |_| Intent::ConfigChanges,
    },
    Route {
        keywords: &["change", "differ", "impact", "affect"],
        resolve: |_| Intent::GeneralDiff,
    },
];

fn interface_intent(question: &str) -> Intent {
    if contains_any(question, &["down", "went down", "failed"]) {
        Intent::InterfaceDown
    } else if contains_any(question, &["up", "came up", "enabled"]) {
        Intent::InterfaceUp
    } else {
        Intent::InterfaceStatus
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

/// Classify a question. Unmatched questions fall back to free-text search.
pub fn classify(question: &str) -> Intent {
    let question = question.to_lowercase();
    for route in ROUTES {
        if contains_any(&question, route.keywords) {
            return (route.resolve)(&question);
        }
    }
    Intent::Search
}
