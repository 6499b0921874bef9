//! Configuration type definitions and defaults

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub masking: MaskingConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

/// Masking configuration: an ordered list of rule categories.
///
/// Category order here is the order rules apply in when no explicit category
/// list is requested, so it must stay deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingConfig {
    #[serde(default = "default_masking_enabled")]
    pub enabled: bool,
    #[serde(default = "default_masking_categories")]
    pub categories: Vec<MaskingCategory>,
}

pub fn default_masking_enabled() -> bool {
    true
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            enabled: default_masking_enabled(),
            categories: default_masking_categories(),
        }
    }
}

/// A named group of masking rules applied together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingCategory {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<MaskingRuleConfig>,
}

/// A single pattern/replacement pair. Replacements use `$1`-style group
/// references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingRuleConfig {
    pub pattern: String,
    pub replacement: String,
}

/// Built-in rule set covering the four standard categories, so the tool is
/// useful with no config file present.
pub fn default_masking_categories() -> Vec<MaskingCategory> {
    fn rule(pattern: &str, replacement: &str) -> MaskingRuleConfig {
        MaskingRuleConfig {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }

    vec![
        MaskingCategory {
            name: "timestamps".to_string(),
            rules: vec![
                rule(r"\d{2}:\d{2}:\d{2}(?:\.\d{1,3})?", "XX:XX:XX"),
                rule(
                    r"(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun) (?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) +\d{1,2} \d{4}",
                    "DAY MON DD YYYY",
                ),
            ],
        },
        MaskingCategory {
            name: "session_ids".to_string(),
            rules: vec![
                rule(r"(?i)session[ -]?id[:=]?\s*\d+", "session id: MASKED"),
                rule(r"0x[0-9A-Fa-f]{4,}", "0xMASKED"),
            ],
        },
        MaskingCategory {
            name: "counters".to_string(),
            rules: vec![
                rule(r"\b\d+ (packets|bytes)\b", "N $1"),
                rule(r"\b\d+ bits/sec\b", "N bits/sec"),
            ],
        },
        MaskingCategory {
            name: "uptime".to_string(),
            rules: vec![rule(r"(?i)uptime is .*", "uptime is MASKED")],
        },
    ]
}

/// Diff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Masking profile applied before diffing: minimal, standard, strict, all.
    #[serde(default = "default_masking_profile")]
    pub masking_profile: String,
}

pub fn default_masking_profile() -> String {
    "standard".to_string()
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            masking_profile: default_masking_profile(),
        }
    }
}

/// Performance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Worker threads for per-device diffing. 0 means one per core.
    #[serde(default)]
    pub max_workers: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { max_workers: 0 }
    }
}
