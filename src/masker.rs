//! Masking of volatile substrings before diffing.
//!
//! Timestamps, session counters and similar fields change between any two
//! captures and would drown a diff in noise. Rules are grouped into named
//! categories and applied in declared order; within a category each rule
//! rewrites the output of the previous one. The same masking is applied to
//! both pre and post text, so volatile fields never show up as changes.

use regex::Regex;

use crate::config::MaskingConfig;
use crate::error::{AnalysisError, Result};

/// Fixed masking profiles mapping a profile name to an ordered category
/// list. `all` applies every loaded category.
pub const PROFILE_NAMES: &[&str] = &["minimal", "standard", "strict", "all"];

/// Resolve a profile name to its category list.
///
/// `None` means "apply all loaded categories". Unknown names are a
/// configuration error.
pub fn profile_categories(profile: &str) -> Result<Option<Vec<String>>> {
    let categories: Option<&[&str]> = match profile {
        "minimal" => Some(&["timestamps"]),
        "standard" => Some(&["timestamps", "session_ids", "uptime"]),
        "strict" => Some(&["timestamps", "session_ids", "counters", "uptime"]),
        "all" => None,
        _ => {
            return Err(AnalysisError::Config(format!(
                "unknown masking profile: {} (expected one of {})",
                profile,
                PROFILE_NAMES.join(", ")
            )))
        }
    };
    Ok(categories.map(|list| list.iter().map(|s| s.to_string()).collect()))
}

/// A compiled pattern/replacement pair.
#[derive(Debug, Clone)]
pub struct MaskingRule {
    pub pattern: String,
    pub replacement: String,
    compiled: Regex,
}

impl MaskingRule {
    fn new(pattern: &str, replacement: &str) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|e| {
            AnalysisError::Config(format!("invalid regex pattern '{}': {}", pattern, e))
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
            compiled,
        })
    }

    fn apply(&self, text: &str) -> String {
        self.compiled
            .replace_all(text, self.replacement.as_str())
            .into_owned()
    }
}

/// Applies masking rule categories to capture text.
///
/// Rules are compiled once at construction; a rule whose pattern fails to
/// compile is logged and skipped, never fatal to the rest of its category.
#[derive(Debug, Clone)]
pub struct Masker {
    enabled: bool,
    categories: Vec<(String, Vec<MaskingRule>)>,
}

impl Masker {
    /// Build a masker from configuration, preserving declared category order.
    pub fn from_config(config: &MaskingConfig) -> Self {
        let mut categories = Vec::with_capacity(config.categories.len());

        for category in &config.categories {
            let mut rules = Vec::with_capacity(category.rules.len());
            for rule in &category.rules {
                match MaskingRule::new(&rule.pattern, &rule.replacement) {
                    Ok(compiled) => rules.push(compiled),
                    Err(err) => {
                        tracing::warn!("skipping masking rule in '{}': {}", category.name, err);
                    }
                }
            }
            categories.push((category.name.clone(), rules));
        }

        Self {
            enabled: config.enabled,
            categories,
        }
    }

    /// A masker that rewrites nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            categories: Vec::new(),
        }
    }

    /// Apply masking rules to text.
    ///
    /// When `categories` is `None`, every loaded category applies in declared
    /// order; otherwise the requested categories apply in the requested
    /// order (unknown names are ignored). Identity when masking is disabled.
    pub fn mask(&self, text: &str, categories: Option<&[String]>) -> String {
        if !self.enabled || text.is_empty() {
            return text.to_string();
        }

        let mut masked = text.to_string();

        match categories {
            None => {
                for (_, rules) in &self.categories {
                    for rule in rules {
                        masked = rule.apply(&masked);
                    }
                }
            }
            Some(requested) => {
                for name in requested {
                    if let Some((_, rules)) =
                        self.categories.iter().find(|(cat, _)| cat == name)
                    {
                        for rule in rules {
                            masked = rule.apply(&masked);
                        }
                    }
                }
            }
        }

        masked
    }

    /// Loaded category names in declared order.
    pub fn categories(&self) -> Vec<&str> {
        self.categories.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Rules loaded for a category, empty if the category is unknown.
    pub fn category_rules(&self, category: &str) -> &[MaskingRule] {
        self.categories
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, rules)| rules.as_slice())
            .unwrap_or(&[])
    }

    /// Add a rule at runtime, creating the category if needed.
    pub fn add_rule(&mut self, category: &str, pattern: &str, replacement: &str) -> Result<()> {
        let rule = MaskingRule::new(pattern, replacement)?;
        match self.categories.iter_mut().find(|(name, _)| name == category) {
            Some((_, rules)) => rules.push(rule),
            None => self.categories.push((category.to_string(), vec![rule])),
        }
        Ok(())
    }

    /// Remove a category and all of its rules.
    pub fn remove_category(&mut self, category: &str) {
        self.categories.retain(|(name, _)| name != category);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MaskingCategory, MaskingRuleConfig};

    fn test_config() -> MaskingConfig {
        MaskingConfig::default()
    }

    #[test]
    fn masks_timestamps() {
        let masker = Masker::from_config(&test_config());
        let masked = masker.mask("System restarted at 09:14:33.120", None);
        assert_eq!(masked, "System restarted at XX:XX:XX");
    }

    #[test]
    fn masking_is_deterministic() {
        let masker = Masker::from_config(&test_config());
        let input = "up at 09:14:33, session-id: 42, 1024 bytes";
        assert_eq!(masker.mask(input, None), masker.mask(input, None));
    }

    #[test]
    fn timestamp_masking_is_idempotent() {
        let masker = Masker::from_config(&test_config());
        let categories = vec!["timestamps".to_string()];
        let once = masker.mask("clock reads 12:30:45", Some(&categories));
        let twice = masker.mask(&once, Some(&categories));
        assert_eq!(once, twice);
    }

    #[test]
    fn disabled_masker_is_identity() {
        let mut config = test_config();
        config.enabled = false;
        let masker = Masker::from_config(&config);
        assert_eq!(masker.mask("up at 10:00:00", None), "up at 10:00:00");
    }

    #[test]
    fn unknown_category_is_ignored() {
        let masker = Masker::from_config(&test_config());
        let categories = vec!["no_such_category".to_string()];
        assert_eq!(masker.mask("10:00:00", Some(&categories)), "10:00:00");
    }

    #[test]
    fn category_subset_only_applies_requested_rules() {
        let masker = Masker::from_config(&test_config());
        let categories = vec!["session_ids".to_string()];
        let masked = masker.mask("session id: 99 at 10:00:00", Some(&categories));
        assert!(masked.contains("session id: MASKED"));
        assert!(masked.contains("10:00:00"));
    }

    #[test]
    fn rules_apply_cumulatively_within_category() {
        let config = MaskingConfig {
            enabled: true,
            categories: vec![MaskingCategory {
                name: "chain".to_string(),
                rules: vec![
                    MaskingRuleConfig {
                        pattern: "alpha".to_string(),
                        replacement: "beta".to_string(),
                    },
                    MaskingRuleConfig {
                        pattern: "beta".to_string(),
                        replacement: "gamma".to_string(),
                    },
                ],
            }],
        };
        let masker = Masker::from_config(&config);
        // Second rule sees the first rule's output.
        assert_eq!(masker.mask("alpha", None), "gamma");
    }

    #[test]
    fn invalid_pattern_is_skipped_not_fatal() {
        let config = MaskingConfig {
            enabled: true,
            categories: vec![MaskingCategory {
                name: "mixed".to_string(),
                rules: vec![
                    MaskingRuleConfig {
                        pattern: "[unclosed".to_string(),
                        replacement: "X".to_string(),
                    },
                    MaskingRuleConfig {
                        pattern: "good".to_string(),
                        replacement: "MASKED".to_string(),
                    },
                ],
            }],
        };
        let masker = Masker::from_config(&config);
        assert_eq!(masker.category_rules("mixed").len(), 1);
        assert_eq!(masker.mask("good", None), "MASKED");
    }

    #[test]
    fn add_rule_rejects_bad_pattern() {
        let mut masker = Masker::from_config(&test_config());
        let err = masker.add_rule("custom", "(oops", "X").unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }

    #[test]
    fn add_and_remove_category() {
        let mut masker = Masker::from_config(&test_config());
        masker.add_rule("custom", r"\bsecret\b", "HIDDEN").unwrap();
        assert!(masker.categories().contains(&"custom"));
        assert_eq!(masker.mask("a secret thing", None), "a HIDDEN thing");

        masker.remove_category("custom");
        assert!(!masker.categories().contains(&"custom"));
    }

    #[test]
    fn profile_lookup() {
        assert_eq!(
            profile_categories("minimal").unwrap().unwrap(),
            vec!["timestamps"]
        );
        assert_eq!(
            profile_categories("strict").unwrap().unwrap(),
            vec!["timestamps", "session_ids", "counters", "uptime"]
        );
        assert!(profile_categories("all").unwrap().is_none());
        assert!(matches!(
            profile_categories("bogus").unwrap_err(),
            AnalysisError::Config(_)
        ));
    }
}
