//! Bonus variant eligibility.
//!
//! A pure evaluator over an ordered rule table. The first rule naming a set
//! decides for that set; rules are never combined.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::CatalogCard;

/// Variant marker appended for eligible cards.
pub const BONUS_VARIANT: &str = "pokeBall";

/// One eligibility rule scoped to a group of set ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VariantRule {
    #[serde(rename_all = "camelCase")]
    Range {
        set_ids: Vec<String>,
        min: u32,
        max: u32,
        /// Cards named "... ex" never qualify
        #[serde(default)]
        exclude_ex: bool,
    },
    #[serde(rename_all = "camelCase")]
    List { set_ids: Vec<String>, numbers: Vec<u32> },
}

impl VariantRule {
    fn set_ids(&self) -> &[String] {
        match self {
            VariantRule::Range { set_ids, .. } | VariantRule::List { set_ids, .. } => set_ids,
        }
    }

    fn applies_to(&self, set_id: &str) -> bool {
        self.set_ids().iter().any(|s| s == set_id)
    }

    fn admits(&self, number: u32, card: Option<&CatalogCard>) -> bool {
        match self {
            VariantRule::Range {
                min,
                max,
                exclude_ex,
                ..
            } => {
                if !(*min..=*max).contains(&number) {
                    return false;
                }
                !(*exclude_ex && card.is_some_and(|c| is_ex_name(&c.name)))
            }
            VariantRule::List { numbers, .. } => numbers.contains(&number),
        }
    }
}

/// Parse a local card number: ASCII digits only, leading zeros ignored.
pub fn parse_local_number(local_number: &str) -> Option<u32> {
    let trimmed = local_number.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = trimmed.trim_start_matches('0');
    if digits.is_empty() {
        return Some(0);
    }
    digits.parse().ok()
}

fn is_ex_name(name: &str) -> bool {
    name.trim_end().to_ascii_lowercase().ends_with(" ex")
}

fn sets(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

/// Built-in rule table.
pub fn default_rules() -> Vec<VariantRule> {
    vec![
        VariantRule::Range {
            set_ids: sets(&["sv03.5", "sv3pt5", "SV2a"]),
            min: 1,
            max: 165,
            exclude_ex: true,
        },
        VariantRule::Range {
            set_ids: sets(&["SV8a"]),
            min: 1,
            max: 187,
            exclude_ex: true,
        },
        VariantRule::List {
            set_ids: sets(&["sv08.5", "sv8pt5"]),
            numbers: vec![
                1, 2, 4, 5, 6, 7, 8, 9, 10, 12, 13, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
                27, 29, 30, 31, 32, 33, 35, 37, 38, 39, 40, 42, 43, 44, 45, 46, 47, 48, 49, 50,
                51, 52, 53, 54, 55, 56, 57, 58, 59, 62, 63, 64, 65, 66, 67, 68, 69, 70, 71, 72,
                73, 74, 77, 78, 79, 80, 81, 82, 83, 84, 85, 86, 87, 88, 89, 90, 91, 92, 93, 94,
                95, 96, 97, 98, 99, 100, 101, 102, 103, 104, 105, 106, 107, 108, 109, 110, 111,
                112, 113, 114, 115, 116, 117, 118, 119, 120, 121, 122, 123, 124, 125, 126, 127,
                128, 129, 130, 131,
            ],
        },
    ]
}

/// Evaluates the rule table.
#[derive(Debug, Clone)]
pub struct VariantEligibility {
    rules: Vec<VariantRule>,
}

impl Default for VariantEligibility {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl VariantEligibility {
    pub fn new(rules: Vec<VariantRule>) -> Self {
        Self { rules }
    }

    /// Load a rule table from a JSON array file.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        let rules: Vec<VariantRule> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Validation(format!("Invalid variant rules in {}: {}", path.display(), e))
        })?;
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[VariantRule] {
        &self.rules
    }

    pub fn is_eligible(&self, set_id: &str, local_number: &str, card: Option<&CatalogCard>) -> bool {
        let Some(number) = parse_local_number(local_number) else {
            return false;
        };
        self.rules
            .iter()
            .find(|rule| rule.applies_to(set_id))
            .is_some_and(|rule| rule.admits(number, card))
    }

    /// A new variant list with the bonus marker appended when eligible and
    /// not already present. The input is left untouched.
    pub fn augment(
        &self,
        variants: &[String],
        set_id: &str,
        local_number: &str,
        card: Option<&CatalogCard>,
    ) -> Vec<String> {
        let mut out = variants.to_vec();
        if self.is_eligible(set_id, local_number, card) && !out.iter().any(|v| v == BONUS_VARIANT)
        {
            out.push(BONUS_VARIANT.to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> CatalogCard {
        CatalogCard {
            id: "x".to_string(),
            name: name.to_string(),
            number: None,
            set: None,
            images: Default::default(),
        }
    }

    #[test]
    fn test_parse_local_number() {
        assert_eq!(parse_local_number("042"), Some(42));
        assert_eq!(parse_local_number("6"), Some(6));
        assert_eq!(parse_local_number("000"), Some(0));
        assert_eq!(parse_local_number("abc"), None);
        assert_eq!(parse_local_number("TG05"), None);
        assert_eq!(parse_local_number(""), None);
        assert_eq!(parse_local_number("-1"), None);
    }

    #[test]
    fn test_default_table_decisions() {
        let engine = VariantEligibility::default();

        assert!(engine.is_eligible("sv03.5", "42", None));
        assert!(engine.is_eligible("sv03.5", "042", None));
        assert!(!engine.is_eligible("sv03.5", "166", None));
        assert!(!engine.is_eligible("SV8a", "100", Some(&named("Pidgeot ex"))));
        assert!(!engine.is_eligible("SV8a", "100", Some(&named("Pidgeot EX "))));
        assert!(engine.is_eligible("SV8a", "100", Some(&named("Pidgeot"))));
        assert!(engine.is_eligible("sv08.5", "6", None));
        assert!(!engine.is_eligible("sv08.5", "3", None));
        assert!(!engine.is_eligible("sv03.5", "abc", None));
        assert!(!engine.is_eligible("unknown", "1", None));
    }

    #[test]
    fn test_first_matching_rule_is_authoritative() {
        let engine = VariantEligibility::new(vec![
            VariantRule::List {
                set_ids: sets(&["s1"]),
                numbers: vec![5],
            },
            VariantRule::Range {
                set_ids: sets(&["s1", "s2"]),
                min: 1,
                max: 100,
                exclude_ex: false,
            },
        ]);

        assert!(engine.is_eligible("s1", "5", None));
        assert!(!engine.is_eligible("s1", "6", None));
        assert!(engine.is_eligible("s2", "6", None));
    }

    #[test]
    fn test_augment_returns_new_list_without_duplicates() {
        let engine = VariantEligibility::default();
        let input = vec!["normal".to_string()];

        let out = engine.augment(&input, "sv03.5", "42", None);
        assert_eq!(out, vec!["normal", BONUS_VARIANT]);
        assert_eq!(input, vec!["normal"]);

        assert_eq!(engine.augment(&out, "sv03.5", "42", None), out);
        assert_eq!(engine.augment(&input, "sv03.5", "abc", None), input);
    }

    #[test]
    fn test_rules_deserialize_from_tagged_json() {
        let raw = r#"[
            { "kind": "range", "setIds": ["a"], "min": 1, "max": 3, "excludeEx": true },
            { "kind": "list", "setIds": ["b"], "numbers": [7] }
        ]"#;
        let rules: Vec<VariantRule> = serde_json::from_str(raw).unwrap();
        let engine = VariantEligibility::new(rules);
        assert!(engine.is_eligible("a", "2", None));
        assert!(engine.is_eligible("b", "7", None));
        assert!(!engine.is_eligible("b", "8", None));
    }
}
