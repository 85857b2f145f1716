// 🧭 Intent Rules - free-text card wishes translated into a FilterSpec
//
// Rules as data. Two stages run over the lower-cased query:
//   modifier: every matching rule applies, effects compound
//   topic:    first matching rule wins, otherwise the raw query becomes the text term
// Every translation starts from the identity spec.

use crate::filter::{CategoryFilter, FilterSpec};
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStage {
    Modifier,
    Topic,
}

/// What a rule does to the spec when it fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IntentEffect {
    ZeroFeeOnly,
    Category(String),
    /// Literal replacement for the text term (not the raw query)
    TextTerm(String),
}

impl IntentEffect {
    fn apply(&self, spec: &mut FilterSpec) {
        match self {
            IntentEffect::ZeroFeeOnly => spec.zero_fee_only = true,
            IntentEffect::Category(label) => spec.category = CategoryFilter::from_label(label),
            IntentEffect::TextTerm(term) => spec.text_term = term.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRule {
    /// Rule ID for tracking
    pub id: String,

    /// Substrings looked for in the lower-cased query (any one is enough)
    pub keywords: Vec<String>,

    pub stage: RuleStage,

    pub effect: IntentEffect,

    /// Priority within the stage (higher = evaluated first)
    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub description: Option<String>,
}

impl IntentRule {
    pub fn new(id: &str, keywords: &[&str], stage: RuleStage, effect: IntentEffect) -> Self {
        IntentRule {
            id: id.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            stage,
            effect,
            priority: 0,
            description: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// `query_lower` must already be lower-cased
    pub fn matches(&self, query_lower: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| query_lower.contains(&keyword.to_lowercase()))
    }
}

/// The stock rule table
pub fn default_rules() -> Vec<IntentRule> {
    vec![
        IntentRule::new(
            "zero-fee",
            &["budget", "no fee", "no ssn"],
            RuleStage::Modifier,
            IntentEffect::ZeroFeeOnly,
        )
        .with_priority(10),
        IntentRule::new(
            "travel",
            &["travel", "points"],
            RuleStage::Topic,
            IntentEffect::Category("Travel".to_string()),
        )
        .with_priority(20),
        IntentRule::new(
            "student",
            &["student"],
            RuleStage::Topic,
            IntentEffect::TextTerm("Student".to_string()),
        )
        .with_priority(10),
    ]
}

// ============================================================================
// TRANSLATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentMatch {
    pub spec: FilterSpec,

    /// IDs of the rules that fired, in evaluation order
    pub fired: Vec<String>,

    /// True when no topic rule fired and the raw query became the text term
    pub used_raw_query: bool,
}

// ============================================================================
// TRANSLATOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct IntentTranslator {
    rules: Vec<IntentRule>,
}

impl IntentTranslator {
    pub fn new() -> Self {
        Self::from_rules(default_rules())
    }

    /// Load rules from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read intent rules file: {:?}", path.as_ref()))?;

        let rules: Vec<IntentRule> =
            serde_json::from_str(&content).context("Failed to parse intent rules JSON")?;

        Ok(Self::from_rules(rules))
    }

    pub fn from_rules(mut rules: Vec<IntentRule>) -> Self {
        // Stable sort keeps file order among equal priorities
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        IntentTranslator { rules }
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn translate(&self, query: &str) -> FilterSpec {
        self.explain(query).spec
    }

    /// Translate and report which rules fired
    pub fn explain(&self, query: &str) -> IntentMatch {
        let query_lower = query.to_lowercase();
        let mut spec = FilterSpec::default();
        let mut fired = Vec::new();

        for rule in self.stage(RuleStage::Modifier) {
            if rule.matches(&query_lower) {
                rule.effect.apply(&mut spec);
                fired.push(rule.id.clone());
            }
        }

        let topic = self
            .stage(RuleStage::Topic)
            .find(|rule| rule.matches(&query_lower));

        let used_raw_query = match topic {
            Some(rule) => {
                rule.effect.apply(&mut spec);
                fired.push(rule.id.clone());
                false
            }
            None => {
                spec.text_term = query.to_string();
                true
            }
        };

        debug!(query, ?fired, used_raw_query, "translated intent query");

        IntentMatch {
            spec,
            fired,
            used_raw_query,
        }
    }

    fn stage(&self, stage: RuleStage) -> impl Iterator<Item = &IntentRule> {
        self.rules.iter().filter(move |rule| rule.stage == stage)
    }
}

impl Default for IntentTranslator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(query: &str) -> FilterSpec {
        IntentTranslator::new().translate(query)
    }

    #[test]
    fn test_student_without_literal_no_ssn() {
        // "dont have a ssn" does not contain the literal "no ssn"
        let spec = translate("I am a student and I dont have a ssn");

        assert_eq!(spec.text_term, "Student");
        assert_eq!(spec.category, CategoryFilter::All);
        assert!(!spec.zero_fee_only);
    }

    #[test]
    fn test_student_with_no_ssn_compounds() {
        let spec = translate("student with no ssn");

        assert_eq!(spec.text_term, "Student");
        assert!(spec.zero_fee_only);
    }

    #[test]
    fn test_travel_points() {
        let spec = translate("best travel points card");

        assert_eq!(spec.category, CategoryFilter::Named("Travel".to_string()));
        assert!(!spec.zero_fee_only);
        assert_eq!(spec.text_term, "");
    }

    #[test]
    fn test_no_keywords_uses_raw_query() {
        let spec = translate("chase sapphire");

        assert_eq!(spec.text_term, "chase sapphire");
        assert_eq!(spec.category, CategoryFilter::All);
        assert!(!spec.zero_fee_only);
    }

    #[test]
    fn test_raw_query_is_not_lowercased_or_trimmed() {
        let spec = translate("  Chase Sapphire ");
        assert_eq!(spec.text_term, "  Chase Sapphire ");
    }

    #[test]
    fn test_travel_beats_student() {
        let spec = translate("Student who loves TRAVEL");

        assert_eq!(spec.category, CategoryFilter::Named("Travel".to_string()));
        assert_eq!(spec.text_term, "");
    }

    #[test]
    fn test_fee_keywords_combine_with_raw_query() {
        let spec = translate("Budget card from Chase");

        assert!(spec.zero_fee_only);
        assert_eq!(spec.text_term, "Budget card from Chase");

        let spec = translate("travel with no fee");
        assert!(spec.zero_fee_only);
        assert_eq!(spec.category, CategoryFilter::Named("Travel".to_string()));
    }

    #[test]
    fn test_empty_query() {
        let spec = translate("");
        assert_eq!(spec, FilterSpec::default());
    }

    #[test]
    fn test_explain_reports_fired_rules() {
        let translator = IntentTranslator::new();

        let result = translator.explain("no fee student card");
        assert_eq!(result.fired, vec!["zero-fee", "student"]);
        assert!(!result.used_raw_query);

        let result = translator.explain("chase");
        assert!(result.fired.is_empty());
        assert!(result.used_raw_query);
    }

    #[test]
    fn test_rules_from_json() {
        let json = r#"[
            {"id": "cash", "keywords": ["cash"], "stage": "topic",
             "effect": {"kind": "category", "value": "Cashback"}},
            {"id": "free", "keywords": ["free"], "stage": "modifier",
             "effect": {"kind": "zero_fee_only"}}
        ]"#;
        let rules: Vec<IntentRule> = serde_json::from_str(json).unwrap();
        let translator = IntentTranslator::from_rules(rules);

        assert_eq!(translator.rule_count(), 2);

        let spec = translator.translate("free CASH back");
        assert!(spec.zero_fee_only);
        assert_eq!(spec.category, CategoryFilter::Named("Cashback".to_string()));
        assert_eq!(spec.text_term, "");
    }

    #[test]
    fn test_priority_orders_topic_rules() {
        let translator = IntentTranslator::from_rules(vec![
            IntentRule::new(
                "low",
                &["card"],
                RuleStage::Topic,
                IntentEffect::TextTerm("Low".to_string()),
            )
            .with_priority(1),
            IntentRule::new(
                "high",
                &["card"],
                RuleStage::Topic,
                IntentEffect::TextTerm("High".to_string()),
            )
            .with_priority(5),
        ]);

        assert_eq!(translator.translate("any card").text_term, "High");
    }

    const TRAVEL_ONLY_RULES: &str = r#"[
        {"id": "miles", "keywords": ["miles"], "stage": "topic",
         "effect": {"kind": "category", "value": "Travel"}, "priority": 5}
    ]"#;

    #[test]
    fn test_rules_file_replaces_builtin_table() {
        let path = std::env::temp_dir().join(format!("omnicard-rules-{}.json", std::process::id()));
        fs::write(&path, TRAVEL_ONLY_RULES).unwrap();

        let translator = IntentTranslator::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(translator.rule_count(), 1);
        assert_eq!(translator.rules()[0].id, "miles");

        // No modifier rule in the file, so "budget" no longer sets the fee flag
        let result = translator.explain("student on a budget");
        assert!(!result.spec.zero_fee_only);
        assert!(result.used_raw_query);
        assert_eq!(result.spec.text_term, "student on a budget");

        let spec = translator.translate("airline miles");
        assert_eq!(spec.category, CategoryFilter::Named("Travel".to_string()));
    }

    #[test]
    fn test_malformed_rules_file() {
        let path = std::env::temp_dir().join(format!("omnicard-bad-rules-{}.json", std::process::id()));
        fs::write(&path, r#"[{"id": "x", "stage": "sideways"}]"#).unwrap();

        let err = IntentTranslator::from_file(&path).unwrap_err();
        fs::remove_file(&path).unwrap();

        assert!(err.to_string().contains("Failed to parse intent rules JSON"));
    }

    #[test]
    fn test_missing_rules_file() {
        assert!(IntentTranslator::from_file("/nonexistent/rules.json").is_err());
    }
}
