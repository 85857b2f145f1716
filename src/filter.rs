// 🔎 Filter Spec - the structured query shared by intent translation and matching

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CATEGORY FILTER
// ============================================================================

/// Reward category constraint. `All` is the wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CategoryFilter {
    #[default]
    All,
    Named(String),
}

impl CategoryFilter {
    /// Label that selects every category
    pub const WILDCARD: &'static str = "All";

    /// "All" becomes the wildcard; any other label (even "") is an exact category
    pub fn from_label(label: &str) -> Self {
        if label == Self::WILDCARD {
            CategoryFilter::All
        } else {
            CategoryFilter::Named(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CategoryFilter::All => Self::WILDCARD,
            CategoryFilter::Named(name) => name,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, CategoryFilter::All)
    }
}

impl From<String> for CategoryFilter {
    fn from(label: String) -> Self {
        CategoryFilter::from_label(&label)
    }
}

impl From<&str> for CategoryFilter {
    fn from(label: &str) -> Self {
        CategoryFilter::from_label(label)
    }
}

impl From<CategoryFilter> for String {
    fn from(filter: CategoryFilter) -> Self {
        filter.label().to_string()
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// FILTER SPEC
// ============================================================================

/// Three-field value type. Equal specs select the same records from the same catalog.
///
/// The default spec is the identity filter: empty text term, every category,
/// fees not restricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Case-insensitive substring of institution or product name ("" matches all)
    pub text_term: String,

    pub category: CategoryFilter,

    /// Restrict to cards whose annual fee is "$0", "0" or empty
    pub zero_fee_only: bool,
}

impl FilterSpec {
    pub fn new(text_term: impl Into<String>, category: CategoryFilter, zero_fee_only: bool) -> Self {
        FilterSpec {
            text_term: text_term.into(),
            category,
            zero_fee_only,
        }
    }

    pub fn with_text_term(mut self, text_term: impl Into<String>) -> Self {
        self.text_term = text_term.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<CategoryFilter>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_zero_fee_only(mut self, zero_fee_only: bool) -> Self {
        self.zero_fee_only = zero_fee_only;
        self
    }

    /// True when the spec filters nothing out
    pub fn is_identity(&self) -> bool {
        self.text_term.is_empty() && self.category.is_wildcard() && !self.zero_fee_only
    }

    /// Short human-readable description of the active constraints
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.text_term.is_empty() {
            parts.push(format!("text \"{}\"", self.text_term));
        }
        if !self.category.is_wildcard() {
            parts.push(format!("category {}", self.category));
        }
        if self.zero_fee_only {
            parts.push("no annual fee".to_string());
        }

        if parts.is_empty() {
            "all cards".to_string()
        } else {
            parts.join(", ")
        }
    }
}
