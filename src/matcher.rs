// 🎯 Record Matcher - binary AND filter over the card catalog
//
// A record is kept iff it passes the text, category and fee predicates.
// Output order is the catalog order; nothing is scored or re-sorted.

use crate::catalog::CardRecord;
use crate::filter::{CategoryFilter, FilterSpec};

/// Annual fee spellings that count as "no fee". Compared verbatim.
pub const ZERO_FEE_VALUES: [&str; 3] = ["$0", "0", ""];

// ============================================================================
// PREDICATES
// ============================================================================

/// Term is empty, or a case-insensitive substring of institution or product name
pub fn matches_text(term: &str, record: &CardRecord) -> bool {
    if term.is_empty() {
        return true;
    }

    let term = term.to_lowercase();
    record.institution().to_lowercase().contains(&term)
        || record.product().to_lowercase().contains(&term)
}

/// Wildcard, or exact case-sensitive equality with the record's reward type
pub fn matches_category(category: &CategoryFilter, record: &CardRecord) -> bool {
    match category {
        CategoryFilter::All => true,
        CategoryFilter::Named(name) => name == record.reward_type_label(),
    }
}

pub fn is_zero_fee(annual_fee: &str) -> bool {
    ZERO_FEE_VALUES.contains(&annual_fee)
}

pub fn matches_fee(zero_fee_only: bool, record: &CardRecord) -> bool {
    !zero_fee_only || is_zero_fee(record.annual_fee_raw())
}

// ============================================================================
// MATCHING
// ============================================================================

pub fn matches(spec: &FilterSpec, record: &CardRecord) -> bool {
    matches_text(&spec.text_term, record)
        && matches_category(&spec.category, record)
        && matches_fee(spec.zero_fee_only, record)
}

/// Stable filter: the matching records in their original relative order
pub fn filter_records<'a>(spec: &FilterSpec, records: &'a [CardRecord]) -> Vec<&'a CardRecord> {
    records.iter().filter(|record| matches(spec, record)).collect()
}

pub fn count_matches(spec: &FilterSpec, records: &[CardRecord]) -> usize {
    records.iter().filter(|record| matches(spec, record)).count()
}

// ============================================================================
// TESTS
// ============================================================================
