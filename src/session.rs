// 🗂️ Query Session - current view mode and filter, driven by explicit commands
//
// Each command runs to completion before the next one is accepted. The engines
// stay pure; the session only decides which spec is current.

use crate::catalog::{CardRecord, CatalogStore};
use crate::filter::FilterSpec;
use crate::intent::IntentTranslator;
use crate::matcher;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Free-text intent prompt is shown
    IntentEntry,
    /// Matching cards are shown
    Results,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::IntentEntry => ViewMode::Results,
            ViewMode::Results => ViewMode::IntentEntry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Translate the query into a new spec and show results
    SubmitIntentQuery(String),
    ToggleMode,
    /// Replace the current spec wholesale; the view mode is unchanged
    EditStructuredFilter(FilterSpec),
}

#[derive(Debug, Clone)]
pub struct QuerySession {
    mode: ViewMode,
    spec: FilterSpec,
    last_query: Option<String>,
    fired_rules: Vec<String>,
    translator: IntentTranslator,
}

impl QuerySession {
    /// Sessions open on the intent prompt with the identity spec
    pub fn new(translator: IntentTranslator) -> Self {
        QuerySession {
            mode: ViewMode::IntentEntry,
            spec: FilterSpec::default(),
            last_query: None,
            fired_rules: Vec::new(),
            translator,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    /// Last submitted intent query, if any
    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    /// Rules fired by the last intent submission
    pub fn fired_rules(&self) -> &[String] {
        &self.fired_rules
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::SubmitIntentQuery(query) => {
                let result = self.translator.explain(&query);
                info!(query = %query, spec = %result.spec.summary(), "intent query submitted");

                self.spec = result.spec;
                self.fired_rules = result.fired;
                self.last_query = Some(query);
                self.mode = ViewMode::Results;
            }
            Command::ToggleMode => {
                self.mode = self.mode.toggled();
                debug!(mode = ?self.mode, "view mode toggled");
            }
            Command::EditStructuredFilter(spec) => {
                debug!(spec = %spec.summary(), "structured filter edited");
                self.spec = spec;
                self.fired_rules.clear();
            }
        }
    }

    /// Cards matching the current spec, in catalog order
    pub fn results<'a>(&self, catalog: &'a CatalogStore) -> Vec<&'a CardRecord> {
        matcher::filter_records(&self.spec, catalog.records())
    }
}

impl Default for QuerySession {
    fn default() -> Self {
        Self::new(IntentTranslator::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CategoryFilter;

    fn catalog() -> CatalogStore {
        let card = |institution: &str, product: &str, reward: &str, fee: &str| CardRecord {
            institution_name: Some(institution.to_string()),
            product_name: Some(product.to_string()),
            reward_type: Some(reward.to_string()),
            annual_fee: Some(fee.to_string()),
            ..Default::default()
        };

        CatalogStore::from_records(vec![
            card("Chase", "Sapphire Preferred", "Travel", "$95"),
            card("Discover", "it Student Cash Back", "Cashback", "$0"),
            card("Capital One", "VentureOne", "Travel", "$0"),
            card("Bank of America", "Student Travel Rewards", "Travel", ""),
        ])
    }

    #[test]
    fn test_new_session_starts_on_prompt() {
        let session = QuerySession::default();

        assert_eq!(session.mode(), ViewMode::IntentEntry);
        assert!(session.spec().is_identity());
        assert_eq!(session.last_query(), None);
    }

    #[test]
    fn test_submit_switches_to_results() {
        let catalog = catalog();
        let mut session = QuerySession::default();

        session.apply(Command::SubmitIntentQuery("travel on a budget".to_string()));

        assert_eq!(session.mode(), ViewMode::Results);
        assert_eq!(session.last_query(), Some("travel on a budget"));
        assert_eq!(session.fired_rules(), ["zero-fee", "travel"]);

        let products: Vec<&str> = session.results(&catalog).into_iter().map(|c| c.product()).collect();
        assert_eq!(products, vec!["VentureOne", "Student Travel Rewards"]);
    }

    #[test]
    fn test_submit_replaces_previous_spec() {
        let mut session = QuerySession::default();

        session.apply(Command::SubmitIntentQuery("no fee travel".to_string()));
        session.apply(Command::ToggleMode);
        session.apply(Command::SubmitIntentQuery("student".to_string()));

        let spec = session.spec();
        assert_eq!(spec.text_term, "Student");
        assert_eq!(spec.category, CategoryFilter::All);
        assert!(!spec.zero_fee_only);
    }

    #[test]
    fn test_toggle_mode_round_trip() {
        let mut session = QuerySession::default();

        session.apply(Command::ToggleMode);
        assert_eq!(session.mode(), ViewMode::Results);
        session.apply(Command::ToggleMode);
        assert_eq!(session.mode(), ViewMode::IntentEntry);
    }

    #[test]
    fn test_structured_edit_keeps_mode() {
        let catalog = catalog();
        let mut session = QuerySession::default();
        session.apply(Command::SubmitIntentQuery("chase".to_string()));

        let edited = session.spec().clone().with_text_term("").with_zero_fee_only(true);
        session.apply(Command::EditStructuredFilter(edited.clone()));

        assert_eq!(session.mode(), ViewMode::Results);
        assert_eq!(session.spec(), &edited);
        assert!(session.fired_rules().is_empty());
        assert_eq!(session.results(&catalog).len(), 3);
    }
}
