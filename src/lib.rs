// OmniCard View - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod catalog;
pub mod cleaning;
pub mod config;
pub mod filter;
pub mod intent;
pub mod matcher;
pub mod session;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use catalog::{CardRecord, CatalogError, CatalogStore};
pub use cleaning::{
    clean_catalog, clean_file, clean_workbook, derive_reward_type, CleanReport, RawFormat,
    CFPB_HEADER_ROW,
};
pub use config::{AppConfig, DEFAULT_CONFIG_PATH};
pub use filter::{CategoryFilter, FilterSpec};
pub use intent::{default_rules, IntentEffect, IntentMatch, IntentRule, IntentTranslator, RuleStage};
pub use matcher::{count_matches, filter_records, matches, ZERO_FEE_VALUES};
pub use session::{Command, QuerySession, ViewMode};

use anyhow::Context;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global fmt subscriber. `RUST_LOG` overrides `default_level`.
/// Logs go to stderr so stdout stays clean for command output.
pub fn init_logging(default_level: &str) {
    install_subscriber(default_level, std::io::stderr, true);
}

/// Install the global subscriber appending to `path`. The terminal UI uses this:
/// anything written to stderr would land inside the alternate screen.
pub fn init_file_logging(default_level: &str, path: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {:?}", path))?;

    install_subscriber(default_level, Mutex::new(file), false);
    Ok(())
}

fn install_subscriber<W>(default_level: &str, writer: W, ansi: bool)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .try_init();
}

/// Intent rules from the configured file, or the built-in table
pub fn load_translator(config: &AppConfig) -> anyhow::Result<IntentTranslator> {
    match &config.intent_rules_path {
        Some(path) => {
            let translator = IntentTranslator::from_file(path)?;
            tracing::info!(rules = translator.rule_count(), path = %path.display(), "loaded intent rules");
            Ok(translator)
        }
        None => Ok(IntentTranslator::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("omnicard-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_load_translator_defaults_to_builtin_rules() {
        let translator = load_translator(&AppConfig::default()).unwrap();
        assert!(translator.translate("student on a budget").zero_fee_only);
    }

    #[test]
    fn test_load_translator_uses_configured_rules_file() {
        let path = temp_path("rules.json");
        std::fs::write(
            &path,
            r#"[{"id": "student", "keywords": ["student"], "stage": "topic",
                "effect": {"kind": "text_term", "value": "Student"}}]"#,
        )
        .unwrap();

        let config = AppConfig {
            intent_rules_path: Some(path.clone()),
            ..AppConfig::default()
        };
        let translator = load_translator(&config).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(translator.rule_count(), 1);
        let spec = translator.translate("student on a budget");
        assert_eq!(spec.text_term, "Student");
        assert!(!spec.zero_fee_only);
    }

    #[test]
    fn test_load_translator_missing_rules_file_is_error() {
        let config = AppConfig {
            intent_rules_path: Some(PathBuf::from("/nonexistent/rules.json")),
            ..AppConfig::default()
        };
        assert!(load_translator(&config).is_err());
    }

    #[test]
    fn test_file_logging_creates_log_file() {
        let path = temp_path("ui.log");
        init_file_logging("warn", &path).unwrap();

        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_logging_unwritable_path_is_error() {
        assert!(init_file_logging("warn", Path::new("/nonexistent/dir/omnicard.log")).is_err());
    }
}
