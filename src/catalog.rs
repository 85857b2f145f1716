// 💳 Card Catalog - immutable card records loaded once from the cleaned CSV
//
// Every field is optional in the source data. Absence is resolved here, at the
// ingestion boundary, so the matcher only ever sees plain strings.

use chrono::{DateTime, Utc};
use csv::{ByteRecord, StringRecord};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fallback search used when a card has no direct application link
const SEARCH_FALLBACK_URL: &str = "https://www.google.com/search?q=";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog row {row}: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("raw export has no header row after skipping {0} rows")]
    MissingHeader(usize),

    #[error("raw export is missing required column '{0}'")]
    MissingColumn(String),

    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),

    #[error("workbook has no worksheets")]
    EmptyWorkbook,

    #[error("failed to write cleaned catalog: {0}")]
    Output(#[from] std::io::Error),
}

// ============================================================================
// CARD RECORD
// ============================================================================

/// One catalog entry. Never mutated after ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    #[serde(rename = "Institution Name", default)]
    pub institution_name: Option<String>,

    #[serde(rename = "Product Name", default)]
    pub product_name: Option<String>,

    /// Categorical label ("Travel", "Cashback", "General", ...)
    #[serde(rename = "Reward_Type", default)]
    pub reward_type: Option<String>,

    /// Free-text rewards description, may be long
    #[serde(rename = "Rewards", default)]
    pub rewards: Option<String>,

    /// Currency amount as written in the source ("$0", "$95", ...)
    #[serde(rename = "Annual Fee", default)]
    pub annual_fee: Option<String>,

    /// Direct application URL, if known
    #[serde(rename = "Apply_Link", default)]
    pub apply_link: Option<String>,

    #[serde(rename = "State", default)]
    pub state: Option<String>,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_student: Option<bool>,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub accepts_itin: Option<bool>,
}

/// Accepts the flag spellings produced by the cleaning step and by hand edits.
/// Anything unrecognised is treated as unknown rather than rejected.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_flag))
}

pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "True" | "true" | "TRUE" | "1" => Some(true),
        "False" | "false" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

impl CardRecord {
    /// Build a record from a header-keyed row, as handed over by an external parser
    pub fn from_mapping(row: &HashMap<String, String>) -> Self {
        CardRecord {
            institution_name: non_empty(row.get("Institution Name")),
            product_name: non_empty(row.get("Product Name")),
            reward_type: non_empty(row.get("Reward_Type")),
            rewards: non_empty(row.get("Rewards")),
            annual_fee: non_empty(row.get("Annual Fee")),
            apply_link: non_empty(row.get("Apply_Link")),
            state: non_empty(row.get("State")),
            is_student: row.get("is_student").and_then(|v| parse_flag(v)),
            accepts_itin: row.get("accepts_itin").and_then(|v| parse_flag(v)),
        }
    }

    pub fn institution(&self) -> &str {
        self.institution_name.as_deref().unwrap_or("")
    }

    pub fn product(&self) -> &str {
        self.product_name.as_deref().unwrap_or("")
    }

    pub fn reward_type_label(&self) -> &str {
        self.reward_type.as_deref().unwrap_or("")
    }

    /// Annual fee exactly as ingested; a missing fee reads as ""
    pub fn annual_fee_raw(&self) -> &str {
        self.annual_fee.as_deref().unwrap_or("")
    }

    /// Fee for display: empty fees are shown as "$0"
    pub fn fee_display(&self) -> &str {
        match self.annual_fee_raw() {
            "" => "$0",
            fee => fee,
        }
    }

    /// Application link, or a web search for the product when none is known
    pub fn apply_url(&self) -> String {
        match self.apply_link.as_deref() {
            Some(link) if !link.is_empty() => link.to_string(),
            _ => format!("{}{}", SEARCH_FALLBACK_URL, urlencoding::encode(self.product())),
        }
    }

    /// First `max_chars` characters of the rewards text, always followed by "..."
    pub fn rewards_summary(&self, max_chars: usize) -> String {
        let rewards = self.rewards.as_deref().unwrap_or("");
        let head: String = rewards.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

// ============================================================================
// CATALOG STORE
// ============================================================================

/// In-memory card catalog. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    records: Vec<CardRecord>,
    source: Option<String>,
    loaded_at: DateTime<Utc>,
}

impl CatalogStore {
    /// Empty catalog, before any data has arrived
    pub fn new() -> Self {
        Self::from_records(Vec::new())
    }

    pub fn from_records(records: Vec<CardRecord>) -> Self {
        CatalogStore {
            records,
            source: None,
            loaded_at: Utc::now(),
        }
    }

    /// Load the cleaned catalog CSV from disk
    pub fn load_csv(path: &Path) -> Result<Self, CatalogError> {
        let file = File::open(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let store = Self::from_reader(file, &path.display().to_string())?;
        info!(
            cards = store.len(),
            path = %path.display(),
            "loaded card catalog"
        );
        Ok(store)
    }

    /// Load from any CSV source with a header row.
    /// Fields that are not valid UTF-8 are decoded lossily instead of failing the load.
    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self, CatalogError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = rdr
            .byte_headers()
            .map(|raw| decode_lossy(raw, 0))
            .map_err(|source| CatalogError::Csv { row: 0, source })?;

        let mut records = Vec::new();
        for (index, result) in rdr.byte_records().enumerate() {
            let row = index + 1;
            let record = result
                .and_then(|raw| decode_lossy(&raw, row).deserialize::<CardRecord>(Some(&headers)))
                .map_err(|source| CatalogError::Csv { row, source })?;
            records.push(record);
        }

        debug!(source, rows = records.len(), "parsed catalog rows");

        Ok(CatalogStore {
            records,
            source: Some(source.to_string()),
            loaded_at: Utc::now(),
        })
    }

    pub fn records(&self) -> &[CardRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Distinct non-empty reward types, sorted
    pub fn reward_types(&self) -> Vec<String> {
        self.records
            .iter()
            .map(CardRecord::reward_type_label)
            .filter(|label| !label.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

fn decode_lossy(raw: &ByteRecord, row: usize) -> StringRecord {
    if std::str::from_utf8(raw.as_slice()).is_err() {
        warn!(row, "catalog row is not valid UTF-8, replacing bad bytes");
    }
    raw.iter().map(String::from_utf8_lossy).collect()
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
