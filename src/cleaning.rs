// 🧹 Catalog Cleaning - raw CFPB export (CSV or .xlsx) → cleaned catalog CSV
//
// The raw export starts with a block of intro rows before the real header.
// Output keeps the display columns and adds derived flags plus a reward category.

use crate::catalog::CatalogError;
use calamine::{Data, Reader, Xlsx};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::iter;
use std::path::Path;
use tracing::{debug, info, warn};

/// Intro rows preceding the header in the CFPB credit card dataset
pub const CFPB_HEADER_ROW: usize = 9;

/// Columns copied through from the raw export
pub const BASE_COLUMNS: [&str; 5] = [
    "Institution Name",
    "Product Name",
    "State",
    "Annual Fee",
    "Rewards",
];

const APPLY_LINK_COLUMN: &str = "Apply_Link";

/// Reward category from the rewards text. "Cashback" wins over "Travel";
/// matching is case-sensitive.
pub fn derive_reward_type(rewards: Option<&str>) -> &'static str {
    match rewards {
        Some(text) if text.contains("Cashback") => "Cashback",
        Some(text) if text.contains("Travel") => "Travel",
        _ => "General",
    }
}

/// True when any cell of the row contains `needle` (case-insensitive)
pub fn row_mentions(cells: &[&str], needle: &str) -> bool {
    let needle = needle.to_lowercase();
    cells.iter().any(|cell| cell.to_lowercase().contains(&needle))
}

fn flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

// ============================================================================
// CLEAN REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub rows_written: usize,
    pub blank_rows_skipped: usize,
    pub student_cards: usize,
    pub itin_cards: usize,
    pub by_reward_type: BTreeMap<String, usize>,
}

// ============================================================================
// RAW FORMATS
// ============================================================================

/// Container of the raw export, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFormat {
    Csv,
    Xlsx,
}

impl RawFormat {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("xlsx") | Some("xlsm") => RawFormat::Xlsx,
            _ => RawFormat::Csv,
        }
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// CLEANING
// ============================================================================

/// Clean a raw CSV export. `header_row` is the number of rows before the header.
pub fn clean_catalog<R: Read, W: Write>(
    raw: R,
    out: W,
    header_row: usize,
) -> Result<CleanReport, CatalogError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw);

    let rows = rdr.records().enumerate().map(|(index, result)| {
        result
            .map(|record| record.iter().map(str::to_string).collect::<Vec<_>>())
            .map_err(|source| CatalogError::Csv {
                row: index + 1,
                source,
            })
    });

    clean_rows(rows, out, header_row)
}

/// Clean the first worksheet of a raw `.xlsx` export.
/// `header_row` counts sheet rows, including empty ones above the data.
pub fn clean_workbook<RS: Read + Seek, W: Write>(
    raw: RS,
    out: W,
    header_row: usize,
) -> Result<CleanReport, CatalogError> {
    let mut workbook: Xlsx<RS> = Xlsx::new(raw)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(CatalogError::EmptyWorkbook)??;

    // The used range starts at the first non-empty row
    let leading = range.start().map_or(0, |(row, _)| row as usize);
    debug!(leading, rows = range.height(), "read first worksheet");

    let rows = iter::repeat_with(Vec::new)
        .take(leading)
        .chain(range.rows().map(|cells| cells.iter().map(cell_text).collect::<Vec<_>>()))
        .map(Ok);

    clean_rows(rows, out, header_row)
}

/// Shared pipeline: skip the intro block, locate columns, write cleaned rows
fn clean_rows<I, W>(rows: I, out: W, header_row: usize) -> Result<CleanReport, CatalogError>
where
    I: Iterator<Item = Result<Vec<String>, CatalogError>>,
    W: Write,
{
    let mut rows = rows.enumerate();

    // Skip the intro block
    for _ in 0..header_row {
        if rows.next().is_none() {
            return Err(CatalogError::MissingHeader(header_row));
        }
    }

    let header = match rows.next() {
        Some((_, result)) => result?,
        None => return Err(CatalogError::MissingHeader(header_row)),
    };

    let mut base_indexes = Vec::with_capacity(BASE_COLUMNS.len());
    for column in BASE_COLUMNS {
        let index = header
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| CatalogError::MissingColumn(column.to_string()))?;
        base_indexes.push(index);
    }
    let rewards_index = base_indexes[4];
    let apply_link_index = header.iter().position(|h| h.trim() == APPLY_LINK_COLUMN);

    let mut wtr = csv::Writer::from_writer(out);
    let mut out_header: Vec<&str> = BASE_COLUMNS.to_vec();
    out_header.extend(["is_student", "accepts_itin", "Reward_Type", APPLY_LINK_COLUMN]);
    wtr.write_record(&out_header)
        .map_err(|source| CatalogError::Csv { row: 0, source })?;

    let mut report = CleanReport::default();

    for (index, result) in rows {
        let record = result?;
        let cells: Vec<&str> = record.iter().map(String::as_str).collect();

        if cells.iter().all(|cell| cell.trim().is_empty()) {
            report.blank_rows_skipped += 1;
            continue;
        }

        let is_student = row_mentions(&cells, "student");
        let accepts_itin = row_mentions(&cells, "itin");
        let rewards = cells
            .get(rewards_index)
            .copied()
            .filter(|text| !text.is_empty());
        let reward_type = derive_reward_type(rewards);

        let mut out_row: Vec<&str> = base_indexes
            .iter()
            .map(|&i| cells.get(i).copied().unwrap_or(""))
            .collect();
        out_row.push(flag(is_student));
        out_row.push(flag(accepts_itin));
        out_row.push(reward_type);
        out_row.push(
            apply_link_index
                .and_then(|i| cells.get(i).copied())
                .unwrap_or(""),
        );

        wtr.write_record(&out_row).map_err(|source| CatalogError::Csv {
            row: index + 1,
            source,
        })?;

        report.rows_written += 1;
        report.student_cards += usize::from(is_student);
        report.itin_cards += usize::from(accepts_itin);
        *report
            .by_reward_type
            .entry(reward_type.to_string())
            .or_insert(0) += 1;
    }

    wtr.flush()?;

    if report.blank_rows_skipped > 0 {
        warn!(skipped = report.blank_rows_skipped, "skipped blank rows in raw export");
    }

    Ok(report)
}

/// File-to-file wrapper. `.xlsx` inputs go through [`clean_workbook`],
/// everything else through [`clean_catalog`].
pub fn clean_file(raw_path: &Path, out_path: &Path, header_row: usize) -> Result<CleanReport, CatalogError> {
    let raw = File::open(raw_path).map_err(|source| CatalogError::Io {
        path: raw_path.to_path_buf(),
        source,
    })?;
    let out = File::create(out_path).map_err(|source| CatalogError::Io {
        path: out_path.to_path_buf(),
        source,
    })?;

    let format = RawFormat::from_path(raw_path);
    let report = match format {
        RawFormat::Xlsx => clean_workbook(BufReader::new(raw), out, header_row)?,
        RawFormat::Csv => clean_catalog(raw, out, header_row)?,
    };
    info!(
        rows = report.rows_written,
        ?format,
        raw = %raw_path.display(),
        out = %out_path.display(),
        "cleaned card catalog"
    );
    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogStore;
    use rust_xlsxwriter::Workbook;
    use std::io::Cursor;

    const RAW: &str = "\
Consumer Financial Protection Bureau,,,,,
Credit card agreements survey,,,,,
Institution Name,Product Name,State,Annual Fee,Rewards,Notes
Chase,Sapphire Preferred,NY,$95,Earn Travel points,
Discover,it Student,,$0,Cashback on categories,
,,,,,
Self,Secured Visa,TX,,,Apply with ITIN
";

    /// Lays comma-separated lines out as worksheet rows, leaving empty cells unwritten
    fn workbook_from_lines(lines: &str, first_row: u32) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, line) in lines.lines().enumerate() {
            for (c, cell) in line.split(',').enumerate() {
                if !cell.is_empty() {
                    sheet
                        .write_string(first_row + r as u32, c as u16, cell)
                        .unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    fn clean(raw: &str, header_row: usize) -> (CleanReport, String) {
        let mut out = Vec::new();
        let report = clean_catalog(raw.as_bytes(), &mut out, header_row).unwrap();
        (report, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_derive_reward_type() {
        assert_eq!(derive_reward_type(Some("Cashback and Travel perks")), "Cashback");
        assert_eq!(derive_reward_type(Some("Travel miles")), "Travel");
        assert_eq!(derive_reward_type(Some("travel miles")), "General");
        assert_eq!(derive_reward_type(Some("Points")), "General");
        assert_eq!(derive_reward_type(None), "General");
    }

    #[test]
    fn test_row_mentions_is_case_insensitive() {
        assert!(row_mentions(&["Chase", "STUDENT card"], "student"));
        assert!(!row_mentions(&["Chase", "Sapphire"], "student"));
    }

    #[test]
    fn test_clean_catalog_output() {
        let (report, out) = clean(RAW, 2);
        let mut lines = out.lines();

        assert_eq!(
            lines.next(),
            Some("Institution Name,Product Name,State,Annual Fee,Rewards,is_student,accepts_itin,Reward_Type,Apply_Link")
        );
        assert_eq!(
            lines.next(),
            Some("Chase,Sapphire Preferred,NY,$95,Earn Travel points,False,False,Travel,")
        );

        assert_eq!(report.rows_written, 3);
        assert_eq!(report.blank_rows_skipped, 1);
        assert_eq!(report.student_cards, 1);
        assert_eq!(report.itin_cards, 1);
        assert_eq!(report.by_reward_type.get("General"), Some(&1));
    }

    #[test]
    fn test_cleaned_output_loads_into_catalog() {
        let (_, out) = clean(RAW, 2);
        let store = CatalogStore::from_reader(out.as_bytes(), "cleaned.csv").unwrap();

        assert_eq!(store.len(), 3);
        let discover = &store.records()[1];
        assert_eq!(discover.is_student, Some(true));
        assert_eq!(discover.reward_type_label(), "Cashback");

        let secured = &store.records()[2];
        assert_eq!(secured.accepts_itin, Some(true));
        assert_eq!(secured.annual_fee, None);
    }

    #[test]
    fn test_missing_column() {
        let raw = "Institution Name,Product Name\nChase,Sapphire\n";
        let mut out = Vec::new();
        let err = clean_catalog(raw.as_bytes(), &mut out, 0).unwrap_err();

        assert!(matches!(err, CatalogError::MissingColumn(ref c) if c == "State"));
    }

    #[test]
    fn test_header_beyond_end() {
        let mut out = Vec::new();
        let err = clean_catalog("a,b\n".as_bytes(), &mut out, CFPB_HEADER_ROW).unwrap_err();

        assert!(matches!(err, CatalogError::MissingHeader(9)));
    }

    #[test]
    fn test_raw_format_from_extension() {
        assert_eq!(RawFormat::from_path(Path::new("raw_data.xlsx")), RawFormat::Xlsx);
        assert_eq!(RawFormat::from_path(Path::new("RAW.XLSX")), RawFormat::Xlsx);
        assert_eq!(RawFormat::from_path(Path::new("raw.csv")), RawFormat::Csv);
        assert_eq!(RawFormat::from_path(Path::new("raw")), RawFormat::Csv);
    }

    #[test]
    fn test_workbook_matches_csv_cleaning() {
        let (csv_report, csv_out) = clean(RAW, 2);

        let mut out = Vec::new();
        let report = clean_workbook(Cursor::new(workbook_from_lines(RAW, 0)), &mut out, 2).unwrap();

        assert_eq!(report, csv_report);
        assert_eq!(String::from_utf8(out).unwrap(), csv_out);
    }

    #[test]
    fn test_workbook_header_offset_counts_empty_leading_rows() {
        let sheet = "\
Institution Name,Product Name,State,Annual Fee,Rewards
Citi,Double Cash,,$0,Cashback on everything
";
        // Nothing in rows 0..3, header on row 3
        let mut out = Vec::new();
        let report = clean_workbook(Cursor::new(workbook_from_lines(sheet, 3)), &mut out, 3).unwrap();

        assert_eq!(report.rows_written, 1);
        assert_eq!(report.by_reward_type.get("Cashback"), Some(&1));

        let mut out = Vec::new();
        let err = clean_workbook(Cursor::new(workbook_from_lines(sheet, 3)), &mut out, 0).unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn(_)));
    }

    #[test]
    fn test_workbook_rejects_non_xlsx_bytes() {
        let mut out = Vec::new();
        let err = clean_workbook(Cursor::new(RAW.as_bytes().to_vec()), &mut out, 2).unwrap_err();
        assert!(matches!(err, CatalogError::Workbook(_)));
    }

    #[test]
    fn test_clean_file_reads_xlsx_export() {
        let dir = std::env::temp_dir();
        let raw_path = dir.join(format!("omnicard-raw-{}.xlsx", std::process::id()));
        let out_path = dir.join(format!("omnicard-cleaned-{}.csv", std::process::id()));
        std::fs::write(&raw_path, workbook_from_lines(RAW, 0)).unwrap();

        let report = clean_file(&raw_path, &out_path, 2).unwrap();
        let store = CatalogStore::load_csv(&out_path).unwrap();

        std::fs::remove_file(&raw_path).unwrap();
        std::fs::remove_file(&out_path).unwrap();

        assert_eq!(report.rows_written, 3);
        assert_eq!(store.len(), 3);
        assert_eq!(store.records()[0].product(), "Sapphire Preferred");
        assert_eq!(store.records()[2].accepts_itin, Some(true));
    }
}
