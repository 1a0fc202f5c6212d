//! Question bank: the shared pool every game draws its board from
//!
//! Questions are added in bulk from import rows: a UTF-8 CSV with a header
//! line, or a JSON array of row objects, uploaded over HTTP or loaded from a
//! file at startup. Each row is validated on its own; bad rows are reported
//! and the rest are kept.

use super::AppState;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One uploaded question, as loosely typed as the source file allows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionRow {
    #[serde(default)]
    pub category: Option<String>,
    /// Number or numeric string
    #[serde(default)]
    pub difficulty: Option<serde_json::Value>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub option_a: Option<String>,
    #[serde(default)]
    pub option_b: Option<String>,
    #[serde(default)]
    pub option_c: Option<String>,
    #[serde(default)]
    pub correct_option: Option<String>,
    /// Bool, number or "true"/"yes"/"1"; missing means active
    #[serde(default)]
    pub is_active: Option<serde_json::Value>,
}

/// Columns a CSV upload must carry; `is_active` is optional
pub const REQUIRED_HEADERS: [&str; 7] = [
    "category",
    "difficulty",
    "text",
    "option_a",
    "option_b",
    "option_c",
    "correct_option",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Position in the upload: 1-based for JSON, the file line for CSV (header is line 1)
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: usize,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellCoverage {
    pub category: Category,
    pub level: u8,
    pub active: usize,
}

/// How many active questions back each board cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    pub cells: Vec<CellCoverage>,
    pub missing: Vec<Cell>,
    pub total_active: usize,
}

impl CoverageReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BankLoadError {
    #[error("failed to read questions file: {0}")]
    Io(#[from] std::io::Error),
    #[error("questions file is not a JSON array of rows: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unreadable CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing CSV headers {missing:?}, expected: {}", REQUIRED_HEADERS.join(", "))]
    MissingHeaders { missing: Vec<&'static str> },
}

/// A row tagged with its position, or the reason it could not be read at all
pub type NumberedRow = (usize, Result<QuestionRow, String>);

/// Read a CSV upload into numbered rows.
/// Fails as a whole only when required headers are absent; rows count from 2.
pub fn parse_csv(input: &[u8]) -> Result<Vec<NumberedRow>, BankLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let missing: Vec<&'static str> = REQUIRED_HEADERS
        .iter()
        .copied()
        .filter(|h| !headers.iter().any(|found| found == *h))
        .collect();
    if !missing.is_empty() {
        return Err(BankLoadError::MissingHeaders { missing });
    }

    Ok(reader
        .deserialize::<QuestionRow>()
        .enumerate()
        .map(|(idx, record)| (idx + 2, record.map_err(|e| format!("unreadable row: {}", e))))
        .collect())
}

#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Add already-built questions as they are
    pub fn extend(&mut self, questions: impl IntoIterator<Item = Question>) {
        self.questions.extend(questions);
    }

    /// Validate and store rows; one bad row never blocks the others
    pub fn import(&mut self, rows: Vec<QuestionRow>) -> ImportReport {
        self.import_numbered(
            rows.into_iter()
                .enumerate()
                .map(|(idx, row)| (idx + 1, Ok(row))),
        )
    }

    pub fn import_numbered(&mut self, rows: impl IntoIterator<Item = NumberedRow>) -> ImportReport {
        let mut report = ImportReport::default();

        for (row, parsed) in rows {
            match parsed.and_then(validate_row) {
                Ok(question) => {
                    self.questions.push(question);
                    report.created += 1;
                }
                Err(reason) => report.errors.push(RowError { row, reason }),
            }
        }
        report
    }

    pub fn coverage(&self) -> CoverageReport {
        let mut cells = Vec::new();
        let mut missing = Vec::new();

        for cell in Cell::all() {
            let active = self
                .questions
                .iter()
                .filter(|q| q.is_active && q.cell() == cell)
                .count();
            if active == 0 {
                missing.push(cell);
            }
            cells.push(CellCoverage {
                category: cell.category,
                level: cell.level,
                active,
            });
        }

        CoverageReport {
            total_active: self.questions.iter().filter(|q| q.is_active).count(),
            cells,
            missing,
        }
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn parse_difficulty(value: Option<&serde_json::Value>) -> Option<i64> {
    match value? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_active(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_i64() == Some(1),
        Some(serde_json::Value::String(s)) => {
            matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y")
        }
        Some(_) => false,
    }
}

fn validate_row(row: QuestionRow) -> Result<Question, String> {
    let difficulty =
        parse_difficulty(row.difficulty.as_ref()).ok_or_else(|| "invalid difficulty".to_string())?;

    let raw_category = trimmed(row.category);
    let category = Category::parse(&raw_category)
        .ok_or_else(|| format!("invalid category '{}'", raw_category))?;

    let difficulty = u8::try_from(difficulty)
        .ok()
        .filter(|d| LEVELS.contains(d))
        .ok_or_else(|| format!("difficulty out of range {}-{}", MIN_LEVEL, MAX_LEVEL))?;

    let correct_option = AnswerOption::parse(&trimmed(row.correct_option))
        .ok_or_else(|| "correct option must be A, B or C".to_string())?;

    let text = trimmed(row.text);
    let option_a = trimmed(row.option_a);
    let option_b = trimmed(row.option_b);
    let option_c = trimmed(row.option_c);
    if text.is_empty() || option_a.is_empty() || option_b.is_empty() || option_c.is_empty() {
        return Err("missing text or options".to_string());
    }

    Ok(Question {
        id: ulid::Ulid::new().to_string(),
        category,
        difficulty,
        text,
        option_a,
        option_b,
        option_c,
        correct_option,
        is_active: parse_active(row.is_active.as_ref()),
    })
}

impl AppState {
    pub async fn import_questions(&self, rows: Vec<QuestionRow>) -> ImportReport {
        let report = self.bank.write().await.import(rows);
        log_import(&report);
        report
    }

    /// Import a CSV upload; nothing is stored when its headers are incomplete
    pub async fn import_questions_csv(&self, input: &[u8]) -> Result<ImportReport, BankLoadError> {
        let rows = parse_csv(input)?;
        let report = self.bank.write().await.import_numbered(rows);
        log_import(&report);
        Ok(report)
    }

    pub async fn question_coverage(&self) -> CoverageReport {
        self.bank.read().await.coverage()
    }

    /// Import rows from disk: CSV when the extension says so, a JSON array otherwise
    pub async fn load_questions_file(&self, path: &Path) -> Result<ImportReport, BankLoadError> {
        let raw = tokio::fs::read(path).await?;
        tracing::info!("Loading question rows from {}", path.display());
        if is_csv_path(path) {
            return self.import_questions_csv(&raw).await;
        }
        let rows: Vec<QuestionRow> = serde_json::from_slice(&raw)?;
        Ok(self.import_questions(rows).await)
    }
}

fn is_csv_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn log_import(report: &ImportReport) {
    tracing::info!(
        "Imported {} questions ({} rows rejected)",
        report.created,
        report.errors.len()
    );
    for error in &report.errors {
        tracing::debug!("Row {} rejected: {}", error.row, error.reason);
    }
}
