use crate::model::ReportKind;
use crate::routing::{TabRoute, default_tab_table};
use crate::template::tokens::{Token, TokenVocabulary};
use crate::template::{ColumnSpan, RowRange};
use crate::utils::{cell_address, column_name_to_number, column_number_to_name, parse_cell_address};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_TOTALS_MARKER: &str = "DISPATCH_TOTALS";

/// A worksheet column written in letters (`"C"`) in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Column(u32);

impl Column {
    pub fn new(index: u32) -> Self {
        Self(index.max(1))
    }

    pub fn letters(letters: &str) -> Self {
        Self::new(column_name_to_number(letters).unwrap_or(1))
    }

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn offset(self, by: u32) -> Self {
        Self(self.0 + by)
    }
}

impl TryFrom<String> for Column {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        column_name_to_number(&value)
            .map(Column)
            .ok_or_else(|| format!("invalid column letters: {value:?}"))
    }
}

impl From<Column> for String {
    fn from(value: Column) -> Self {
        column_number_to_name(value.0)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&column_number_to_name(self.0))
    }
}

/// A cell written in A1 notation in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellRef {
    pub col: u32,
    pub row: u32,
}

impl CellRef {
    pub fn parse(address: &str) -> Option<Self> {
        parse_cell_address(address).map(|(col, row)| Self { col, row })
    }

    pub fn at(address: &str) -> Option<Self> {
        Self::parse(address)
    }
}

impl TryFrom<String> for CellRef {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid cell address: {value:?}"))
    }
}

impl From<CellRef> for String {
    fn from(value: CellRef) -> Self {
        cell_address(value.col, value.row)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&cell_address(self.col, self.row))
    }
}

/// Fixed header cells, used both to read the dispatch sheet and to write EOD headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderCells {
    pub country: Option<CellRef>,
    pub cruise_line: Option<CellRef>,
    pub ship_name: Option<CellRef>,
    pub port: Option<CellRef>,
    pub report_date: Option<CellRef>,
    pub tour_operator: Option<CellRef>,
    pub shorex_manager: Option<CellRef>,
    pub assistant_manager: Option<CellRef>,
}

impl HeaderCells {
    fn source_defaults() -> Self {
        Self {
            country: CellRef::at("B1"),
            cruise_line: CellRef::at("B2"),
            ship_name: CellRef::at("B3"),
            port: CellRef::at("B4"),
            report_date: CellRef::at("B5"),
            tour_operator: CellRef::at("E2"),
            shorex_manager: CellRef::at("E3"),
            assistant_manager: CellRef::at("E4"),
        }
    }

    fn eod_defaults() -> Self {
        Self {
            ship_name: CellRef::at("B2"),
            cruise_line: CellRef::at("B3"),
            report_date: CellRef::at("B4"),
            port: CellRef::at("B5"),
            tour_operator: CellRef::at("E2"),
            shorex_manager: CellRef::at("E3"),
            assistant_manager: CellRef::at("E4"),
            country: CellRef::at("E5"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLayout {
    /// Zero-based index of the dispatch worksheet.
    pub sheet_index: usize,
    pub first_row: u32,
    pub last_row: u32,
    pub name_column: Column,
    pub departure_offset: u32,
    pub adult_offset: u32,
    pub child_offset: u32,
    pub comp_offset: u32,
    pub notes_offset: u32,
    /// Name-cell values that mark header rows rather than tours.
    pub header_labels: Vec<String>,
    pub header: HeaderCells,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            sheet_index: 0,
            first_row: 8,
            last_row: 300,
            name_column: Column::letters("A"),
            departure_offset: 1,
            adult_offset: 2,
            child_offset: 3,
            comp_offset: 4,
            notes_offset: 5,
            header_labels: ["Tour", "Tour Name", "Excursion", "Total", "Totals"]
                .iter()
                .map(|label| label.to_string())
                .collect(),
            header: HeaderCells::source_defaults(),
        }
    }
}

/// Where the repeating section lives in a template worksheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionLayout {
    /// Worksheet name; the first worksheet when absent.
    pub sheet: Option<String>,
    pub start_row: u32,
    pub end_row: u32,
    pub first_column: Column,
    pub last_column: Column,
    /// Column that receives a thick right border on every section row.
    pub boundary_column: Option<Column>,
    /// Token positions relative to the section's top-left cell (`A1` = top-left).
    /// Used to re-tokenise an already generated section before appending.
    pub token_cells: BTreeMap<Token, CellRef>,
    /// Right-most column a stray notes cell is merged to by the fallback pass.
    pub notes_merge_to: Option<Column>,
    /// Column that receives the report date on each section's first row.
    pub date_column: Option<Column>,
}

impl SectionLayout {
    pub fn height(&self) -> u32 {
        self.end_row.saturating_sub(self.start_row) + 1
    }

    pub fn rows(&self) -> RowRange {
        RowRange::new(self.start_row, self.end_row)
    }

    pub fn columns(&self) -> ColumnSpan {
        ColumnSpan::new(self.first_column.index(), self.last_column.index())
    }

    fn eod_defaults() -> Self {
        Self {
            sheet: None,
            start_row: 8,
            end_row: 10,
            first_column: Column::letters("A"),
            last_column: Column::letters("H"),
            boundary_column: Some(Column::letters("H")),
            token_cells: token_map(&[
                (Token::TourName, "A1"),
                (Token::DepartureTime, "B2"),
                (Token::NumAdult, "C2"),
                (Token::NumChd, "D2"),
                (Token::NumComp, "E2"),
                (Token::Notes, "B3"),
            ]),
            notes_merge_to: Some(Column::letters("H")),
            date_column: None,
        }
    }

    fn pax_defaults() -> Self {
        Self {
            sheet: None,
            start_row: 4,
            end_row: 4,
            first_column: Column::letters("A"),
            last_column: Column::letters("G"),
            boundary_column: Some(Column::letters("G")),
            token_cells: token_map(&[
                (Token::TourName, "B1"),
                (Token::DepartureTime, "C1"),
                (Token::NumAdult, "D1"),
                (Token::NumChd, "E1"),
                (Token::NumComp, "F1"),
                (Token::Notes, "G1"),
            ]),
            notes_merge_to: None,
            date_column: Some(Column::letters("A")),
        }
    }
}

impl Default for SectionLayout {
    fn default() -> Self {
        Self::eod_defaults()
    }
}

fn token_map(entries: &[(Token, &str)]) -> BTreeMap<Token, CellRef> {
    entries
        .iter()
        .filter_map(|(token, address)| CellRef::at(address).map(|cell| (*token, cell)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotalsLayout {
    pub adult_column: Column,
    pub child_column: Column,
    pub comp_column: Column,
    /// Cell column whose formula sums the three count cells of the totals row.
    pub formula_column: Option<Column>,
    /// First row the structural heuristic considers.
    pub min_row: u32,
    /// Last-resort totals row when nothing else locates the block.
    pub fallback_row: u32,
    /// Empty rows that must follow a heuristic totals candidate.
    pub empty_rows_after: u32,
    /// Prefix of the defined name that marks the rendered totals row.
    pub marker_prefix: String,
}

impl TotalsLayout {
    fn eod_defaults() -> Self {
        Self {
            adult_column: Column::letters("C"),
            child_column: Column::letters("D"),
            comp_column: Column::letters("E"),
            formula_column: Some(Column::letters("F")),
            min_row: 11,
            fallback_row: 12,
            empty_rows_after: 2,
            marker_prefix: DEFAULT_TOTALS_MARKER.to_string(),
        }
    }

    fn pax_defaults() -> Self {
        Self {
            adult_column: Column::letters("D"),
            child_column: Column::letters("E"),
            comp_column: Column::letters("F"),
            formula_column: Some(Column::letters("H")),
            min_row: 5,
            fallback_row: 6,
            empty_rows_after: 2,
            marker_prefix: DEFAULT_TOTALS_MARKER.to_string(),
        }
    }
}

impl Default for TotalsLayout {
    fn default() -> Self {
        Self::eod_defaults()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EodLayout {
    pub section: SectionLayout,
    pub totals: TotalsLayout,
    /// Output cells that receive the dispatch header on fresh generation.
    pub header: HeaderCells,
}

impl Default for EodLayout {
    fn default() -> Self {
        Self {
            section: SectionLayout::eod_defaults(),
            totals: TotalsLayout::eod_defaults(),
            header: HeaderCells::eod_defaults(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaxLayout {
    pub section: SectionLayout,
    pub totals: TotalsLayout,
    pub tabs: Vec<TabRoute>,
    pub default_tab: String,
    /// Sum the counts of records that share a tour name.
    pub merge_duplicate_tours: bool,
}

impl Default for PaxLayout {
    fn default() -> Self {
        let tabs = default_tab_table();
        let default_tab = tabs
            .first()
            .map(|route| route.tab.clone())
            .unwrap_or_default();
        Self {
            section: SectionLayout::pax_defaults(),
            totals: TotalsLayout::pax_defaults(),
            tabs,
            default_tab,
            merge_duplicate_tours: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    pub timeout_ms: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl LockSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Immutable engine configuration, built once at startup and shared by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub source: SourceLayout,
    pub eod: EodLayout,
    pub pax: PaxLayout,
    pub locks: LockSettings,
    #[serde(skip)]
    pub vocabulary: TokenVocabulary,
}

impl EngineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => load_config_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn layout(&self, kind: ReportKind) -> (&SectionLayout, &TotalsLayout) {
        match kind {
            ReportKind::Eod => (&self.eod.section, &self.eod.totals),
            ReportKind::Pax => (&self.pax.section, &self.pax.totals),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let source = &self.source;
        anyhow::ensure!(
            source.first_row >= 1 && source.first_row <= source.last_row,
            "source rows {}..={} are not a valid window",
            source.first_row,
            source.last_row
        );

        for (label, section, totals) in [
            ("eod", &self.eod.section, &self.eod.totals),
            ("pax", &self.pax.section, &self.pax.totals),
        ] {
            anyhow::ensure!(
                section.start_row >= 1 && section.start_row <= section.end_row,
                "{label} section rows {}..={} are empty",
                section.start_row,
                section.end_row
            );
            anyhow::ensure!(
                section.first_column <= section.last_column,
                "{label} section columns {}..={} are reversed",
                section.first_column,
                section.last_column
            );
            for (token, cell) in &section.token_cells {
                anyhow::ensure!(
                    cell.row >= 1 && cell.row <= section.height(),
                    "{label} token {} sits outside the section height",
                    token.name()
                );
                let absolute_col = section.first_column.index() + cell.col - 1;
                anyhow::ensure!(
                    absolute_col <= section.last_column.index(),
                    "{label} token {} sits outside the section columns",
                    token.name()
                );
            }
            anyhow::ensure!(
                totals.min_row > section.end_row,
                "{label} totals min_row {} must lie below the section (ends at {})",
                totals.min_row,
                section.end_row
            );
            anyhow::ensure!(
                totals.fallback_row > section.end_row,
                "{label} totals fallback_row {} must lie below the section",
                totals.fallback_row
            );
            anyhow::ensure!(
                !totals.marker_prefix.trim().is_empty(),
                "{label} totals marker_prefix must not be empty"
            );
        }

        anyhow::ensure!(!self.pax.tabs.is_empty(), "pax tab table is empty");
        anyhow::ensure!(
            !self.pax.default_tab.trim().is_empty(),
            "pax default_tab must not be empty"
        );
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dispatch-reports",
    about = "Generate End-Of-Day and PAX reports from dispatch sheets",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        env = "DISPATCH_REPORTS_CONFIG",
        value_name = "FILE",
        help = "Path to a configuration file (YAML, JSON or TOML)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "DISPATCH_REPORTS_LOCK_TIMEOUT_MS",
        value_name = "MS",
        help = "How long a request waits for the per-report lock",
        global = true
    )]
    pub lock_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate or extend a report from a dispatch sheet.
    Generate(GenerateArgs),
    /// List the monthly tabs a PAX template is missing.
    CheckPaxTemplate {
        #[arg(long, value_name = "FILE")]
        template: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(long, value_enum)]
    pub kind: ReportKind,
    #[arg(long, value_name = "ID", help = "Ship identifier used as the lock key")]
    pub ship: String,
    #[arg(long, value_name = "FILE", help = "Uploaded dispatch workbook")]
    pub source: PathBuf,
    #[arg(long, value_name = "FILE", help = "Where the report is written")]
    pub output: PathBuf,
    #[arg(long, value_name = "FILE", help = "Blank report template")]
    pub template: Option<PathBuf>,
    #[arg(
        long,
        value_name = "FILE",
        help = "Previously generated report to append to (used when it exists)"
    )]
    pub existing: Option<PathBuf>,
    #[arg(long, value_name = "DATE", help = "Override the report date used for PAX routing")]
    pub date: Option<String>,
}

fn load_config_file(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        "toml" => toml::from_str(&contents)
            .with_context(|| format!("failed to parse TOML config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
