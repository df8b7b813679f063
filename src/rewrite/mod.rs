// src/rewrite/mod.rs
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

use crate::{error::TableError, upgrade::UpgradeRequest};

pub mod backup;
pub mod columns;
pub mod window;

pub use columns::SpecColumns;
pub use window::Lookahead;

/// Location of the preset mode spec inside a repository checkout.
pub const PRESET_MODE_SPEC_FILE: &str = "vgrXdcrData/sh/PresetModeSpec.csv";
pub const V1_CAPABILITY: &str = "TspV1";
pub const V2_CAPABILITY: &str = "TspV2";
pub const V2_PRESET_SUFFIX: &str = " 2";
pub const BACKUP_SUFFIX: &str = ".bak";

/// Everything about the rewrite that is not read from the input files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteConfig {
    /// Preset mode spec path, relative to the repository root.
    pub spec_file: PathBuf,
    pub backup_suffix: String,
    /// Capability Id written on the original row.
    pub v1_tag: String,
    /// Capability Id written on the inserted row.
    pub v2_tag: String,
    /// Appended to the preset name of the inserted row.
    pub v2_suffix: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            spec_file: PathBuf::from(PRESET_MODE_SPEC_FILE),
            backup_suffix: BACKUP_SUFFIX.to_string(),
            v1_tag: V1_CAPABILITY.to_string(),
            v2_tag: V2_CAPABILITY.to_string(),
            v2_suffix: V2_PRESET_SUFFIX.to_string(),
        }
    }
}

impl RewriteConfig {
    pub fn spec_path(&self, repo: &Path) -> PathBuf {
        repo.join(&self.spec_file)
    }
}

/// Counts from one rewrite. `rows_written == rows_read + inserted`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Data rows read, header excluded.
    pub rows_read: u64,
    /// Data rows written, header excluded.
    pub rows_written: u64,
    /// V2 rows added.
    pub inserted: u64,
    /// Rows that matched a request but are followed by, or named like, a V2 row.
    pub already_upgraded: u64,
    pub backup_path: PathBuf,
}

type Row = Vec<String>;

/// What to do with one data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowAction {
    Keep,
    /// Matched, but the next row's preset or the row's own preset already
    /// carries the V2 suffix.
    AlreadyUpgraded,
    Upgrade,
}

fn plan_row(
    row: &Row,
    next: Option<&Row>,
    requests: &[UpgradeRequest],
    cols: &SpecColumns,
    config: &RewriteConfig,
) -> RowAction {
    let product = &row[cols.product];
    let transducer = &row[cols.transducer];
    let preset = &row[cols.preset];

    let Some(request) = requests
        .iter()
        .find(|r| r.matches(product, transducer, preset))
    else {
        return RowAction::Keep;
    };

    let followed_by_v2 = next.is_some_and(|n| n[cols.preset].ends_with(&config.v2_suffix));
    let named_v2 = preset.ends_with(&config.v2_suffix);
    if followed_by_v2 || named_v2 {
        debug!(%request, %product, %transducer, %preset, "already upgraded");
        RowAction::AlreadyUpgraded
    } else {
        debug!(%request, %product, %transducer, %preset, "matched");
        RowAction::Upgrade
    }
}

/// Split a matching row into its V1 and V2 rows.
fn upgrade_row(mut row: Row, cols: &SpecColumns, config: &RewriteConfig) -> (Row, Row) {
    row[cols.capability_id] = config.v1_tag.clone();
    let mut v2 = row.clone();
    v2[cols.preset].push_str(&config.v2_suffix);
    v2[cols.capability_id] = config.v2_tag.clone();
    (row, v2)
}

/// Console line announcing an inserted V2 row.
fn upgrade_notice(v2: &Row, cols: &SpecColumns) -> String {
    format!(
        "Adding V2 TSP for: {}, {}, {}",
        v2[cols.product], v2[cols.transducer], v2[cols.preset]
    )
}

fn checked_row(
    result: csv::Result<StringRecord>,
    width: usize,
    path: &Path,
) -> Result<Row> {
    let record = result.with_context(|| format!("CSV parse error in {}", path.display()))?;
    if record.len() != width {
        return Err(TableError::Format {
            path: path.to_path_buf(),
            line: record.position().map(|p| p.line()).unwrap_or_default(),
            expected: width,
            found: record.len(),
        }
        .into());
    }
    Ok(record.iter().map(str::to_string).collect())
}

/// Add V2 TSP rows to the preset mode spec at `spec_file`, in place.
///
/// 1. Backs the file up to `spec_file` + `config.backup_suffix`.
/// 2. Resolves the required columns from the header.
/// 3. Streams rows through a two-row window. A row matching any request gets
///    its Capability Id set to the V1 tag and is followed by a copy whose
///    preset is suffixed and whose Capability Id is the V2 tag, unless the next
///    row's preset already carries the suffix or the row's own preset does.
/// 4. Writes everything to a temporary file and only then renames it over
///    `spec_file`. On error the original stays untouched.
#[instrument(level = "info", skip_all, fields(spec = %spec_file.display(), requests = requests.len()))]
pub fn update_preset_mode_spec(
    spec_file: &Path,
    requests: &[UpgradeRequest],
    config: &RewriteConfig,
) -> Result<RewriteSummary> {
    let backup_path = backup::create_backup(spec_file, &config.backup_suffix)?;
    info!(backup = %backup_path.display(), "created backup");

    let file = File::open(spec_file)
        .with_context(|| format!("failed to open preset mode spec {}", spec_file.display()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));
    let mut records = rdr.records();

    let header = match records.next() {
        Some(result) => {
            result.with_context(|| format!("CSV parse error in {}", spec_file.display()))?
        }
        None => StringRecord::new(),
    };
    let cols = SpecColumns::resolve(&header, spec_file)?;
    let width = header.len();
    debug!(?cols, width, "resolved columns");

    let mut staging = backup::staging_file(spec_file)?;
    let mut summary = RewriteSummary {
        backup_path,
        ..Default::default()
    };
    let layout = backup::sniff_layout(spec_file)?;
    if layout.bom {
        staging
            .write_all(backup::UTF8_BOM)
            .context("failed to write byte order mark")?;
    }
    {
        let mut wtr = WriterBuilder::new()
            .terminator(layout.terminator)
            .from_writer(staging.as_file_mut());
        wtr.write_record(&header)?;

        let rows = records.map(|r| checked_row(r, width, spec_file));
        for window in Lookahead::new(rows) {
            let (row, next) = window?;
            summary.rows_read += 1;

            match plan_row(&row, next.as_ref(), requests, &cols, config) {
                RowAction::Upgrade => {
                    let (v1, v2) = upgrade_row(row, &cols, config);
                    wtr.write_record(&v1)?;
                    wtr.write_record(&v2)?;
                    println!("{}", upgrade_notice(&v2, &cols));
                    summary.rows_written += 2;
                    summary.inserted += 1;
                }
                RowAction::AlreadyUpgraded => {
                    wtr.write_record(&row)?;
                    summary.rows_written += 1;
                    summary.already_upgraded += 1;
                }
                RowAction::Keep => {
                    wtr.write_record(&row)?;
                    summary.rows_written += 1;
                }
            }
        }
        wtr.flush().context("failed to flush temporary file")?;
    }

    backup::replace_with(staging, spec_file)?;
    info!(
        rows_read = summary.rows_read,
        rows_written = summary.rows_written,
        inserted = summary.inserted,
        already_upgraded = summary.already_upgraded,
        "preset mode spec rewritten"
    );
    Ok(summary)
}
