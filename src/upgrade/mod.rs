// src/upgrade/mod.rs
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::{fmt, fs::File, io::BufReader, path::Path};
use tracing::{debug, info, instrument, warn};

use crate::error::TableError;

pub mod pattern;

pub use pattern::FieldPattern;

/// Number of columns in an upgrade list: Product, Transducer, Preset.
pub const REQUEST_FIELDS: usize = 3;

/// One line of the upgrade list: which preset mode spec rows get a V2 TSP.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpgradeRequest {
    pub product: FieldPattern,
    pub transducer: FieldPattern,
    pub preset: FieldPattern,
}

impl UpgradeRequest {
    pub fn new(product: &str, transducer: &str, preset: &str) -> Result<Self> {
        Ok(Self {
            product: FieldPattern::new(product)?,
            transducer: FieldPattern::new(transducer)?,
            preset: FieldPattern::new(preset)?,
        })
    }

    /// True when all three fields match their patterns.
    pub fn matches(&self, product: &str, transducer: &str, preset: &str) -> bool {
        self.product.matches(product)
            && self.transducer.matches(transducer)
            && self.preset.matches(preset)
    }
}

impl fmt::Display for UpgradeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.product, self.transducer, self.preset)
    }
}

/// Read the upgrade list at `path`, in file order.
///
/// The first line is a header and is skipped without looking at its names;
/// fields are positional. Every other line must carry exactly
/// [`REQUEST_FIELDS`] fields.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_upgrade_requests<P: AsRef<Path>>(path: P) -> Result<Vec<UpgradeRequest>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open upgrade list {}", path.display()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut requests = Vec::new();
    for result in rdr.records() {
        let record =
            result.with_context(|| format!("CSV parse error in {}", path.display()))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        if record.len() != REQUEST_FIELDS {
            return Err(TableError::Format {
                path: path.to_path_buf(),
                line,
                expected: REQUEST_FIELDS,
                found: record.len(),
            }
            .into());
        }

        let request: UpgradeRequest = record
            .deserialize(None)
            .with_context(|| format!("{}: line {}: bad upgrade request", path.display(), line))?;
        debug!(line, %request, "loaded upgrade request");
        requests.push(request);
    }

    if requests.is_empty() {
        warn!("upgrade list has no requests; nothing will be upgraded");
    }
    info!(count = requests.len(), "loaded upgrade requests");
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_list(content: &str) -> Result<NamedTempFile> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        Ok(tmp)
    }

    #[test]
    fn loads_requests_in_file_order() -> Result<()> {
        let tmp = write_list("Product,Transducer,Preset\nModelA,*,Cardiac\nModel*,TX?,*\n")?;
        let requests = read_upgrade_requests(tmp.path())?;

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].product.as_str(), "ModelA");
        assert_eq!(requests[0].transducer.as_str(), "*");
        assert_eq!(requests[0].preset.as_str(), "Cardiac");
        assert_eq!(requests[1].to_string(), "Model*, TX?, *");
        Ok(())
    }

    #[test]
    fn header_only_list_is_empty() -> Result<()> {
        let tmp = write_list("Product,Transducer,Preset\n")?;
        assert!(read_upgrade_requests(tmp.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn wrong_field_count_is_a_format_error() -> Result<()> {
        let tmp = write_list("Product,Transducer,Preset\nModelA,TX1,Cardiac\nModelB,TX2\n")?;
        let err = read_upgrade_requests(tmp.path()).unwrap_err();

        match err.downcast_ref::<TableError>() {
            Some(TableError::Format {
                line,
                expected,
                found,
                ..
            }) => {
                assert_eq!(*line, 3);
                assert_eq!(*expected, 3);
                assert_eq!(*found, 2);
            }
            other => panic!("expected format error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn quoted_fields_keep_their_commas() -> Result<()> {
        let tmp = write_list("Product,Transducer,Preset\n\"Model, A\",TX1,\"Abd*\"\n")?;
        let requests = read_upgrade_requests(tmp.path())?;
        assert!(requests[0].matches("Model, A", "TX1", "Abdomen"));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_upgrade_requests("/nonexistent/upgrade.csv").unwrap_err();
        assert!(err.downcast_ref::<TableError>().is_none());
        assert!(err.to_string().contains("failed to open upgrade list"));
    }

    #[test]
    fn request_matches_all_three_fields() -> Result<()> {
        let request = UpgradeRequest::new("Model*", "TX?", "*")?;
        assert!(request.matches("ModelB", "TX2", "Renal"));
        assert!(!request.matches("ModelB", "TX22", "Renal"));
        assert!(!request.matches("Other", "TX2", "Renal"));
        Ok(())
    }
}
