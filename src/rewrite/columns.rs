use csv::StringRecord;
use std::path::Path;

use crate::error::TableError;

pub const PRODUCT: &str = "Product";
pub const TRANSDUCER: &str = "Transducer";
pub const PRESET: &str = "Preset";
pub const CAPABILITY_ID: &str = "Capability Id";

/// Offsets of the columns the rewrite reads or writes, resolved once from the
/// header of the preset mode spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecColumns {
    pub product: usize,
    pub transducer: usize,
    pub preset: usize,
    pub capability_id: usize,
}

impl SpecColumns {
    /// Look up each required name (exact, case-sensitive, first occurrence).
    pub fn resolve(header: &StringRecord, path: &Path) -> Result<Self, TableError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| TableError::Schema {
                    path: path.to_path_buf(),
                    column: name.to_string(),
                })
        };

        Ok(Self {
            product: find(PRODUCT)?,
            transducer: find(TRANSDUCER)?,
            preset: find(PRESET)?,
            capability_id: find(CAPABILITY_ID)?,
        })
    }
}
