// src/selftest.rs
use anyhow::{Context, Result};
use std::{fs, path::Path};
use tempfile::TempDir;
use tracing::{error, info, instrument};

use crate::{
    rewrite::{update_preset_mode_spec, RewriteConfig},
    upgrade::read_upgrade_requests,
};

const FIXTURE_SPEC: &str = "\
Preset,Product,Capability Id,Transducer,Notes
Cardiac,ModelA,OldCap,TX1,\"adult, default\"
Renal,ModelB,Cap1,TX2,
Renal 2,ModelB,Cap2,TX2,
Abdomen,Other,Cap3,TX1,
Lung,Other,Cap4,TX9,
";

const FIXTURE_UPGRADES: &str = "\
Product,Transducer,Preset
ModelA,*,Cardiac
ModelB,TX2,Renal
Other,TX?,Abd*
";

const EXPECTED_SPEC: &str = "\
Preset,Product,Capability Id,Transducer,Notes
Cardiac,ModelA,TspV1,TX1,\"adult, default\"
Cardiac 2,ModelA,TspV2,TX1,\"adult, default\"
Renal,ModelB,Cap1,TX2,
Renal 2,ModelB,Cap2,TX2,
Abdomen,Other,TspV1,TX1,
Abdomen 2,Other,TspV2,TX1,
Lung,Other,Cap4,TX9,
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct SelfTestReport {
    pub checks: Vec<Check>,
}

impl SelfTestReport {
    fn record(&mut self, name: &'static str, passed: bool, detail: impl Into<String>) {
        let detail = detail.into();
        if passed {
            info!(check = name, "passed");
        } else {
            error!(check = name, %detail, "failed");
        }
        self.checks.push(Check {
            name,
            passed,
            detail,
        });
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }
}

/// Run the rewrite twice against a scratch repository and check the results.
///
/// Setup problems (temp dir, fixture writes) and rewrite errors are returned as
/// `Err`; behavioural mismatches are recorded as failed checks.
#[instrument(level = "info")]
pub fn run() -> Result<SelfTestReport> {
    let repo = TempDir::new().context("creating scratch repository")?;
    let config = RewriteConfig::default();
    let spec = config.spec_path(repo.path());
    let upgrades = repo.path().join("upgrades.csv");
    write_fixture(&spec, FIXTURE_SPEC)?;
    write_fixture(&upgrades, FIXTURE_UPGRADES)?;

    let requests = read_upgrade_requests(&upgrades)?;
    let mut report = SelfTestReport::default();
    report.record(
        "upgrade list loaded",
        requests.len() == 3,
        format!("expected 3 requests, got {}", requests.len()),
    );

    let first = update_preset_mode_spec(&spec, &requests, &config)?;
    let after_first = fs::read_to_string(&spec)?;

    report.record(
        "header preserved",
        after_first.lines().next() == FIXTURE_SPEC.lines().next(),
        format!("header is {:?}", after_first.lines().next()),
    );
    report.record(
        "row count law",
        first.rows_written == first.rows_read + first.inserted,
        format!(
            "read {} + inserted {} != written {}",
            first.rows_read, first.inserted, first.rows_written
        ),
    );
    report.record(
        "V1/V2 rows inserted adjacently",
        after_first == EXPECTED_SPEC,
        format!("rewritten table:\n{}", after_first),
    );
    report.record(
        "existing V2 row not duplicated",
        first.inserted == 2 && first.already_upgraded == 1,
        format!(
            "inserted {}, already upgraded {}",
            first.inserted, first.already_upgraded
        ),
    );

    let backup = fs::read_to_string(&first.backup_path)?;
    report.record(
        "backup holds original table",
        backup == FIXTURE_SPEC,
        format!("backup at {}", first.backup_path.display()),
    );

    let second = update_preset_mode_spec(&spec, &requests, &config)?;
    let after_second = fs::read_to_string(&spec)?;
    report.record(
        "second run is a no-op",
        second.inserted == 0 && after_second == after_first,
        format!("second run inserted {}", second.inserted),
    );

    Ok(report)
}

fn write_fixture(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(path, content).with_context(|| format!("writing fixture {}", path.display()))
}
