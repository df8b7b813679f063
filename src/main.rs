use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use tspupgrade::{
    read_upgrade_requests,
    rewrite::{update_preset_mode_spec, RewriteConfig, PRESET_MODE_SPEC_FILE},
    selftest,
};

#[derive(Debug, Parser)]
#[command(
    name = "add_v2_tsps",
    version,
    about = "Updates PresetModeSpec.csv with V2 TSPs and modifies the V1 internal capabilities as necessary."
)]
struct Cli {
    /// Repository checkout to modify
    #[arg(short, long, value_name = "DIR", required_unless_present = "test")]
    repo: Option<PathBuf>,

    /// CSV describing which TSPs to upgrade to V2: Product, Transducer, Preset
    #[arg(short, long, value_name = "CSV", required_unless_present = "test")]
    input: Option<PathBuf>,

    /// Set the logging level
    #[arg(short, long = "log", value_enum, ignore_case = true)]
    log_level: Option<LogLevel>,

    /// Preset mode spec location inside the repository
    #[arg(long, value_name = "PATH", default_value = PRESET_MODE_SPEC_FILE)]
    spec_file: PathBuf,

    /// Run the built-in self-test instead of the rewrite
    #[arg(short, long)]
    test: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "UPPER")]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ─── 1) init logging ─────────────────────────────────────────────
    let env = match cli.log_level {
        Some(level) => EnvFilter::new(level.directive()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) self-test mode ───────────────────────────────────────────
    if cli.test {
        println!("Running test suite instead of script.");
        let report = selftest::run()?;
        for check in &report.checks {
            let status = if check.passed { "ok" } else { "FAILED" };
            println!("{} ... {}", check.name, status);
        }
        if !report.passed() {
            bail!("{} self-test check(s) failed", report.failures());
        }
        println!("all {} checks passed", report.checks.len());
        return Ok(());
    }

    // ─── 3) resolve paths ────────────────────────────────────────────
    let repo = cli.repo.context("--repo is required")?;
    let input = cli.input.context("--input is required")?;
    let config = RewriteConfig {
        spec_file: cli.spec_file,
        ..Default::default()
    };
    let spec = config.spec_path(&repo);
    info!(repo = %repo.display(), spec = %spec.display(), input = %input.display(), "paths set");

    // ─── 4) load requests & rewrite ──────────────────────────────────
    let requests = read_upgrade_requests(&input)?;
    let summary = update_preset_mode_spec(&spec, &requests, &config)?;
    info!(
        inserted = summary.inserted,
        already_upgraded = summary.already_upgraded,
        backup = %summary.backup_path.display(),
        "all done"
    );
    Ok(())
}
