use anyhow::{Context, Result};
use csv::Terminator;
use std::{
    ffi::OsString,
    fs::{self, File},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::debug;

/// `path` with `suffix` appended to the full file name,
/// e.g. `PresetModeSpec.csv` -> `PresetModeSpec.csv.bak`.
pub fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Copy `path` byte for byte next to itself. An older backup is overwritten.
pub fn create_backup(path: &Path, suffix: &str) -> Result<PathBuf> {
    let backup = backup_path(path, suffix);
    let bytes = fs::copy(path, &backup).with_context(|| {
        format!(
            "failed to back up {} to {}",
            path.display(),
            backup.display()
        )
    })?;
    debug!(backup = %backup.display(), bytes, "backup written");
    Ok(backup)
}

/// Open a temporary file in the same directory as `target`, so that the
/// final rename never crosses a filesystem.
pub fn staging_file(target: &Path) -> Result<NamedTempFile> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))
}

/// Move a fully written staging file over `target`, keeping the target's
/// permissions.
pub fn replace_with(staging: NamedTempFile, target: &Path) -> Result<()> {
    let perms = fs::metadata(target)
        .with_context(|| format!("failed to stat {}", target.display()))?
        .permissions();
    staging
        .as_file()
        .sync_all()
        .context("failed to sync temporary file")?;
    fs::set_permissions(staging.path(), perms)
        .with_context(|| format!("failed to set permissions on {}", staging.path().display()))?;
    staging
        .persist(target)
        .with_context(|| format!("failed to replace {}", target.display()))?;
    Ok(())
}

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Byte-level details of a table that the CSV reader does not hand back.
#[derive(Debug, Clone, Copy)]
pub struct FileLayout {
    /// File starts with a UTF-8 byte order mark. The reader drops it.
    pub bom: bool,
    /// CRLF when the first line ends in `\r\n`, LF otherwise.
    pub terminator: Terminator,
}

/// Inspect the first line of `path`.
pub fn sniff_layout(path: &Path) -> Result<FileLayout> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut first = Vec::new();
    BufReader::new(file)
        .read_until(b'\n', &mut first)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let terminator = if first.ends_with(b"\r\n") {
        Terminator::CRLF
    } else {
        Terminator::Any(b'\n')
    };
    Ok(FileLayout {
        bom: first.starts_with(UTF8_BOM),
        terminator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn backup_suffix_goes_after_the_extension() {
        assert_eq!(
            backup_path(Path::new("sh/PresetModeSpec.csv"), ".bak"),
            PathBuf::from("sh/PresetModeSpec.csv.bak")
        );
    }

    #[test]
    fn backup_is_an_exact_copy() -> Result<()> {
        let dir = TempDir::new()?;
        let target = dir.path().join("pms.csv");
        fs::write(&target, b"Product,Preset\r\nA,\"x, y\"\r\n")?;

        let backup = create_backup(&target, ".bak")?;
        assert_eq!(backup, dir.path().join("pms.csv.bak"));
        assert_eq!(fs::read(&backup)?, fs::read(&target)?);
        Ok(())
    }

    #[test]
    fn replace_swaps_contents_and_leaves_no_temp_file() -> Result<()> {
        let dir = TempDir::new()?;
        let target = dir.path().join("pms.csv");
        fs::write(&target, "old\n")?;

        let mut staging = staging_file(&target)?;
        staging.write_all(b"new\n")?;
        replace_with(staging, &target)?;

        assert_eq!(fs::read_to_string(&target)?, "new\n");
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn dropped_staging_file_is_removed() -> Result<()> {
        let dir = TempDir::new()?;
        let target = dir.path().join("pms.csv");
        fs::write(&target, "old\n")?;

        let staging = staging_file(&target)?;
        let staged = staging.path().to_path_buf();
        drop(staging);

        assert!(!staged.exists());
        assert_eq!(fs::read_to_string(&target)?, "old\n");
        Ok(())
    }

    #[test]
    fn detects_line_terminator_from_header() -> Result<()> {
        let dir = TempDir::new()?;
        let crlf = dir.path().join("crlf.csv");
        let lf = dir.path().join("lf.csv");
        fs::write(&crlf, "a,b\r\n1,2\r\n")?;
        fs::write(&lf, "a,b\n1,2\n")?;

        assert!(matches!(sniff_layout(&crlf)?.terminator, Terminator::CRLF));
        assert!(matches!(sniff_layout(&lf)?.terminator, Terminator::Any(b'\n')));
        Ok(())
    }

    #[test]
    fn detects_byte_order_mark() -> Result<()> {
        let dir = TempDir::new()?;
        let bom = dir.path().join("bom.csv");
        let plain = dir.path().join("plain.csv");
        fs::write(&bom, "\u{feff}a,b\r\n1,2\r\n")?;
        fs::write(&plain, "a,b\n")?;

        let layout = sniff_layout(&bom)?;
        assert!(layout.bom);
        assert!(matches!(layout.terminator, Terminator::CRLF));
        assert!(!sniff_layout(&plain)?.bom);
        Ok(())
    }
}
