use std::error::Error;
use std::path::{Path, PathBuf};

/// Picks the database DSN: an explicit `--dsn` wins, otherwise a sqlite
/// file under the data directory (defaulting to `./data`). For sqlite
/// file DSNs the parent directory and an empty database file are created
/// up front, since sqlite creates neither.
pub(crate) fn resolve_dsn(
    cli_dsn: &str,
    cli_data_dir: &str,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    let dsn = if cli_dsn.trim().is_empty() {
        let data_dir = if cli_data_dir.trim().is_empty() {
            PathBuf::from("data")
        } else {
            PathBuf::from(cli_data_dir)
        };
        let db_file = data_dir.join("apibridge.db");
        match db_file.to_string_lossy() {
            path if path.starts_with('/') => format!("sqlite://{path}"),
            path => format!("sqlite://./{path}"),
        }
    } else {
        cli_dsn.trim().to_string()
    };

    if let Some(file) = sqlite_file_path(&dsn) {
        prepare_sqlite_file(&file)?;
    }
    Ok(dsn)
}

fn sqlite_file_path(dsn: &str) -> Option<PathBuf> {
    let rest = dsn.strip_prefix("sqlite:")?;
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    if rest.is_empty() || rest.starts_with(":memory:") || rest.starts_with("memory:") {
        return None;
    }
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

fn prepare_sqlite_file(path: &Path) -> Result<(), Box<dyn Error + Send + Sync>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    if !path.exists() {
        std::fs::File::create(path)?;
    }
    Ok(())
}
