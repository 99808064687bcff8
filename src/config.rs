use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; CLI wins.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub max_upload_mb: usize,
    /// Decode xlsx/xls imports. When off, only CSV is accepted.
    pub spreadsheets: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Jewellery catalogue API")]
pub struct Args {
    /// Host to bind to (overrides CATALOGUE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CATALOGUE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where image payloads are stored (overrides CATALOGUE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides CATALOGUE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Request body limit in MiB (overrides CATALOGUE_MAX_UPLOAD_MB)
    #[arg(long)]
    pub max_upload_mb: Option<usize>,

    /// Reject xlsx/xls imports instead of decoding them
    #[arg(long)]
    pub no_spreadsheet: bool,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

/// Read `name` and parse it, falling back to `default` when unset.
fn env_parsed<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let cfg = Self::merge(&args)?;
        Ok((cfg, args.migrate))
    }

    fn merge(args: &Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("CATALOGUE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parsed("CATALOGUE_PORT", 3000u16)?;
        let env_storage =
            env::var("CATALOGUE_STORAGE_DIR").unwrap_or_else(|_| "./data/storage".into());
        let env_db = env::var("CATALOGUE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/catalogue.db".into());
        let env_upload = env_parsed("CATALOGUE_MAX_UPLOAD_MB", 64usize)?;

        // --- Merge ---
        Ok(Self {
            host: args.host.clone().unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.clone().unwrap_or(env_storage),
            database_url: args.database_url.clone().unwrap_or(env_db),
            max_upload_mb: args.max_upload_mb.unwrap_or(env_upload),
            spreadsheets: !args.no_spreadsheet,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_values_take_precedence() {
        let args = Args::parse_from([
            "catalogue-store",
            "--port",
            "8081",
            "--storage-dir",
            "/tmp/catalogue",
            "--max-upload-mb",
            "2",
            "--no-spreadsheet",
        ]);
        let cfg = AppConfig::merge(&args).unwrap();
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.storage_dir, "/tmp/catalogue");
        assert_eq!(cfg.max_body_bytes(), 2 * 1024 * 1024);
        assert!(!cfg.spreadsheets);
        assert!(!args.migrate);
    }

    #[test]
    fn missing_variable_uses_default() {
        let value: u16 = env_parsed("CATALOGUE_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
