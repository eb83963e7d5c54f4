use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "apibridge")]
pub(crate) struct Cli {
    #[arg(long, default_value = "")]
    pub(crate) dsn: String,
    #[arg(long, default_value = "")]
    pub(crate) data_dir: String,
    #[arg(long, default_value = "127.0.0.1")]
    pub(crate) host: String,
    #[arg(long, default_value_t = 8788)]
    pub(crate) port: u16,
    /// Key guarding every invoke route. The default only binds alongside
    /// the loopback host default; set a real key for anything reachable.
    #[arg(long, default_value = "apibridge-dev-key")]
    pub(crate) admin_key: String,
    #[arg(long)]
    pub(crate) proxy: Option<String>,
}

/// Persisted process configuration. Written to the config row on first
/// boot; later boots prefer the row so runtime edits survive restarts.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct GlobalConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) admin_key: String,
    pub(crate) dsn: String,
    #[serde(default)]
    pub(crate) proxy: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_stay_on_loopback_with_the_dev_key() {
        let cli = Cli::try_parse_from(["apibridge"]).unwrap();
        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.port, 8788);
        assert_eq!(cli.admin_key, "apibridge-dev-key");
        assert!(cli.dsn.is_empty());
        assert!(cli.proxy.is_none());
    }

    #[test]
    fn admin_key_flag_overrides_the_default() {
        let cli = Cli::try_parse_from(["apibridge", "--admin-key", "s3cret"]).unwrap();
        assert_eq!(cli.admin_key, "s3cret");
    }
}
