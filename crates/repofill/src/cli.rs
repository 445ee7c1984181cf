//! Command line surface.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use repofill_net::Addressing;
use repofill_sync::TransferTarget;

use crate::config::PopulateConfig;

/// Populate a local repository from a name-addressed content network.
#[derive(Debug, Parser)]
#[command(name = "repofill", version, about)]
pub struct Args {
    /// Address content by the name as given instead of its newest version
    #[arg(long)]
    pub unversioned: bool,

    /// Log round and transfer details
    #[arg(short, long)]
    pub verbose: bool,

    /// Treat each NAME as a prefix and fetch everything below it
    #[arg(short, long)]
    pub enumerate: bool,

    /// Skip content whose version is already stored locally
    #[arg(long)]
    pub verify: bool,

    /// Answers needed before an enumeration round ends early
    #[arg(long = "rep", value_name = "N", default_value_t = 1)]
    pub required_answers: usize,

    /// Per-round enumeration deadline in milliseconds
    #[arg(long = "timeout", value_name = "MS", default_value_t = 500)]
    pub timeout_ms: u64,

    /// Only pull content through the network; store nothing locally
    #[arg(long)]
    pub cache: bool,

    /// Directory tree serving as the content network
    #[arg(long, value_name = "DIR")]
    pub network: PathBuf,

    /// Directory holding the local repository
    #[arg(long, value_name = "DIR")]
    pub repo: PathBuf,

    /// Print the full run report as JSON instead of the failed names
    #[arg(long)]
    pub json: bool,

    /// Names (or prefixes with --enumerate) to populate
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,
}

impl Args {
    pub fn config(&self) -> PopulateConfig {
        let addressing = if self.unversioned {
            Addressing::Unversioned
        } else {
            Addressing::Versioned
        };
        let target = if self.cache {
            TransferTarget::CacheOnly
        } else {
            TransferTarget::Repository
        };

        PopulateConfig::new()
            .with_addressing(addressing)
            .with_enumerate(self.enumerate)
            .with_verify(self.verify)
            .with_required_answers(self.required_answers)
            .with_round_timeout(Duration::from_millis(self.timeout_ms))
            .with_target(target)
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_directives(&self) -> &'static str {
        if self.verbose {
            "repofill=debug"
        } else {
            "repofill=info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        let base = ["repofill", "--network", "net", "--repo", "repo"];
        Args::try_parse_from(base.iter().chain(args.iter()).copied())
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["/a"]).unwrap();
        let config = args.config();
        assert_eq!(config, PopulateConfig::default());
        assert_eq!(args.names, vec!["/a".to_string()]);
        assert_eq!(args.log_directives(), "repofill=info");
    }

    #[test]
    fn test_all_flags() {
        let args = parse(&[
            "--unversioned",
            "-v",
            "-e",
            "--verify",
            "--rep",
            "3",
            "--timeout",
            "250",
            "--cache",
            "/a",
            "/b",
        ])
        .unwrap();
        let config = args.config();

        assert_eq!(config.addressing, Addressing::Unversioned);
        assert!(config.enumerate);
        assert!(config.verify);
        assert_eq!(config.required_answers, 3);
        assert_eq!(config.round_timeout, Duration::from_millis(250));
        assert_eq!(config.target, TransferTarget::CacheOnly);
        assert_eq!(args.names.len(), 2);
        assert_eq!(args.log_directives(), "repofill=debug");
    }

    #[test]
    fn test_zero_timeout_uses_default() {
        let args = parse(&["--timeout", "0", "/a"]).unwrap();
        assert_eq!(args.config().round_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_usage_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--rep", "many", "/a"]).is_err());
        assert!(Args::try_parse_from(["repofill", "/a"]).is_err());
    }
}
