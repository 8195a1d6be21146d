use clap::Parser;
use std::path::PathBuf;

use crate::config::{MirrorConfig, DEFAULT_CONFIG_FILE};
use crate::rewriter::ForeignPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "page-mirror",
    about = "Mirror a single web page and its same-origin resources for offline use",
    version,
    long_about = "Downloads one page together with the stylesheets, scripts, images and fonts it loads from the same host, including resources referenced from inside stylesheets. Every reference is rewritten to a relative local path so the copy works offline."
)]
pub struct MirrorCommand {
    /// The URL of the page to mirror
    #[arg(required = true)]
    pub url: String,

    /// Directory that receives the project folder (and archive)
    #[arg(short, long, default_value = "./output")]
    pub output_dir: PathBuf,

    /// Maximum concurrent downloads
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_concurrent: Option<u64>,

    /// Maximum concurrent downloads per host
    #[arg(long = "per-host", value_parser = clap::value_parser!(u64).range(1..))]
    pub per_host: Option<u64>,

    /// Timeout for each request in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Timeout for the whole fetch phase in seconds
    #[arg(long)]
    pub run_timeout: Option<u64>,

    /// User agent string to use for requests
    #[arg(long)]
    pub user_agent: Option<String>,

    /// What to do with references to other hosts
    #[arg(long, value_enum)]
    pub foreign_policy: Option<ForeignPolicy>,

    /// JSON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Zip the mirrored project
    #[arg(long)]
    pub archive: bool,

    /// Send the zip to the configured Telegram chat (implies --archive)
    #[arg(long)]
    pub deliver: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl MirrorCommand {
    /// Applies command-line overrides on top of a loaded configuration.
    pub fn apply_to(&self, config: &mut MirrorConfig) {
        if let Some(max_concurrent) = self.max_concurrent {
            config.max_concurrent = max_concurrent as usize;
        }
        if let Some(per_host) = self.per_host {
            config.per_host_concurrent = per_host as usize;
        }
        if let Some(timeout) = self.timeout {
            config.fetch_timeout_secs = timeout;
        }
        if let Some(run_timeout) = self.run_timeout {
            config.run_timeout_secs = run_timeout;
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(policy) = self.foreign_policy {
            config.foreign_policy = policy;
        }
    }

    pub fn wants_archive(&self) -> bool {
        self.archive || self.deliver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_args() {
        let args = MirrorCommand::try_parse_from(&[
            "page-mirror",
            "https://example.com",
            "-o", "./output"
        ]).unwrap();

        assert_eq!(args.url, "https://example.com");
        assert_eq!(args.output_dir, PathBuf::from("./output"));
        assert_eq!(args.max_concurrent, None);
        assert_eq!(args.foreign_policy, None);
        assert_eq!(args.config, PathBuf::from("config.json"));
        assert!(!args.archive);
        assert!(!args.deliver);
        assert!(!args.verbose);
    }

    #[test]
    fn test_parse_all_args() {
        let args = MirrorCommand::try_parse_from(&[
            "page-mirror",
            "example.com",
            "-o", "./sites",
            "-c", "20",
            "--per-host", "2",
            "--timeout", "10",
            "--run-timeout", "60",
            "--user-agent", "TestAgent/2.0",
            "--foreign-policy", "strip",
            "--config", "other.json",
            "--deliver",
            "-v"
        ]).unwrap();

        assert_eq!(args.max_concurrent, Some(20));
        assert_eq!(args.per_host, Some(2));
        assert_eq!(args.timeout, Some(10));
        assert_eq!(args.run_timeout, Some(60));
        assert_eq!(args.user_agent.as_deref(), Some("TestAgent/2.0"));
        assert_eq!(args.foreign_policy, Some(ForeignPolicy::Strip));
        assert_eq!(args.config, PathBuf::from("other.json"));
        assert!(args.wants_archive());
        assert!(args.verbose);
    }

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let args = MirrorCommand::try_parse_from(&[
            "page-mirror",
            "https://example.com",
            "-c", "3",
            "--foreign-policy", "strip"
        ]).unwrap();

        let mut config = MirrorConfig {
            per_host_concurrent: 2,
            ..MirrorConfig::default()
        };
        args.apply_to(&mut config);

        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.per_host_concurrent, 2);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.foreign_policy, ForeignPolicy::Strip);
    }

    #[test]
    fn test_parse_missing_url() {
        let result = MirrorCommand::try_parse_from(&[
            "page-mirror",
            "-o", "./output"
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_invalid_concurrent() {
        let result = MirrorCommand::try_parse_from(&[
            "page-mirror",
            "https://example.com",
            "-c", "0"
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_invalid_policy() {
        let result = MirrorCommand::try_parse_from(&[
            "page-mirror",
            "https://example.com",
            "--foreign-policy", "drop"
        ]);
        assert!(result.is_err());
    }
}
