//! # elbfetch-cli
//!
//! Command-line interface retrieving load-balancer access logs from S3.
//!
//! ```text
//! elbfetch -b <S3Bucket> -p <AccessLogPrefix> {-o <OutputFilePrefix>|--stdout}
//!          [-r aws-region] [-s yyyy-MM-ddTHH:mm:ss] [-e yyyy-MM-ddTHH:mm:ss]
//!          [--duration <minutes>] [--cred] [--gz|--elb] [--utc] [--force] [--debug]
//! ```
//!
//! ## Configuration
//!
//! - `AWS_REGION` - region used when `-r` is not given
//! - `RUST_LOG` - log filter (default: `warn`); logs always go to stderr

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod prompt;
pub mod run;
pub mod time;

use clap::Parser;

/// Retrieve ALB/ELB access logs from S3 for a time window.
#[derive(Debug, Parser)]
#[command(name = "elbfetch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// S3 bucket holding the access logs.
    #[arg(short = 'b', long)]
    pub bucket: String,

    /// Access-log prefix configured on the load balancer.
    #[arg(short = 'p', long)]
    pub prefix: String,

    /// Output file prefix (ex. /tmp/alb).
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Write access log lines to stdout, merged by request time.
    #[arg(long)]
    pub stdout: bool,

    /// Start time, yyyy-MM-ddTHH:mm:ss (default: 10 minutes ago).
    #[arg(short = 's', long)]
    pub start: Option<String>,

    /// End time, yyyy-MM-ddTHH:mm:ss (default: now).
    #[arg(short = 'e', long)]
    pub end: Option<String>,

    /// Window length in minutes, counted back from the end time.
    #[arg(long)]
    pub duration: Option<u32>,

    /// AWS region (ex. us-west-1).
    #[arg(short = 'r', long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// AWS account id owning the logs (default: caller identity).
    #[arg(long)]
    pub account_id: Option<String>,

    /// Use the default profile of ~/.aws/credentials.
    #[arg(long)]
    pub cred: bool,

    /// Don't decompress gzip, preserve gzip format.
    #[arg(long)]
    pub gz: bool,

    /// ELB (Classic Load Balancer) mode.
    #[arg(long)]
    pub elb: bool,

    /// Interpret -s and -e as UTC.
    #[arg(long)]
    pub utc: bool,

    /// Skip the confirmation prompt.
    #[arg(long)]
    pub force: bool,

    /// Debug logging on stderr.
    #[arg(long)]
    pub debug: bool,

    /// Custom S3 endpoint (MinIO, LocalStack).
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Use path-style S3 addressing.
    #[arg(long)]
    pub path_style: bool,

    /// Maximum keys listed per day.
    #[arg(long, default_value_t = elbfetch_core::config::DEFAULT_MAX_KEYS)]
    pub max_keys: usize,
}

impl Cli {
    /// Returns whether the confirmation prompt is skipped.
    ///
    /// Merged output on stdout always runs unattended.
    #[must_use]
    pub const fn is_forced(&self) -> bool {
        self.force || self.stdout
    }

    /// Returns the tracing filter directives for this invocation.
    #[must_use]
    pub const fn log_directives(&self) -> Option<&'static str> {
        if self.debug {
            Some("warn,elbfetch=debug,elbfetch_cli=debug,elbfetch_core=debug,elbfetch_s3=debug")
        } else {
            None
        }
    }
}
