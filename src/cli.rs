use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::error::Result;
use crate::io::{DEFAULT_DISCARD, ReaderOptions};

#[derive(Parser, Debug)]
#[command(name = "httpseek")]
#[command(version)]
#[command(about = "Random access to remote files using HTTP Range requests", long_about = None)]
#[command(after_help = "Examples:\n  \
  httpseek info https://example.com/disk.img          size and detected format\n  \
  httpseek cat --tail 64 https://example.com/app.log  last 64 bytes\n  \
  httpseek ls -l https://example.com/archive.zip      list a remote ZIP\n  \
  httpseek unzip -p https://example.com/a.zip '*.txt' print matching entries")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Extra request header, e.g. "Authorization: Bearer ..." (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER", global = true)]
    pub headers: Vec<String>,

    /// Largest forward seek served by draining the open response
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_DISCARD, global = true)]
    pub discard: u64,

    /// HTTP request timeout
    #[arg(long, value_name = "SECS", default_value_t = 30, global = true)]
    pub timeout: u64,

    /// Quiet mode, no request statistics
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Log more (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show size, detected format and validator
    Info {
        /// URL or local path
        #[arg(value_name = "SOURCE")]
        source: String,
    },

    /// Write a byte range to stdout
    Cat {
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Start offset
        #[arg(long, value_name = "BYTES", default_value_t = 0)]
        offset: u64,

        /// Number of bytes to write (default: to the end)
        #[arg(short = 'n', long, value_name = "BYTES")]
        length: Option<u64>,

        /// Write the last BYTES bytes instead
        #[arg(long, value_name = "BYTES", conflicts_with = "offset")]
        tail: Option<u64>,
    },

    /// List ZIP archive entries
    Ls {
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Long format with sizes, ratio and dates
        #[arg(short = 'l')]
        long: bool,
    },

    /// Extract ZIP archive entries
    Unzip {
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Entries to extract, exact names or * and ? patterns (default: all)
        #[arg(value_name = "ENTRIES")]
        entries: Vec<String>,

        /// Extract files into DIR
        #[arg(short = 'd', value_name = "DIR")]
        extract_dir: Option<PathBuf>,

        /// Write entries to stdout
        #[arg(short = 'p')]
        pipe: bool,

        /// Overwrite existing files
        #[arg(short = 'o')]
        overwrite: bool,

        /// Junk paths (do not make directories)
        #[arg(short = 'j')]
        junk_paths: bool,
    },
}

impl Cli {
    pub fn source(&self) -> &str {
        match &self.command {
            Command::Info { source }
            | Command::Cat { source, .. }
            | Command::Ls { source, .. }
            | Command::Unzip { source, .. } => source,
        }
    }

    pub fn is_http_url(&self) -> bool {
        let source = self.source();
        source.starts_with("http://") || source.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet || matches!(self.command, Command::Unzip { pipe: true, .. })
    }

    pub fn reader_options(&self) -> Result<ReaderOptions> {
        let mut options = ReaderOptions::new().with_discard(self.discard);
        for raw in &self.headers {
            options = options.parse_header(raw)?;
        }
        options.validate()?;
        Ok(options)
    }

    /// Log directive implied by `-v`, if any.
    pub fn log_directive(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("httpseek=debug"),
            _ => Some("httpseek=trace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cat_with_headers() {
        let cli = Cli::try_parse_from([
            "httpseek",
            "cat",
            "https://example.com/file.bin",
            "--offset",
            "100",
            "-n",
            "16",
            "-H",
            "Authorization: Bearer t",
            "--discard",
            "8192",
        ])
        .unwrap();

        assert!(cli.is_http_url());
        assert_eq!(cli.source(), "https://example.com/file.bin");
        let options = cli.reader_options().unwrap();
        assert_eq!(options.discard, 8192);
        assert_eq!(options.headers.len(), 1);
        assert!(matches!(
            cli.command,
            Command::Cat {
                offset: 100,
                length: Some(16),
                tail: None,
                ..
            }
        ));
    }

    #[test]
    fn test_tail_conflicts_with_offset() {
        let result = Cli::try_parse_from([
            "httpseek", "cat", "f.bin", "--tail", "4", "--offset", "2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_reserved_header_rejected() {
        let cli =
            Cli::try_parse_from(["httpseek", "info", "http://x/y", "-H", "Range: bytes=0-"])
                .unwrap();
        assert!(cli.reader_options().is_err());
    }

    #[test]
    fn test_pipe_implies_quiet() {
        let cli = Cli::try_parse_from(["httpseek", "unzip", "-p", "a.zip", "*.txt"]).unwrap();
        assert!(!cli.is_http_url());
        assert!(cli.is_quiet());
        assert_eq!(cli.log_directive(), None);

        let cli = Cli::try_parse_from(["httpseek", "-vv", "ls", "a.zip"]).unwrap();
        assert_eq!(cli.log_directive(), Some("httpseek=trace"));
    }
}
