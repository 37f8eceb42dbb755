//! Main entry point for the httpseek CLI application.
//!
//! Every subcommand works on a seekable source: an HTTP(S) URL read through
//! Range requests, or a local file.

use anyhow::{Context, Result, bail};
use clap::Parser;
use reqwest::Url;
use std::fs;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use httpseek::cli::Command;
use httpseek::io::HEAD_SIZE;
use httpseek::{
    Cli, HttpRangeReader, LocalFileReader, ReadAt, ReqwestTransport, ZipArchive, ZipEntry,
};

/// What `info` reports about a source.
struct Summary {
    size: u64,
    head: Vec<u8>,
    validator: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    if cli.is_http_url() {
        let url = Url::parse(cli.source())
            .with_context(|| format!("invalid URL {}", cli.source()))?;
        let transport = ReqwestTransport::with_timeout(Duration::from_secs(cli.timeout))?;
        let mut reader = HttpRangeReader::with_transport(url, transport, cli.reader_options()?)?;

        let summary = Summary {
            size: reader.size(),
            head: reader.head_bytes().to_vec(),
            validator: reader.validator().to_str().ok().map(str::to_string),
        };
        let result = run(&mut reader, &cli, summary);
        reader.close()?;

        // Network statistics for HTTP sources
        if !cli.is_quiet() {
            eprintln!(
                "\nHTTP requests: {}, transferred: {} of {}",
                reader.request_count(),
                format_size(reader.transferred_bytes()),
                format_size(reader.size())
            );
        }
        result
    } else {
        let mut reader = LocalFileReader::new(Path::new(cli.source()))
            .with_context(|| format!("cannot open {}", cli.source()))?;

        let mut head = vec![0u8; head_len(reader.size())];
        reader.read_exact(&mut head)?;
        reader.seek(SeekFrom::Start(0))?;
        let summary = Summary {
            size: reader.size(),
            head,
            validator: None,
        };
        run(&mut reader, &cli, summary)
    }
}

/// Bytes of a source of `size` bytes that make up its head.
fn head_len(size: u64) -> usize {
    usize::try_from(size).map_or(HEAD_SIZE, |s| s.min(HEAD_SIZE))
}

/// Install the stderr log subscriber. `-v` overrides `RUST_LOG`.
fn init_logging(cli: &Cli) {
    let filter = match cli.log_directive() {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Dispatch the subcommand against an opened source.
fn run<R: ReadAt>(reader: &mut R, cli: &Cli, summary: Summary) -> Result<()> {
    match &cli.command {
        Command::Info { source } => {
            print_info(source, &summary);
            Ok(())
        }
        Command::Cat {
            offset,
            length,
            tail,
            ..
        } => cat(reader, *offset, *length, *tail),
        Command::Ls { long, .. } => list_entries(reader, *long),
        Command::Unzip { .. } => extract_entries(reader, cli),
    }
}

fn print_info(source: &str, summary: &Summary) {
    println!("source:    {source}");
    println!("size:      {} ({})", summary.size, format_size(summary.size));
    println!("format:    {}", sniff(&summary.head));
    if let Some(validator) = &summary.validator {
        println!("validator: {validator}");
    }
}

/// Copy a byte range of the source to stdout.
fn cat<R: ReadAt>(
    reader: &mut R,
    offset: u64,
    length: Option<u64>,
    tail: Option<u64>,
) -> Result<()> {
    let size = reader.size();
    let start = match tail {
        Some(n) => size.saturating_sub(n),
        None => offset,
    };
    if start > size {
        bail!("offset {start} is beyond the end of the source ({size} bytes)");
    }

    reader.seek(SeekFrom::Start(start))?;
    let mut stdout = io::stdout().lock();
    io::copy(&mut reader.take(length.unwrap_or(u64::MAX)), &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

/// List archive entries, either names only or in a detailed table.
fn list_entries<R: ReadAt>(reader: &mut R, long: bool) -> Result<()> {
    let archive = ZipArchive::open(reader)?;

    if !long {
        for entry in archive.entries() {
            println!("{}", entry.name);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in archive.entries() {
        let (year, month, day) = entry.date();
        let (hour, minute, _) = entry.time();
        println!(
            "{:>10}  {:>10}  {:>4}%  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            entry.savings(),
            year,
            month,
            day,
            hour,
            minute,
            entry.name
        );

        if !entry.is_dir {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    let total_savings = match total_uncompressed {
        0 => 0,
        total => 100u64.saturating_sub(total_compressed.saturating_mul(100) / total),
    };
    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {:>4}%  {:>17}  {} files",
        total_uncompressed, total_compressed, total_savings, "", file_count
    );
    Ok(())
}

fn extract_entries<R: ReadAt>(reader: &mut R, cli: &Cli) -> Result<()> {
    let Command::Unzip {
        entries: patterns,
        extract_dir,
        pipe,
        overwrite,
        junk_paths,
        ..
    } = &cli.command
    else {
        bail!("not an unzip command");
    };

    let mut archive = ZipArchive::open(reader)?;
    let selected: Vec<ZipEntry> = archive
        .entries()
        .iter()
        .filter(|e| !e.is_dir && matches_any(patterns, &e.name))
        .cloned()
        .collect();

    if selected.is_empty() && !patterns.is_empty() {
        bail!("no entries match {}", patterns.join(" "));
    }

    if *pipe {
        let mut stdout = io::stdout().lock();
        for entry in &selected {
            if selected.len() > 1 {
                writeln!(stdout, "--- {} ---", entry.name)?;
            }
            archive.copy_to(entry, &mut stdout)?;
        }
        stdout.flush()?;
        return Ok(());
    }

    for entry in &selected {
        let Some(relative) = output_path(&entry.name, *junk_paths) else {
            warn!(name = %entry.name, "skipping entry with unsafe path");
            continue;
        };
        let path = match extract_dir {
            Some(dir) => dir.join(relative),
            None => relative,
        };

        if path.exists() && !overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.name);
            }
            continue;
        }

        if !cli.is_quiet() {
            println!("  extracting: {}", entry.name);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(fs::File::create(&path)?);
        archive.copy_to(entry, &mut out)?;
        out.flush()?;
    }

    Ok(())
}

/// An empty pattern list selects everything.
fn matches_any(patterns: &[String], name: &str) -> bool {
    if patterns.is_empty() {
        return true;
    }
    let basename = name.rsplit('/').next().unwrap_or(name);
    patterns.iter().any(|p| {
        if has_glob_chars(p) {
            glob_match(p, name)
        } else {
            name == p || basename == p
        }
    })
}

/// Relative output path for an entry, or `None` if it would escape the target directory.
fn output_path(name: &str, junk_paths: bool) -> Option<PathBuf> {
    let path = Path::new(name);
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    if junk_paths {
        path.file_name().map(PathBuf::from)
    } else {
        Some(path.to_path_buf())
    }
}

/// Name the format announced by the leading bytes.
fn sniff(head: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"PK\x03\x04", "ZIP archive"),
        (b"PK\x05\x06", "ZIP archive (empty)"),
        (b"\x1f\x8b", "gzip compressed data"),
        (b"BZh", "bzip2 compressed data"),
        (b"\xfd7zXZ\x00", "xz compressed data"),
        (b"\x28\xb5\x2f\xfd", "zstd compressed data"),
        (b"7z\xbc\xaf\x27\x1c", "7-Zip archive"),
        (b"%PDF-", "PDF document"),
        (b"\x89PNG\r\n\x1a\n", "PNG image"),
        (b"\xff\xd8\xff", "JPEG image"),
        (b"GIF8", "GIF image"),
        (b"\x7fELF", "ELF executable"),
        (b"MZ", "DOS/PE executable"),
        (b"SQLite format 3\x00", "SQLite database"),
    ];

    if let Some((_, name)) = SIGNATURES.iter().find(|(magic, _)| head.starts_with(magic)) {
        return *name;
    }
    if head.get(257..262) == Some(&b"ustar"[..]) {
        return "tar archive";
    }
    match std::str::from_utf8(head) {
        Ok(text) if !text.contains('\0') => "text",
        // A multi-byte character may be cut at the end of the head.
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => "text",
        _ => "binary data",
    }
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if p == t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern, &text)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.txt", "docs/readme.txt"));
        assert!(glob_match("file?.dat", "file1.dat"));
        assert!(!glob_match("*.txt", "readme.md"));
    }

    #[test]
    fn test_matches_any() {
        let patterns = vec!["readme.txt".to_string()];
        assert!(matches_any(&patterns, "docs/readme.txt"));
        assert!(!matches_any(&patterns, "docs/other.txt"));
        assert!(matches_any(&[], "anything"));
    }

    #[test]
    fn test_output_path_rejects_escapes() {
        assert_eq!(output_path("a/b.txt", false), Some(PathBuf::from("a/b.txt")));
        assert_eq!(output_path("a/b.txt", true), Some(PathBuf::from("b.txt")));
        assert_eq!(output_path("../etc/passwd", false), None);
        assert_eq!(output_path("/etc/passwd", false), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(sniff(b"PK\x03\x04rest"), "ZIP archive");
        assert_eq!(sniff(b"%PDF-1.7"), "PDF document");
        assert_eq!(sniff(b"hello world\n"), "text");
        assert_eq!(sniff(&[0u8, 1, 2, 3]), "binary data");

        let mut tar = vec![0u8; 512];
        tar[..4].copy_from_slice(b"file");
        tar[257..262].copy_from_slice(b"ustar");
        assert_eq!(sniff(&tar), "tar archive");
    }

    #[test]
    fn test_head_len() {
        assert_eq!(head_len(10), 10);
        assert_eq!(head_len(4096), HEAD_SIZE);
        assert_eq!(head_len(u64::MAX), HEAD_SIZE);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }
}
