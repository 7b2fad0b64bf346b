//! Command-line argument parsing.
//!
//! The service normally runs as a long-lived HTTP server (`start`), but
//! also supports one-shot standalone invocations for indexing/downloading a
//! single filtered set of entities, useful for scripting and cron jobs.

use clap::{Parser, Subcommand};

use crate::error::{Error, Result};
use crate::types::EntityKind;

/// media-indexer: catalog crawler and file downloader for a third-party
/// video catalog API.
#[derive(Debug, Parser)]
#[command(name = "media-indexer", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Only log critical errors.
    #[arg(long, global = true, conflicts_with_all = ["error", "warn", "info", "debug"])]
    pub critical: bool,

    /// Log errors and above.
    #[arg(long, global = true, conflicts_with_all = ["critical", "warn", "info", "debug"])]
    pub error: bool,

    /// Log warnings and above.
    #[arg(long, global = true, conflicts_with_all = ["critical", "error", "info", "debug"])]
    pub warn: bool,

    /// Log info and above (default).
    #[arg(long, global = true, conflicts_with_all = ["critical", "error", "warn", "debug"])]
    pub info: bool,

    /// Log everything, including debug output.
    #[arg(long, global = true, conflicts_with_all = ["critical", "error", "warn", "info"])]
    pub debug: bool,
}

impl Cli {
    /// Resolves the `--critical/--error/--warn/--info/--debug` flags (at
    /// most one set, enforced by clap) to a `tracing` filter directive.
    pub fn log_level(&self) -> &'static str {
        if self.critical {
            "error"
        } else if self.error {
            "error"
        } else if self.warn {
            "warn"
        } else if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the HTTP service until a termination signal arrives.
    Start,

    /// Downloads entities matching a filter expression.
    ///
    /// `<filter>` is `key=v1,v2-v3;key2=...`; only `kind=video` and filter
    /// key `id` are currently supported.
    Download {
        /// Entity kind to download. Only `video` is supported today.
        kind: String,
        /// Filter expression, e.g. `id=1,2,3`.
        filter: String,
    },

    /// Indexes and downloads recently published items of `kind`.
    DownloadRecent {
        /// Entity kind to refresh. Only `video` is supported today.
        kind: String,
    },
}

/// Parsed, validated arguments from [`Command::Download`]'s filter string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdFilter {
    pub ids: Vec<i64>,
}

/// Parses a `download` filter expression (`key=v1,v2-v3;key2=...`),
/// rejecting anything but a single `id` key with a comma-separated id list.
/// Ranges (`v1-v3`) are accepted and expanded inclusively.
pub fn parse_id_filter(filter: &str) -> Result<IdFilter> {
    let mut ids = Vec::new();

    for clause in filter.split(';').filter(|c| !c.is_empty()) {
        let (key, values) = clause
            .split_once('=')
            .ok_or_else(|| Error::InvalidArgument(format!("malformed filter clause: {clause}")))?;

        if key != "id" {
            return Err(Error::InvalidArgument(format!("unsupported filter key: {key}")));
        }

        for part in values.split(',').filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((lo, hi)) => {
                    let lo: i64 = lo
                        .parse()
                        .map_err(|_| Error::InvalidArgument(format!("invalid id range start: {lo}")))?;
                    let hi: i64 = hi
                        .parse()
                        .map_err(|_| Error::InvalidArgument(format!("invalid id range end: {hi}")))?;
                    if lo > hi {
                        return Err(Error::InvalidArgument(format!("invalid id range {lo}-{hi}")));
                    }
                    ids.extend(lo..=hi);
                }
                None => {
                    let id: i64 = part
                        .parse()
                        .map_err(|_| Error::InvalidArgument(format!("invalid id: {part}")))?;
                    ids.push(id);
                }
            }
        }
    }

    if ids.is_empty() {
        return Err(Error::InvalidArgument("filter matched no ids".into()));
    }

    Ok(IdFilter { ids })
}

/// Validates `kind` is the one entity kind the standalone CLI flows
/// support today.
pub fn require_video_kind(kind: &str) -> Result<EntityKind> {
    match EntityKind::from_item_name(kind) {
        Some(EntityKind::Video) => Ok(EntityKind::Video),
        Some(_) => Err(Error::InvalidArgument(format!("unsupported kind for this command: {kind}"))),
        None => Err(Error::InvalidArgument(format!("unknown entity kind: {kind}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_ids() {
        let filter = parse_id_filter("id=1,2,3").unwrap();
        assert_eq!(filter.ids, vec![1, 2, 3]);
    }

    #[test]
    fn expands_id_ranges() {
        let filter = parse_id_filter("id=5-7").unwrap();
        assert_eq!(filter.ids, vec![5, 6, 7]);
    }

    #[test]
    fn rejects_unsupported_filter_key() {
        assert!(parse_id_filter("name=foo").is_err());
    }

    #[test]
    fn rejects_empty_filter() {
        assert!(parse_id_filter("id=").is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(parse_id_filter("id=9-1").is_err());
    }

    #[test]
    fn accepts_only_video_kind() {
        assert!(require_video_kind("video").is_ok());
        assert!(require_video_kind("video_show").is_err());
        assert!(require_video_kind("bogus").is_err());
    }
}
