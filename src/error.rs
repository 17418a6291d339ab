//! Error types for the library seams.
//!
//! The binary pipeline works with `anyhow::Result`; the loader, the
//! aggregator entry point and the enrichment client return these typed
//! errors so callers can tell the failure modes apart.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the pattern aggregator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// No record collection was supplied at all.
    #[error("no record collection supplied for analysis")]
    MissingInput,
}

/// Errors raised while discovering and reading export files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("input not found: {0}")]
    NotFound(PathBuf),

    #[error("no CSV files found in {0}")]
    NoCsvFiles(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Neither a track nor an artist column could be mapped.
    #[error("{path} has no usable track or artist column (found: {found})")]
    MissingColumns { path: PathBuf, found: String },
}

/// Errors raised by the audio-feature enrichment client.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Spotify credentials not configured (set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET)")]
    MissingCredentials,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Parse(String),
}
