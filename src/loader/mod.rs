//! Playlist export discovery and loading.
//!
//! This module finds export files, reads them with the `csv` crate,
//! resolves their columns and hands the rows to the cleaner. The result is
//! one deduplicated record collection across every source file.

pub mod cleaner;
pub mod schema;

pub use cleaner::CleanOptions;

use crate::error::LoadError;
use crate::models::{CleanReport, ListeningRecord, SchemaCheck};
use cleaner::{clean_records, parse_rows};
use schema::{validate_exportify_schema, ColumnMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A raw export read into memory.
#[derive(Debug, Clone)]
pub struct RawExport {
    pub source: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// At least one field was not valid UTF-8 and was decoded as Latin-1.
    pub latin1_fallback: bool,
}

/// The cleaned collection plus what happened while building it.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub records: Vec<ListeningRecord>,
    pub cleaning: CleanReport,
    pub schema: Vec<SchemaCheck>,
    pub sources: Vec<String>,
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// Resolve the input path into the list of CSV files to load.
///
/// A file is used as-is. For a directory, every `*.csv` directly inside it
/// is returned in name order; hidden files are skipped.
pub fn discover_sources(input: &Path) -> Result<Vec<PathBuf>, LoadError> {
    if !input.exists() {
        return Err(LoadError::NotFound(input.to_path_buf()));
    }

    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let entries = fs::read_dir(input).map_err(|source| LoadError::Io {
        path: input.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_csv(path))
        .filter(|path| {
            !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
        })
        .collect();

    files.sort();

    if files.is_empty() {
        return Err(LoadError::NoCsvFiles(input.to_path_buf()));
    }

    debug!("Discovered {} CSV files in {}", files.len(), input.display());
    Ok(files)
}

fn decode_field(bytes: &[u8], fallback: &mut bool) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            *fallback = true;
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// Read one export file into memory.
pub fn read_export(path: &Path) -> Result<RawExport, LoadError> {
    info!("Loading export from: {}", path.display());

    let file = fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let csv_error = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut latin1_fallback = false;

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| {
            decode_field(h, &mut latin1_fallback)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_string()
        })
        .collect();

    let mut rows = Vec::new();
    for result in reader.byte_records() {
        let record = result.map_err(csv_error)?;
        rows.push(
            record
                .iter()
                .map(|field| decode_field(field, &mut latin1_fallback))
                .collect::<Vec<_>>(),
        );
    }

    if latin1_fallback {
        warn!(
            "{} is not valid UTF-8, decoded affected fields as Latin-1",
            path.display()
        );
    }

    info!("Loaded {} rows from {}", rows.len(), path.display());

    Ok(RawExport {
        source: path.to_path_buf(),
        headers,
        rows,
        latin1_fallback,
    })
}

/// Playlist name for rows that do not carry one: the export's file stem.
fn playlist_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load, validate and clean every export under `input`.
///
/// Records from all sources are concatenated in source order before
/// deduplication, so a track that appears in two playlists is kept once.
pub fn load_dataset(input: &Path, options: &CleanOptions) -> Result<LoadedDataset, LoadError> {
    let paths = discover_sources(input)?;

    let mut parsed: Vec<ListeningRecord> = Vec::new();
    let mut schema = Vec::new();
    let mut sources = Vec::new();
    let mut unparseable_dates = 0;

    for path in &paths {
        let raw = read_export(path)?;
        let name = raw.source.display().to_string();

        let columns = ColumnMap::from_headers(&raw.headers);
        if !columns.has_identity() {
            return Err(LoadError::MissingColumns {
                path: raw.source.clone(),
                found: raw.headers.join(", "),
            });
        }

        let mut check = validate_exportify_schema(&name, &raw.headers);
        if raw.latin1_fallback {
            check
                .recommendations
                .push("File is not valid UTF-8. Text was decoded as Latin-1.".to_string());
        }
        if !check.is_valid {
            warn!(
                "{} is missing {} Exportify columns",
                name,
                check.missing_columns.len()
            );
        }
        schema.push(check);

        let (mut records, bad_dates) = parse_rows(&raw.rows, &columns);
        unparseable_dates += bad_dates;

        let playlist = playlist_from_path(&raw.source);
        for record in records.iter_mut().filter(|r| r.playlist_name.is_none()) {
            record.playlist_name = Some(playlist.clone());
        }

        parsed.extend(records);
        sources.push(name);
    }

    let (records, mut cleaning) = clean_records(parsed, options);
    cleaning.unparseable_dates = unparseable_dates;

    info!(
        "Data cleaning complete. Final dataset: {} rows from {} file(s)",
        records.len(),
        sources.len()
    );

    Ok(LoadedDataset {
        records,
        cleaning,
        schema,
        sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;
    use std::io::Write;
    use tempfile::TempDir;

    fn fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/sample_export.csv")
    }

    #[test]
    fn test_load_fixture_export() {
        let dataset = load_dataset(&fixture(), &CleanOptions::default()).unwrap();

        assert_eq!(dataset.sources.len(), 1);
        assert_eq!(dataset.cleaning.raw_rows, 9);
        assert_eq!(dataset.cleaning.duplicates_removed, 1);
        assert_eq!(dataset.cleaning.incomplete_removed, 1);
        assert_eq!(dataset.cleaning.unparseable_dates, 1);
        assert_eq!(dataset.cleaning.kept, 7);
        assert_eq!(dataset.records.len(), 7);

        let first = &dataset.records[0];
        assert_eq!(first.track_id.as_deref(), Some("4uLU6hMCjMI75M1A2tKUQC"));
        assert_eq!(first.name_for(EntityKind::Artist), Some("Rick Astley"));
        assert_eq!(first.duration_ms, Some(213573));
        assert_eq!(first.features.valence, Some(0.918));
        assert_eq!(first.playlist_name.as_deref(), Some("sample_export"));

        // Extra audio-feature columns are noted but the export is complete
        let check = &dataset.schema[0];
        assert!(check.is_valid);
        assert_eq!(check.extra_columns, vec!["Valence", "Energy"]);
    }

    #[test]
    fn test_directory_input_merges_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let write = |name: &str, body: &str| {
            let mut f = fs::File::create(dir.path().join(name)).unwrap();
            f.write_all(body.as_bytes()).unwrap();
        };
        write("b.csv", "track_name,artist_name\nSong,Band\nOther,Band\n");
        write("a.csv", "track_name,artist_name\nSong,Band\nFirst,Solo\n");
        write(".hidden.csv", "track_name,artist_name\nX,Y\n");
        write("notes.txt", "not a csv");

        let sources = discover_sources(dir.path()).unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].ends_with("a.csv"));

        let dataset = load_dataset(dir.path(), &CleanOptions::default()).unwrap();
        assert_eq!(dataset.cleaning.raw_rows, 4);
        assert_eq!(dataset.cleaning.duplicates_removed, 1);
        let tracks: Vec<_> = dataset
            .records
            .iter()
            .filter_map(|r| r.track_name.as_deref())
            .collect();
        assert_eq!(tracks, vec!["Song", "First", "Other"]);
        assert!(!dataset.schema[0].is_valid);

        // without a playlist column each file stands in as its own playlist
        let playlists: Vec<_> = dataset
            .records
            .iter()
            .filter_map(|r| r.playlist_name.as_deref())
            .collect();
        assert_eq!(playlists, vec!["a", "a", "b"]);
    }

    #[test]
    fn test_playlist_column_overrides_file_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("liked.csv");
        fs::write(
            &path,
            "Track Name,Artist Name(s),Playlist Name
Song,Band,Gym
Other,Band,
",
        )
        .unwrap();

        let dataset = load_dataset(&path, &CleanOptions::default()).unwrap();
        assert_eq!(dataset.records[0].playlist_name.as_deref(), Some("Gym"));
        assert_eq!(dataset.records[1].playlist_name.as_deref(), Some("liked"));
    }

    #[test]
    fn test_latin1_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin.csv");
        let mut bytes = b"Track Name,Artist Name(s)\nCaf".to_vec();
        bytes.push(0xE9); // 'é' in Latin-1
        bytes.extend_from_slice(b",Band\n");
        fs::write(&path, bytes).unwrap();

        let raw = read_export(&path).unwrap();
        assert!(raw.latin1_fallback);
        assert_eq!(raw.rows[0][0], "Café");

        let dataset = load_dataset(&path, &CleanOptions::default()).unwrap();
        assert!(dataset.schema[0]
            .recommendations
            .iter()
            .any(|r| r.contains("Latin-1")));
    }

    #[test]
    fn test_missing_identity_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weird.csv");
        fs::write(&path, "foo,bar\n1,2\n").unwrap();

        let err = load_dataset(&path, &CleanOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumns { .. }));
    }

    #[test]
    fn test_missing_input_and_empty_directory() {
        let dir = TempDir::new().unwrap();

        let err = discover_sources(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));

        let err = discover_sources(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::NoCsvFiles(_)));
    }

    #[test]
    fn test_header_only_file_is_empty_dataset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "Track Name,Artist Name(s)\n").unwrap();

        let dataset = load_dataset(&path, &CleanOptions::default()).unwrap();
        assert!(dataset.records.is_empty());
        assert_eq!(dataset.cleaning, CleanReport::default());
    }
}
