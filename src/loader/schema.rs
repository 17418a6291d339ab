//! Column mapping and schema validation for Exportify exports.
//!
//! Exports come from several tools and Exportify versions, so each field is
//! looked up through a list of header aliases. The first alias present wins.

use crate::models::SchemaCheck;

/// Columns produced by a standard Exportify export.
pub const EXPORTIFY_COLUMNS: [&str; 19] = [
    "Track URI",
    "Track Name",
    "Artist URI(s)",
    "Artist Name(s)",
    "Album URI",
    "Album Name",
    "Album Artist URI(s)",
    "Album Artist Name(s)",
    "Album Release Date",
    "Album Image URL",
    "Disc Number",
    "Track Number",
    "Track Duration (ms)",
    "Track Preview URL",
    "Explicit",
    "Popularity",
    "ISRC",
    "Added By",
    "Added At",
];

const TRACK_NAME: &[&str] = &["Track Name", "track_name", "name", "song"];
const ARTIST_NAME: &[&str] = &["Artist Name(s)", "artist_name", "artist", "Artist Name"];
const ALBUM_NAME: &[&str] = &["Album Name", "album_name", "album"];
const PLAYLIST: &[&str] = &["Playlist Name", "playlist_name", "playlist"];
const ADDED_AT: &[&str] = &["Added At", "added_at", "date_added", "timestamp"];
const TRACK_ID: &[&str] = &["Track URI", "track_uri", "uri", "Track ID", "id"];
const DURATION_MS: &[&str] = &["Track Duration (ms)", "Duration (ms)", "duration_ms"];
const POPULARITY: &[&str] = &["Popularity", "popularity", "play_count"];

const VALENCE: &[&str] = &["Valence", "valence"];
const ENERGY: &[&str] = &["Energy", "energy"];
const DANCEABILITY: &[&str] = &["Danceability", "danceability"];
const ACOUSTICNESS: &[&str] = &["Acousticness", "acousticness"];
const INSTRUMENTALNESS: &[&str] = &["Instrumentalness", "instrumentalness"];
const LIVENESS: &[&str] = &["Liveness", "liveness"];
const SPEECHINESS: &[&str] = &["Speechiness", "speechiness"];
const TEMPO: &[&str] = &["Tempo", "tempo"];
const SENTIMENT: &[&str] = &["Sentiment", "sentiment", "lyric_polarity"];

/// Header positions for every field the cleaner understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub track_name: Option<usize>,
    pub artist_name: Option<usize>,
    pub album_name: Option<usize>,
    pub playlist: Option<usize>,
    pub added_at: Option<usize>,
    pub track_id: Option<usize>,
    pub duration_ms: Option<usize>,
    pub popularity: Option<usize>,
    pub valence: Option<usize>,
    pub energy: Option<usize>,
    pub danceability: Option<usize>,
    pub acousticness: Option<usize>,
    pub instrumentalness: Option<usize>,
    pub liveness: Option<usize>,
    pub speechiness: Option<usize>,
    pub tempo: Option<usize>,
    pub sentiment: Option<usize>,
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| h.trim() == *alias))
}

impl ColumnMap {
    /// Resolve field positions from a header row.
    pub fn from_headers(headers: &[String]) -> Self {
        Self {
            track_name: find_column(headers, TRACK_NAME),
            artist_name: find_column(headers, ARTIST_NAME),
            album_name: find_column(headers, ALBUM_NAME),
            playlist: find_column(headers, PLAYLIST),
            added_at: find_column(headers, ADDED_AT),
            track_id: find_column(headers, TRACK_ID),
            duration_ms: find_column(headers, DURATION_MS),
            popularity: find_column(headers, POPULARITY),
            valence: find_column(headers, VALENCE),
            energy: find_column(headers, ENERGY),
            danceability: find_column(headers, DANCEABILITY),
            acousticness: find_column(headers, ACOUSTICNESS),
            instrumentalness: find_column(headers, INSTRUMENTALNESS),
            liveness: find_column(headers, LIVENESS),
            speechiness: find_column(headers, SPEECHINESS),
            tempo: find_column(headers, TEMPO),
            sentiment: find_column(headers, SENTIMENT),
        }
    }

    /// At least one identity column (track or artist name) was found.
    pub fn has_identity(&self) -> bool {
        self.track_name.is_some() || self.artist_name.is_some()
    }
}

/// Compare a header row against the standard Exportify columns.
///
/// Missing columns make the check invalid but never stop loading; extra
/// columns are preserved and only noted.
pub fn validate_exportify_schema(source: &str, headers: &[String]) -> SchemaCheck {
    let present = |name: &str| headers.iter().any(|h| h.trim() == name);

    let missing_columns: Vec<String> = EXPORTIFY_COLUMNS
        .iter()
        .filter(|c| !present(**c))
        .map(|c| c.to_string())
        .collect();

    let extra_columns: Vec<String> = headers
        .iter()
        .map(|h| h.trim())
        .filter(|h| !EXPORTIFY_COLUMNS.contains(h))
        .map(String::from)
        .collect();

    let mut recommendations = Vec::new();
    if !missing_columns.is_empty() {
        recommendations.push(format!(
            "Missing {} expected columns. Check Exportify export settings.",
            missing_columns.len()
        ));
    }
    if !extra_columns.is_empty() {
        recommendations.push(format!(
            "Found {} unexpected columns. These will be preserved.",
            extra_columns.len()
        ));
    }

    SchemaCheck {
        source: source.to_string(),
        is_valid: missing_columns.is_empty(),
        missing_columns,
        extra_columns,
        recommendations,
    }
}
