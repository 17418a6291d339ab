//! Spotify Web API client for audio features.

use super::FeatureSource;
use crate::error::EnrichError;
use crate::models::AudioFeatures;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for the Spotify Web API.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: String,
    pub api_url: String,
    pub timeout_seconds: u64,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            api_url: "https://api.spotify.com/v1".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl SpotifyConfig {
    /// Both halves of the client credentials are present and non-empty.
    pub fn has_credentials(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.client_id) && set(&self.client_secret)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AudioFeaturesResponse {
    audio_features: Vec<Option<ApiAudioFeatures>>,
}

/// One entry of the `audio-features` response.
#[derive(Debug, Deserialize)]
struct ApiAudioFeatures {
    valence: Option<f64>,
    energy: Option<f64>,
    danceability: Option<f64>,
    acousticness: Option<f64>,
    instrumentalness: Option<f64>,
    liveness: Option<f64>,
    speechiness: Option<f64>,
    tempo: Option<f64>,
}

impl From<ApiAudioFeatures> for AudioFeatures {
    fn from(api: ApiAudioFeatures) -> Self {
        AudioFeatures {
            valence: api.valence,
            energy: api.energy,
            danceability: api.danceability,
            acousticness: api.acousticness,
            instrumentalness: api.instrumentalness,
            liveness: api.liveness,
            speechiness: api.speechiness,
            tempo: api.tempo,
            sentiment: None,
        }
    }
}

fn parse_features(body: &str, expected: usize) -> Result<Vec<Option<AudioFeatures>>, EnrichError> {
    let response: AudioFeaturesResponse =
        serde_json::from_str(body).map_err(|e| EnrichError::Parse(e.to_string()))?;

    if response.audio_features.len() != expected {
        return Err(EnrichError::Parse(format!(
            "expected {} audio feature entries, got {}",
            expected,
            response.audio_features.len()
        )));
    }

    Ok(response
        .audio_features
        .into_iter()
        .map(|entry| entry.map(AudioFeatures::from))
        .collect())
}

/// Authenticated client using the client-credentials flow.
pub struct SpotifyClient {
    http_client: reqwest::Client,
    api_url: String,
    access_token: String,
}

impl SpotifyClient {
    /// Build the HTTP client and exchange the credentials for a token.
    pub async fn connect(config: &SpotifyConfig) -> Result<Self, EnrichError> {
        let (Some(client_id), Some(client_secret)) = (&config.client_id, &config.client_secret)
        else {
            return Err(EnrichError::MissingCredentials);
        };
        if !config.has_credentials() {
            return Err(EnrichError::MissingCredentials);
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        debug!("Requesting Spotify access token from {}", config.token_url);

        let response = http_client
            .post(&config.token_url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Api { status, body });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::Parse(e.to_string()))?;

        info!("Authenticated with Spotify");

        Ok(Self {
            http_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: token.access_token,
        })
    }
}

impl FeatureSource for SpotifyClient {
    async fn fetch_features(
        &self,
        ids: &[String],
    ) -> Result<Vec<Option<AudioFeatures>>, EnrichError> {
        let url = format!("{}/audio-features", self.api_url);
        debug!("GET {} for {} ids", url, ids.len());

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("ids", ids.join(","))])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EnrichError::Api {
                status: status.as_u16(),
                body,
            });
        }

        parse_features(&body, ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_features_keeps_order_and_gaps() {
        let body = r#"{
            "audio_features": [
                {"id": "a", "valence": 0.9, "energy": 0.5, "tempo": 113.3, "key": 8},
                null,
                {"id": "c", "valence": 0.0}
            ]
        }"#;

        let features = parse_features(body, 3).unwrap();
        assert_eq!(features.len(), 3);

        let first = features[0].unwrap();
        assert_eq!(first.valence, Some(0.9));
        assert_eq!(first.tempo, Some(113.3));
        assert_eq!(first.danceability, None);
        assert_eq!(first.sentiment, None);

        assert!(features[1].is_none());
        assert_eq!(features[2].unwrap().valence, Some(0.0));
    }

    #[test]
    fn test_parse_features_rejects_length_mismatch() {
        let body = r#"{"audio_features": [null]}"#;
        let err = parse_features(body, 2).unwrap_err();
        assert!(matches!(err, EnrichError::Parse(_)));
    }

    #[test]
    fn test_parse_features_rejects_malformed_body() {
        let err = parse_features("<html>", 1).unwrap_err();
        assert!(matches!(err, EnrichError::Parse(_)));
    }

    #[test]
    fn test_connect_requires_credentials() {
        let config = SpotifyConfig {
            client_id: Some("id".to_string()),
            client_secret: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!config.has_credentials());

        let result = tokio_test::block_on(SpotifyClient::connect(&config));
        assert!(matches!(result, Err(EnrichError::MissingCredentials)));
    }
}
