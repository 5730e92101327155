//! Remote screenshot service.
//!
//! [`FrameSource`] is the seam between the sequence controller and the network:
//! the controller only ever sees `Option` results, so a failed lookup is an
//! ordinary "no result" rather than an error. [`FrinkiacClient`] implements it
//! against the live JSON API.

use crate::decoder::decode_image;
use crate::sequence::{FrameLocator, FrameRecord, Match};
use crate::{FrinkyError, Result};
use async_trait::async_trait;
use image::DynamicImage;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Default API host
pub const DEFAULT_API_BASE: &str = "https://frinkiac.com";

/// Source of frames, captions and images
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// A server-chosen frame
    async fn random_frame(&self) -> Option<FrameLocator>;

    /// The frame at a locator, with its captions and nearby timestamps
    async fn frame_at(&self, locator: &FrameLocator) -> Option<FrameRecord>;

    /// Frames whose captions match a quote, best match first
    async fn search_quote(&self, query: &str) -> Option<Vec<Match>>;

    /// URL of the still image for a locator
    fn image_url(&self, locator: &FrameLocator) -> String;

    /// Download and decode an image
    async fn fetch_image(&self, url: &str) -> Result<DynamicImage>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FrameDto {
    episode: String,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubtitleDto {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EpisodeDto {
    #[serde(default)]
    title: Option<String>,
}

/// Body of `/api/random` and `/api/caption`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CaptionResponse {
    frame: FrameDto,
    #[serde(default)]
    subtitles: Vec<SubtitleDto>,
    #[serde(default)]
    nearby: Vec<FrameDto>,
    #[serde(default)]
    episode: Option<EpisodeDto>,
}

impl CaptionResponse {
    fn into_record(self) -> Result<FrameRecord> {
        let locator = FrameLocator::from_episode_key(&self.frame.episode, self.frame.timestamp)?;
        Ok(FrameRecord {
            locator,
            captions: self.subtitles.into_iter().map(|s| s.content).collect(),
            nearby: self.nearby.into_iter().map(|f| f.timestamp).collect(),
            title: self.episode.and_then(|e| e.title),
        })
    }
}

/// HTTP client for the Frinkiac API
#[derive(Debug, Clone)]
pub struct FrinkiacClient {
    http: Client,
    base: String,
}

impl FrinkiacClient {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, base))
    }

    pub fn with_client(http: Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { http, base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Send a request and decode its JSON body. Transport failures, non-success
    /// statuses and undecodable bodies all come back as `None`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Option<T> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("{} request failed: {}", what, e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned status {}", what, status);
            return None;
        }

        match response.json::<T>().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!("{} returned an unreadable body: {}", what, e);
                None
            }
        }
    }

    fn record_from(response: CaptionResponse, what: &str) -> Option<FrameRecord> {
        match response.into_record() {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("{} returned an unusable frame: {}", what, e);
                None
            }
        }
    }
}

#[async_trait]
impl FrameSource for FrinkiacClient {
    async fn random_frame(&self) -> Option<FrameLocator> {
        let request = self.http.get(format!("{}/api/random", self.base));
        let response: CaptionResponse = self.get_json(request, "Random frame").await?;
        let record = Self::record_from(response, "Random frame")?;
        debug!("Random frame resolved to {}", record.locator);
        Some(record.locator)
    }

    async fn frame_at(&self, locator: &FrameLocator) -> Option<FrameRecord> {
        let request = self
            .http
            .get(format!("{}/api/caption", self.base))
            .query(&[
                ("e", locator.episode_key()),
                ("t", locator.timestamp.to_string()),
            ]);
        let response: CaptionResponse = self.get_json(request, "Caption lookup").await?;
        Self::record_from(response, "Caption lookup")
    }

    async fn search_quote(&self, query: &str) -> Option<Vec<Match>> {
        let request = self
            .http
            .get(format!("{}/api/search", self.base))
            .query(&[("q", query)]);
        let frames: Vec<FrameDto> = self.get_json(request, "Quote search").await?;
        Some(
            frames
                .into_iter()
                .enumerate()
                .map(|(index, frame)| Match {
                    episode: frame.episode,
                    timestamp: frame.timestamp,
                    index,
                })
                .collect(),
        )
    }

    fn image_url(&self, locator: &FrameLocator) -> String {
        format!(
            "{}/img/{}/{}.jpg",
            self.base,
            locator.episode_key(),
            locator.timestamp
        )
    }

    async fn fetch_image(&self, url: &str) -> Result<DynamicImage> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FrinkyError::RemoteUnavailable(format!(
                "image {} returned status {}",
                url, status
            )));
        }
        let bytes = response.bytes().await?;
        decode_image(&bytes)
    }
}
