//! Search state and frame sequences.
//!
//! A [`SequenceController`] turns a search (random, quote or an explicit
//! episode/timestamp) into an ordered run of frames. The remote service only
//! knows each frame's immediate neighbors, so a range is covered by walking
//! those links one lookup at a time.

use crate::api::FrameSource;
use crate::converter::{AsciiFrame, ConversionConfig, FrameConverter};
use crate::playback::{self, PlaybackOptions};
use crate::renderer::DisplaySink;
use crate::utils::{format_timestamp, sanitize_query, seconds_to_millis};
use crate::{FrinkyError, Result};
use image::DynamicImage;
use log::{debug, info, warn};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Address of a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameLocator {
    pub season: u32,
    pub episode: u32,
    /// Milliseconds from the start of the episode
    pub timestamp: i64,
}

impl FrameLocator {
    pub fn new(season: u32, episode: u32, timestamp: i64) -> Result<Self> {
        if season == 0 || episode == 0 {
            return Err(FrinkyError::MalformedInput(format!(
                "season and episode must be positive, got season {} episode {}",
                season, episode
            )));
        }
        Ok(Self {
            season,
            episode,
            timestamp,
        })
    }

    /// Parse an episode key such as `S05E10` into `(season, episode)`
    pub fn parse_episode_key(key: &str) -> Result<(u32, u32)> {
        static EPISODE_KEY_RE: OnceLock<Regex> = OnceLock::new();
        let re = EPISODE_KEY_RE.get_or_init(|| {
            Regex::new(r"^S(\d+)E(\d+)$").expect("episode key regex should compile")
        });

        let invalid = || {
            FrinkyError::MalformedInput(format!(
                "Invalid episode key '{}', expected e.g. S05E10",
                key
            ))
        };
        let caps = re.captures(key.trim()).ok_or_else(invalid)?;
        let season = caps[1].parse().map_err(|_| invalid())?;
        let episode = caps[2].parse().map_err(|_| invalid())?;
        Ok((season, episode))
    }

    pub fn from_episode_key(key: &str, timestamp: i64) -> Result<Self> {
        let (season, episode) = Self::parse_episode_key(key)?;
        Self::new(season, episode, timestamp)
    }

    /// `S05E10` form used by the remote service
    pub fn episode_key(&self) -> String {
        format!("S{:02}E{:02}", self.season, self.episode)
    }

    /// Same episode, different timestamp
    pub fn at(&self, timestamp: i64) -> Self {
        Self { timestamp, ..*self }
    }
}

impl fmt::Display for FrameLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.episode_key(), format_timestamp(self.timestamp))
    }
}

/// One frame as returned by a caption lookup
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub locator: FrameLocator,
    /// Subtitle lines shown around this frame
    pub captions: Vec<String>,
    /// Timestamps of nearby frames, in order, including this one
    pub nearby: Vec<i64>,
    pub title: Option<String>,
}

impl FrameRecord {
    pub fn timestamp(&self) -> i64 {
        self.locator.timestamp
    }

    /// Index of this frame in its own neighbor list, `None` if the service left it out
    pub fn position(&self) -> Option<usize> {
        self.nearby.iter().position(|&ts| ts == self.locator.timestamp)
    }

    pub fn next_timestamp(&self) -> Option<i64> {
        let index = self.position()?;
        self.nearby.get(index + 1).copied()
    }

    pub fn previous_timestamp(&self) -> Option<i64> {
        let index = self.position()?;
        index.checked_sub(1).and_then(|i| self.nearby.get(i).copied())
    }

    pub fn caption_text(&self) -> String {
        self.captions.join("\n")
    }
}

/// One quote search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Episode key, e.g. `S05E10`
    pub episode: String,
    pub timestamp: i64,
    /// Rank in the result list
    pub index: usize,
}

impl Match {
    pub fn locator(&self) -> Result<FrameLocator> {
        FrameLocator::from_episode_key(&self.episode, self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Random,
    Quote {
        text: String,
    },
    Exact {
        locator: FrameLocator,
        end: Option<i64>,
    },
}

/// Immutable snapshot of the active search. Every transition returns a new
/// snapshot; the last known locator survives mode switches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchState {
    pub mode: SearchMode,
    pub last_locator: Option<FrameLocator>,
}

impl SearchState {
    pub fn random(&self) -> Self {
        Self {
            mode: SearchMode::Random,
            last_locator: self.last_locator,
        }
    }

    /// Quote search; the text is stored sanitized
    pub fn quote(&self, text: &str) -> Self {
        Self {
            mode: SearchMode::Quote {
                text: sanitize_query(text),
            },
            last_locator: self.last_locator,
        }
    }

    pub fn exact(&self, locator: FrameLocator, end: Option<i64>) -> Self {
        Self {
            mode: SearchMode::Exact { locator, end },
            last_locator: Some(locator),
        }
    }

    /// End of the requested range, if the state is exact and has one
    pub fn range_end(&self) -> Option<i64> {
        match self.mode {
            SearchMode::Exact { end, .. } => end,
            _ => None,
        }
    }
}

/// Result of one [`SequenceController::search`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A random frame was picked; the controller is now in exact mode
    Resolved(FrameLocator),
    /// A quote search returned this many matches; pick one with `select_match`
    Matches(usize),
    /// The exact frame was fetched and anchors the sequence
    Anchored(FrameLocator),
    NoResult,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Drives a search from mode selection through to playback
pub struct SequenceController<S> {
    source: S,
    converter: FrameConverter,
    state: SearchState,
    duration_ms: Option<i64>,
    matches: Vec<Match>,
    anchor: Option<FrameRecord>,
    records: Vec<FrameRecord>,
    images: Vec<DynamicImage>,
    frames: Vec<AsciiFrame>,
    caption_override: Option<String>,
    query_caption: Option<String>,
    prefer_subtitles: bool,
}

impl<S: FrameSource> SequenceController<S> {
    pub fn new(source: S, config: ConversionConfig) -> Result<Self> {
        Ok(Self {
            source,
            converter: FrameConverter::new(config)?,
            state: SearchState::default(),
            duration_ms: None,
            matches: Vec::new(),
            anchor: None,
            records: Vec::new(),
            images: Vec::new(),
            frames: Vec::new(),
            caption_override: None,
            query_caption: None,
            prefer_subtitles: false,
        })
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn anchor(&self) -> Option<&FrameRecord> {
        self.anchor.as_ref()
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn images(&self) -> &[DynamicImage] {
        &self.images
    }

    pub fn frames(&self) -> &[AsciiFrame] {
        &self.frames
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn set_random(&mut self) {
        self.state = self.state.random();
        self.reset_search();
    }

    pub fn set_quote(&mut self, text: &str) -> Result<()> {
        let state = self.state.quote(text);
        if let SearchMode::Quote { text: sanitized } = &state.mode {
            if sanitized.trim().is_empty() {
                return Err(FrinkyError::MalformedInput(format!(
                    "Quote '{}' has nothing searchable in it",
                    text
                )));
            }
        }
        self.state = state;
        self.reset_search();
        Ok(())
    }

    pub fn set_exact(&mut self, locator: FrameLocator, end: Option<i64>) {
        let end = end.or_else(|| self.duration_end(&locator));
        self.state = self.state.exact(locator, end);
        self.reset_search();
    }

    /// Length of the range to cover from the exact locator. Applies to an
    /// exact search without an explicit end, and to any random frame or quote
    /// match promoted later.
    pub fn set_duration(&mut self, seconds: Option<f64>) {
        self.duration_ms = seconds.map(|s| seconds_to_millis(s.max(0.0)));
        if let SearchMode::Exact { locator, end: None } = self.state.mode {
            let end = self.duration_end(&locator);
            self.state = self.state.exact(locator, end);
        }
    }

    fn duration_end(&self, locator: &FrameLocator) -> Option<i64> {
        self.duration_ms.map(|d| locator.timestamp.saturating_add(d))
    }

    /// Use one caption for every frame instead of the server subtitles
    pub fn set_caption_override(&mut self, text: impl Into<String>) {
        self.caption_override = Some(text.into());
    }

    /// Show server subtitles for quote searches instead of the quote itself
    pub fn prefer_subtitles(&mut self, prefer: bool) {
        self.prefer_subtitles = prefer;
    }

    fn reset_search(&mut self) {
        self.matches.clear();
        self.query_caption = None;
        self.anchor = None;
        self.clear_sequence();
    }

    fn clear_sequence(&mut self) {
        self.records.clear();
        self.images.clear();
        self.frames.clear();
    }

    fn promote(&mut self, locator: FrameLocator) {
        let end = self.duration_end(&locator);
        self.state = self.state.exact(locator, end);
        self.anchor = None;
        self.clear_sequence();
    }

    /// Run the active search against the source
    pub async fn search(&mut self) -> SearchOutcome {
        match self.state.mode.clone() {
            SearchMode::Random => match self.source.random_frame().await {
                Some(locator) => {
                    info!("Random frame: {}", locator);
                    self.promote(locator);
                    SearchOutcome::Resolved(locator)
                }
                None => SearchOutcome::NoResult,
            },
            SearchMode::Quote { text } => match self.source.search_quote(&text).await {
                Some(matches) if !matches.is_empty() => {
                    info!("Quote '{}' matched {} frames", text, matches.len());
                    let count = matches.len();
                    self.matches = matches;
                    SearchOutcome::Matches(count)
                }
                Some(_) => {
                    info!("Quote '{}' matched nothing", text);
                    SearchOutcome::NoResult
                }
                None => SearchOutcome::NoResult,
            },
            SearchMode::Exact { locator, .. } => match self.source.frame_at(&locator).await {
                Some(record) => {
                    debug!("Anchored at {}", record.locator);
                    self.anchor = Some(record);
                    SearchOutcome::Anchored(locator)
                }
                None => SearchOutcome::NoResult,
            },
        }
    }

    /// Promote one quote match to the exact locator. Out-of-range indices are
    /// clamped; returns `Ok(None)` when there are no matches to pick from.
    pub fn select_match(&mut self, index: i64) -> Result<Option<FrameLocator>> {
        if self.matches.is_empty() {
            return Ok(None);
        }

        let last = self.matches.len() as i64 - 1;
        let clamped = index.clamp(0, last) as usize;
        if clamped as i64 != index {
            warn!("Match index {} out of range, using {}", index, clamped);
        }

        let locator = self.matches[clamped].locator()?;
        if let SearchMode::Quote { text } = &self.state.mode {
            self.query_caption = Some(text.to_uppercase());
        }
        self.promote(locator);
        Ok(Some(locator))
    }

    /// Search until an anchor frame is fetched, picking quote match `match_index`
    pub async fn resolve(&mut self, match_index: i64) -> Result<Option<FrameLocator>> {
        loop {
            match self.search().await {
                SearchOutcome::NoResult => return Ok(None),
                SearchOutcome::Resolved(_) => continue,
                SearchOutcome::Matches(_) => {
                    if self.select_match(match_index)?.is_none() {
                        return Ok(None);
                    }
                }
                SearchOutcome::Anchored(locator) => return Ok(Some(locator)),
            }
        }
    }

    /// Walk the neighbor links from the anchor to the end of the requested
    /// range, then back `lead_in_seconds` before it.
    ///
    /// The walk stops early, without error, when the chain runs out or a
    /// lookup fails, so the sequence can be shorter than requested.
    pub async fn build_sequence(&mut self, lead_in_seconds: f64) -> &[FrameRecord] {
        self.clear_sequence();
        let Some(anchor) = self.anchor.clone() else {
            warn!("No anchor frame, nothing to build");
            return &self.records;
        };

        let mut forward = vec![anchor.clone()];
        if let Some(end) = self.state.range_end() {
            let mut current = anchor.clone();
            while current.timestamp() < end {
                let Some(next) = self.step(&current, Direction::Forward).await else {
                    break;
                };
                forward.push(next.clone());
                current = next;
            }
        }

        let mut sequence = Vec::new();
        let lead_in_ms = seconds_to_millis(lead_in_seconds.max(0.0));
        if lead_in_ms > 0 {
            let target = anchor.timestamp().saturating_sub(lead_in_ms);
            let mut current = anchor;
            while current.timestamp() > target {
                let Some(previous) = self.step(&current, Direction::Backward).await else {
                    break;
                };
                sequence.push(previous.clone());
                current = previous;
            }
            sequence.reverse();
        }
        sequence.extend(forward);

        info!("Built sequence of {} frames", sequence.len());
        self.records = sequence;
        &self.records
    }

    async fn step(&self, current: &FrameRecord, direction: Direction) -> Option<FrameRecord> {
        let neighbor = match direction {
            Direction::Forward => current.next_timestamp(),
            Direction::Backward => current.previous_timestamp(),
        };
        let Some(timestamp) = neighbor else {
            debug!("Chain ends at {} going {:?}", current.locator, direction);
            return None;
        };

        let record = self.source.frame_at(&current.locator.at(timestamp)).await?;
        let advanced = match direction {
            Direction::Forward => record.timestamp() > current.timestamp(),
            Direction::Backward => record.timestamp() < current.timestamp(),
        };
        if !advanced {
            debug!("Neighbor of {} did not move {:?}, stopping", current.locator, direction);
            return None;
        }
        Some(record)
    }

    pub fn derive_timestamps(&self) -> Vec<i64> {
        self.records.iter().map(FrameRecord::timestamp).collect()
    }

    pub fn derive_urls(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|record| self.source.image_url(&record.locator))
            .collect()
    }

    /// Download every frame's image, in sequence order
    pub async fn fetch_images(&mut self) -> Result<&[DynamicImage]> {
        let mut images = Vec::with_capacity(self.records.len());
        for url in self.derive_urls() {
            debug!("Fetching {}", url);
            images.push(self.source.fetch_image(&url).await?);
        }
        self.images = images;
        Ok(&self.images)
    }

    pub fn render_all(&mut self) -> Result<&[AsciiFrame]> {
        self.frames = self
            .images
            .iter()
            .map(|image| self.converter.convert_image(image))
            .collect::<Result<Vec<_>>>()?;
        Ok(&self.frames)
    }

    /// Captions to show: the override, the quote for quote searches, or one
    /// block of server subtitles per frame
    pub fn captions(&self) -> Vec<String> {
        if let Some(text) = &self.caption_override {
            return vec![text.clone()];
        }
        if !self.prefer_subtitles {
            if let Some(query) = &self.query_caption {
                return vec![query.clone()];
            }
        }
        self.records.iter().map(FrameRecord::caption_text).collect()
    }

    /// One info line per frame: episode, title, timestamp and position
    pub fn info_lines(&self) -> Vec<String> {
        let total = self.records.len();
        self.records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let title = record
                    .title
                    .as_deref()
                    .map(|t| format!(" \"{}\"", t))
                    .unwrap_or_default();
                format!(
                    "{}{} {} [{}/{}]",
                    record.locator.episode_key(),
                    title,
                    format_timestamp(record.timestamp()),
                    i + 1,
                    total
                )
            })
            .collect()
    }

    pub async fn play<D: DisplaySink + ?Sized>(
        &self,
        sink: &mut D,
        options: &PlaybackOptions,
    ) -> Result<()> {
        let captions = self.captions();
        let info = self.info_lines();
        playback::play(&self.frames, &captions, &info, sink, options).await
    }
}
