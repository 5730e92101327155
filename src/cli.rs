use crate::converter::ConversionConfig;
use crate::playback::PlaybackOptions;
use crate::sequence::FrameLocator;
use crate::utils::{ramp_by_index, sanitize_query};
use crate::{Settings, RAMPS};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Show a random frame (the default when no quote or episode is given)
    #[arg(short, long, conflicts_with_all = ["quote", "episode"])]
    pub random: bool,

    /// Search for a frame by quote
    #[arg(short, long, conflicts_with = "episode")]
    pub quote: Option<String>,

    /// Episode key, e.g. S05E10
    #[arg(short, long, requires = "timestamp")]
    pub episode: Option<String>,

    /// Timestamp within the episode, in milliseconds
    #[arg(short, long, requires = "episode")]
    pub timestamp: Option<i64>,

    /// Extend the sequence up to this timestamp (milliseconds)
    #[arg(long, requires = "episode", conflicts_with = "duration")]
    pub end: Option<i64>,

    /// Extend the sequence by this many seconds
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Seconds of frames to include before the resolved frame
    #[arg(long, default_value_t = 0.0)]
    pub lead_in: f64,

    /// Output width in characters
    #[arg(short, long)]
    pub width: Option<u32>,

    /// Contrast exponent (1.0 = linear, higher darkens midtones)
    #[arg(short = 'g', long)]
    pub contrast: Option<f64>,

    /// Character ramp index (0 = long, 1 = classic, 2 = short, 3 = blocks)
    #[arg(long)]
    pub ramp: Option<usize>,

    /// Play the sequence as an animation
    #[arg(short, long)]
    pub animate: bool,

    /// Seconds between animation frames
    #[arg(short, long)]
    pub interval: Option<f64>,

    /// Number of times to play the animation (0 = forever)
    #[arg(short, long, default_value_t = 1)]
    pub loops: u32,

    /// Which quote match to use (out-of-range values are clamped)
    #[arg(short = 'n', long, default_value_t = 0, allow_negative_numbers = true)]
    pub index: i64,

    /// List quote matches with their index instead of rendering
    #[arg(short, long, requires = "quote")]
    pub preview: bool,

    /// Caption to show instead of the fetched subtitles
    #[arg(short, long)]
    pub caption: Option<String>,

    /// Show server subtitles for quote searches instead of the quote
    #[arg(long)]
    pub subtitles: bool,

    /// Hide captions
    #[arg(long)]
    pub no_caption: bool,

    /// Show episode and timestamp under each frame
    #[arg(long)]
    pub info: bool,

    /// Base URL of the screenshot API
    #[arg(long, value_name = "URL")]
    pub api_base: Option<String>,

    /// JSON file with default settings
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// The search the command line asks for
#[derive(Debug, Clone, PartialEq)]
pub enum SearchRequest {
    Random,
    Quote(String),
    Exact(FrameLocator, Option<i64>),
}

impl Cli {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<(), String> {
        if let Some(width) = self.width {
            if width == 0 {
                return Err("Width must be greater than 0".to_string());
            }
        }

        if let Some(contrast) = self.contrast {
            if !contrast.is_finite() || contrast <= 0.0 {
                return Err("Contrast must be greater than 0".to_string());
            }
        }

        if let Some(ramp) = self.ramp {
            if ramp_by_index(ramp).is_none() {
                return Err(format!("Ramp must be between 0 and {}", RAMPS.len() - 1));
            }
        }

        if let Some(interval) = self.interval {
            if !interval.is_finite() || interval < 0.0 {
                return Err("Interval must not be negative".to_string());
            }
        }

        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration <= 0.0 {
                return Err("Duration must be greater than 0".to_string());
            }
        }

        if !self.lead_in.is_finite() || self.lead_in < 0.0 {
            return Err("Lead-in must not be negative".to_string());
        }

        if let Some(timestamp) = self.timestamp {
            if timestamp < 0 {
                return Err("Timestamp must not be negative".to_string());
            }
            if let Some(end) = self.end {
                if end < timestamp {
                    return Err("End timestamp must not be before the start timestamp".to_string());
                }
            }
        }

        self.search_request().map(|_| ())
    }

    /// Work out which search mode the flags select
    pub fn search_request(&self) -> Result<SearchRequest, String> {
        if let Some(quote) = &self.quote {
            if sanitize_query(quote).trim().is_empty() {
                return Err("Quote must contain letters or digits".to_string());
            }
            return Ok(SearchRequest::Quote(quote.clone()));
        }

        match (&self.episode, self.timestamp) {
            (Some(key), Some(timestamp)) => {
                let locator =
                    FrameLocator::from_episode_key(key, timestamp).map_err(|e| e.to_string())?;
                Ok(SearchRequest::Exact(locator, self.end))
            }
            _ => Ok(SearchRequest::Random),
        }
    }

    /// Settings loaded from the config file with command-line overrides applied
    pub fn apply_overrides(&self, mut settings: Settings) -> Settings {
        if let Some(api_base) = &self.api_base {
            settings.api_base = api_base.clone();
        }
        if let Some(width) = self.width {
            settings.width = width;
        }
        if let Some(contrast) = self.contrast {
            settings.contrast = contrast;
        }
        if let Some(ramp) = self.ramp {
            settings.ramp = ramp;
        }
        if let Some(interval) = self.interval {
            settings.interval = interval;
        }
        settings
    }

    pub fn conversion_config(&self, settings: &Settings) -> ConversionConfig {
        ConversionConfig {
            width: settings.width,
            contrast: settings.contrast,
            ascii_chars: ramp_by_index(settings.ramp)
                .unwrap_or(RAMPS[0])
                .to_vec(),
        }
    }

    pub fn playback_options(&self, settings: &Settings) -> PlaybackOptions {
        PlaybackOptions {
            animated: self.animate,
            interval: settings.interval,
            loop_count: self.loops,
            show_caption: !self.no_caption,
            show_info: self.info,
            ..Default::default()
        }
    }
}
