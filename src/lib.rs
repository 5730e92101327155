//! Frinky - Frinkiac screenshots rendered as ASCII art in the terminal
//!
//! This crate resolves frames from a television-screenshot search API (random,
//! quote search, or an explicit episode/timestamp), walks the API's "nearby"
//! links to cover a time range, converts each image into a block of text
//! characters and plays the result back with captions.

pub mod api;
pub mod cli;
pub mod config;
pub mod converter;
pub mod decoder;
pub mod playback;
pub mod renderer;
pub mod sequence;

pub use api::{FrameSource, FrinkiacClient, DEFAULT_API_BASE};
pub use cli::Cli;
pub use config::Settings;
pub use converter::{render, AsciiFrame, ConversionConfig, FrameConverter, WIDTH_CORRECTION};
pub use decoder::decode_image;
pub use playback::{caption_index, run_until, PlaybackOptions};
pub use renderer::{calculate_frame_delay, DisplaySink, TerminalRenderer};
pub use sequence::{
    FrameLocator, FrameRecord, Match, SearchMode, SearchOutcome, SearchState, SequenceController,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

/// Long character ramp, lightest to darkest
pub const FRINKIAC_RAMP: &[char] = &[
    ' ', '.', '"', '`', '^', ',', ':', ';', 'I', 'l', '!', 'i', '~', '+', '_',
    '-', '?', ']', '[', '}', '{', '1', ')', '(', '|', '\\', '/', 't', 'f', 'j',
    'r', 'x', 'n', 'u', 'v', 'c', 'z', 'X', 'Y', 'U', 'J', 'C', 'L', 'Q', '0',
    'O', 'Z', 'm', 'w', 'q', 'p', 'd', 'b', 'k', 'h', 'a', 'o', '*', '#', 'M',
    'W', '&', '8', '%', 'B', '@', '$',
];

/// Classic asciinator ramp
pub const CLASSIC_ASCII_RAMP: &[char] = &[
    ' ', '.', ',', ':', ';', 'i', 'r', 's', 'X', 'A', '2', '5', '3', 'h', 'M',
    'H', 'G', 'S', '#', '9', 'B', '&', '@',
];

/// Short ramp for narrow renders
pub const DEFAULT_ASCII_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Block character ramp for a more solid appearance
pub const BLOCK_ASCII_RAMP: &[char] = &[' ', '░', '▒', '▓', '█'];

/// Ramps selectable by index (`--ramp`)
pub const RAMPS: &[&[char]] = &[
    FRINKIAC_RAMP,
    CLASSIC_ASCII_RAMP,
    DEFAULT_ASCII_RAMP,
    BLOCK_ASCII_RAMP,
];

/// Error types used throughout the application
#[derive(thiserror::Error, Debug)]
pub enum FrinkyError {
    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image decoding error: {0}")]
    ImageDecoding(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, FrinkyError>;

/// Utility functions
pub mod utils {
    use super::*;

    /// Look up a character ramp by its `--ramp` index
    pub fn ramp_by_index(index: usize) -> Option<&'static [char]> {
        RAMPS.get(index).copied()
    }

    /// Format a millisecond timestamp as `m:ss.mmm` (or `h:mm:ss.mmm`)
    pub fn format_timestamp(millis: i64) -> String {
        let millis = millis.max(0);
        let total_seconds = millis / 1000;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;
        let ms = millis % 1000;

        if hours > 0 {
            format!("{}:{:02}:{:02}.{:03}", hours, minutes, secs, ms)
        } else {
            format!("{}:{:02}.{:03}", minutes, secs, ms)
        }
    }

    /// Convert seconds to whole milliseconds, rounding down
    pub fn seconds_to_millis(seconds: f64) -> i64 {
        (seconds * 1000.0).floor() as i64
    }

    /// Strip everything but ASCII letters, digits and spaces from a search query
    pub fn sanitize_query(text: &str) -> String {
        text.chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
            .collect()
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        caption_index, calculate_frame_delay, decode_image, render,
        utils::*,
        AsciiFrame, Cli, ConversionConfig, DisplaySink, FrameConverter, FrameLocator,
        FrameRecord, FrameSource, FrinkiacClient, FrinkyError, Match, PlaybackOptions, Result,
        SearchMode, SearchOutcome, SearchState, SequenceController, Settings, TerminalRenderer,
        RAMPS,
    };
}
