use crate::converter::AsciiFrame;
use crate::renderer::{calculate_frame_delay, DisplaySink};
use crate::Result;
use log::{debug, info, warn};
use std::future::Future;
use tokio::time::sleep;

/// How a rendered sequence is shown
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackOptions {
    /// First frame to show
    pub start: usize,
    /// One past the last frame to animate; defaults to the frame count
    pub end: Option<usize>,
    pub animated: bool,
    /// Seconds between animation frames
    pub interval: f64,
    /// Passes over the range; 0 loops forever
    pub loop_count: u32,
    pub show_caption: bool,
    pub show_info: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            start: 0,
            end: None,
            animated: false,
            interval: 0.2,
            loop_count: 1,
            show_caption: true,
            show_info: false,
        }
    }
}

/// Caption for an animation frame. Captions are spread evenly over the
/// frames: `frame_index * caption_count / frame_count`, clamped to the last
/// caption.
pub fn caption_index(
    frame_index: usize,
    frame_count: usize,
    caption_count: usize,
) -> Option<usize> {
    if caption_count == 0 || frame_count == 0 {
        return None;
    }
    Some((frame_index * caption_count / frame_count).min(caption_count - 1))
}

/// Caption for a still frame: the matching caption when there is one per
/// frame, otherwise the first.
pub fn still_caption_index(
    frame_index: usize,
    frame_count: usize,
    caption_count: usize,
) -> Option<usize> {
    match caption_count {
        0 => None,
        n if n == frame_count => Some(frame_index),
        _ => Some(0),
    }
}

/// Show rendered frames through a display sink, once or as a timed loop
pub async fn play<D: DisplaySink + ?Sized>(
    frames: &[AsciiFrame],
    captions: &[String],
    info: &[String],
    sink: &mut D,
    options: &PlaybackOptions,
) -> Result<()> {
    if frames.is_empty() {
        warn!("No frames to play");
        return Ok(());
    }

    let overlay = move |index: usize, caption: Option<usize>| {
        let caption = caption
            .filter(|_| options.show_caption)
            .and_then(|i| captions.get(i))
            .map(String::as_str);
        let info = if options.show_info {
            info.get(index).map(String::as_str)
        } else {
            None
        };
        (caption, info)
    };

    if !options.animated {
        let index = options.start.min(frames.len() - 1);
        if index != options.start {
            warn!("Start frame {} out of range, showing {}", options.start, index);
        }
        let caption = still_caption_index(index, frames.len(), captions.len());
        let (caption, info) = overlay(index, caption);
        return sink.show(&frames[index], caption, info);
    }

    let end = options.end.unwrap_or(frames.len()).min(frames.len());
    if options.start >= end {
        warn!("Empty playback range {}..{}", options.start, end);
        return Ok(());
    }

    let delay = calculate_frame_delay(options.interval);
    let mut pass = 0u32;
    loop {
        for index in options.start..end {
            let caption = caption_index(index, frames.len(), captions.len());
            let (caption, info) = overlay(index, caption);
            sink.clear()?;
            sink.show(&frames[index], caption, info)?;
            sleep(delay).await;
        }

        pass += 1;
        if options.loop_count != 0 && pass >= options.loop_count {
            break;
        }
        debug!("Starting pass {}", pass + 1);
    }

    Ok(())
}

/// Drive playback until it finishes or `interrupt` resolves first.
/// Returns `true` when playback was cut short.
pub async fn run_until<P, I>(playback: P, interrupt: I) -> Result<bool>
where
    P: Future<Output = Result<()>>,
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = interrupt => {
            info!("Playback interrupted");
            Ok(true)
        }
        result = playback => result.map(|_| false),
    }
}
