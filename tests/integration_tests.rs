use assert_cmd::Command;
use async_trait::async_trait;
use frinky::prelude::*;
use image::{DynamicImage, Rgb, RgbImage};
use predicates::prelude::*;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;

/// In-memory stand-in for the screenshot service: one episode (S05E10) with
/// frames every 100ms, each listing `window` neighbors on either side.
struct FakeSource {
    timestamps: Vec<i64>,
    window: usize,
    random: Option<FrameLocator>,
    matches: Option<Vec<Match>>,
    available: bool,
    lookups: AtomicUsize,
}

impl FakeSource {
    fn episode(frame_count: usize) -> Self {
        Self {
            timestamps: (0..frame_count as i64).map(|i| i * 100).collect(),
            window: 2,
            random: Some(locator(400)),
            matches: None,
            available: true,
            lookups: AtomicUsize::new(0),
        }
    }

    fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::episode(10)
        }
    }

    fn with_matches(mut self, matches: Vec<Match>) -> Self {
        self.matches = Some(matches);
        self
    }

    fn record(&self, timestamp: i64) -> Option<FrameRecord> {
        let index = self.timestamps.iter().position(|&ts| ts == timestamp)?;
        let low = index.saturating_sub(self.window);
        let high = (index + self.window + 1).min(self.timestamps.len());
        Some(FrameRecord {
            locator: locator(timestamp),
            captions: vec![format!("line {}", index)],
            nearby: self.timestamps[low..high].to_vec(),
            title: Some("Homer the Vigilante".to_string()),
        })
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for FakeSource {
    async fn random_frame(&self) -> Option<FrameLocator> {
        self.random.filter(|_| self.available)
    }

    async fn frame_at(&self, locator: &FrameLocator) -> Option<FrameRecord> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if !self.available || locator.episode_key() != "S05E10" {
            return None;
        }
        self.record(locator.timestamp)
    }

    async fn search_quote(&self, _query: &str) -> Option<Vec<Match>> {
        self.matches.clone().filter(|_| self.available)
    }

    fn image_url(&self, locator: &FrameLocator) -> String {
        format!("fake://{}/{}", locator.episode_key(), locator.timestamp)
    }

    async fn fetch_image(&self, url: &str) -> Result<DynamicImage> {
        if !self.available {
            return Err(FrinkyError::RemoteUnavailable(url.to_string()));
        }
        Ok(DynamicImage::ImageRgb8(RgbImage::from_fn(40, 28, |x, y| {
            let v = ((x + y) * 255 / 66) as u8;
            Rgb([v, v / 2, 255 - v])
        })))
    }
}

#[derive(Default)]
struct RecordingSink {
    shown: Vec<(AsciiFrame, Option<String>)>,
}

impl DisplaySink for RecordingSink {
    fn clear(&mut self) -> Result<()> {
        Ok(())
    }

    fn show(
        &mut self,
        frame: &AsciiFrame,
        caption: Option<&str>,
        _info: Option<&str>,
    ) -> Result<()> {
        self.shown.push((frame.clone(), caption.map(str::to_string)));
        Ok(())
    }
}

fn locator(timestamp: i64) -> FrameLocator {
    FrameLocator::new(5, 10, timestamp).unwrap()
}

fn controller(source: FakeSource) -> SequenceController<FakeSource> {
    let config = ConversionConfig {
        width: 20,
        ..Default::default()
    };
    SequenceController::new(source, config).unwrap()
}

fn matches(entries: &[(&str, i64)]) -> Vec<Match> {
    entries
        .iter()
        .enumerate()
        .map(|(index, (episode, timestamp))| Match {
            episode: episode.to_string(),
            timestamp: *timestamp,
            index,
        })
        .collect()
}

mod sequence_tests {
    use super::*;

    #[tokio::test]
    async fn test_end_equal_to_start_is_single_frame() {
        let mut controller = controller(FakeSource::episode(10));
        controller.set_exact(locator(300), Some(300));
        assert_eq!(controller.search().await, SearchOutcome::Anchored(locator(300)));

        let records = controller.build_sequence(0.0).await.to_vec();
        let direct = controller.source().frame_at(&locator(300)).await.unwrap();
        assert_eq!(records, vec![direct]);
    }

    #[tokio::test]
    async fn test_walks_forward_one_lookup_per_frame() {
        let mut controller = controller(FakeSource::episode(10));
        controller.set_exact(locator(200), Some(500));
        controller.search().await;
        controller.build_sequence(0.0).await;

        assert_eq!(controller.derive_timestamps(), vec![200, 300, 400, 500]);
        // anchor + three hops
        assert_eq!(controller.source().lookups(), 4);
    }

    #[tokio::test]
    async fn test_range_past_chain_end_is_truncated() {
        let mut controller = controller(FakeSource::episode(10));
        controller.set_exact(locator(700), Some(5000));
        controller.search().await;
        let records = controller.build_sequence(0.0).await;

        let timestamps: Vec<_> = records.iter().map(FrameRecord::timestamp).collect();
        assert_eq!(timestamps, vec![700, 800, 900]);
    }

    #[tokio::test]
    async fn test_lead_in_is_prepended_in_order() {
        let mut controller = controller(FakeSource::episode(10));
        controller.set_exact(locator(500), Some(600));
        controller.search().await;
        controller.build_sequence(0.25).await;
        assert_eq!(controller.derive_timestamps(), vec![200, 300, 400, 500, 600]);

        controller.set_exact(locator(100), None);
        controller.search().await;
        controller.build_sequence(10.0).await;
        assert_eq!(controller.derive_timestamps(), vec![0, 100]);
    }

    #[tokio::test]
    async fn test_derived_urls_follow_sequence() {
        let mut controller = controller(FakeSource::episode(10));
        controller.set_exact(locator(0), Some(100));
        controller.search().await;
        controller.build_sequence(0.0).await;

        assert_eq!(
            controller.derive_urls(),
            vec!["fake://S05E10/0".to_string(), "fake://S05E10/100".to_string()]
        );
        assert_eq!(controller.fetch_images().await.unwrap().len(), 2);
        let frames = controller.render_all().unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.width == 20 && f.height == 8));
    }

    #[tokio::test]
    async fn test_random_promotes_to_exact_with_duration() {
        let mut controller = controller(FakeSource::episode(10));
        controller.set_random();
        controller.set_duration(Some(0.2));

        assert_eq!(controller.search().await, SearchOutcome::Resolved(locator(400)));
        assert_eq!(
            controller.state().mode,
            SearchMode::Exact {
                locator: locator(400),
                end: Some(600)
            }
        );

        assert_eq!(controller.resolve(0).await.unwrap(), Some(locator(400)));
        controller.build_sequence(0.0).await;
        assert_eq!(controller.derive_timestamps(), vec![400, 500, 600]);
        assert_eq!(controller.captions(), vec!["line 4", "line 5", "line 6"]);
    }

    #[tokio::test]
    async fn test_duration_extends_exact_search() {
        let mut controller = controller(FakeSource::episode(20));
        controller.set_exact(locator(1000), None);
        controller.set_duration(Some(0.5));

        assert_eq!(
            controller.state().mode,
            SearchMode::Exact {
                locator: locator(1000),
                end: Some(1500)
            }
        );
        assert_eq!(controller.resolve(0).await.unwrap(), Some(locator(1000)));
        controller.build_sequence(0.0).await;
        assert_eq!(
            controller.derive_timestamps(),
            vec![1000, 1100, 1200, 1300, 1400, 1500]
        );

    }

    #[tokio::test]
    async fn test_duration_before_exact_and_explicit_end() {
        let mut controller = controller(FakeSource::episode(20));
        controller.set_duration(Some(0.2));
        controller.set_exact(locator(300), None);
        controller.search().await;
        controller.build_sequence(0.0).await;
        assert_eq!(controller.derive_timestamps(), vec![300, 400, 500]);

        controller.set_exact(locator(300), Some(300));
        controller.search().await;
        controller.build_sequence(0.0).await;
        assert_eq!(controller.derive_timestamps(), vec![300]);
    }

    #[tokio::test]
    async fn test_huge_duration_saturates_end() {
        let mut controller = controller(FakeSource::episode(10));
        controller.set_random();
        controller.set_duration(Some(1e17));

        assert_eq!(controller.search().await, SearchOutcome::Resolved(locator(400)));
        assert_eq!(
            controller.state().mode,
            SearchMode::Exact {
                locator: locator(400),
                end: Some(i64::MAX)
            }
        );
        controller.build_sequence(0.0).await;
        assert_eq!(
            controller.derive_timestamps(),
            vec![400, 500, 600, 700, 800, 900]
        );
    }

    #[tokio::test]
    async fn test_info_lines_label_each_frame() {
        let mut controller = controller(FakeSource::episode(10));
        controller.set_exact(locator(200), Some(400));
        controller.search().await;
        controller.build_sequence(0.0).await;

        assert_eq!(
            controller.info_lines(),
            vec![
                "S05E10 \"Homer the Vigilante\" 0:00.200 [1/3]".to_string(),
                "S05E10 \"Homer the Vigilante\" 0:00.300 [2/3]".to_string(),
                "S05E10 \"Homer the Vigilante\" 0:00.400 [3/3]".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unavailable_service_is_a_no_op() {
        let mut controller = controller(FakeSource::unavailable());
        assert_eq!(controller.search().await, SearchOutcome::NoResult);
        assert_eq!(controller.resolve(0).await.unwrap(), None);

        assert!(controller.build_sequence(1.0).await.is_empty());
        assert!(controller.derive_timestamps().is_empty());
        assert!(controller.derive_urls().is_empty());
        assert!(controller.fetch_images().await.unwrap().is_empty());
        assert!(controller.render_all().unwrap().is_empty());

        let mut sink = RecordingSink::default();
        controller.play(&mut sink, &PlaybackOptions::default()).await.unwrap();
        assert!(sink.shown.is_empty());
    }
}

mod quote_tests {
    use super::*;

    #[tokio::test]
    async fn test_select_match_clamps_index() {
        let source = FakeSource::episode(10)
            .with_matches(matches(&[("S05E10", 100), ("S05E10", 200), ("S05E10", 300)]));
        let mut controller = controller(source);
        controller.set_quote("mercy").unwrap();
        assert_eq!(controller.search().await, SearchOutcome::Matches(3));

        assert_eq!(controller.select_match(10).unwrap(), Some(locator(300)));
        assert_eq!(controller.select_match(-5).unwrap(), Some(locator(100)));
        assert_eq!(controller.select_match(1).unwrap(), Some(locator(200)));
    }

    #[tokio::test]
    async fn test_select_match_bad_episode_key() {
        let source = FakeSource::episode(10).with_matches(matches(&[("Movie", 100)]));
        let mut controller = controller(source);
        controller.set_quote("spider pig").unwrap();
        controller.search().await;

        assert!(matches!(
            controller.select_match(0),
            Err(FrinkyError::MalformedInput(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_results() {
        let mut controller = controller(FakeSource::episode(10).with_matches(Vec::new()));
        controller.set_quote("nothing matches this").unwrap();
        assert_eq!(controller.search().await, SearchOutcome::NoResult);
        assert_eq!(controller.select_match(0).unwrap(), None);
    }

    #[test]
    fn test_unsearchable_quote_rejected() {
        let mut controller = controller(FakeSource::episode(10));
        assert!(controller.set_quote("?!...").is_err());
        assert_eq!(controller.state().mode, SearchMode::Random);
    }

    #[tokio::test]
    async fn test_quote_to_rendered_frame() {
        let source = FakeSource::episode(10)
            .with_matches(matches(&[("S05E10", 300), ("S05E10", 600)]));
        let mut controller = controller(source);
        controller.set_quote("may god have mercy on us all").unwrap();

        assert_eq!(controller.resolve(0).await.unwrap(), Some(locator(300)));
        assert_eq!(controller.build_sequence(0.0).await.len(), 1);
        controller.fetch_images().await.unwrap();
        controller.render_all().unwrap();

        let mut sink = RecordingSink::default();
        controller.play(&mut sink, &PlaybackOptions::default()).await.unwrap();

        assert_eq!(sink.shown.len(), 1);
        let (frame, caption) = &sink.shown[0];
        assert_eq!(frame.width, 20);
        assert!(frame.characters.iter().all(|c| RAMPS[0].contains(c)));
        assert_eq!(caption.as_deref(), Some("MAY GOD HAVE MERCY ON US ALL"));
    }

    #[tokio::test]
    async fn test_quote_caption_sources() {
        let source = FakeSource::episode(10).with_matches(matches(&[("S05E10", 300)]));
        let mut controller = controller(source);
        controller.set_quote("may god have mercy on us all").unwrap();
        controller.resolve(0).await.unwrap();
        controller.build_sequence(0.0).await;

        controller.prefer_subtitles(true);
        assert_eq!(controller.captions(), vec!["line 3"]);

        controller.set_caption_override("D'oh!");
        assert_eq!(controller.captions(), vec!["D'oh!"]);
    }
}

mod cli_tests {
    use super::*;

    #[test]
    fn test_cli_help() {
        let mut cmd = Command::cargo_bin("frinky").unwrap();
        cmd.arg("--help");
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("ASCII art"));
    }

    #[test]
    fn test_cli_version() {
        let mut cmd = Command::cargo_bin("frinky").unwrap();
        cmd.arg("--version");
        cmd.assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_cli_invalid_contrast() {
        let mut cmd = Command::cargo_bin("frinky").unwrap();
        cmd.args(["--contrast", "0"]);
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("Contrast must be greater than 0"));
    }

    #[test]
    fn test_cli_bad_episode_key() {
        let mut cmd = Command::cargo_bin("frinky").unwrap();
        cmd.args(["--episode", "season5", "--timestamp", "1000"]);
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("Invalid episode key"));
    }

    #[test]
    fn test_cli_bad_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let mut cmd = Command::cargo_bin("frinky").unwrap();
        cmd.arg("--config").arg(file.path());
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("Failed to load config"));
    }

    #[test]
    fn test_cli_preview_requires_quote() {
        let mut cmd = Command::cargo_bin("frinky").unwrap();
        cmd.arg("--preview");
        cmd.assert().failure();
    }
}
