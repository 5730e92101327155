use anyhow::{Context, Result};
use clap::Parser;
use frinky::cli::SearchRequest;
use frinky::playback;
use frinky::utils::format_timestamp;
use frinky::{Cli, FrinkiacClient, SearchOutcome, SequenceController, Settings, TerminalRenderer};
use log::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Logs go to stderr; keep them quiet unless asked so they don't tear the art
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Validate CLI arguments
    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => cli.apply_overrides(settings),
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = settings.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("Starting {} v{}", frinky::PACKAGE_NAME, frinky::VERSION);
    debug!("Settings: {:?}", settings);

    let client = FrinkiacClient::new(settings.api_base.clone())
        .context("failed to build HTTP client")?;
    let mut controller = SequenceController::new(client, cli.conversion_config(&settings))?;

    match cli.search_request().map_err(anyhow::Error::msg)? {
        SearchRequest::Random => controller.set_random(),
        SearchRequest::Quote(quote) => controller.set_quote(&quote)?,
        SearchRequest::Exact(locator, end) => controller.set_exact(locator, end),
    }
    controller.set_duration(cli.duration);
    controller.prefer_subtitles(cli.subtitles);
    if let Some(caption) = &cli.caption {
        controller.set_caption_override(caption.clone());
    }

    let mut display = TerminalRenderer::new();

    // Preview mode: list quote matches and stop
    if cli.preview {
        match controller.search().await {
            SearchOutcome::Matches(count) => {
                display.display_message(&format!("{} matches:", count))?;
                for m in controller.matches() {
                    display.display_message(&format!(
                        "[{:>2}] {} {}",
                        m.index,
                        m.episode,
                        format_timestamp(m.timestamp)
                    ))?;
                }
            }
            _ => display.display_message("No matches found.")?,
        }
        return Ok(());
    }

    let locator = match controller.resolve(cli.index).await {
        Ok(Some(locator)) => locator,
        Ok(None) => {
            display.display_message(
                "No frame found; the service returned nothing for this search.",
            )?;
            return Ok(());
        }
        Err(e) => {
            display.display_error(&e.to_string())?;
            std::process::exit(1);
        }
    };
    info!("Resolved {}", locator);

    let count = controller.build_sequence(cli.lead_in).await.len();
    debug!("Timestamps: {:?}", controller.derive_timestamps());
    info!("Fetching {} images", count);
    controller.fetch_images().await.context("failed to fetch frame images")?;
    controller.render_all()?;

    let options = cli.playback_options(&settings);
    if options.animated {
        display.init()?;
    }
    // Ctrl-C ends an endless loop; the cursor still gets restored below
    let interrupted = playback::run_until(controller.play(&mut display, &options), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;
    display.cleanup()?;
    if interrupted? {
        return Ok(());
    }

    info!("Done. Total frames: {}", count);
    Ok(())
}
