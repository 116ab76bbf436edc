use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_relay::cli::{Cli, Commands};
use transcript_relay::config::Config;
use transcript_relay::pipeline::TranscriptPipeline;
use transcript_relay::{output, server, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs);

    // `config --init` must not require an existing file
    if let Commands::Config { init: true, .. } = cli.command {
        let path = Config::init(cli.config.as_deref())?;
        println!("Configuration written to: {}", path.display());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            // Missing tools only disable their strategy
            let missing_deps = utils::check_dependencies(&config.yt_dlp.path).await;
            if !missing_deps.is_empty() {
                eprintln!("⚠️  Dependency check warnings:");
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
                eprintln!("   (Continuing anyway - the remaining strategies stay available)");
            }

            let addr = config.socket_addr(host.as_deref(), port)?;
            server::serve(&config, addr).await?;
        }
        Commands::Fetch {
            video_id,
            pretty,
            output,
        } => {
            let pipeline = TranscriptPipeline::from_config(&config)?;

            tracing::info!("Fetching transcript for video: {}", video_id.trim());

            let progress = (!cli.quiet).then(|| spinner(&video_id)).transpose()?;
            let started = Instant::now();
            let outcome = pipeline.fetch(&video_id).await;

            if let Some(progress) = progress {
                let elapsed = utils::format_duration(started.elapsed().as_secs_f64());
                match &outcome {
                    Ok(acquisition) => progress.finish_with_message(format!(
                        "Fetched via {} in {}",
                        acquisition.source, elapsed
                    )),
                    Err(_) => progress.finish_with_message(format!("No transcript after {}", elapsed)),
                }
            }

            match &output {
                Some(path) => {
                    output::save_to_file(&outcome, path, pretty)?;
                    println!("Response saved to: {}", path.display());
                }
                None => output::print_to_console(&outcome, pretty)?,
            }

            if let Err(err) = outcome {
                anyhow::bail!(err);
            }
        }
        Commands::Strategies => {
            let pipeline = TranscriptPipeline::from_config(&config)?;

            println!("Acquisition strategies (in priority order):");
            for (position, name) in pipeline.strategy_names().iter().enumerate() {
                println!("  {}. {}", position + 1, name);
            }
            println!("Language: {}", pipeline.language());
            println!(
                "Timeout per strategy: {}",
                utils::format_duration(pipeline.strategy_timeout().as_secs_f64())
            );
        }
        Commands::Config { show, .. } => {
            if !show {
                tracing::debug!("No config action given; showing current configuration");
            }
            config.display();
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json_logs: bool) {
    let default_filter = if verbose {
        "transcript_relay=debug"
    } else {
        "transcript_relay=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn spinner(video_id: &str) -> Result<ProgressBar> {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    progress.set_message(format!("Fetching transcript for {}...", video_id.trim()));
    progress.enable_steady_tick(Duration::from_millis(100));
    Ok(progress)
}
