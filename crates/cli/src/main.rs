use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use studio_client::{
    ArtifactCatalog, ClientConfig, ControllerError, JobController, JobEvent, StudioApi,
};
use studio_core::{JobRequest, Language, TargetDuration};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod render;

#[derive(Parser)]
#[command(author, version, about = "Generate math explainer videos on a studio backend", long_about = None)]
struct Args {
    /// Backend root URL. Overrides `STUDIO_API_URL`.
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a video job and follow it until it finishes
    Generate {
        /// What the video should explain
        #[arg(long)]
        topic: String,

        /// Narration language (en or vi)
        #[arg(long, default_value = "en")]
        language: Language,

        /// Target length in minutes (1 or 3)
        #[arg(long, default_value = "1")]
        duration: TargetDuration,

        /// Print the job id and exit without waiting
        #[arg(long)]
        detach: bool,
    },
    /// List generated videos
    Videos,
    /// Download a generated video
    Download {
        /// Artifact name as shown by `videos`
        name: String,

        /// Destination file (defaults to the artifact name)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Check that the backend is up
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studio_cli=info,studio_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env().context("Invalid configuration")?;
    if let Some(url) = args.api_url {
        config.api_url = url
            .parse()
            .with_context(|| format!("Invalid --api-url '{url}'"))?;
    }
    tracing::debug!(api_url = %config.api_url, "Loaded client configuration");

    let api = Arc::new(
        StudioApi::new(config.api_url.clone(), config.request_timeout)
            .context("Failed to build HTTP client")?,
    );

    match args.command {
        Command::Generate {
            topic,
            language,
            duration,
            detach,
        } => {
            let request = JobRequest::new(topic, language, duration);
            generate(api, &config, request, detach).await
        }
        Command::Videos => list_videos(api).await,
        Command::Download { name, output } => {
            let dest = output.unwrap_or_else(|| PathBuf::from(&name));
            let bytes = api
                .download_artifact(&name, &dest)
                .await
                .with_context(|| format!("Failed to download '{name}'"))?;
            println!("Saved {} ({bytes} bytes)", dest.display());
            Ok(())
        }
        Command::Health => {
            let health = api.health().await.context("Backend is unreachable")?;
            match health.message {
                Some(message) => println!("{}: {message}", health.status),
                None => println!("{}", health.status),
            }
            Ok(())
        }
    }
}

/// Submit a job and render its events until it reaches a final state.
///
/// Ctrl-C cancels polling; the backend job itself keeps running.
async fn generate(
    api: Arc<StudioApi>,
    config: &ClientConfig,
    request: JobRequest,
    detach: bool,
) -> anyhow::Result<()> {
    let catalog = ArtifactCatalog::load(api.clone()).await;
    let controller = JobController::new(api, config.poll_policy())
        .with_terminal_hook(catalog.clone());
    let mut events = controller.subscribe();

    let handle = match controller.submit(request).await {
        Ok(handle) => handle,
        Err(ControllerError::Validation(e)) => bail!("{e}"),
        Err(e) => return Err(e).context("Could not start generation"),
    };
    println!("Job {handle} started");

    if detach {
        controller.shutdown().await;
        return Ok(());
    }

    let outcome = loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                controller.cancel().await;
                break Err(anyhow::anyhow!("Interrupted; job {handle} continues on the backend"));
            }
            received = events.recv() => received,
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event receiver lagged");
                continue;
            }
            Err(RecvError::Closed) => break Err(anyhow::anyhow!("Controller stopped unexpectedly")),
        };

        match event {
            JobEvent::Progress { status, .. } => println!("{}", render::progress_line(&status)),
            JobEvent::PollFailed { error, .. } => eprintln!("warning: status check failed: {error}"),
            JobEvent::Completed { status, .. } => {
                println!("{}", render::progress_line(&status));
                match controller.download_url().await {
                    Some(url) => println!("Video completed! Download: {url}"),
                    None => println!("Video completed!"),
                }
                println!("{} video(s) available", catalog.len().await);
                break Ok(());
            }
            JobEvent::Failed { status, .. } => {
                let reason = status.failure().unwrap_or_default().to_string();
                break Err(anyhow::anyhow!("Job failed: {reason}"));
            }
            JobEvent::PollingAbandoned {
                consecutive_failures,
                ..
            } => {
                break Err(anyhow::anyhow!(
                    "Gave up after {consecutive_failures} failed status checks"
                ));
            }
            JobEvent::Cancelled { .. } | JobEvent::SubmissionFailed { .. } => {
                break Err(anyhow::anyhow!("Job tracking stopped"));
            }
            JobEvent::Submitted { .. } => {}
        }
    };

    controller.shutdown().await;
    outcome
}

async fn list_videos(api: Arc<StudioApi>) -> anyhow::Result<()> {
    let catalog = ArtifactCatalog::new(api);
    let artifacts = catalog
        .refresh()
        .await
        .context("Failed to fetch video list")?;

    if artifacts.is_empty() {
        println!("No videos yet");
        return Ok(());
    }
    for artifact in &artifacts {
        println!("{}", render::artifact_line(artifact));
        if let Ok(url) = catalog.download_url(&artifact.name) {
            println!("    {url}");
        }
    }
    Ok(())
}
