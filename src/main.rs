//! Command-line trigger for the uploader.
//!
//! `login` runs the consent flow, `upload` mirrors every top-level folder of
//! the media root into its own album, `status` and `logout` manage the stored
//! credential. Options fall back to environment variables, and a `.env` file
//! in the working directory is loaded first.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::Context;
use bridge_desktop::FileSecureStore;
use clap::{Args, Parser, Subcommand};
use core_runtime::config::UploaderConfig;
use core_runtime::events::{CoreEvent, EventSeverity, EventStream, RecvError, UploadEvent};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LogLevel, LoggingConfig,
};
use core_service::{bootstrap_desktop, UploaderService};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "photo-album-uploader", version, about)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Authorize access to the photo library
    Login,
    /// Upload every top-level folder of the media root as an album
    Upload,
    /// Report whether a stored session can be restored
    Status,
    /// Forget the stored credential
    Logout,
}

#[derive(Debug, Args)]
struct Settings {
    /// Directory whose top-level folders become albums
    #[arg(long, env = "MEDIA_ROOT", global = true)]
    media_root: Option<PathBuf>,

    /// Port of the local authorization callback
    #[arg(long, env = "SERVER_PORT", global = true)]
    port: Option<u16>,

    #[arg(long, env = "GOOGLE_CLIENT_ID", global = true, hide_env_values = true)]
    client_id: Option<String>,

    #[arg(long, env = "GOOGLE_CLIENT_SECRET", global = true, hide_env_values = true)]
    client_secret: Option<String>,

    #[arg(long, env = "GOOGLE_REDIRECT_URL", global = true)]
    redirect_url: Option<String>,

    /// Where the refresh token is persisted
    #[arg(long = "credentials", env = "UPLOADER_CREDENTIALS", global = true)]
    credential_path: Option<PathBuf>,

    /// Retries per remote call after the first attempt
    #[arg(long, env = "UPLOAD_MAX_RETRY", global = true)]
    max_retry: Option<u32>,

    /// Pause after each failed attempt, in milliseconds
    #[arg(long, env = "UPLOAD_RETRY_DELAY_MS", global = true)]
    retry_delay_ms: Option<u64>,

    /// Comma-separated media extensions, e.g. `jpg,heic,mp4`
    #[arg(long, env = "MEDIA_EXTENSIONS", global = true, value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    /// pretty, json or compact
    #[arg(long, env = "LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[arg(long, env = "LOG_LEVEL", global = true)]
    log_level: Option<LogLevel>,

    /// Full filter directive, e.g. `core_upload=debug`; overrides --log-level
    #[arg(long, env = "LOG_FILTER", global = true)]
    log_filter: Option<String>,
}

impl Settings {
    fn logging(&self) -> LoggingConfig {
        let mut config = LoggingConfig::default();
        if let Some(format) = self.log_format {
            config = config.with_format(format);
        }
        if let Some(level) = self.log_level {
            config = config.with_level(level);
        }
        if let Some(filter) = &self.log_filter {
            config = config.with_filter(filter.clone());
        }
        config
    }

    fn uploader(self) -> core_runtime::Result<UploaderConfig> {
        let mut builder = UploaderConfig::builder().credential_path(
            self.credential_path
                .unwrap_or_else(FileSecureStore::default_location),
        );

        if let Some(media_root) = self.media_root {
            builder = builder.media_root(media_root);
        }
        if let Some(port) = self.port {
            builder = builder.server_port(port);
        }
        if let Some(client_id) = self.client_id {
            builder = builder.client_id(client_id);
        }
        if let Some(client_secret) = self.client_secret {
            builder = builder.client_secret(client_secret);
        }
        if let Some(redirect_url) = self.redirect_url {
            builder = builder.redirect_url(redirect_url);
        }
        if let Some(max_retry) = self.max_retry {
            builder = builder.max_retry(max_retry);
        }
        if let Some(delay) = self.retry_delay_ms {
            builder = builder.retry_delay(Duration::from_millis(delay));
        }
        if let Some(extensions) = self.extensions {
            builder = builder.media_extensions(extensions);
        }

        builder.build()
    }
}

/// How long a finished run's last progress lines may take to print
const REPORTER_DRAIN: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        return;
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(error = %format!("{error:#}"), "command failed");
    } else {
        eprintln!("Error: {error:#}");
    }
    process::exit(1);
}

async fn run() -> anyhow::Result<()> {
    // A missing .env file is the normal case.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.settings.logging()).context("failed to initialize logging")?;

    let config = cli
        .settings
        .uploader()
        .context("invalid uploader configuration")?;
    log_config(&config);

    let service = bootstrap_desktop(config).context("failed to initialize uploader")?;

    match cli.command {
        Command::Login => login(&service).await,
        Command::Upload => upload(&service).await,
        Command::Status => status(&service).await,
        Command::Logout => {
            service.logout().await.context("failed to clear credential")?;
            println!("Signed out");
            Ok(())
        }
    }
}

fn log_config(config: &UploaderConfig) {
    let credential_path = config.credential_path.to_string_lossy();
    tracing::info!(
        media_root = %config.media_root.display(),
        port = config.server_port,
        redirect_url = %config.oauth.redirect_url,
        client_secret = %redact_if_sensitive("client_secret", &config.oauth.client_secret),
        credential_file = strip_path(&credential_path),
        max_retry = config.retry.max_retry,
        retry_delay_ms = config.retry.retry_delay.as_millis() as u64,
        extensions = %config.media_extensions.join(","),
        "Uploader configured"
    );
}

async fn login(service: &UploaderService) -> anyhow::Result<()> {
    let url = service
        .start_authorization()
        .await
        .context("failed to build authorization URL")?;

    println!("Open this URL in a browser and grant access:\n\n{url}\n");
    println!("Paste the `code` parameter from the redirect URL:");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read authorization code")?;
    let code = line.trim();
    anyhow::ensure!(!code.is_empty(), "no authorization code entered");

    let summary = service
        .complete_authorization(code)
        .await
        .context("authorization failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn upload(service: &UploaderService) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, finishing current step");
            on_interrupt.cancel();
        }
    });

    let progress = EventStream::new(service.event_bus().subscribe()).filter(|event| {
        event.severity() >= EventSeverity::Info
            || matches!(
                event,
                CoreEvent::Upload(UploadEvent::AlbumCreated { .. } | UploadEvent::FileUploaded { .. })
            )
    });
    let mut reporter = tokio::spawn(report_progress(progress));

    let outcome = service.run_bulk_upload_with_cancellation(cancel).await;
    if outcome.is_ok() {
        // A finished run always ends with a terminal event; let it print
        let _ = tokio::time::timeout(REPORTER_DRAIN, &mut reporter).await;
    }
    reporter.abort();

    let results = outcome.context("bulk upload failed")?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

/// Prints progress until the run's terminal event or until the bus closes.
async fn report_progress(mut events: EventStream) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                eprintln!("WARN   {skipped} progress events skipped");
                continue;
            }
            Err(RecvError::Closed) => return,
        };
        let finished = is_terminal(&event);

        match event {
            CoreEvent::Upload(UploadEvent::AlbumCreated { title, .. }) => {
                eprintln!("album  {title}");
            }
            CoreEvent::Upload(UploadEvent::FileUploaded {
                album_title,
                file_name,
                ..
            }) => eprintln!("  ok   {album_title}/{file_name}"),
            CoreEvent::Upload(UploadEvent::FileFailed {
                album_title,
                file_name,
                attempts,
                ..
            }) => eprintln!("  FAIL {album_title}/{file_name} after {attempts} attempts"),
            CoreEvent::Upload(UploadEvent::RunCompleted {
                albums,
                uploaded,
                failed,
                duration_secs,
                ..
            }) => eprintln!(
                "done   {albums} albums, {uploaded} uploaded, {failed} failed in {duration_secs}s"
            ),
            other => {
                let marker = match other.severity() {
                    EventSeverity::Error => "ERROR",
                    EventSeverity::Warning => "WARN ",
                    _ => "     ",
                };
                eprintln!("{marker}  {}", other.description());
            }
        }

        if finished {
            return;
        }
    }
}

fn is_terminal(event: &CoreEvent) -> bool {
    matches!(
        event,
        CoreEvent::Upload(UploadEvent::RunCompleted { .. } | UploadEvent::RunCancelled { .. })
    )
}

async fn status(service: &UploaderService) -> anyhow::Result<()> {
    let restored = service
        .bootstrap()
        .await
        .context("failed to restore session")?;

    if restored {
        println!("Signed in ({})", service.auth_state().await);
    } else {
        println!("Not signed in; run `photo-album-uploader login`");
    }
    Ok(())
}
