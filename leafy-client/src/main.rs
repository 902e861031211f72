//! leafy - leaf classifier client
//!
//! Classifies leaf images and drives remote training of new species against
//! the classifier backend.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leafy_client::models::StagedFile;
use leafy_client::render;
use leafy_client::workflow::TrainingWorkflowController;
use leafy_client::{LeafyClient, WorkflowError};
use leafy_common::config::{load_toml_config, ClientConfig, TomlConfig};
use leafy_common::events::{LeafyEvent, Phase};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;

/// Exit status for a start rejected because the label already exists
const EXIT_ALREADY_TRAINED: u8 = 2;
/// Exit status after Ctrl+C during training
const EXIT_INTERRUPTED: u8 = 130;

/// Command-line arguments for leafy
#[derive(Parser, Debug)]
#[command(name = "leafy")]
#[command(about = "Leaf species classifier client")]
#[command(version)]
struct Args {
    /// Backend base URL (overrides LEAFY_BACKEND_URL and the config file)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Config file (default: <config dir>/leafy/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "leafy_client=trace"
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a leaf image
    Predict {
        /// Image file to upload
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        file: Option<PathBuf>,

        /// Image URL for the backend to download
        #[arg(long)]
        url: Option<String>,
    },

    /// Manage trained labels
    Labels {
        #[command(subcommand)]
        action: LabelsAction,
    },

    /// Show the backend training status once
    Status,

    /// Train a new species
    Train {
        /// Species name
        label: String,

        /// Number of images to search for (10-100)
        #[arg(long)]
        count: Option<String>,

        /// Upload these files instead of searching
        #[arg(long, value_name = "FILE", num_args = 1..)]
        upload: Vec<PathBuf>,

        /// Start immediately without staging images
        #[arg(long, conflicts_with = "upload")]
        no_preview: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum LabelsAction {
    /// List trained labels
    List,
    /// Delete a trained label
    Delete { name: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let toml_config = load_toml_config(args.config.as_deref())?;
    // Flushes the log file writer when main returns
    let _log_guard = init_tracing(args.log_level.as_deref(), &toml_config)?;

    info!("Starting leafy {}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::resolve(args.backend_url.as_deref(), &toml_config)?;
    let client = LeafyClient::new(&config)?;

    match args.command {
        Command::Predict { file, url } => predict(&client, file.as_deref(), url.as_deref()).await,
        Command::Labels { action } => labels(&client, action).await,
        Command::Status => status(&client).await,
        Command::Train {
            label,
            count,
            upload,
            no_preview,
            yes,
        } => {
            let options = TrainOptions {
                label,
                count,
                upload,
                no_preview,
                yes,
            };
            train(&client, options).await
        }
    }
}

/// Filter priority: --log-level, RUST_LOG, TOML `[logging].level`, "info"
///
/// With `[logging].log_file` set, output goes to that file through a
/// non-blocking writer; the returned guard must outlive all logging.
fn init_tracing(cli_level: Option<&str>, toml_config: &TomlConfig) -> Result<Option<WorkerGuard>> {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(toml_config.logging.level.as_deref().unwrap_or("info"))?,
        },
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match &toml_config.logging.log_file {
        Some(path) => {
            let (writer, guard) = log_file_writer(path)?;
            builder.with_ansi(false).with_writer(writer).init();
            Ok(Some(guard))
        }
        None => {
            builder.with_writer(std::io::stderr).init();
            Ok(None)
        }
    }
}

/// Non-blocking writer appending to `path`; creates the parent directory
fn log_file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

async fn predict(client: &LeafyClient, file: Option<&Path>, url: Option<&str>) -> Result<ExitCode> {
    let result = match (file, url) {
        (Some(path), _) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            client.prediction.predict_from_file(bytes, &file_name(path)).await
        }
        (None, Some(url)) => client.prediction.predict_from_url(url).await,
        (None, None) => anyhow::bail!("either --file or --url is required"),
    };

    match result {
        Ok(prediction) => {
            print!("{}", render::prediction_summary(&prediction));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn labels(client: &LeafyClient, action: LabelsAction) -> Result<ExitCode> {
    let result = match action {
        LabelsAction::List => client.workflow.refresh_labels().await,
        LabelsAction::Delete { name } => client.workflow.delete_label(&name).await,
    };

    match result {
        Ok(labels) => {
            println!("{}", render::labels_list(&labels));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn status(client: &LeafyClient) -> Result<ExitCode> {
    match client.training.status().await {
        Ok(status) if status.message.is_empty() => {
            println!("{}", status.status.as_str());
            Ok(ExitCode::SUCCESS)
        }
        Ok(status) => {
            println!("{}: {}", status.status.as_str(), status.message);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

struct TrainOptions {
    label: String,
    count: Option<String>,
    upload: Vec<PathBuf>,
    no_preview: bool,
    yes: bool,
}

async fn train(client: &LeafyClient, options: TrainOptions) -> Result<ExitCode> {
    let workflow = &client.workflow;
    let snapshot = workflow.open().await;
    debug!(labels = snapshot.labels.len(), "Workflow opened");

    workflow.set_label(&options.label).await?;
    if let Some(count) = &options.count {
        let effective = workflow.set_requested_image_count(count).await?;
        if effective.to_string() != count.trim() {
            println!("Using {} images", effective);
        }
    }

    let staged = if !options.upload.is_empty() {
        let mut files = Vec::with_capacity(options.upload.len());
        for path in &options.upload {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            files.push(StagedFile::new(file_name(path), bytes));
        }
        workflow.stage_files(files).await?;
        workflow.upload_staged().await.map(|result| result.images)
    } else if !options.no_preview {
        println!("Searching for images...");
        workflow.request_preview().await
    } else {
        Ok(Vec::new())
    };

    let images = match staged {
        Ok(images) => images,
        Err(e) => return Ok(report_failure(workflow, &e).await),
    };

    if workflow.session().await.phase == Phase::Previewing {
        println!("{} images staged:", images.len());
        for line in render::preview_list(workflow.transport(), &images) {
            println!("{}", line);
        }

        if !options.yes {
            let question = format!("Start training '{}'?", options.label.trim());
            if !prompt_yes_no(question).await? {
                workflow.cancel_preview().await?;
                println!("Cancelled");
                return Ok(ExitCode::SUCCESS);
            }
        }
    }

    let mut events = workflow.subscribe();
    if let Err(e) = workflow.confirm().await {
        return Ok(report_failure(workflow, &e).await);
    }

    follow_training(workflow, &mut events).await
}

/// Print progress events until the session reaches a terminal phase
async fn follow_training(
    workflow: &TrainingWorkflowController,
    events: &mut tokio::sync::broadcast::Receiver<LeafyEvent>,
) -> Result<ExitCode> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping status polling");
                workflow.reset().await;
                eprintln!("Interrupted; training may continue on the server");
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = render::event_line(&event) {
                        println!("{}", line);
                    }
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event receiver lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    let snapshot = workflow.snapshot().await;
    println!("{}", render::phase_line(&snapshot.session));
    match snapshot.session.phase {
        Phase::Completed => {
            println!("Trained labels:\n{}", render::labels_list(&snapshot.labels));
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

/// Print the session notice for a failed command, falling back to the error text
async fn report_failure(workflow: &TrainingWorkflowController, error: &WorkflowError) -> ExitCode {
    let notice = match error {
        WorkflowError::AlreadyTrained { .. } | WorkflowError::Transport(_) => {
            workflow.snapshot().await.notice
        }
        _ => None,
    };
    match notice {
        Some(notice) => eprintln!("{}", render::notice_line(&notice)),
        None => eprintln!("{}", error.user_message()),
    }
    match error {
        WorkflowError::AlreadyTrained { .. } => ExitCode::from(EXIT_ALREADY_TRAINED),
        _ => ExitCode::FAILURE,
    }
}

async fn prompt_yes_no(question: String) -> Result<bool> {
    let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
        print!("{} [y/N] ", question);
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line)
    })
    .await??;

    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
