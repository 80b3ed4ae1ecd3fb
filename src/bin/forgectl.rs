use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use expression_forge::archive::ARCHIVE_FILE_NAME;
use expression_forge::generation::results::GeneratedImage;
use expression_forge::generation::retry::{Progress, RunObserver};
use expression_forge::labels::convert_labels;
use expression_forge::prompt::catalog::{PromptPair, DETECTION_CLASSES};
use expression_forge::utils::media::SourceImage;
use expression_forge::{ArchiveBuilder, Category, Config, GeminiClient, RetryLoop};

#[derive(Parser, Debug)]
#[command(name = "forgectl", about = "Generate labeled expression variants of a portrait", version)]
struct Cli {
    /// Override GEMINI_API_KEY
    #[arg(global = true, long)]
    api_key: Option<String>,

    /// Override GEMINI_MODEL
    #[arg(global = true, long)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run all sixteen prompts against a portrait and write the zip archive
    Generate {
        /// Portrait image (png, jpg, webp)
        #[arg(long, value_name = "PATH")]
        image: PathBuf,
        /// Archive path (defaults to <OUTPUT_DIR>/ai-generated-images-with-labels.zip)
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
        /// Attempts per prompt while rate limited
        #[arg(long)]
        max_attempts: Option<u32>,
        /// First backoff wait in milliseconds
        #[arg(long)]
        base_delay_ms: Option<u64>,
        /// Multiplier applied to the wait after each rate-limited attempt
        #[arg(long)]
        backoff_factor: Option<u32>,
        /// Wait after each success in milliseconds
        #[arg(long)]
        pacing_ms: Option<u64>,
    },
    /// Convert a detection response (file or `-` for stdin) into label lines
    Labels {
        #[arg(value_name = "PATH")]
        input: String,
    },
    /// Print the detection classes, one per line
    Classes,
    /// Print the prompt catalog
    Prompts {
        /// Only this category (e.g. yawning, holding-phone)
        #[arg(long)]
        category: Option<String>,
    },
}

struct ConsoleObserver;

#[async_trait]
impl RunObserver for ConsoleObserver {
    async fn image_added(&mut self, category: Category, image: &GeneratedImage) {
        let boxes = image.label.lines().count();
        eprintln!("  + {} ({} boxes)", category.slug(), boxes);
    }

    async fn backoff(&mut self, pair: &PromptPair, delay: Duration, retries_left: u32) {
        eprintln!(
            "  rate limited on {}-{}, retrying in {}s ({} retries left)",
            pair.category.slug(),
            pair.index + 1,
            delay.as_secs(),
            retries_left
        );
    }

    async fn progress(&mut self, progress: Progress) {
        eprintln!("[{}]", progress);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load env and parse CLI
    Config::dotenv_load();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut conf = Config::new();
    if let Some(key) = cli.api_key {
        conf.gemini_api_key = Some(key);
    }
    if let Some(model) = cli.model {
        conf.gemini_model = model;
    }

    match cli.command {
        Commands::Generate { image, out, max_attempts, base_delay_ms, backoff_factor, pacing_ms } => {
            if let Some(v) = max_attempts {
                conf.retry_max_attempts = v;
            }
            if let Some(v) = base_delay_ms {
                conf.retry_base_delay_ms = v;
            }
            if let Some(v) = backoff_factor {
                conf.retry_backoff_factor = v;
            }
            if let Some(v) = pacing_ms {
                conf.pacing_delay_ms = v;
            }

            let source = SourceImage::from_path(&image).await?;
            let client = GeminiClient::from_config(&conf)?;
            let runner = RetryLoop::new(Arc::new(client), conf.retry_policy());
            let policy = runner.policy();
            tracing::info!(
                max_attempts = policy.max_attempts,
                base_delay_ms = policy.base_delay.as_millis() as u64,
                backoff_factor = policy.backoff_factor,
                pacing_ms = policy.pacing.as_millis() as u64,
                "Retry policy"
            );

            let report = runner.run(&source, &mut ConsoleObserver).await?;
            if let Some(msg) = report.partial_failure_message() {
                eprintln!("Some images failed to generate: {}", msg);
            }
            if report.results.is_empty() {
                eprintln!("Error: no images were generated, nothing to archive");
                std::process::exit(1);
            }

            let bytes = ArchiveBuilder::new().build(&report.results).await.map_err(|e| {
                eprintln!("Error: download failed: {}", e);
                e
            })?;
            let path = match out {
                Some(p) => p,
                None => {
                    let dir = PathBuf::from(&conf.output_dir);
                    tokio::fs::create_dir_all(&dir).await?;
                    dir.join(ARCHIVE_FILE_NAME)
                }
            };
            tokio::fs::write(&path, &bytes).await?;
            println!("Saved {} ({} bytes, {}/{} images)", path.display(), bytes.len(), report.succeeded, report.total);
            Ok(())
        }
        Commands::Labels { input } => {
            let text = if input == "-" {
                let mut buf = String::new();
                tokio::io::stdin().read_to_string(&mut buf).await?;
                buf
            } else {
                tokio::fs::read_to_string(&input).await?
            };
            let labels = convert_labels(&text);
            if !labels.is_empty() {
                println!("{}", labels);
            }
            Ok(())
        }
        Commands::Classes => {
            for class in DETECTION_CLASSES {
                println!("{}", class);
            }
            Ok(())
        }
        Commands::Prompts { category } => {
            let categories = match category {
                Some(raw) => match Category::parse(&raw) {
                    Some(c) => vec![c],
                    None => {
                        eprintln!("Unknown category '{}'", raw);
                        std::process::exit(2);
                    }
                },
                None => Category::ALL.to_vec(),
            };
            for c in categories {
                println!("{} ({})", c.wire_name(), c.title());
                for (i, prompt) in c.prompts().iter().enumerate() {
                    println!("  {}. {}", i + 1, prompt);
                }
            }
            Ok(())
        }
    }
}
