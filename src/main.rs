use std::{path::PathBuf, sync::atomic::Ordering, time::Duration};

use anyhow::{Context, Result};
use chat_pipeline_rs::{
    config::{CoreConfig, CoreConfigBuilder},
    logging::{init_logging, LoggingConfig},
    protocols::{decode_message, Citation, TranscriptMetadata},
    streaming::{
        cancellation_flag, process_anthropic_stream, process_azure_stream, ProcessedStream,
        ProviderError, ProviderKind, StreamOptions,
    },
};
use clap::{Parser, Subcommand};
use futures::{stream, stream::BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "chat-pipeline")]
#[command(about = "Chat pipeline - staged request processing and paced response streaming")]
#[command(long_about = r#"
Chat pipeline - staged request processing and paced response streaming

Examples:
  # Replay a recorded Anthropic event stream at 2 characters every 20ms
  chat-pipeline replay --provider anthropic --input events.jsonl \
    --chars-per-batch 2 --delay-ms 20

  # Attach web search citations and a transcript to the metadata trailer
  chat-pipeline replay --provider azure --input chunks.jsonl \
    --citations citations.json --transcript-file call.mp3 --transcript-text "..."

  # Split a stored assistant message into text and metadata
  chat-pipeline decode --input message.txt
"#)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory for daily rolling log files
    #[arg(long, global = true)]
    log_dir: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream recorded provider deltas (one JSON object per line) to stdout
    Replay {
        /// Provider family the deltas come from (azure, anthropic)
        #[arg(long)]
        provider: ProviderKind,

        /// JSON lines file; `data:` prefixes and `[DONE]` lines are tolerated
        #[arg(long)]
        input: PathBuf,

        /// Delay between upstream deltas in milliseconds
        #[arg(long, default_value_t = 0)]
        delta_delay_ms: u64,

        /// Override the configured characters per batch
        #[arg(long)]
        chars_per_batch: Option<usize>,

        /// Override the configured delay between batches in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// JSON array of external citations
        #[arg(long)]
        citations: Option<PathBuf>,

        /// Transcript source filename
        #[arg(long, requires = "transcript_text")]
        transcript_file: Option<String>,

        /// Transcript text
        #[arg(long, requires = "transcript_file")]
        transcript_text: Option<String>,
    },
    /// Decode framed (or legacy) message text into content and metadata
    Decode {
        /// File holding the message text, `-` for stdin
        #[arg(long)]
        input: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<CoreConfig> {
    let base = match &cli.config {
        Some(path) => CoreConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CoreConfig::default(),
    };

    let mut builder = CoreConfigBuilder::from_config(base);
    if let Some(level) = &cli.log_level {
        builder = builder.log_level(level.clone());
    }
    if let Some(dir) = &cli.log_dir {
        builder = builder.log_dir(dir.clone());
    }
    if cli.log_json {
        builder = builder.log_json(true);
    }
    Ok(builder.build()?)
}

/// Parse recorded deltas; lines that fail to parse become malformed-delta errors
fn parse_deltas<T: DeserializeOwned>(raw: &str) -> Vec<Result<T, ProviderError>> {
    raw.lines()
        .map(str::trim)
        .map(|line| line.strip_prefix("data:").map(str::trim).unwrap_or(line))
        .filter(|line| !line.is_empty() && *line != "[DONE]")
        .map(|line| {
            serde_json::from_str(line).map_err(|e| ProviderError::Malformed(e.to_string()))
        })
        .collect()
}

fn scripted<T: Send + 'static>(
    items: Vec<Result<T, ProviderError>>,
    delay: Duration,
) -> BoxStream<'static, Result<T, ProviderError>> {
    stream::iter(items)
        .then(move |item| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            item
        })
        .boxed()
}

async fn write_stream(mut output: ProcessedStream) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(item) = output.next().await {
        let bytes = item.context("response stream failed")?;
        stdout.write_all(&bytes).await?;
        stdout.flush().await?;
    }
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn replay(
    config: &CoreConfig,
    provider: ProviderKind,
    input: PathBuf,
    delta_delay_ms: u64,
    chars_per_batch: Option<usize>,
    delay_ms: Option<u64>,
    citations: Option<PathBuf>,
    transcript: Option<TranscriptMetadata>,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;

    let mut speed = config.streaming;
    if let Some(chars) = chars_per_batch {
        speed.chars_per_batch = chars;
    }
    if let Some(delay) = delay_ms {
        speed.delay_ms = delay;
    }

    let external_citations: Vec<Citation> = match citations {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing citations from {}", path.display()))?
        }
        None => Vec::new(),
    };

    let cancellation = cancellation_flag();
    let ctrl_c_flag = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling stream");
            ctrl_c_flag.store(true, Ordering::SeqCst);
        }
    });

    let mut options = StreamOptions::new()
        .with_cancellation(cancellation)
        .with_speed(speed)
        .with_external_citations(external_citations);
    if let Some(transcript) = transcript {
        options = options.with_transcript(transcript);
    }

    let delay = Duration::from_millis(delta_delay_ms);
    info!(provider = %provider, input = %input.display(), "Replaying provider stream");

    let output = match provider {
        ProviderKind::Azure => process_azure_stream(scripted(parse_deltas(&raw), delay), options),
        ProviderKind::Anthropic => {
            process_anthropic_stream(scripted(parse_deltas(&raw), delay), options)
        }
    };
    write_stream(output).await
}

async fn decode(input: PathBuf) -> Result<()> {
    let raw = if input.as_os_str() == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(&input)
            .await
            .with_context(|| format!("reading {}", input.display()))?
    };

    let decoded = decode_message(&raw);
    println!("{}", decoded.content);
    if let Some(metadata) = decoded.metadata {
        println!("---");
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let _log_guard = init_logging(LoggingConfig::from_core_config(&config));

    match cli.command {
        Command::Replay {
            provider,
            input,
            delta_delay_ms,
            chars_per_batch,
            delay_ms,
            citations,
            transcript_file,
            transcript_text,
        } => {
            let transcript = transcript_file
                .zip(transcript_text)
                .map(|(file, text)| TranscriptMetadata::new(file, text));
            replay(
                &config,
                provider,
                input,
                delta_delay_ms,
                chars_per_batch,
                delay_ms,
                citations,
                transcript,
            )
            .await
        }
        Command::Decode { input } => decode(input).await,
    }
}
