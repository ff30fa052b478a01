use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genai_studio::config::{CaptureKind, PlaybackKind};
use genai_studio::{
    create_router, AppState, AspectRatio, ChatSession, Config, ContentGenerator, GenAiClient,
    ImageLab, SessionStatus, VoiceSession,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Chat, image generation and live voice against a hosted generative-AI service
#[derive(Parser, Debug)]
#[command(name = "genai-studio", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (extension optional)
    #[arg(long, global = true, value_name = "PATH", default_value = "config/genai-studio")]
    config: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP control API
    Serve,

    /// Send one grounded chat message
    Chat {
        text: String,
    },

    /// Generate an image from a prompt
    Image {
        prompt: String,

        /// One of 1:1, 4:3, 3:4, 16:9, 9:16
        #[arg(long, default_value = "1:1")]
        aspect_ratio: AspectRatio,

        /// Where to write the image (default: gemini-gen-<id>.png)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Hold a live voice conversation
    Voice {
        /// Stream this WAV file instead of the microphone
        #[arg(long, value_name = "WAV")]
        input: Option<PathBuf>,

        /// Play into a WAV file instead of the speakers
        #[arg(long, value_name = "WAV")]
        record: Option<PathBuf>,

        /// Stop after this many seconds (default: until Ctrl-C or remote close)
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = Config::load(&cli.config)?;

    info!("GenAI Studio v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Commands::Serve => serve(&cfg).await,
        Commands::Chat { text } => chat(&cfg, &text).await,
        Commands::Image {
            prompt,
            aspect_ratio,
            out,
        } => image(&cfg, prompt, aspect_ratio, out).await,
        Commands::Voice {
            input,
            record,
            seconds,
        } => {
            if let Some(input) = input {
                cfg.audio.capture = CaptureKind::File;
                cfg.audio.input_path = Some(input);
            }
            if let Some(record) = record {
                cfg.audio.playback = PlaybackKind::Virtual;
                cfg.audio.record_path = Some(record);
            }
            voice(&cfg, seconds).await
        }
    }
}

async fn serve(cfg: &Config) -> Result<()> {
    let state = AppState::from_config(cfg);
    let voice = state.voice.clone();
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await
        .context("HTTP server failed")?;

    voice.stop().await;
    info!("HTTP server stopped");
    Ok(())
}

fn generator(cfg: &Config) -> Arc<dyn ContentGenerator> {
    Arc::new(GenAiClient::from_config(cfg))
}

async fn chat(cfg: &Config, text: &str) -> Result<()> {
    let session = ChatSession::new(generator(cfg), cfg.models.chat.clone());
    let reply = session.send(text).await?;

    println!("{}", reply.content);
    for source in reply.grounding_urls.unwrap_or_default() {
        println!("  - {} <{}>", source.title, source.uri);
    }
    Ok(())
}

async fn image(
    cfg: &Config,
    prompt: String,
    aspect_ratio: AspectRatio,
    out: Option<PathBuf>,
) -> Result<()> {
    let lab = ImageLab::new(generator(cfg), cfg.models.image.clone());
    lab.set_prompt(prompt);
    lab.set_aspect_ratio(aspect_ratio);

    let Some(image) = lab.generate().await? else {
        println!("No image was produced for this prompt.");
        return Ok(());
    };

    let path = out.unwrap_or_else(|| PathBuf::from(image.download_name()));
    let bytes = image.decode_bytes()?;
    std::fs::write(&path, &bytes).with_context(|| format!("Failed to write {:?}", path))?;
    println!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

async fn voice(cfg: &Config, seconds: Option<u64>) -> Result<()> {
    let session = VoiceSession::from_config(cfg);
    session.start().await?;

    let deadline = seconds.map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
    let mut poll = tokio::time::interval(Duration::from_millis(200));
    let mut printed = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = poll.tick() => {}
        }

        let transcript = session.transcript();
        for turn in transcript.iter().skip(printed).filter(|t| !t.text.is_empty()) {
            println!("{}: {}", turn.role.display_name(), turn.text);
        }
        printed = transcript.len();

        if session.status() == SessionStatus::Idle {
            break;
        }
        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            break;
        }
    }

    session.stop().await;

    if let Some(error) = session.last_error() {
        warn!("Session ended with error: {}", error);
    }
    let stats = session.stats();
    info!(
        "Voice session finished: {} frames sent, {} chunks received ({} dropped), {} turns, {} interruptions",
        stats.frames_sent,
        stats.audio_chunks_received,
        stats.chunks_dropped,
        stats.turns,
        stats.interruptions
    );
    Ok(())
}
