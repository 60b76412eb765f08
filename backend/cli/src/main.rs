mod input;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use falabot_channels::{DiscordBot, SongbirdConnector};
use falabot_config::{Config, TtsCredential};
use falabot_core::{CancelFlag, PipelineBus, PipelineMessage};
use falabot_media::{EncoderOptions, OpusFrameEncoder};
use falabot_supervisor::{Coordinator, PipelineSettings, PlaybackDriver};
use falabot_tts::{GoogleAuth, GoogleTts, VoiceConfig, VoiceGender};

#[derive(Parser)]
#[command(name = "falabot")]
#[command(about = "Speaks lines typed on stdin into a Discord voice channel")]
#[command(version)]
struct Cli {
    /// Frame file written and reloaded for every line
    #[arg(long)]
    frame_file: Option<PathBuf>,
    /// Where to dump the synthesized audio
    #[arg(long, conflicts_with = "no_audio_dump")]
    audio_dump: Option<PathBuf>,
    /// Do not write the synthesized audio to disk
    #[arg(long)]
    no_audio_dump: bool,
    /// Chat command that makes the bot join your voice channel
    #[arg(long)]
    command: Option<String>,
    /// Directory for rolling JSON log files
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(path) = self.frame_file {
            config.frame_file = path;
        }
        if self.no_audio_dump {
            config.audio_dump = None;
        } else if let Some(path) = self.audio_dump {
            config.audio_dump = Some(path);
        }
        if let Some(command) = self.command {
            config.command = command;
        }
        if let Some(dir) = self.log_dir {
            config.log_dir = Some(dir);
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

fn synthesizer(config: &Config) -> Result<GoogleTts> {
    let voice = VoiceConfig {
        language_code: config.language_code.clone(),
        gender: config
            .voice_gender
            .parse::<VoiceGender>()
            .context("Invalid FALABOT_VOICE_GENDER")?,
        name: config.voice_name.clone(),
        speaking_rate: config.speaking_rate,
        ..VoiceConfig::default()
    };
    let auth = match &config.tts_credential {
        TtsCredential::ApiKey(key) => GoogleAuth::ApiKey(key.clone()),
        TtsCredential::AccessToken(token) => GoogleAuth::AccessToken(token.clone()),
    };
    Ok(GoogleTts::new(auth, voice).with_base_url(&config.tts_base_url))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    cli.apply(&mut config);

    falabot_logging::init_logger(config.log_dir.as_deref(), &config.log_level);
    falabot_config::check(&config).context("Invalid configuration")?;
    info!(config = ?config, "Starting falabot");

    let synthesizer = Arc::new(synthesizer(&config)?);
    let encoder = Arc::new(OpusFrameEncoder::new(EncoderOptions {
        ffmpeg: config.ffmpeg.clone(),
        bitrate: config.opus_bitrate,
    }));

    let mut bus = PipelineBus::new();
    let pipeline_rx = bus.take_rx().context("pipeline rx already taken")?;

    let bot = DiscordBot::new(config.discord_token.clone(), config.command.clone());
    let (mut client, songbird) = bot
        .build(bus.sender())
        .await
        .context("Failed to build Discord client")?;

    let cancel = CancelFlag::new();
    let coordinator = Coordinator::new(
        synthesizer,
        encoder,
        Arc::new(SongbirdConnector::new(songbird, cancel.clone())),
        PipelineSettings {
            frame_file: config.frame_file.clone(),
            audio_dump: config.audio_dump.clone(),
            synthesis_timeout: config.synthesis_timeout,
            encode_timeout: config.encode_timeout,
            io_timeout: config.io_timeout,
        },
    )
    .with_playback(PlaybackDriver::new().with_cancel(cancel.clone()));

    let shard_manager = client.shard_manager.clone();
    let mut gateway = tokio::spawn(async move {
        if let Err(e) = client.start().await {
            error!(error = ?e, "Discord client error");
        }
    });

    let mut pipeline = tokio::spawn(coordinator.run(pipeline_rx));
    let stdin_done = input::spawn_stdin_reader(bus.sender()).context("Failed to start stdin reader")?;

    info!("Bot is now running. Type a line to speak it; Ctrl-D or Ctrl-C to exit.");

    let mut pipeline_finished = false;
    let mut gateway_finished = false;
    tokio::select! {
        done = stdin_done => match done {
            Ok(Ok(lines)) => info!(lines, "Standard input closed"),
            Ok(Err(e)) => error!(error = %e, "Standard input reader failed"),
            Err(_) => error!("Standard input reader exited unexpectedly"),
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received; cancelling playback");
            cancel.cancel();
        }
        finished = &mut pipeline => {
            pipeline_finished = true;
            report_pipeline(finished);
        }
        _ = &mut gateway => {
            gateway_finished = true;
            error!("Discord gateway stopped; shutting down");
        }
    }

    let pipeline_abort = pipeline.abort_handle();
    let drain = async {
        if !pipeline_finished {
            if let Err(e) = bus.send(PipelineMessage::Shutdown).await {
                warn!(error = %e, "Pipeline already stopped");
            }
            report_pipeline(pipeline.await);
        }

        if !gateway_finished {
            shard_manager.shutdown_all().await;
            if let Err(e) = gateway.await {
                warn!(error = %e, "Gateway task ended abnormally");
            }
        }
    };

    if drain_unless_interrupted(drain, tokio::signal::ctrl_c()).await {
        info!("falabot stopped");
    } else {
        warn!("Interrupted during shutdown; exiting without draining the queue");
        cancel.cancel();
        pipeline_abort.abort();
    }
    Ok(())
}

/// Runs `drain` to completion unless `interrupt` resolves first.
/// Returns `false` when interrupted.
async fn drain_unless_interrupted<D, I>(drain: D, interrupt: I) -> bool
where
    D: Future<Output = ()>,
    I: Future,
{
    tokio::select! {
        _ = drain => true,
        _ = interrupt => false,
    }
}

fn report_pipeline(result: Result<falabot_core::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => info!("Pipeline drained"),
        Ok(Err(e)) => error!(error = %e, "Pipeline stopped with an error"),
        Err(e) => error!(error = %e, "Pipeline task panicked"),
    }
}
