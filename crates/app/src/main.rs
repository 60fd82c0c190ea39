use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use slipnote_core::{
    input_devices, project, AudioPlayer, AudioRecorder, FrameStore, HeaderStyle,
    MicrophoneSelection, Notifier, PlaybackSequencer, ProjectCodec, SequencerTick, SessionConfig,
    SlipnoteError,
};
use tracing_subscriber::EnvFilter;

fn main() -> slipnote_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };
    config.validate()?;

    match cli.command {
        Commands::Devices => run_devices(),
        Commands::New { output, frames } => run_new(&config, &output, frames),
        Commands::Info { project } => run_info(&project),
        Commands::Record {
            seconds,
            device,
            output,
        } => run_record(config, seconds, device, output),
        Commands::Preview { project, fps } => run_preview(&config, &project, fps),
        Commands::Play { audio } => run_play(&audio),
    }
}

fn run_devices() -> slipnote_core::Result<()> {
    let devices = input_devices()?;
    if devices.is_empty() {
        tracing::warn!("no input devices found; recordings will use the synthetic microphone");
    }
    for device in devices {
        println!("{:>3}  {}", device.index, device.name);
    }
    Ok(())
}

fn run_new(config: &SessionConfig, output: &Path, frames: usize) -> slipnote_core::Result<()> {
    let canvas = &config.canvas;
    let mut store = FrameStore::with_background(canvas.width, canvas.height, canvas.background);
    for _ in 1..frames.max(1) {
        store.add_frame();
    }
    codec_for(config).save(&store, output)?;
    tracing::info!(path = %output.display(), frames = store.len(), "project written");
    Ok(())
}

fn run_info(path: &Path) -> slipnote_core::Result<()> {
    let bytes = std::fs::read(path)?;
    let header = project::inspect(&bytes)?;
    println!("file:    {}", path.display());
    println!("format:  {:?}", header.style);
    println!("frames:  {}", header.frame_count);
    println!("size:    {}x{}", header.width, header.height);
    Ok(())
}

fn run_record(
    mut config: SessionConfig,
    seconds: f32,
    device: Option<usize>,
    output: Option<PathBuf>,
) -> slipnote_core::Result<()> {
    if let Some(index) = device {
        config.audio.microphone = MicrophoneSelection::Device { index };
    }
    if let Some(output) = output {
        config.audio.output_path = output;
    }

    let length = recording_length(seconds)?;
    let mut recorder = AudioRecorder::new(config.audio, Notifier::tracing_only());
    recorder.start()?;
    thread::sleep(length);
    let outcome = recorder.stop()?;

    tracing::info!(
        path = %outcome.path.display(),
        samples = outcome.samples,
        duration = ?outcome.duration,
        source = ?outcome.source,
        fell_back = outcome.fell_back,
        "recording saved"
    );
    Ok(())
}

fn recording_length(seconds: f32) -> slipnote_core::Result<Duration> {
    Duration::try_from_secs_f32(seconds)
        .map_err(|err| SlipnoteError::Config(format!("invalid recording length {seconds}: {err}")))
}

fn run_preview(config: &SessionConfig, path: &Path, fps: Option<i64>) -> slipnote_core::Result<()> {
    let store = codec_for(config).load(path)?;
    let mut sequencer = PlaybackSequencer::new(config.playback.clamp_fps(fps));
    tracing::info!(frames = store.len(), fps = sequencer.fps(), "preview started");

    let mut shown = match sequencer.start(store.len()) {
        SequencerTick::Show(index) => index,
        _ => return Ok(()),
    };
    tracing::info!(frame = shown, "showing frame");

    let period = Duration::from_secs_f32(sequencer.frame_duration());
    let mut last = Instant::now();
    loop {
        thread::sleep(period);
        let now = Instant::now();
        let delta = now.duration_since(last).as_secs_f32();
        last = now;

        match sequencer.tick(delta) {
            SequencerTick::Show(index) if index != shown => {
                shown = index;
                tracing::info!(frame = index, "showing frame");
            }
            SequencerTick::Show(_) => {}
            SequencerTick::Finished | SequencerTick::Idle => break,
        }
    }
    tracing::info!("preview finished");
    Ok(())
}

fn run_play(path: &Path) -> slipnote_core::Result<()> {
    let mut player = AudioPlayer::new();
    let info = player.play(path)?;
    tracing::info!(
        path = %path.display(),
        sample_rate = info.sample_rate,
        channels = info.channels,
        duration = ?info.duration,
        "playing"
    );
    while !player.is_idle() {
        thread::sleep(Duration::from_millis(100));
    }
    Ok(())
}

fn codec_for(config: &SessionConfig) -> ProjectCodec {
    let header = if config.project.tagged_header {
        HeaderStyle::Tagged
    } else {
        HeaderStyle::Plain
    };
    ProjectCodec::new()
        .with_header(header)
        .with_background(config.canvas.background)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Flipbook animation with narration", long_about = None)]
struct Cli {
    /// Session configuration as JSON.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List audio input devices.
    Devices,
    /// Write a project of blank frames.
    New {
        output: PathBuf,
        #[arg(short, long, default_value_t = 1)]
        frames: usize,
    },
    /// Show the header of a project file.
    Info { project: PathBuf },
    /// Record narration to a WAV file.
    Record {
        #[arg(short, long, default_value_t = 5.0)]
        seconds: f32,
        /// Input device index; the synthetic microphone is used otherwise.
        #[arg(short, long)]
        device: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Play a project's frames once at the given rate.
    Preview {
        project: PathBuf,
        #[arg(long)]
        fps: Option<i64>,
    },
    /// Play an audio file.
    Play { audio: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_length_rejects_unrepresentable_values() {
        assert_eq!(recording_length(1.5).unwrap(), Duration::from_millis(1500));
        for bad in [f32::INFINITY, f32::NAN, -1.0] {
            assert!(matches!(recording_length(bad), Err(SlipnoteError::Config(_))));
        }
    }
}
