//! soundbed CLI: real-time player and offline renderer for ambient soundscapes.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use soundbed_engine::{Backend, CpalBackend, Engine, EngineConfig, OfflineBackend, Preset};
use tracing_subscriber::EnvFilter;

/// How often the real-time player fires due scheduler timers.
const PUMP_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(name = "soundbed", version, about = "Procedural ambient soundscapes")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Fixed seed for noise buffers and event timing.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the soundscape identifiers.
    Presets,
    /// List audio output devices.
    Devices,
    /// Play a soundscape in real time, with a console on stdin.
    Play(PlayArgs),
    /// Render a soundscape to a WAV file.
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct PlayArgs {
    preset: String,
    #[arg(long)]
    volume: Option<f32>,
    /// Output device name (see `devices`).
    #[arg(long)]
    device: Option<String>,
    #[arg(long)]
    sample_rate: Option<u32>,
    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<u64>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    preset: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = 30.0)]
    seconds: f64,
    #[arg(long, default_value_t = 48_000)]
    sample_rate: u32,
    #[arg(long, default_value_t = 0.5)]
    volume: f32,
    /// Crossfade into this preset part-way through.
    #[arg(long)]
    crossfade_to: Option<String>,
    /// When the crossfade starts (seconds); defaults to a third of the render.
    #[arg(long, requires = "crossfade_to")]
    at: Option<f64>,
    #[arg(long, default_value_t = 4_000)]
    fade_ms: u64,
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = EngineConfig::default();
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    match cli.command {
        Command::Presets => {
            for p in Preset::ALL {
                println!("{p}");
            }
            Ok(())
        }
        Command::Devices => {
            println!("Available output devices:");
            for name in soundbed_engine::output_devices()? {
                println!("- {name}");
            }
            Ok(())
        }
        Command::Play(args) => play(args, config),
        Command::Render(args) => render(&args, config),
    }
}

// ------------------------------------ Player -------------------------------------

fn play(args: PlayArgs, config: EngineConfig) -> Result<()> {
    let mut backend = CpalBackend::new();
    if let Some(name) = args.device {
        backend = backend.with_device(name);
    }
    if let Some(sr) = args.sample_rate {
        backend = backend.with_sample_rate(sr);
    }
    let mut engine = Engine::with_config(backend, config);
    engine
        .play(&args.preset, args.volume)
        .with_context(|| format!("cannot start {:?}", args.preset))?;

    println!("Playing {}  | volume {:.2}", args.preset, engine.volume());
    println!("Commands: play <preset> [volume] | fade <preset> <ms> | vol <0..1> | stop | quit");

    let lines = spawn_stdin_reader();
    let deadline = args.duration.map(|d| Instant::now() + Duration::from_secs(d));
    loop {
        engine.pump();
        match lines.try_recv() {
            Ok(line) => match ConsoleCommand::parse(&line) {
                Ok(Some(ConsoleCommand::Quit)) => break,
                Ok(Some(cmd)) => {
                    if let Err(e) = cmd.apply(&mut engine) {
                        tracing::warn!(error = %e, "command failed");
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("{e}"),
            },
            Err(mpsc::TryRecvError::Disconnected) if deadline.is_none() => break,
            Err(_) => {}
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        std::thread::sleep(PUMP_INTERVAL);
    }
    engine.destroy();
    Ok(())
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// One line typed at the player console.
#[derive(Debug, PartialEq)]
enum ConsoleCommand {
    Play(String, Option<f32>),
    Fade(String, u64),
    Volume(f32),
    Stop,
    Quit,
}

impl ConsoleCommand {
    /// `Ok(None)` for a blank line.
    fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else { return Ok(None) };
        let cmd = match verb {
            "play" => {
                let preset = words.next().context("usage: play <preset> [volume]")?;
                let volume = words.next().map(str::parse::<f32>).transpose().context("volume must be a number")?;
                ConsoleCommand::Play(preset.to_string(), volume)
            }
            "fade" => {
                let preset = words.next().context("usage: fade <preset> <ms>")?;
                let ms = words.next().context("usage: fade <preset> <ms>")?;
                ConsoleCommand::Fade(preset.to_string(), ms.parse::<u64>().context("ms must be an integer")?)
            }
            "vol" => {
                let v = words.next().context("usage: vol <0..1>")?;
                ConsoleCommand::Volume(v.parse::<f32>().context("volume must be a number")?)
            }
            "stop" => ConsoleCommand::Stop,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => bail!("unknown command: {other}"),
        };
        Ok(Some(cmd))
    }

    fn apply<B: Backend>(self, engine: &mut Engine<B>) -> Result<()> {
        match self {
            ConsoleCommand::Play(p, v) => engine.play(&p, v)?,
            ConsoleCommand::Fade(p, ms) => engine.crossfade(&p, Duration::from_millis(ms))?,
            ConsoleCommand::Volume(v) => engine.set_volume(v),
            ConsoleCommand::Stop => engine.stop(),
            ConsoleCommand::Quit => {}
        }
        println!("{:?} | volume {:.2}", engine.state(), engine.volume());
        Ok(())
    }
}

// ------------------------------------ Renderer -----------------------------------

fn render(args: &RenderArgs, config: EngineConfig) -> Result<()> {
    if args.seconds.is_nan() || args.seconds <= 0.0 {
        bail!("--seconds must be positive");
    }
    #[allow(clippy::cast_precision_loss)]
    let sr = args.sample_rate as f32;
    let mut engine = Engine::with_config(OfflineBackend::new(sr), config);
    engine.play(&args.preset, Some(args.volume))?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: args.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&args.out, spec)
        .with_context(|| format!("cannot create {}", args.out.display()))?;

    let fade_at = args.crossfade_to.as_ref().map(|p| (p, args.at.unwrap_or(args.seconds / 3.0)));
    let mut fade_pending = fade_at.is_some();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = (args.seconds * f64::from(args.sample_rate)).round() as usize;
    let mut block = vec![0.0_f32; 4_096];
    let mut written = 0;

    while written < total {
        if let (true, Some((to, at))) = (fade_pending, fade_at) {
            if engine.time() >= at {
                engine.crossfade(to, Duration::from_millis(args.fade_ms))?;
                fade_pending = false;
            }
        }
        let n = block.len().min(total - written);
        engine.render(&mut block[..n]);
        for &s in &block[..n] {
            #[allow(clippy::cast_possible_truncation)]
            writer.write_sample((s * f32::from(i16::MAX)) as i16)?;
        }
        written += n;
    }
    writer.finalize().context("cannot finalize WAV file")?;
    tracing::info!(path = %args.out.display(), seconds = args.seconds, "render complete");
    engine.destroy();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_commands_parse() {
        assert_eq!(ConsoleCommand::parse("").ok(), Some(None));
        assert_eq!(
            ConsoleCommand::parse("play rain 0.4").ok().flatten(),
            Some(ConsoleCommand::Play("rain".into(), Some(0.4)))
        );
        assert_eq!(
            ConsoleCommand::parse("fade waves 3000").ok().flatten(),
            Some(ConsoleCommand::Fade("waves".into(), 3_000))
        );
        assert_eq!(ConsoleCommand::parse("vol 0.8").ok().flatten(), Some(ConsoleCommand::Volume(0.8)));
        assert_eq!(ConsoleCommand::parse("  stop ").ok().flatten(), Some(ConsoleCommand::Stop));
        assert!(ConsoleCommand::parse("fade waves").is_err());
        assert!(ConsoleCommand::parse("dance").is_err());
    }

    #[test]
    fn console_drives_an_engine() {
        let mut engine = Engine::offline(8_000.0, EngineConfig::default().with_seed(3));
        ConsoleCommand::Play("rain".into(), Some(0.3)).apply(&mut engine).expect("play");
        assert_eq!(engine.current_preset(), Some(Preset::Rain));
        ConsoleCommand::Volume(2.0).apply(&mut engine).expect("vol");
        assert_eq!(engine.volume(), 1.0);
        assert!(ConsoleCommand::Play("lava".into(), None).apply(&mut engine).is_err());
        ConsoleCommand::Stop.apply(&mut engine).expect("stop");
        assert!(!engine.is_playing());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
