use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use vidyamitra_gateway::daemon::{build_narrator, build_recognizer};
use vidyamitra_gateway::voice::engine::{AudioOutput, SpeechSynthesizer};
use vidyamitra_gateway::voice::{
    AudioCapture, CpalOutput, EspeakSynthesizer, VoiceRoute, VoiceSelector, WakeWordService,
    capture_utterance, rms_energy,
};
use vidyamitra_gateway::{Config, Daemon, Language};

/// VidyaMitra - Voice narration and tutoring gateway
#[derive(Parser)]
#[command(name = "vidyamitra", version, about)]
struct Cli {
    /// Port to listen on (overrides configuration)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (for headless servers without audio hardware)
    #[arg(long, env = "VIDYAMITRA_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server and voice assistant (default)
    Serve {
        /// Tutor language for the voice assistant
        #[arg(short, long, default_value = "en")]
        lang: String,
    },
    /// Narrate text through the speakers
    Speak {
        /// Language code (en, hi, te, ta, mr, ...)
        #[arg(short, long, default_value = "en")]
        lang: String,
        /// Text to narrate
        text: String,
    },
    /// Listen for the wake word and print what follows it
    Listen {
        /// Recognition language
        #[arg(short, long, default_value = "en")]
        lang: String,
    },
    /// Show installed on-device voices and the route each language takes
    Voices,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,vidyamitra_gateway=info",
        1 => "info,vidyamitra_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.disable_voice)?;
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve {
        lang: "en".to_string(),
    }) {
        Command::Serve { lang } => serve(config, &lang).await,
        Command::Speak { lang, text } => speak(&config, &lang, &text).await,
        Command::Listen { lang } => listen(&config, &lang).await,
        Command::Voices => voices(&config).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker().await,
    }
}

async fn serve(config: Config, lang: &str) -> anyhow::Result<()> {
    let language = Language::from_code_lossy(lang);

    tracing::info!(
        port = config.api_server.port,
        language = language.code(),
        voice = config.voice.enabled,
        "starting vidyamitra gateway"
    );

    if config.voice.enabled {
        if let Some(wake_word) = config.voice.wake_words.first() {
            tracing::info!("vidyamitra ready - say \"{wake_word}\"");
        }
    } else {
        tracing::info!("vidyamitra ready (API only, voice disabled)");
    }

    Daemon::new(config, language)?.run().await?;
    Ok(())
}

/// Narrate text and wait for it to finish
async fn speak(config: &Config, lang: &str, text: &str) -> anyhow::Result<()> {
    let language = Language::from_code_lossy(lang);
    let narrator = build_narrator(&config.voice)?;

    let Some(session) = narrator.speak(text, language).await? else {
        println!("Nothing to narrate after removing markup.");
        return Ok(());
    };
    println!("Narrating in {} (session {session})...", language.name());

    let status = tokio::select! {
        status = narrator.wait_idle() => status?,
        _ = tokio::signal::ctrl_c() => {
            narrator.stop().await?;
            println!("Stopped.");
            return Ok(());
        }
    };

    if let Some(error) = status.error {
        anyhow::bail!("narration failed: {error}");
    }
    println!("Done.");
    Ok(())
}

/// Print wake word activations until interrupted
async fn listen(config: &Config, lang: &str) -> anyhow::Result<()> {
    let language = Language::from_code_lossy(lang);
    let recognizer = build_recognizer(&config.voice)?;
    let service = WakeWordService::new(Arc::clone(&recognizer), config.voice.wake_words.clone());

    let (activations_tx, mut activations_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    println!(
        "Listening for {:?}; requests in {}. Press Ctrl-C to stop.\n",
        config.voice.wake_words,
        language.name()
    );

    let listener = tokio::spawn(service.run(activations_tx, shutdown_rx));
    while let Some(activation) = activations_rx.recv().await {
        match activation.request {
            Some(request) => println!("Heard \"{}\" -> request: {request}", activation.transcript),
            None => {
                println!("Heard \"{}\", listening for a request...", activation.transcript);
                match capture_utterance(recognizer.as_ref(), language.recognition_locale()).await? {
                    Some(request) => println!("  request: {request}"),
                    None => println!("  (no request)"),
                }
            }
        }
    }

    listener.await??;
    Ok(())
}

/// List on-device voices and the route each language would take
async fn voices(config: &Config) -> anyhow::Result<()> {
    let output: Arc<dyn AudioOutput> = Arc::new(CpalOutput::new()?);
    let synthesizer = EspeakSynthesizer::new(config.voice.espeak_binary.clone(), output);
    let installed = synthesizer.voices().await;
    let selector = VoiceSelector::new(config.voice.local_languages.clone());

    println!("{} on-device voices via {}", installed.len(), config.voice.espeak_binary);
    println!("---");

    for language in Language::ALL {
        let route = match selector.select(language, &installed) {
            VoiceRoute::Local => "on-device",
            VoiceRoute::Remote => "remote proxy",
        };
        println!("{:<4} {:<10} {route}", language.code(), language.name());
    }

    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.snapshot();
        let energy = rms_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        capture.clear();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = CpalOutput::new()?;

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let num_samples = sample_rate as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    playback.play_samples(samples, sample_rate).await?;

    println!("If you heard the tone, your speakers are working!");
    println!("If not, check: pactl list sinks short");

    Ok(())
}
