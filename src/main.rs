// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use polysample::audio::{self, AudioMixer, SamplePlayer};
use polysample::config::Performance;
use polysample::playback::{performance_length_ms, Playback};
use polysample::registry::Registry;
use polysample::render::render_performance;
use polysample::scheduler::{millis, TokioScheduler};
use polysample::util::format_ms;

/// Extra time given to the output device after the last note has finished.
const PLAY_TAIL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A polyphonic sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Loads and verifies a performance, printing its samples and notes.
    Verify {
        /// The path to the performance file.
        performance: String,
    },
    /// Renders a performance to a WAV file.
    Render {
        /// The path to the performance file.
        performance: String,
        /// The WAV file to write.
        output: String,
    },
    /// Plays a performance through an audio device.
    Play {
        /// The path to the performance file.
        performance: String,
        /// The device name to play through. The default output device is used if omitted.
        #[arg[short, long]]
        device_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::cpal::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Verify { performance } => {
            let performance = Performance::deserialize(&PathBuf::from(&performance))?;
            let registry = Registry::new();
            let sources = performance.voice_sources(&registry)?;
            let events = performance.note_events()?;

            println!("Samples (count: {}):", sources.len());
            for source in sources.iter() {
                println!(
                    "- {} (Voices={}) (Envelope={}) (Loop={})",
                    source.sample.name(),
                    source.sample.max_voices(),
                    source.envelope.is_some(),
                    source.looping,
                );
            }

            let notes = events.iter().filter(|event| event.pitch.is_some()).count();
            let length_ms =
                performance_length_ms(&events, &sources, performance.release_guard_ms());
            println!(
                "\nNotes: {} ({} rests), length {}",
                notes,
                events.len() - notes,
                format_ms(length_ms)
            );
        }
        Commands::Render {
            performance,
            output,
        } => {
            let performance = Performance::deserialize(&PathBuf::from(&performance))?;
            let summary = render_performance(&performance, &PathBuf::from(&output))?;
            println!(
                "Rendered {} notes ({}) to {}",
                summary.notes,
                format_ms(summary.length.as_secs_f64() * 1000.0),
                output
            );
        }
        Commands::Play {
            performance,
            device_name,
        } => {
            let performance = Performance::deserialize(&PathBuf::from(&performance))?;
            let registry = Registry::new();
            let sources = performance.voice_sources(&registry)?;
            let events = performance.note_events()?;

            let mixer = AudioMixer::new(performance.sample_rate());
            for source in sources.iter() {
                mixer.add_sample(source.sample.clone());
            }
            let length_ms =
                performance_length_ms(&events, &sources, performance.release_guard_ms());

            let stream = audio::cpal::start_output(mixer, device_name.as_deref())?;
            let playback = Playback::new(
                sources,
                Arc::new(TokioScheduler::current()),
                performance.playback_options(),
                &registry,
            );
            playback.audio(&events);
            println!(
                "Playing on {} ({})",
                stream.device_name(),
                format_ms(length_ms)
            );

            tokio::time::sleep(millis(length_ms) + PLAY_TAIL).await;
            registry.shutdown_all();
        }
    }

    Ok(())
}
