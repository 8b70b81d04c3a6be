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
mod audio;
mod config;
mod controller;
mod params;
mod router;
mod samples;
#[cfg(test)]
mod testutil;

use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use parking_lot::Mutex;
use tracing::info;

use crate::audio::cpal::OutputStream;
use crate::audio::{Mixer, Recorder};
use crate::config::Config;
use crate::params::Params;
use crate::router::Router;
use crate::samples::{SampleLibrary, VoicePool};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A polyphonic keyboard sample pad."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists and verifies the banks in the given configuration.
    Banks {
        /// The path to the instrument configuration.
        config_path: String,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Start will start the instrument.
    Start {
        /// The path to the instrument configuration.
        config_path: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Banks { config_path } => {
            let config = Config::load(&PathBuf::from(&config_path))?;
            let library = SampleLibrary::load(
                config.bindings(),
                config.base_path(),
                config.audio().sample_rate(),
            )?;

            println!("Banks (count: {}):", library.bank_ids().len());
            for bank in library.bank_ids() {
                println!("- bank {}:", bank);
                for key in library.keys_in_bank(bank) {
                    let asset = library.lookup(bank, key).expect("listed key");
                    println!(
                        "  {} ({:.2}s, {} samples)",
                        key,
                        asset.duration().as_secs_f64(),
                        asset.len()
                    );
                }
            }
        }
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
        Commands::Start { config_path } => {
            start(&PathBuf::from(&config_path))?;
        }
    }

    Ok(())
}

/// Brings the instrument up, runs the keyboard loop until the session ends,
/// then writes the recording. A recording failure here is fatal.
fn start(config_path: &Path) -> Result<(), Box<dyn Error>> {
    let config = Config::load(config_path)?;
    let sample_rate = config.audio().sample_rate();

    let library = Arc::new(SampleLibrary::load(
        config.bindings(),
        config.base_path(),
        sample_rate,
    )?);

    let params = Arc::new(Params::new());
    config.params().apply(&params);

    let pool = VoicePool::new(config.polyphony());
    let reservations = pool.reservations();
    let (trigger_tx, trigger_rx) = crossbeam_channel::bounded(config.polyphony());
    let recorder = Arc::new(Mutex::new(Recorder::new(sample_rate)));

    let mixer = Mixer::new(
        pool,
        Arc::clone(&params),
        trigger_rx,
        Arc::clone(&recorder),
        config.audio().buffer_size(),
    );
    let stream = OutputStream::start(config.audio(), mixer)?;

    let initial_bank = config.initial_bank().unwrap_or('1');
    info!(
        banks = library.bank_ids().len(),
        clips = library.len(),
        polyphony = config.polyphony(),
        initial_bank = %initial_bank,
        device = stream.device_name(),
        "Instrument ready"
    );

    let mut router = Router::new(library, params, trigger_tx, reservations, initial_bank);
    controller::run(&mut router, io::stdin().lock(), io::stdout())?;

    // Stop the callback before touching the recorder; flushing happens
    // strictly outside the audio context.
    stream.stop();

    let filename = audio::recording_filename();
    recorder.lock().flush(Path::new(&filename))?;
    println!("Recording written to {}", filename);

    Ok(())
}
