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

//! The keyboard control surface.
//!
//! Reads lines from the terminal and feeds each character to the router as
//! a key event. This is the whole control context; it never touches voice
//! state directly.

use std::io;

use tracing::info;

use crate::router::{Router, TriggerOutcome};

const QUIT: &str = "quit";

/// Runs the keyboard loop until the user quits or input closes. Each
/// character on a line is one key event; outcomes that need user feedback
/// are echoed to the writer.
pub fn run<R, W>(router: &mut Router, mut reader: R, mut writer: W) -> Result<(), io::Error>
where
    R: io::BufRead,
    W: io::Write,
{
    writeln!(
        writer,
        "Type keys and press Enter to trigger clips ('{}' exits).",
        QUIT
    )?;
    writer.flush()?;

    let mut input = String::new();
    loop {
        input.clear();
        if reader.read_line(&mut input)? == 0 {
            // Input closed; end the session.
            return Ok(());
        }

        let line = input.trim();
        if line.eq_ignore_ascii_case(QUIT) {
            info!("Session ended from keyboard");
            return Ok(());
        }

        for key in line.chars() {
            match router.handle_key(key) {
                TriggerOutcome::Triggered => {}
                TriggerOutcome::BankSelected(bank) => {
                    writeln!(writer, "Switched to bank {}", bank)?;
                }
                TriggerOutcome::NoBinding => {
                    writeln!(
                        writer,
                        "No sample for key {} in bank {}",
                        key,
                        router.active_bank()
                    )?;
                }
                TriggerOutcome::NoFreeVoice => {
                    writeln!(writer, "All voices busy, dropped {}", key)?;
                }
            }
        }
        writer.flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use crate::samples::{SampleAsset, SampleLibrary, VoicePool};
    use std::io::BufReader;
    use std::sync::Arc;

    fn test_router(capacity: usize) -> (Router, crossbeam_channel::Receiver<crate::audio::Trigger>)
    {
        let asset = Arc::new(SampleAsset::from_samples(vec![0.5; 100], 48000));
        let library = Arc::new(SampleLibrary::from_assets(vec![
            ('1', 'a', asset.clone()),
            ('2', 'b', asset),
        ]));
        let pool = VoicePool::new(capacity);
        let reservations = pool.reservations();
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let router = Router::new(library, Arc::new(Params::new()), tx, reservations, '1');
        (router, rx)
    }

    fn run_input(router: &mut Router, input: &str) -> String {
        let reader = BufReader::new(input.as_bytes());
        let mut output: Vec<u8> = Vec::new();
        run(router, reader, &mut output).expect("run");
        String::from_utf8(output).expect("utf8")
    }

    #[test]
    fn test_keys_trigger_and_quit_exits() {
        let (mut router, rx) = test_router(4);
        run_input(&mut router, "aa\nquit\na\n");
        // Two triggers before quit; the trailing key is never read.
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn test_bank_switch_is_echoed() {
        let (mut router, rx) = test_router(4);
        let output = run_input(&mut router, "2b\n");
        assert!(output.contains("Switched to bank 2"));
        assert_eq!(router.active_bank(), '2');
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_unbound_key_is_echoed() {
        let (mut router, rx) = test_router(4);
        let output = run_input(&mut router, "x\n");
        assert!(output.contains("No sample for key x in bank 1"));
        assert_eq!(rx.len(), 0);
    }

    #[test]
    fn test_closed_input_ends_session() {
        let (mut router, _rx) = test_router(4);
        run_input(&mut router, "");
    }
}
