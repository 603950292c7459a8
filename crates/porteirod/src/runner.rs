//! Engine thread and operator console.
//!
//! The decision loop runs blocking on a dedicated OS thread; the async
//! side owns stdin and ctrl-c and forwards [`Command`]s over an mpsc
//! channel. In access mode commands are drained between frames; in
//! registration mode the loop blocks on the channel and consumes no
//! frames until structured input arrives or the mode switches back.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

use porteiro_core::{ChannelError, DetectError, FaceDetector, Signal, SignalFile};
use porteiro_hw::{CameraError, FrameSource};

use crate::controller::{AccessController, ControllerError};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectError),
    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),
    #[error("signal channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Operator commands forwarded to the engine thread.
#[derive(Debug)]
pub enum Command {
    EnterRegistration,
    EnterAccess,
    Register {
        name: String,
        block: String,
        unit: String,
    },
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Access,
    Registration,
}

/// Spawn the decision loop on a dedicated OS thread.
///
/// The thread exits on a [`Command::Quit`], when every sender is
/// dropped, or on a fatal error (capture, inference, persistence).
/// The camera is released and the signal slot cleared on the way out.
pub fn spawn_engine<S, D>(
    source: S,
    detector: D,
    controller: AccessController,
    channel: SignalFile,
    frame_interval: Duration,
    rx: mpsc::Receiver<Command>,
) -> std::thread::JoinHandle<Result<(), EngineError>>
where
    S: FrameSource + Send + 'static,
    D: FaceDetector + Send + 'static,
{
    std::thread::Builder::new()
        .name("porteiro-engine".into())
        .spawn(move || {
            let result = run_loop(&source, detector, controller, &channel, frame_interval, rx);
            // Leave the indicator a clean slot rather than a stale token.
            if let Err(e) = channel.set(Signal::Idle) {
                tracing::warn!(error = %e, "failed to clear signal on shutdown");
            }
            tracing::info!("decision loop ended");
            result
        })
        .expect("failed to spawn engine thread")
}

fn run_loop<S: FrameSource, D: FaceDetector>(
    source: &S,
    mut detector: D,
    mut controller: AccessController,
    channel: &SignalFile,
    frame_interval: Duration,
    mut rx: mpsc::Receiver<Command>,
) -> Result<(), EngineError> {
    let mut mode = Mode::Access;
    tracing::info!("decision loop started in access mode");

    loop {
        match mode {
            // No frames are consumed in registration mode: block until
            // the operator supplies input or switches back.
            Mode::Registration => match rx.blocking_recv() {
                None | Some(Command::Quit) => return Ok(()),
                Some(Command::EnterAccess) => {
                    tracing::info!("access mode");
                    mode = Mode::Access;
                }
                Some(Command::EnterRegistration) => {}
                Some(Command::Register { name, block, unit }) => {
                    handle_registration(source, &mut detector, &mut controller, &name, &block, &unit)?;
                }
            },
            Mode::Access => {
                // Drain pending commands without blocking the frame cycle.
                loop {
                    match rx.try_recv() {
                        Ok(Command::Quit) => return Ok(()),
                        Ok(Command::EnterRegistration) => {
                            tracing::info!("registration mode, frame processing suspended");
                            // Leave the rest of the queue to the
                            // registration handler.
                            mode = Mode::Registration;
                            break;
                        }
                        Ok(Command::EnterAccess) => {}
                        Ok(Command::Register { .. }) => {
                            tracing::warn!("ignoring save: not in registration mode");
                        }
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        Err(mpsc::error::TryRecvError::Disconnected) => return Ok(()),
                    }
                }
                if mode != Mode::Access {
                    continue;
                }

                let frame = source.capture_frame()?;
                let regions = detector.detect(&frame.data, frame.width, frame.height)?;
                let signatures = if regions.is_empty() {
                    Vec::new()
                } else {
                    detector.encode(&frame.data, frame.width, frame.height, &regions)?
                };

                let decision = controller.assess(&signatures, frame.timestamp)?;
                channel.set(decision.signal())?;

                std::thread::sleep(frame_interval);
            }
        }
    }
}

/// Capture a registration frame and enroll. Recoverable failures (no
/// face, several faces, store refusal) are reported and the loop goes on.
fn handle_registration<S: FrameSource, D: FaceDetector>(
    source: &S,
    detector: &mut D,
    controller: &mut AccessController,
    name: &str,
    block: &str,
    unit: &str,
) -> Result<(), EngineError> {
    let frame = source.capture_frame()?;
    let regions = detector.detect(&frame.data, frame.width, frame.height)?;
    let signatures = detector.encode(&frame.data, frame.width, frame.height, &regions)?;

    match controller.register(&signatures, name, unit, block) {
        Ok(id) => {
            println!("Resident {name} registered (id {id}).");
        }
        Err(e) => {
            tracing::warn!(resident = name, error = %e, "registration failed");
            println!("Registration failed: {e}. Try again.");
        }
    }
    Ok(())
}

/// Print the operator menu.
pub fn print_menu() {
    println!("=== Porteiro — facial-recognition access control ===");
    println!("  q         quit");
    println!("  c         enter registration mode");
    println!("  a         return to access mode");
    println!("  s         save a new resident (registration mode only)");
}

/// Read operator commands from stdin and forward them to the engine.
///
/// Returns when the operator quits or stdin closes. The `s` command
/// prompts for the three registration fields before anything is sent,
/// matching the suspended-loop registration flow.
pub async fn run_console(tx: mpsc::Sender<Command>) {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let Ok(Some(line)) = lines.next_line().await else {
            return;
        };
        let command = match line.trim() {
            "" => continue,
            "q" => {
                let _ = tx.send(Command::Quit).await;
                return;
            }
            "c" => Command::EnterRegistration,
            "a" => Command::EnterAccess,
            "s" => match read_registration_fields(&mut lines).await {
                Some(cmd) => cmd,
                None => return,
            },
            other => {
                println!("Unknown command {other:?}.");
                print_menu();
                continue;
            }
        };
        if tx.send(command).await.is_err() {
            return;
        }
    }
}

async fn read_registration_fields(lines: &mut Lines<BufReader<Stdin>>) -> Option<Command> {
    println!("Resident name:");
    let name = lines.next_line().await.ok()??.trim().to_string();
    println!("Block:");
    let block = lines.next_line().await.ok()??.trim().to_string();
    println!("Unit:");
    let unit = lines.next_line().await.ok()??.trim().to_string();
    Some(Command::Register { name, block, unit })
}
