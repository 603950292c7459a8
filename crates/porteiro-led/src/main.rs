//! porteiro-led — the "simulated Arduino" indicator.
//!
//! Polls the shared signal file once a second and renders a two-color
//! terminal LED: green for an authorized signal, red for denied, and
//! whatever it last showed while the slot is idle (gray until the first
//! signal arrives). Purely reactive; it runs and dies independently of
//! the decision loop.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use porteiro_core::{ChannelError, Signal, SignalFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Led {
    Gray,
    Green,
    Red,
}

impl Led {
    fn render(&self) -> &'static str {
        match self {
            Led::Gray => "\x1b[90m●\x1b[0m off",
            Led::Green => "\x1b[32m●\x1b[0m GREEN (access granted)",
            Led::Red => "\x1b[31m●\x1b[0m RED (access denied)",
        }
    }
}

/// Next LED state for a polled signal. Idle retains the current color.
fn apply(current: Led, signal: Signal) -> Led {
    match signal {
        Signal::Authorized => Led::Green,
        Signal::Denied => Led::Red,
        Signal::Idle => current,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let channel_path = std::env::var("PORTEIRO_CHANNEL_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("comando.txt"));
    let poll_ms = std::env::var("PORTEIRO_POLL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000u64);

    let channel = SignalFile::new(&channel_path);
    tracing::info!(channel = %channel_path.display(), poll_ms, "porteiro-led starting");

    let mut led = Led::Gray;
    println!("LED {}", led.render());

    let mut ticker = tokio::time::interval(Duration::from_millis(poll_ms));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match channel.consume() {
                    Ok(signal) => {
                        let next = apply(led, signal);
                        if next != led {
                            led = next;
                            println!("LED {}", led.render());
                        }
                        match signal {
                            Signal::Authorized => tracing::info!("green LED lit (access granted)"),
                            Signal::Denied => tracing::info!("red LED lit (access denied)"),
                            Signal::Idle => {}
                        }
                    }
                    Err(ChannelError::UnknownToken(token)) => {
                        tracing::warn!(token, "unrecognized signal token, keeping current LED");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "signal poll failed");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("porteiro-led stopping");
                return Ok(());
            }
        }
    }
}
