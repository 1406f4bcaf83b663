use super::ControlCommand;
use crossbeam::channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Keyboard control: Enter triggers the output, `x` stops the session
pub struct KeyboardInputHandler {
    control: Sender<ControlCommand>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    /// Create a new keyboard input handler
    pub fn new(control: Sender<ControlCommand>) -> Self {
        Self {
            control,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub fn start(&self) {
        info!("Starting keyboard input handler - ENTER to trigger output, x to stop");

        let control = self.control.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            while !cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        let command = match key_event.code {
                            KeyCode::Enter => ControlCommand::ManualTrigger,
                            KeyCode::Char('x') | KeyCode::Char('X') => ControlCommand::Stop,
                            other => {
                                debug!("Key pressed: {:?}", other);
                                continue;
                            }
                        };

                        info!("Keyboard command: {:?}", command);
                        if control.send(command).is_err() || command == ControlCommand::Stop {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        error!("Error polling for keyboard events: {}", e);
                        break;
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard input handler task exited");
        });
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to leave raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();
    }
}
