use super::Intent;
use crate::classifier::ModelKind;
use crate::error::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Map a key press to the intent it triggers
pub fn intent_for_key(key: &KeyEvent) -> Option<Intent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        // Raw mode swallows SIGINT
        return matches!(key.code, KeyCode::Char('c')).then_some(Intent::Quit);
    }

    match key.code {
        KeyCode::Char('c') | KeyCode::Char(' ') => Some(Intent::Capture),
        KeyCode::Char('s') => Some(Intent::Save),
        KeyCode::Char('r') => Some(Intent::Retake),
        KeyCode::Char('t') => Some(Intent::ToggleTorch),
        KeyCode::Char('1') => Some(Intent::SelectModel(ModelKind::MobileNet)),
        KeyCode::Char('2') => Some(Intent::SelectModel(ModelKind::Food)),
        KeyCode::Char('3') => Some(Intent::SelectModel(ModelKind::Flowers)),
        KeyCode::Char('q') | KeyCode::Esc => Some(Intent::Quit),
        _ => None,
    }
}

/// Terminal keyboard surface forwarding key presses as intents
pub struct KeyboardInputHandler {
    intents: mpsc::Sender<Intent>,
    cancellation_token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl KeyboardInputHandler {
    pub fn new(intents: mpsc::Sender<Intent>) -> Self {
        Self {
            intents,
            cancellation_token: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard input handler");

        let intents = self.intents.clone();
        let cancellation_token = self.cancellation_token.clone();

        // crossterm polling blocks
        let task = task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled - keyboard handler active");

            while !cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let key = match event::read() {
                            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
                            _ => continue,
                        };
                        let Some(intent) = intent_for_key(&key) else {
                            debug!("Key pressed: {:?}", key.code);
                            continue;
                        };

                        debug!("Key {:?} -> {:?}", key.code, intent);
                        if intents.blocking_send(intent).is_err() {
                            debug!("Intent receiver closed");
                            break;
                        }
                        if intent == Intent::Quit {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        *self.task.lock() = Some(task);
        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if tokio::time::timeout(Duration::from_millis(500), task)
                .await
                .is_err()
            {
                warn!("Keyboard handler did not exit in time");
            }
        }

        // Ensure raw mode is disabled even if the task didn't clean up
        let _ = disable_raw_mode();
        Ok(())
    }
}
