use crate::state::{CameraState, StateStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Human-readable lines for what changed between two snapshots
pub fn describe_changes(previous: &CameraState, current: &CameraState) -> Vec<String> {
    let mut lines = Vec::new();

    if previous.label != current.label {
        lines.push(format!("Label: {}", current.label));
    }
    if previous.model != current.model {
        lines.push(format!("Model: {}", current.model.display_name()));
    }
    if previous.phase != current.phase {
        lines.push(format!("Phase: {:?}", current.phase));
    }
    if previous.torch != current.torch {
        lines.push(format!("Torch: {}", if current.torch { "on" } else { "off" }));
    }
    if previous.camera != current.camera {
        lines.push(format!("Camera: {:?}", current.camera));
    }
    if previous.classifier != current.classifier {
        lines.push(format!("Classifier: {:?}", current.classifier));
    }
    if previous.last_error != current.last_error {
        if let Some(error) = &current.last_error {
            lines.push(format!("Error: {}", error));
        }
    }

    lines
}

/// Render state changes to the log until cancelled
pub(super) fn spawn_presenter(store: StateStore, token: CancellationToken) -> JoinHandle<()> {
    let mut updates = store.subscribe();
    tokio::spawn(async move {
        let mut previous = updates.borrow_and_update().clone();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = updates.borrow_and_update().clone();
                    for line in describe_changes(&previous, &current) {
                        info!("{}", line);
                    }
                    previous = current;
                }
            }
        }
        debug!("Presenter stopped");
    })
}
