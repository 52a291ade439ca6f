mod store;
mod types;


pub use store::StateStore;
pub use types::{CameraState, CameraStatus, ClassifierStatus, SessionPhase, UserFacingError};
