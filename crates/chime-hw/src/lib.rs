//! chime-hw — Hardware abstraction for the doorbell.
//!
//! V4L2-based camera access and audio clip playback. Everything here is
//! blocking and meant to be driven from the dispatch loop's dedicated
//! thread.

pub mod audio;
pub mod camera;
pub mod frame;

pub use audio::{AudioError, Speaker};
pub use camera::{Camera, CameraError};
pub use frame::Frame;
