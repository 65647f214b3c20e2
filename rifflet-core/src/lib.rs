//! # Rifflet Core
//!
//! Pure Rust single-pass reader for uncompressed RIFF/AVI video.
//!
//! ```no_run
//! use rifflet_core::AviInput;
//!
//! let mut input = AviInput::from_file("clip.avi").expect("not a readable AVI");
//! while !input.current_info().completed {
//!     if input.is_frame_available(1.0 / 60.0) {
//!         match input.next_frame() {
//!             Ok(Some(frame)) => println!("frame of {} bytes", frame.size),
//!             _ => break,
//!         }
//!     }
//! }
//! ```

// ============================================================================
// RIFF structure
// ============================================================================
pub mod byte_cursor;
pub mod riff;

// ============================================================================
// AVI
// ============================================================================
pub mod avi_header;
pub mod frame_demux;
pub mod avi_input;

// ============================================================================
// Support
// ============================================================================
pub mod config;
pub mod error;

#[cfg(test)]
mod test_support;

pub use avi_header::{MainHeader, StreamDescriptor, StreamKind, VideoFormat};
pub use avi_input::{avi_probe, probe_value, AviInfo, AviInput};
pub use config::{ConfigError, InputConfig};
pub use error::{AviError, Result};
pub use frame_demux::{DemuxState, FrameInfo, OwnedFrame};
pub use riff::FourCC;

// ============================================================================
// Version
// ============================================================================
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
