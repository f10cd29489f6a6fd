//! Emulator seam for the Game Boy training harness.
//!
//! Everything above this crate talks to the emulator through the [`Emulator`] trait,
//! so episodes can run against any backend that can tick frames, press buttons,
//! peek at RAM, capture the screen and restore a save state.
//!
//! - [`Emulator`] / [`ReadMemory`] - the backend interface
//! - [`Button`] - the eight joypad inputs
//! - [`Screen`] / [`Frame`] - luminance capture and mean-pooled downscaling
//! - [`RingBuffer`] / [`FrameHistory`] - fixed-capacity, index-addressed history buffers
//!
//! A concrete backend built on the `boytacean` emulator is available behind the
//! `boytacean` cargo feature.
//!
//! # Example
//!
//! ```
//! use gbneat_engine::{FrameHistory, Screen};
//!
//! let screen = Screen::blank();
//! let frame = screen.downscale(4);
//! assert_eq!((frame.width(), frame.height()), (40, 36));
//!
//! let mut history = FrameHistory::new(frame.width(), frame.height(), 3);
//! history.push(&frame);
//! assert_eq!(history.len(), 3 * 40 * 36);
//! ```

pub use self::{button::*, emulator::*, ring_buffer::*, screen::*};

#[cfg(feature = "boytacean")]
pub mod boytacean_backend;
mod button;
mod emulator;
mod ring_buffer;
mod screen;
