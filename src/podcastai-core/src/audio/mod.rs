//! Audio buffers, codecs and the episode mix.

pub mod buffer;
pub mod codec;
pub mod mix;

pub use buffer::{AudioBuffer, OverlayOptions, db_to_amplitude};
pub use mix::{AssembledEpisode, Assembler, MixStep};
