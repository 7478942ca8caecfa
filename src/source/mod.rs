//! Frame sources for driving a hub without a real host.

mod mock;

pub use mock::{MockSource, Waveform};
