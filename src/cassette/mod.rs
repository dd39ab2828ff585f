//! Cassette format for recording and replaying remote tracker interactions.

pub mod format;
pub mod recorder;
pub mod replayer;
