//! Live adapters for real external interactions.

pub mod clock;
pub mod events;
pub mod filesystem;
pub mod github;
