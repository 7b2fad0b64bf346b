//! HTTP route handlers, grouped by resource the way spec.md's route table
//! groups them.

pub mod definitions;
pub mod downloads;
pub mod media;
pub mod settings;
pub mod subscriptions;
pub mod system;
pub mod videos;

pub use definitions::*;
pub use downloads::*;
pub use media::*;
pub use settings::*;
pub use subscriptions::*;
pub use system::*;
pub use videos::*;
