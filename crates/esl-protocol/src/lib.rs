//! Shared types for es-logger: the event document model, build identity,
//! extension settings and the "build finished" notifications consumed by
//! the daemon.

pub mod event;
pub mod notification;
pub mod settings;

pub use event::*;
pub use notification::*;
pub use settings::Settings;
