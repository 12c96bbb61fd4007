//! Command handlers, one module per command group.

pub mod events;
pub mod init;
pub mod maintenance;
pub mod misc;
pub mod templates;
