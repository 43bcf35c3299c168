//! Lattice, a headless Matrix client built around a room timeline
//! synchronization engine.
//!
//! - [`timeline`] - Per-room timelines fed by sync batches, outgoing messages
//! - [`matrix`] - Login, session persistence, sync loop and transmission
//! - [`console`] - Console commands driving the engine
//! - [`markup`] - Markdown rendering and HTML helpers
//! - [`settings`] - User settings read by the engine
//! - [`config`] - YAML configuration with environment overrides
//! - [`app`] - Wiring of the tasks

pub mod app;
pub mod config;
pub mod console;
pub mod markup;
pub mod matrix;
pub mod settings;
pub mod timeline;
