//! AvsLink protocol engine.
//!
//! Client side of the voice service: the long-lived downchannel, speech
//! uploads on short-lived event streams, and the multipart framing both
//! directions use.  The engine is transport-agnostic; the HTTP/2 client,
//! audio player, capture and credential service plug in through the port
//! traits in [`app::ports`] and [`avs::transport`].
//!
//! ESP-IDF specifics (logger, core pinning, critical section) are behind
//! the `espidf` feature so everything else builds and tests on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod avs;
pub mod capture;
pub mod config;
pub mod error;
pub mod multipart;
pub mod platform;
pub mod runtime;

pub use error::{Error, Result};
