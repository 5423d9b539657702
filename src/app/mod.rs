//! Application boundary: what the protocol core exchanges with the world.
//!
//! Port traits in [`ports`] cover the audio player, capture, credentials
//! and event reporting; [`events`] is what the session reports back.  The
//! core only ever sees these types, keeping it testable without a network
//! or audio hardware.

pub mod events;
pub mod ports;
