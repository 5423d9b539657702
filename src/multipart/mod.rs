//! `multipart/form-data` framing in both directions.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Multipart Stack                         │
//! │                                                              │
//! │  inbound:  bytes ──▶ Parser (push) ──▶ Dispatcher ──▶ AudioSink
//! │                         ▲                                    │
//! │                         └── boundary discovered from header  │
//! │                                                              │
//! │  outbound: transport pull ──▶ Generator ──▶ prefix · JSON ·  │
//! │                                   ▲          prefix · audio ·│
//! │                                   └── AudioSource  terminator│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both directions are explicit state machines so they can be driven with
//! synthetic byte sequences, without a transport.

pub mod boundary;
pub mod dispatcher;
pub mod generator;
pub mod parser;

/// Position within the fixed part layout (metadata part, then audio part).
///
/// Inbound it classifies the part currently being parsed; outbound it is
/// the next thing to produce.  Variants are ordered: the generator only
/// ever moves forward through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartState {
    MetaHeaders,
    MetaJson,
    AudioHeaders,
    AudioData,
    Done,
}
