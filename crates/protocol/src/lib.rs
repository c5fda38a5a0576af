//! Wire protocol shared by the gateway, its clients, and the engine seam.
//!
//! Everything a client exchanges with the gateway after admission is an
//! [`Envelope`]: a `type` discriminator, an optional `requestId`, and an
//! opaque remainder the gateway never interprets. The multiplexing tag that
//! routes one shared engine's output back to the right connection lives in
//! [`TaggedRequestId`].

pub mod envelope;
pub mod tag;

pub use {
    envelope::{ERROR_KIND, Envelope},
    tag::{ConnId, TaggedRequestId},
};

/// Bumped on any wire-visible change to the envelope or tag format.
pub const PROTOCOL_VERSION: u32 = 1;
