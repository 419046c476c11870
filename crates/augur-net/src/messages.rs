//! Network message types and serialization.
//!
//! All messages are serialized with [`postcard`] and prefixed with a protocol
//! version byte. Use [`encode`] and [`decode`] for the wire form.
//!
//! Messages are generic over the request payload `R` (what the predictor
//! asks the authority to do) and the state payload `S` (what the authority
//! confirms), so one codec serves every anticipated value in an application.

use augur_anticipation::{AuthoritativeUpdate, Tick};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::NetError;

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Top-level enum
// ---------------------------------------------------------------------------

/// Top-level network message. The enum discriminant is the type tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message<R, S> {
    /// Predictor asks the authority to apply a change it already anticipated.
    PredictionRequest(PredictionRequest<R>),
    /// Authority confirms a value for a tick.
    AuthoritativeUpdate(AuthoritativeUpdate<S>),
}

/// A change the predictor applied locally and wants the authority to apply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionRequest<R> {
    /// Predictor tick the change was anticipated at.
    pub tick: Tick,
    /// Application-defined request.
    pub request: R,
}

impl<R, S> Message<R, S> {
    /// Wraps a request anticipated at `tick`.
    pub fn request(tick: Tick, request: R) -> Self {
        Self::PredictionRequest(PredictionRequest { tick, request })
    }

    /// Wraps a confirmed value produced at `tick`.
    pub fn update(tick: Tick, value: S) -> Self {
        Self::AuthoritativeUpdate(AuthoritativeUpdate { tick, value })
    }

    /// Tick the message refers to.
    pub fn tick(&self) -> Tick {
        match self {
            Self::PredictionRequest(request) => request.tick,
            Self::AuthoritativeUpdate(update) => update.tick,
        }
    }
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a [`Message`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded Message]`
pub fn encode<R, S>(msg: &Message<R, S>) -> Result<Vec<u8>, NetError>
where
    R: Serialize,
    S: Serialize,
{
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a versioned binary payload into a [`Message`].
///
/// Returns an error if the version is unsupported or the payload is malformed.
pub fn decode<R, S>(data: &[u8]) -> Result<Message<R, S>, NetError>
where
    R: DeserializeOwned,
    S: DeserializeOwned,
{
    let Some((&version, body)) = data.split_first() else {
        return Err(NetError::EmptyPayload);
    };
    if version != PROTOCOL_VERSION {
        return Err(NetError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
