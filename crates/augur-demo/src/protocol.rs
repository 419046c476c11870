//! Messages exchanged between the demo's predictor and authority.

use augur_anticipation::TransformState;
use augur_net::Channel;
use serde::{Deserialize, Serialize};

use crate::player::PlayerInput;

/// The user-editable sample values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueId {
    /// Snaps; the authority accepts the requested value.
    A,
    /// Snaps; the authority replaces the requested value with a random one.
    B,
    /// Smooths; the authority accepts the requested value.
    C,
    /// Smooths; the authority replaces the requested value with a random one.
    D,
}

impl ValueId {
    /// Every editable value, in display order.
    pub const ALL: [ValueId; 4] = [ValueId::A, ValueId::B, ValueId::C, ValueId::D];

    /// Position in [`ALL`](Self::ALL).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the authority overrides the requested value.
    pub fn is_randomized(self) -> bool {
        matches!(self, ValueId::B | ValueId::D)
    }
}

/// Predictor to authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// The user moved a slider.
    SetValue {
        /// Which value.
        id: ValueId,
        /// The value the predictor anticipated.
        value: f32,
    },
    /// One step of player input.
    Move(PlayerInput),
}

/// Authority to predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateUpdate {
    /// New authoritative value for an editable value.
    Value {
        /// Which value.
        id: ValueId,
        /// The confirmed value.
        value: f32,
    },
    /// The server-driven value E.
    ValueE(f32),
    /// The player's confirmed transform.
    Player(TransformState),
}

/// One direction of the demo connection.
pub type DemoChannel = Channel<Request, StateUpdate>;
