//! Typed message channel over a [`SimulatedLink`].

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::NetError;
use crate::link::{LinkConfig, SimulatedLink};
use crate::messages::{Message, decode, encode};

/// Sends [`Message`]s through the wire codec and a simulated link, so every
/// message pays the encode/decode cost a real transport would.
#[derive(Debug)]
pub struct Channel<R, S> {
    link: SimulatedLink,
    undecodable: u64,
    _marker: PhantomData<fn() -> Message<R, S>>,
}

impl<R, S> Channel<R, S>
where
    R: Serialize + DeserializeOwned,
    S: Serialize + DeserializeOwned,
{
    /// Creates a channel with the given latency parameters.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            link: SimulatedLink::new(config),
            undecodable: 0,
            _marker: PhantomData,
        }
    }

    /// Encodes and sends `msg` at simulation time `now`.
    pub fn send(&mut self, now: f64, msg: &Message<R, S>) -> Result<(), NetError> {
        let bytes = encode(msg)?;
        self.link.send(now, bytes);
        Ok(())
    }

    /// Decodes every message due at `now`, in send order.
    ///
    /// A payload that fails to decode is logged, counted and skipped; the
    /// rest of the batch is still delivered.
    pub fn receive(&mut self, now: f64) -> Vec<Message<R, S>> {
        let mut messages = Vec::new();
        for bytes in self.link.receive(now) {
            match decode(&bytes) {
                Ok(msg) => messages.push(msg),
                Err(err) => {
                    self.undecodable += 1;
                    warn!(%err, bytes = bytes.len(), "dropping undecodable payload");
                }
            }
        }
        messages
    }

    /// Payloads dropped because they failed to decode.
    pub fn undecodable(&self) -> u64 {
        self.undecodable
    }

    /// The underlying link.
    pub fn link(&self) -> &SimulatedLink {
        &self.link
    }
}

#[cfg(test)]
mod tests {
    use augur_anticipation::Tick;

    use super::*;
    use crate::messages::PROTOCOL_VERSION;

    #[test]
    fn test_messages_arrive_decoded_and_delayed() {
        let mut channel: Channel<u8, f32> = Channel::new(LinkConfig::from_millis(100, 0, 0));
        channel.send(0.0, &Message::request(Tick::from(1), 7)).unwrap();
        channel.send(0.05, &Message::update(Tick::from(2), 1.5)).unwrap();

        assert!(channel.receive(0.09).is_empty());
        assert_eq!(channel.receive(0.1), vec![Message::request(Tick::from(1), 7)]);
        assert_eq!(channel.receive(0.2), vec![Message::update(Tick::from(2), 1.5)]);
        assert_eq!(channel.link().in_flight(), 0);
    }

    #[test]
    fn test_bad_payload_does_not_drop_batch() {
        let mut channel: Channel<u8, f32> = Channel::new(LinkConfig::from_millis(10, 0, 0));
        channel.send(0.0, &Message::request(Tick::from(1), 1)).unwrap();
        channel.link.send(0.0, vec![PROTOCOL_VERSION + 1, 0]);
        channel.link.send(0.0, Vec::new());
        channel.send(0.0, &Message::request(Tick::from(2), 2)).unwrap();

        let received = channel.receive(1.0);
        assert_eq!(
            received,
            vec![Message::request(Tick::from(1), 1), Message::request(Tick::from(2), 2)]
        );
        assert_eq!(channel.undecodable(), 2);
    }
}
