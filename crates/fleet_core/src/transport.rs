//! Seams to the outside world: the bus and the clock.
//!
//! The engine never owns a transport. Callers hand one in per tick, which keeps
//! the core free of IO and lets tests capture every outbound envelope.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::messages::{Channel, Envelope};

/// Fire-and-forget sink for outbound envelopes.
pub trait Transport {
    fn send(&mut self, envelope: Envelope);
}

/// Milliseconds since some fixed origin. Only used for mission id tokens.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// A clock that always reads the same instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}

/// Collects everything sent during a tick.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    pub sent: Vec<Envelope>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.sent)
    }

    pub fn broadcasts(&self) -> impl Iterator<Item = &Envelope> {
        self.sent.iter().filter(|e| e.is_broadcast())
    }

    pub fn unicasts(&self) -> impl Iterator<Item = &Envelope> {
        self.sent.iter().filter(|e| !e.is_broadcast())
    }
}

impl Transport for Outbox {
    fn send(&mut self, envelope: Envelope) {
        self.sent.push(envelope);
    }
}

/// Inbound queues, one per channel. The engine pops at most one from each per tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inbox {
    broadcast: VecDeque<Envelope>,
    unicast: VecDeque<Envelope>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, envelope: Envelope) {
        match envelope.channel {
            Channel::Broadcast => self.broadcast.push_back(envelope),
            Channel::Unicast { .. } => self.unicast.push_back(envelope),
        }
    }

    pub fn pop_broadcast(&mut self) -> Option<Envelope> {
        self.broadcast.pop_front()
    }

    pub fn pop_unicast(&mut self) -> Option<Envelope> {
        self.unicast.pop_front()
    }

    pub fn len(&self) -> usize {
        self.broadcast.len() + self.unicast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.broadcast.is_empty() && self.unicast.is_empty()
    }
}

impl Extend<Envelope> for Inbox {
    fn extend<I: IntoIterator<Item = Envelope>>(&mut self, iter: I) {
        for envelope in iter {
            self.push(envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;

    #[test]
    fn inbox_splits_channels() {
        let mut inbox = Inbox::new();
        inbox.push(Envelope::broadcast("a".into(), Message::ResetOrders));
        inbox.push(Envelope::unicast(
            "a".into(),
            "b".into(),
            Message::ReRegisterConsumer,
        ));
        inbox.push(Envelope::broadcast("c".into(), Message::ReRegisterProducer));
        assert_eq!(inbox.len(), 3);

        assert_eq!(inbox.pop_unicast().unwrap().message, Message::ReRegisterConsumer);
        assert!(inbox.pop_unicast().is_none());
        assert_eq!(inbox.pop_broadcast().unwrap().message, Message::ResetOrders);
        assert_eq!(inbox.pop_broadcast().unwrap().message, Message::ReRegisterProducer);
        assert!(inbox.is_empty());
    }

    #[test]
    fn outbox_filters() {
        let mut outbox = Outbox::new();
        outbox.send(Envelope::broadcast("a".into(), Message::ResetOrders));
        outbox.send(Envelope::unicast("a".into(), "b".into(), Message::ResetOrders));
        assert_eq!(outbox.broadcasts().count(), 1);
        assert_eq!(outbox.unicasts().count(), 1);
        assert_eq!(outbox.drain().len(), 2);
        assert!(outbox.sent.is_empty());
    }
}
