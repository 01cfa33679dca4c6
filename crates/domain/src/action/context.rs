use crate::flow::packet::Packet;

use super::entity::FlowAction;

/// In-flight packet that flow actions rewrite, plus the log of actions
/// that were actually applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketContext {
    packet: Packet,
    applied: Vec<FlowAction>,
}

impl PacketContext {
    pub fn new(packet: Packet) -> Self {
        Self {
            packet,
            applied: Vec::new(),
        }
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn packet_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }

    /// Actions applied so far, in application order.
    pub fn applied_actions(&self) -> &[FlowAction] {
        &self.applied
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }

    pub(crate) fn record(&mut self, action: FlowAction) {
        self.applied.push(action);
    }
}
