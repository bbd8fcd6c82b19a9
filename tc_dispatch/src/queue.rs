/*
Telecommand queue model.

A queue holds everything one procedure wants on the wire plus its pacing
directives, in the order it was built. Entries are a closed enum so the
sender can match exhaustively instead of casting loosely typed records.
*/

use pus_packets::{PusTc, SpacePacket};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Tag naming the logical command sequence a queue was built for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureInfo {
    pub name: String,
    pub op_code: String,
}

impl ProcedureInfo {
    pub fn new(name: &str, op_code: &str) -> ProcedureInfo {
        ProcedureInfo {
            name: name.to_string(),
            op_code: op_code.to_string(),
        }
    }
}

impl fmt::Display for ProcedureInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.op_code.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} [{}]", self.name, self.op_code)
        }
    }
}

/// Anything that can sit in a telecommand queue
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEntry {
    /// Structured telecommand awaiting sequence count assignment and packing
    PusTc(PusTc),
    /// Pre-packed telecommand
    Raw(Vec<u8>),
    /// CCSDS space packet without a PUS secondary header
    SpacePacket(SpacePacket),
    /// Pure delay, nothing is transmitted
    Wait(Duration),
    /// Overrides the queue inter-command delay from this point on
    PacketDelay(Duration),
    /// Diagnostic only, never transmitted
    Log(String),
}

impl QueueEntry {
    pub fn is_telecommand(&self) -> bool {
        matches!(
            self,
            QueueEntry::PusTc(_) | QueueEntry::Raw(_) | QueueEntry::SpacePacket(_)
        )
    }
}

/// Ordered buffer of queue entries plus queue scoped configuration.
/// Producers append at the back, the sender consumes from the front.
#[derive(Debug, Clone)]
pub struct QueueWrapper {
    pub procedure: ProcedureInfo,
    entries: VecDeque<QueueEntry>,
    pub inter_cmd_delay: Duration,
}

impl QueueWrapper {
    pub fn new(procedure: ProcedureInfo, inter_cmd_delay: Duration) -> QueueWrapper {
        QueueWrapper {
            procedure,
            entries: VecDeque::new(),
            inter_cmd_delay,
        }
    }

    pub fn add_log(&mut self, text: &str) {
        self.entries.push_back(QueueEntry::Log(text.to_string()));
    }

    pub fn add_telecommand(&mut self, tc: PusTc) {
        self.entries.push_back(QueueEntry::PusTc(tc));
    }

    pub fn add_raw(&mut self, bytes: Vec<u8>) {
        self.entries.push_back(QueueEntry::Raw(bytes));
    }

    pub fn add_space_packet(&mut self, packet: SpacePacket) {
        self.entries.push_back(QueueEntry::SpacePacket(packet));
    }

    pub fn add_wait(&mut self, duration: Duration) {
        self.entries.push_back(QueueEntry::Wait(duration));
    }

    pub fn add_packet_delay(&mut self, duration: Duration) {
        self.entries.push_back(QueueEntry::PacketDelay(duration));
    }

    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    pub fn front(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop all remaining entries. The sender observes the emptiness on its
    /// next tick and finishes, which is how a host cancels a procedure.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_keep_fifo_order() {
        let mut queue = QueueWrapper::new(ProcedureInfo::new("test", "0"), Duration::ZERO);
        queue.add_log("starting");
        queue.add_raw(vec![1, 2, 3]);
        queue.add_wait(Duration::from_millis(10));
        queue.add_telecommand(PusTc::new(0x42, 17, 1, vec![]));
        assert_eq!(queue.len(), 4);

        assert_eq!(
            queue.pop_front(),
            Some(QueueEntry::Log("starting".to_string()))
        );
        assert_eq!(queue.pop_front(), Some(QueueEntry::Raw(vec![1, 2, 3])));
        assert_eq!(
            queue.pop_front(),
            Some(QueueEntry::Wait(Duration::from_millis(10)))
        );
        assert!(matches!(queue.pop_front(), Some(QueueEntry::PusTc(_))));
        assert_eq!(queue.pop_front(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_is_telecommand_flags() {
        assert!(QueueEntry::Raw(vec![]).is_telecommand());
        assert!(QueueEntry::PusTc(PusTc::new(1, 17, 1, vec![])).is_telecommand());
        assert!(QueueEntry::SpacePacket(SpacePacket::new(1, vec![])).is_telecommand());
        assert!(!QueueEntry::Wait(Duration::ZERO).is_telecommand());
        assert!(!QueueEntry::PacketDelay(Duration::ZERO).is_telecommand());
        assert!(!QueueEntry::Log(String::new()).is_telecommand());
    }

    #[test]
    fn test_clear_empties_the_queue() {
        let mut queue = QueueWrapper::new(ProcedureInfo::new("test", "0"), Duration::ZERO);
        queue.add_raw(vec![0]);
        queue.add_raw(vec![1]);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.pop_front(), None);
    }
}
