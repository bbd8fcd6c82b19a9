/*
Sequential telecommand sender.

Drives one queue to completion over a communication interface. Entries are
consumed strictly front to back: a telecommand behind an unexpired wait or
inter-command delay stalls until the countdown clears, it is never skipped
or reordered. Each operation() call is one non-blocking tick, all waiting
is expressed through the returned remaining delay.
*/

use crate::handler::TcHandler;
use crate::queue::{QueueEntry, QueueWrapper};
use com_interface::ComInterface;
use common::Countdown;
use log::trace;
use std::io::Error;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderMode {
    Done,
    Busy,
}

/// Per-tick report of the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqResult {
    pub mode: SenderMode,
    pub tc_sent: bool,
    pub longest_rem_delay: Duration,
}

impl SeqResult {
    fn done() -> SeqResult {
        SeqResult {
            mode: SenderMode::Done,
            tc_sent: false,
            longest_rem_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SenderError {
    /// Reassigning a busy sender would corrupt the in-flight queue, the
    /// caller has to wait for Done or clear the current queue first
    #[error("sender is still busy with another queue")]
    Busy,
}

pub struct SequentialTcSender {
    mode: SenderMode,
    queue: Option<QueueWrapper>,
    wait_countdown: Countdown,
    send_countdown: Countdown,
}

impl SequentialTcSender {
    pub fn new() -> SequentialTcSender {
        SequentialTcSender {
            mode: SenderMode::Done,
            queue: None,
            wait_countdown: Countdown::new(None),
            send_countdown: Countdown::new(None),
        }
    }

    pub fn mode(&self) -> SenderMode {
        self.mode
    }

    /// The queue currently assigned, if any. Hosts cancel a procedure by
    /// clearing the entries through this.
    pub fn queue_mut(&mut self) -> Option<&mut QueueWrapper> {
        self.queue.as_mut()
    }

    /// Hand a new queue to the sender. Fails while the sender is still busy
    /// with another queue, the in-flight queue is left untouched. No
    /// artificial delay is applied before the first entry.
    pub fn set_queue(&mut self, queue: QueueWrapper) -> Result<(), SenderError> {
        if self.mode == SenderMode::Busy {
            return Err(SenderError::Busy);
        }
        self.wait_countdown.reset(Some(Duration::ZERO));
        self.send_countdown.reset(Some(Duration::ZERO));
        self.mode = if queue.is_empty() {
            SenderMode::Done
        } else {
            SenderMode::Busy
        };
        self.queue = Some(queue);
        Ok(())
    }

    /// Re-arm a finished sender after entries were appended to its queue
    /// externally
    pub fn resume(&mut self) {
        if self.mode == SenderMode::Done && self.queue.as_ref().is_some_and(|q| !q.is_empty()) {
            self.mode = SenderMode::Busy;
        }
    }

    /// One cooperative tick: consume at most one queue entry, respecting
    /// wait and inter-command delay gating for telecommands.
    pub fn operation(
        &mut self,
        tc_handler: &mut dyn TcHandler,
        com: &mut dyn ComInterface,
    ) -> Result<SeqResult, Error> {
        if self.mode == SenderMode::Done {
            return Ok(SeqResult::done());
        }
        let queue = match self.queue.as_mut() {
            Some(queue) => queue,
            None => {
                self.mode = SenderMode::Done;
                return Ok(SeqResult::done());
            }
        };

        let mut tc_sent = false;
        let delays_done =
            self.wait_countdown.timed_out() && self.send_countdown.timed_out();

        if let Some(front) = queue.front() {
            if front.is_telecommand() && !delays_done {
                trace!(
                    "telecommand gated for another {:?}",
                    self.wait_countdown
                        .remaining()
                        .max(self.send_countdown.remaining())
                );
            } else {
                let entry = queue.pop_front().unwrap();
                match &entry {
                    QueueEntry::Wait(duration) => {
                        self.wait_countdown.reset(Some(*duration));
                    }
                    QueueEntry::PacketDelay(duration) => {
                        queue.inter_cmd_delay = *duration;
                        self.send_countdown.reset(Some(*duration));
                    }
                    _ => {}
                }
                tc_handler.send_cb(&entry, com)?;
                if entry.is_telecommand() {
                    self.send_countdown.reset(Some(queue.inter_cmd_delay));
                    tc_sent = true;
                }
            }
        }

        // The queue only finishes once the trailing delays have run out too
        if queue.is_empty()
            && self.wait_countdown.timed_out()
            && self.send_countdown.timed_out()
        {
            tc_handler.queue_finished_cb(&queue.procedure);
            self.mode = SenderMode::Done;
        }

        Ok(SeqResult {
            mode: self.mode,
            tc_sent,
            longest_rem_delay: self
                .wait_countdown
                .remaining()
                .max(self.send_countdown.remaining()),
        })
    }
}

impl Default for SequentialTcSender {
    fn default() -> Self {
        SequentialTcSender::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ProcedureInfo;
    use com_interface::DummyComInterface;
    use std::io::ErrorKind;
    use std::thread;

    struct RecordingHandler {
        sent: Vec<QueueEntry>,
        finished: Vec<ProcedureInfo>,
        fail_sends: bool,
    }

    impl RecordingHandler {
        fn new() -> RecordingHandler {
            RecordingHandler {
                sent: Vec::new(),
                finished: Vec::new(),
                fail_sends: false,
            }
        }

        fn sent_telecommands(&self) -> Vec<Vec<u8>> {
            self.sent
                .iter()
                .filter_map(|entry| match entry {
                    QueueEntry::Raw(bytes) => Some(bytes.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl TcHandler for RecordingHandler {
        fn send_cb(
            &mut self,
            entry: &QueueEntry,
            com: &mut dyn ComInterface,
        ) -> Result<(), Error> {
            if self.fail_sends {
                return Err(Error::new(ErrorKind::BrokenPipe, "link down"));
            }
            if let QueueEntry::Raw(bytes) = entry {
                com.send(bytes)?;
            }
            self.sent.push(entry.clone());
            Ok(())
        }

        fn feed_cb(&mut self, _info: &ProcedureInfo, _wrapper: &mut QueueWrapper) {}

        fn queue_finished_cb(&mut self, info: &ProcedureInfo) {
            self.finished.push(info.clone());
        }
    }

    fn test_setup() -> (SequentialTcSender, RecordingHandler, DummyComInterface) {
        let mut com = DummyComInterface::new_silent();
        com.open().unwrap();
        (SequentialTcSender::new(), RecordingHandler::new(), com)
    }

    fn queue_with(entries: &[QueueEntry], delay: Duration) -> QueueWrapper {
        let mut queue = QueueWrapper::new(ProcedureInfo::new("test", "0"), delay);
        for entry in entries {
            match entry.clone() {
                QueueEntry::Raw(bytes) => queue.add_raw(bytes),
                QueueEntry::Wait(d) => queue.add_wait(d),
                QueueEntry::PacketDelay(d) => queue.add_packet_delay(d),
                QueueEntry::Log(text) => queue.add_log(&text),
                QueueEntry::PusTc(tc) => queue.add_telecommand(tc),
                QueueEntry::SpacePacket(sp) => queue.add_space_packet(sp),
            }
        }
        queue
    }

    #[test]
    fn test_single_raw_tc_sent_and_finished_in_one_tick() {
        let (mut sender, mut handler, mut com) = test_setup();
        sender
            .set_queue(queue_with(
                &[QueueEntry::Raw(vec![1, 2, 3])],
                Duration::ZERO,
            ))
            .unwrap();
        assert_eq!(sender.mode(), SenderMode::Busy);

        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(result.tc_sent);
        assert_eq!(result.mode, SenderMode::Done);
        assert_eq!(com.sent_packets(), &[vec![1, 2, 3]]);
        assert_eq!(handler.finished.len(), 1);

        // Draining an already finished sender is a no-op
        for _ in 0..3 {
            let result = sender.operation(&mut handler, &mut com).unwrap();
            assert_eq!(result.mode, SenderMode::Done);
            assert!(!result.tc_sent);
        }
        assert_eq!(handler.sent.len(), 1);
        assert_eq!(handler.finished.len(), 1);
    }

    #[test]
    fn test_fifo_order_with_interleaved_entries() {
        let (mut sender, mut handler, mut com) = test_setup();
        sender
            .set_queue(queue_with(
                &[
                    QueueEntry::Log("go".to_string()),
                    QueueEntry::Raw(vec![0xA]),
                    QueueEntry::Wait(Duration::from_millis(5)),
                    QueueEntry::Raw(vec![0xB]),
                    QueueEntry::Raw(vec![0xC]),
                ],
                Duration::ZERO,
            ))
            .unwrap();

        let mut guard = 0;
        while sender.mode() == SenderMode::Busy {
            sender.operation(&mut handler, &mut com).unwrap();
            thread::sleep(Duration::from_millis(1));
            guard += 1;
            assert!(guard < 100, "sender never finished");
        }

        assert_eq!(
            handler.sent_telecommands(),
            vec![vec![0xA], vec![0xB], vec![0xC]]
        );
        // Non-telecommand entries were passed through send_cb as well
        assert_eq!(handler.sent[0], QueueEntry::Log("go".to_string()));
        assert_eq!(
            handler.sent[2],
            QueueEntry::Wait(Duration::from_millis(5))
        );
    }

    #[test]
    fn test_wait_entry_gates_following_telecommand() {
        let (mut sender, mut handler, mut com) = test_setup();
        sender
            .set_queue(queue_with(
                &[
                    QueueEntry::Raw(vec![0xA]),
                    QueueEntry::Wait(Duration::from_millis(30)),
                    QueueEntry::Raw(vec![0xB]),
                ],
                Duration::ZERO,
            ))
            .unwrap();

        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(result.tc_sent);
        // Consumes the wait entry and arms the countdown
        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(!result.tc_sent);
        assert!(result.longest_rem_delay > Duration::ZERO);

        // B stays gated while the wait is pending
        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(!result.tc_sent);
        assert_eq!(handler.sent_telecommands(), vec![vec![0xA]]);

        thread::sleep(Duration::from_millis(40));
        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(result.tc_sent);
        assert_eq!(handler.sent_telecommands(), vec![vec![0xA], vec![0xB]]);
    }

    #[test]
    fn test_inter_command_delay_spaces_telecommands() {
        let (mut sender, mut handler, mut com) = test_setup();
        sender
            .set_queue(queue_with(
                &[QueueEntry::Raw(vec![0xA]), QueueEntry::Raw(vec![0xB])],
                Duration::from_millis(30),
            ))
            .unwrap();

        // No artificial delay before the first telecommand
        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(result.tc_sent);
        assert!(result.longest_rem_delay > Duration::ZERO);

        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(!result.tc_sent);
        assert_eq!(handler.sent_telecommands(), vec![vec![0xA]]);

        thread::sleep(Duration::from_millis(40));
        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(result.tc_sent);
        assert_eq!(handler.sent_telecommands(), vec![vec![0xA], vec![0xB]]);
    }

    #[test]
    fn test_packet_delay_overrides_queue_spacing() {
        let (mut sender, mut handler, mut com) = test_setup();
        sender
            .set_queue(queue_with(
                &[
                    QueueEntry::Raw(vec![0xA]),
                    QueueEntry::PacketDelay(Duration::from_millis(30)),
                    QueueEntry::Raw(vec![0xB]),
                ],
                Duration::ZERO,
            ))
            .unwrap();

        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(result.tc_sent);
        // Delay override consumed, countdown re-armed with the new spacing
        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(!result.tc_sent);
        assert!(result.longest_rem_delay > Duration::ZERO);

        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(!result.tc_sent, "B must stay gated by the new delay");

        thread::sleep(Duration::from_millis(40));
        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(result.tc_sent);
        assert_eq!(handler.sent_telecommands(), vec![vec![0xA], vec![0xB]]);
    }

    #[test]
    fn test_busy_reassignment_is_rejected() {
        let (mut sender, mut handler, mut com) = test_setup();
        sender
            .set_queue(queue_with(
                &[QueueEntry::Raw(vec![0xA]), QueueEntry::Raw(vec![0xB])],
                Duration::from_millis(20),
            ))
            .unwrap();
        sender.operation(&mut handler, &mut com).unwrap();
        assert_eq!(sender.mode(), SenderMode::Busy);

        let other = queue_with(&[QueueEntry::Raw(vec![0xC])], Duration::ZERO);
        assert_eq!(sender.set_queue(other), Err(SenderError::Busy));

        // The in-flight queue drains untouched
        let mut guard = 0;
        while sender.mode() == SenderMode::Busy {
            sender.operation(&mut handler, &mut com).unwrap();
            thread::sleep(Duration::from_millis(5));
            guard += 1;
            assert!(guard < 100, "sender never finished");
        }
        assert_eq!(handler.sent_telecommands(), vec![vec![0xA], vec![0xB]]);
    }

    #[test]
    fn test_resume_after_external_append() {
        let (mut sender, mut handler, mut com) = test_setup();
        sender
            .set_queue(queue_with(&[], Duration::ZERO))
            .unwrap();
        assert_eq!(sender.mode(), SenderMode::Done);

        sender.queue_mut().unwrap().add_raw(vec![0xAA]);
        sender.resume();
        assert_eq!(sender.mode(), SenderMode::Busy);

        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert!(result.tc_sent);
        assert_eq!(result.mode, SenderMode::Done);
        assert_eq!(handler.sent_telecommands(), vec![vec![0xAA]]);
    }

    #[test]
    fn test_trailing_wait_delays_queue_finish() {
        let (mut sender, mut handler, mut com) = test_setup();
        sender
            .set_queue(queue_with(
                &[QueueEntry::Wait(Duration::from_millis(30))],
                Duration::ZERO,
            ))
            .unwrap();

        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert_eq!(result.mode, SenderMode::Busy);
        assert!(handler.finished.is_empty());

        thread::sleep(Duration::from_millis(40));
        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert_eq!(result.mode, SenderMode::Done);
        assert_eq!(handler.finished.len(), 1);
    }

    #[test]
    fn test_clearing_the_queue_cancels_the_procedure() {
        let (mut sender, mut handler, mut com) = test_setup();
        sender
            .set_queue(queue_with(
                &[QueueEntry::Raw(vec![0xA]), QueueEntry::Raw(vec![0xB])],
                Duration::ZERO,
            ))
            .unwrap();

        sender.queue_mut().unwrap().clear();
        let result = sender.operation(&mut handler, &mut com).unwrap();
        assert_eq!(result.mode, SenderMode::Done);
        assert!(handler.sent.is_empty());
        assert_eq!(handler.finished.len(), 1);
    }

    #[test]
    fn test_send_errors_propagate_without_retry() {
        let (mut sender, mut handler, mut com) = test_setup();
        handler.fail_sends = true;
        sender
            .set_queue(queue_with(&[QueueEntry::Raw(vec![0xA])], Duration::ZERO))
            .unwrap();

        let err = sender.operation(&mut handler, &mut com).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
        // The failed entry was consumed, disposition is up to the caller
        assert_eq!(sender.queue_mut().unwrap().len(), 0);
        assert_eq!(sender.mode(), SenderMode::Busy);
    }
}
