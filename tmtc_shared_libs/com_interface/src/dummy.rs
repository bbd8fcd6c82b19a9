/*
Loopback interface standing in for a whole spacecraft link.

Every telecommand sent through it is recorded, and unless replies are
disabled the "spacecraft" answers with acceptance, start and completion
verification reports (plus a ping reply for a service 17 ping). Used by the
dispatch core tests and by the commander's offline mode, the same way the
mission simulators sit behind the SIM_* ports during integration testing.
*/

use super::ComInterface;
use common::pus;
use log::debug;
use pus_packets::{pack_tm, pack_verification_tm, service_of, RequestId};
use std::collections::VecDeque;
use std::io::{Error, ErrorKind};
use std::time::Duration;

pub struct DummyComInterface {
    opened: bool,
    simulate_replies: bool,
    next_tm_seq: u16,
    sent: Vec<Vec<u8>>,
    reply_queue: VecDeque<Vec<u8>>,
}

impl DummyComInterface {
    /// Dummy link with simulated verification replies
    pub fn new() -> DummyComInterface {
        DummyComInterface {
            opened: false,
            simulate_replies: true,
            next_tm_seq: 0,
            sent: Vec::new(),
            reply_queue: VecDeque::new(),
        }
    }

    /// Dummy link that swallows telecommands without replying, handy as a
    /// plain sink in tests
    pub fn new_silent() -> DummyComInterface {
        let mut interface = DummyComInterface::new();
        interface.simulate_replies = false;
        interface
    }

    /// Telecommands recorded so far, in send order
    pub fn sent_packets(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Script an arbitrary telemetry packet for the next receive() call
    pub fn queue_tm(&mut self, packet: Vec<u8>) {
        self.reply_queue.push_back(packet);
    }

    fn next_seq(&mut self) -> u16 {
        let seq = self.next_tm_seq;
        self.next_tm_seq = self.next_tm_seq.wrapping_add(1) & 0x3FFF;
        seq
    }

    fn simulate_spacecraft_replies(&mut self, tc: &[u8]) {
        let request_id = match RequestId::from_tc_bytes(tc) {
            Some(rid) => rid,
            None => return,
        };
        let apid = pus_packets::apid_of(tc).unwrap_or(0);
        debug!("dummy link answering request {}", request_id);

        let seq = self.next_seq();
        self.reply_queue.push_back(pack_verification_tm(
            apid,
            seq,
            pus::SUBSERVICE_ACCEPTANCE_SUCCESS,
            request_id,
            None,
        ));
        let seq = self.next_seq();
        self.reply_queue.push_back(pack_verification_tm(
            apid,
            seq,
            pus::SUBSERVICE_START_SUCCESS,
            request_id,
            None,
        ));
        if let Some((pus::SERVICE_TEST, pus::SUBSERVICE_PING)) = service_of(tc) {
            let seq = self.next_seq();
            self.reply_queue.push_back(pack_tm(
                apid,
                seq,
                pus::SERVICE_TEST,
                pus::SUBSERVICE_PING_REPLY,
                &[],
            ));
        }
        let seq = self.next_seq();
        self.reply_queue.push_back(pack_verification_tm(
            apid,
            seq,
            pus::SUBSERVICE_COMPLETION_SUCCESS,
            request_id,
            None,
        ));
    }
}

impl Default for DummyComInterface {
    fn default() -> Self {
        DummyComInterface::new()
    }
}

impl ComInterface for DummyComInterface {
    fn open(&mut self) -> Result<(), Error> {
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.opened = false;
        self.reply_queue.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.opened
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        if !self.opened {
            return Err(Error::new(
                ErrorKind::NotConnected,
                "dummy interface is not open",
            ));
        }
        self.sent.push(data.to_vec());
        if self.simulate_replies {
            self.simulate_spacecraft_replies(data);
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<Vec<u8>>, Error> {
        Ok(self.reply_queue.drain(..).collect())
    }

    fn data_available(&mut self, _timeout: Duration) -> Result<usize, Error> {
        Ok(self.reply_queue.len())
    }
}
