/*
Application side of the dispatch core.

The Commander owns sequence counting, packing, request id registration and
the sent-telecommand journal. The VerificationReporter consumes routed
telemetry, folds service 1 reports into the shared tracker and prints the
progress line for the operator. Both halves share the tracker through an
Arc<Mutex<_>> since one registers requests while the other resolves them.
*/

use chrono::Utc;
use com_interface::ComInterface;
use common::pus;
use log::{debug, info, warn};
use pus_packets::{parse_verification_tm, service_of, RequestId};
use serde::Serialize;
use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{Error, ErrorKind, Write};
use std::sync::{Arc, Mutex};
use tc_dispatch::verification::format_progress;
use tc_dispatch::{
    ProcedureInfo, QueueEntry, QueueWrapper, StatusField, TcHandler, TmHandler,
    VerificationTracker,
};

use crate::procedures;

/// One line of the sent-telecommand journal
#[derive(Debug, Serialize)]
struct TcJournalEntry {
    time: String,
    procedure: String,
    request_id: String,
    service: u8,
    subservice: u8,
    bytes_hex: String,
}

pub struct Commander {
    apid: u16,
    seq_count: u16,
    current_procedure: String,
    tracker: Arc<Mutex<VerificationTracker>>,
    journal: File,
}

impl Commander {
    pub fn new(
        apid: u16,
        tracker: Arc<Mutex<VerificationTracker>>,
        log_dir: &str,
    ) -> Result<Commander, Error> {
        fs::create_dir_all(log_dir)?;
        let journal = OpenOptions::new()
            .append(true)
            .create(true)
            .open(format!("{}/sent_tcs.json", log_dir))?;
        Ok(Commander {
            apid,
            seq_count: 0,
            current_procedure: String::new(),
            tracker,
            journal,
        })
    }

    fn next_seq_count(&mut self) -> u16 {
        let seq = self.seq_count;
        self.seq_count = (self.seq_count + 1) & 0x3FFF;
        seq
    }

    /// Track the request id of a freshly sent telecommand and append it to
    /// the journal. A duplicate id means sequence counts wrapped onto an
    /// outstanding command, that is escalated instead of papered over.
    fn register_and_journal(
        &mut self,
        raw: &[u8],
        service: u8,
        subservice: u8,
    ) -> Result<(), Error> {
        let request_id = match RequestId::from_tc_bytes(raw) {
            Some(request_id) => request_id,
            None => return Ok(()),
        };
        self.tracker
            .lock()
            .unwrap()
            .add_tc(request_id)
            .map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;

        let entry = TcJournalEntry {
            time: Utc::now().to_rfc3339(),
            procedure: self.current_procedure.clone(),
            request_id: request_id.to_string(),
            service,
            subservice,
            bytes_hex: raw.iter().map(|b| format!("{:02x}", b)).collect(),
        };
        serde_json::to_writer(&mut self.journal, &entry)?;
        self.journal.write_all(b"\n")?;
        Ok(())
    }
}

impl TcHandler for Commander {
    fn send_cb(&mut self, entry: &QueueEntry, com: &mut dyn ComInterface) -> Result<(), Error> {
        match entry {
            QueueEntry::PusTc(tc) => {
                let raw = tc.pack(self.next_seq_count());
                com.send(&raw)?;
                info!("sent TC [{},{}] to APID {}", tc.service, tc.subservice, tc.apid);
                self.register_and_journal(&raw, tc.service, tc.subservice)?;
            }
            QueueEntry::Raw(bytes) => {
                com.send(bytes)?;
                let (service, subservice) = service_of(bytes).unwrap_or((0, 0));
                info!("sent pre-packed TC of {} bytes", bytes.len());
                self.register_and_journal(bytes, service, subservice)?;
            }
            QueueEntry::SpacePacket(packet) => {
                let raw = packet.pack(self.next_seq_count());
                com.send(&raw)?;
                // No PUS secondary header, so nothing to verify
                info!("sent space packet to APID {}", packet.apid);
            }
            QueueEntry::Wait(duration) => debug!("queue waits {:?}", duration),
            QueueEntry::PacketDelay(duration) => {
                debug!("inter-command delay now {:?}", duration)
            }
            QueueEntry::Log(text) => info!("{}", text),
        }
        Ok(())
    }

    fn feed_cb(&mut self, info: &ProcedureInfo, wrapper: &mut QueueWrapper) {
        self.current_procedure = info.name.clone();
        procedures::feed(self.apid, info, wrapper);
    }

    fn queue_finished_cb(&mut self, info: &ProcedureInfo) {
        info!("queue for {} finished", info);
    }
}

pub struct VerificationReporter {
    tracker: Arc<Mutex<VerificationTracker>>,
    color: bool,
}

impl VerificationReporter {
    pub fn new(tracker: Arc<Mutex<VerificationTracker>>, color: bool) -> VerificationReporter {
        VerificationReporter { tracker, color }
    }
}

impl TmHandler for VerificationReporter {
    fn handle_tm(&mut self, apid: u16, packet: &[u8]) {
        match service_of(packet) {
            Some((pus::SERVICE_VERIFICATION, _)) => match parse_verification_tm(packet) {
                Ok(report) => {
                    let mut tracker = self.tracker.lock().unwrap();
                    match tracker.add_tm(&report) {
                        Some(status) => {
                            println!("{}", format_progress(&status, report.request_id, self.color));
                            if status.completed != StatusField::Unset {
                                // Completion closes the book on this request
                                tracker.remove_tc(report.request_id);
                            }
                        }
                        None => {
                            warn!("verification report for unknown request {}", report.request_id)
                        }
                    }
                }
                Err(e) => warn!("undecodable verification report: {}", e),
            },
            Some((pus::SERVICE_TEST, pus::SUBSERVICE_PING_REPLY)) => {
                info!("pong from APID {}", apid)
            }
            Some((service, subservice)) => {
                debug!("unhandled TM [{},{}] from APID {}", service, subservice, apid)
            }
            None => warn!("telemetry frame without a PUS header from APID {}", apid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use com_interface::DummyComInterface;
    use pus_packets::PusTc;

    fn temp_log_dir(tag: &str) -> String {
        let dir = std::env::temp_dir().join(format!("gs_commander_test_{}", tag));
        dir.to_string_lossy().to_string()
    }

    #[test]
    fn test_send_cb_packs_registers_and_journals() {
        let tracker = Arc::new(Mutex::new(VerificationTracker::new()));
        let mut commander =
            Commander::new(0x42, Arc::clone(&tracker), &temp_log_dir("send_cb")).unwrap();
        let mut com = DummyComInterface::new_silent();
        com.open().unwrap();

        let entry = QueueEntry::PusTc(PusTc::new(0x42, 17, 1, vec![]));
        commander.send_cb(&entry, &mut com).unwrap();
        commander.send_cb(&entry, &mut com).unwrap();

        // Two sends, two distinct sequence counts, two tracked requests
        assert_eq!(com.sent_packets().len(), 2);
        assert_ne!(com.sent_packets()[0], com.sent_packets()[1]);
        assert_eq!(tracker.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_reporter_resolves_completion_and_cleans_up() {
        let tracker = Arc::new(Mutex::new(VerificationTracker::new()));
        let mut reporter = VerificationReporter::new(Arc::clone(&tracker), false);

        let rid = RequestId {
            packet_id: 0x1842,
            psc: 0xC000,
        };
        tracker.lock().unwrap().add_tc(rid).unwrap();

        let acceptance =
            pus_packets::pack_verification_tm(0x42, 0, pus::SUBSERVICE_ACCEPTANCE_SUCCESS, rid, None);
        reporter.handle_tm(0x42, &acceptance);
        assert_eq!(tracker.lock().unwrap().len(), 1);

        let completion =
            pus_packets::pack_verification_tm(0x42, 1, pus::SUBSERVICE_COMPLETION_SUCCESS, rid, None);
        reporter.handle_tm(0x42, &completion);
        // Completion removes the entry
        assert!(tracker.lock().unwrap().is_empty());
    }
}
