/*
Procedure definitions. A procedure names one logical command sequence, this
module decides which queue entries it puts on the wire.
*/

use common::pus;
use log::warn;
use pus_packets::PusTc;
use std::time::Duration;
use tc_dispatch::{ProcedureInfo, QueueWrapper};

fn ping(apid: u16) -> PusTc {
    PusTc::new(apid, pus::SERVICE_TEST, pus::SUBSERVICE_PING, vec![])
}

/// Populate `wrapper` for the given procedure. Unknown procedures leave the
/// wrapper empty, which declines the feed.
pub fn feed(apid: u16, info: &ProcedureInfo, wrapper: &mut QueueWrapper) {
    match info.name.as_str() {
        "ping" => {
            wrapper.add_log("pinging the spacecraft");
            wrapper.add_telecommand(ping(apid));
        }
        "ping-burst" => {
            wrapper.add_log("sending a spaced ping burst");
            wrapper.add_packet_delay(Duration::from_millis(500));
            for _ in 0..3 {
                wrapper.add_telecommand(ping(apid));
            }
        }
        "demo-seq" => {
            wrapper.add_log("demonstration sequence with an explicit wait");
            wrapper.add_telecommand(ping(apid));
            wrapper.add_wait(Duration::from_secs(1));
            wrapper.add_telecommand(ping(apid));
        }
        unknown => {
            warn!("unknown procedure '{}', nothing fed", unknown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_procedure_feeds_one_telecommand() {
        let info = ProcedureInfo::new("ping", "0");
        let mut wrapper = QueueWrapper::new(info.clone(), Duration::ZERO);
        feed(0x42, &info, &mut wrapper);
        assert_eq!(wrapper.len(), 2);
    }

    #[test]
    fn test_unknown_procedure_declines() {
        let info = ProcedureInfo::new("does-not-exist", "0");
        let mut wrapper = QueueWrapper::new(info.clone(), Duration::ZERO);
        feed(0x42, &info, &mut wrapper);
        assert!(wrapper.is_empty());
    }
}
