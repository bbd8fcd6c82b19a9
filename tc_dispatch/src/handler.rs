/*
Contracts between the dispatch core and the surrounding application.

The core never packs, prints or interprets anything itself: queue feeding,
actual transmission and telemetry consumption are all supplied through
these traits.
*/

use crate::queue::{ProcedureInfo, QueueEntry, QueueWrapper};
use com_interface::ComInterface;
use std::io::Error;

/// Supplied by the application side that owns procedures and packing
pub trait TcHandler {
    /// Called for every queue entry in FIFO order, telecommand or not.
    /// Telecommand entries are expected to be packed and written to `com`;
    /// wait, delay and log entries are passed through so the handler can
    /// log them. I/O errors propagate out of the tick unretried.
    fn send_cb(&mut self, entry: &QueueEntry, com: &mut dyn ComInterface) -> Result<(), Error>;

    /// Populate `wrapper` with the entries for `info`. Leaving the wrapper
    /// empty declines the feed for this tick.
    fn feed_cb(&mut self, info: &ProcedureInfo, wrapper: &mut QueueWrapper);

    /// The queue for `info` has been fully drained
    fn queue_finished_cb(&mut self, info: &ProcedureInfo);
}

/// Consumer for telemetry routed out of the backend's listener half,
/// registered per APID
pub trait TmHandler {
    fn handle_tm(&mut self, apid: u16, packet: &[u8]);
}
