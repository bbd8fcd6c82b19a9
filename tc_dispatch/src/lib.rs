/*
Sequential telecommand dispatch and verification core.

One queue of heterogeneous entries (telecommands, waits, delay overrides,
log lines) is driven out over a communication interface in strict FIFO
order with pacing, while verification telemetry coming back is correlated
to outstanding telecommands by request id. The whole core is a cooperative
single-threaded tick: the host calls TmtcBackend::periodic_op repeatedly
and sleeps however long the returned state recommends.
*/

pub mod backend;
pub mod handler;
pub mod queue;
pub mod sender;
pub mod verification;

pub use backend::{BackendConfig, BackendRequest, BackendState, TcMode, TmMode, TmtcBackend};
pub use handler::{TcHandler, TmHandler};
pub use queue::{ProcedureInfo, QueueEntry, QueueWrapper};
pub use sender::{SenderError, SenderMode, SeqResult, SequentialTcSender};
pub use verification::{
    StatusField, VerificationError, VerificationStatus, VerificationTracker,
};
