/*
Backend state machine.

Composes the sequential sender with telemetry polling behind one periodic_op
tick. The host loop calls periodic_op, looks at the returned request and
sleeps accordingly, so it neither busy-spins nor misses a ready-to-send
telecommand. TC and TM halves are orthogonal modes: telecommand dispatch can
be off, one-shot or continuous while the listener half independently drains
the link and routes packets to per-APID handlers.
*/

use crate::handler::{TcHandler, TmHandler};
use crate::queue::{ProcedureInfo, QueueWrapper};
use crate::sender::{SenderMode, SeqResult, SequentialTcSender};
use com_interface::ComInterface;
use log::{trace, warn};
use pus_packets::apid_of;
use std::collections::HashMap;
use std::io::{Error, ErrorKind};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcMode {
    Idle,
    /// Execute one fed queue, then terminate
    OneQueue,
    /// Keep asking the TC handler for queues until the host turns it off
    MultiQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmMode {
    Idle,
    Listener,
}

/// What the host loop should do before calling periodic_op again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendRequest {
    None,
    /// The one-shot queue finished, the host may shut down
    TerminationNoError,
    DelayIdle,
    DelayListener,
    DelayCustom(Duration),
    CallNext,
}

/// Explicit backend configuration, threaded through the constructor
/// instead of ambient process-wide state
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Spacing between telecommands unless a queue overrides it
    pub default_inter_cmd_delay: Duration,
    /// Host sleep when both halves are idle
    pub idle_delay: Duration,
    /// Host sleep between telemetry polls with no TC queue active
    pub listener_delay: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            default_inter_cmd_delay: Duration::ZERO,
            idle_delay: Duration::from_millis(500),
            listener_delay: Duration::from_millis(100),
        }
    }
}

/// Snapshot of the backend after one tick
#[derive(Debug, Clone, Copy)]
pub struct BackendState {
    pub tc_mode: TcMode,
    pub tm_mode: TmMode,
    pub request: BackendRequest,
    pub recommended_delay: Duration,
    pub sender_result: SeqResult,
}

pub struct TmtcBackend {
    config: BackendConfig,
    sender: SequentialTcSender,
    tm_handlers: HashMap<u16, Box<dyn TmHandler>>,
    procedure: Option<ProcedureInfo>,
    state: BackendState,
}

impl TmtcBackend {
    pub fn new(config: BackendConfig) -> TmtcBackend {
        TmtcBackend {
            config,
            sender: SequentialTcSender::new(),
            tm_handlers: HashMap::new(),
            procedure: None,
            state: BackendState {
                tc_mode: TcMode::Idle,
                tm_mode: TmMode::Idle,
                request: BackendRequest::None,
                recommended_delay: Duration::ZERO,
                sender_result: SeqResult {
                    mode: SenderMode::Done,
                    tc_sent: false,
                    longest_rem_delay: Duration::ZERO,
                },
            },
        }
    }

    /// Register the consumer for telemetry arriving under `apid`. A second
    /// registration for the same APID replaces the first.
    pub fn register_tm_handler(&mut self, apid: u16, handler: Box<dyn TmHandler>) {
        if self.tm_handlers.insert(apid, handler).is_some() {
            warn!("replacing telemetry handler for APID {}", apid);
        }
    }

    /// Arm the telecommand half for `procedure`. The queue itself comes
    /// from the TC handler's feed_cb on the next tick.
    pub fn start_tc_operation(&mut self, mode: TcMode, procedure: ProcedureInfo) {
        self.state.tc_mode = mode;
        self.procedure = Some(procedure);
    }

    pub fn set_tm_mode(&mut self, mode: TmMode) {
        self.state.tm_mode = mode;
    }

    pub fn tc_mode(&self) -> TcMode {
        self.state.tc_mode
    }

    pub fn tm_mode(&self) -> TmMode {
        self.state.tm_mode
    }

    pub fn state(&self) -> &BackendState {
        &self.state
    }

    /// Advance both halves by one cooperative tick and derive the pacing
    /// recommendation for the host loop.
    pub fn periodic_op(
        &mut self,
        com: &mut dyn ComInterface,
        tc_handler: &mut dyn TcHandler,
    ) -> Result<&BackendState, Error> {
        if self.state.tm_mode == TmMode::Listener {
            self.poll_tm(com)?;
        }

        if self.state.tc_mode != TcMode::Idle {
            if self.sender.mode() == SenderMode::Done {
                self.feed_sender(tc_handler)?;
            }
            self.state.sender_result = self.sender.operation(tc_handler, com)?;
        }

        let (request, delay) = self.derive_request();
        self.state.request = request;
        self.state.recommended_delay = delay;
        Ok(&self.state)
    }

    fn feed_sender(&mut self, tc_handler: &mut dyn TcHandler) -> Result<(), Error> {
        let procedure = match self.procedure.as_ref() {
            Some(procedure) => procedure.clone(),
            None => return Ok(()),
        };
        let mut wrapper =
            QueueWrapper::new(procedure.clone(), self.config.default_inter_cmd_delay);
        tc_handler.feed_cb(&procedure, &mut wrapper);
        if wrapper.is_empty() {
            trace!("feed declined for {}", procedure);
            return Ok(());
        }
        self.sender
            .set_queue(wrapper)
            .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;
        self.sender.resume();
        Ok(())
    }

    fn poll_tm(&mut self, com: &mut dyn ComInterface) -> Result<(), Error> {
        for packet in com.receive()? {
            match apid_of(&packet) {
                Some(apid) => match self.tm_handlers.get_mut(&apid) {
                    Some(handler) => handler.handle_tm(apid, &packet),
                    None => warn!("no telemetry handler registered for APID {}", apid),
                },
                None => warn!("dropping runt telemetry frame of {} bytes", packet.len()),
            }
        }
        Ok(())
    }

    fn derive_request(&mut self) -> (BackendRequest, Duration) {
        let sender_done = self.sender.mode() == SenderMode::Done;
        match (self.state.tc_mode, self.state.tm_mode) {
            (TcMode::Idle, TmMode::Idle) => (BackendRequest::DelayIdle, self.config.idle_delay),
            (TcMode::Idle, TmMode::Listener) => {
                (BackendRequest::DelayListener, self.config.listener_delay)
            }
            (TcMode::OneQueue, _) if sender_done => {
                self.state.tc_mode = TcMode::Idle;
                (BackendRequest::TerminationNoError, Duration::ZERO)
            }
            (TcMode::MultiQueue, _) if sender_done => {
                // Idle until the host arms the next procedure
                self.state.tc_mode = TcMode::Idle;
                (BackendRequest::CallNext, Duration::ZERO)
            }
            _ => {
                let remaining = self.state.sender_result.longest_rem_delay;
                if remaining > Duration::ZERO {
                    (BackendRequest::DelayCustom(remaining), remaining)
                } else {
                    (BackendRequest::CallNext, Duration::ZERO)
                }
            }
        }
    }
}
