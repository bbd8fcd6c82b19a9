/*
Command line ground station commander.

Wires a communication interface, the dispatch backend and the verification
tracker together and runs the host loop: tick the backend, sleep however
long it recommends, stop once a one-shot procedure terminated (or keep
listening with --listen).
*/

use clap::Parser;
use com_interface::{
    ComInterface, ComType, DummyComInterface, SerialComInterface, TcpComInterface,
    UdpComInterface,
};
use common::Countdown;
use log::{info, warn, LevelFilter};
use std::io::{Error, ErrorKind};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tc_dispatch::{
    BackendConfig, BackendRequest, ProcedureInfo, TcMode, TmMode, TmtcBackend,
    VerificationTracker,
};

mod commander;
mod procedures;

use commander::{Commander, VerificationReporter};

#[derive(Parser, Debug)]
#[command(name = "gs_commander", about = "PUS/CCSDS ground station commander")]
struct Args {
    /// Communication interface: tcp, udp, serial or dummy
    #[arg(short, long, default_value = "dummy")]
    com: String,
    /// Target host for tcp/udp
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Target port for tcp/udp
    #[arg(long, default_value_t = common::ports::SIM_SPACECRAFT_TCP_PORT)]
    port: u16,
    /// Serial device path
    #[arg(long, default_value = "/dev/ttyUSB0")]
    device: String,
    /// Serial baud rate
    #[arg(long, default_value_t = 115200)]
    baud: u32,
    /// Spacecraft APID telecommands are addressed to
    #[arg(long, default_value_t = 0x42)]
    apid: u16,
    /// Procedure to execute (ping, ping-burst, demo-seq); omit for
    /// listener-only mode
    #[arg(short, long)]
    procedure: Option<String>,
    /// Op code handed to the procedure
    #[arg(long, default_value = "0")]
    op_code: String,
    /// Inter-command delay in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
    /// Keep listening for telemetry after the procedure finished
    #[arg(long)]
    listen: bool,
    /// Directory for log files and the telecommand journal
    #[arg(long, default_value = "gs_commander/logs")]
    log_dir: String,
    /// ANSI colored verification progress lines
    #[arg(long)]
    color: bool,
    /// Console log verbosity (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    verbosity: String,
}

fn build_com_interface(args: &Args) -> Result<Box<dyn ComInterface>, Error> {
    let com_type = ComType::from_str(&args.com).map_err(|_| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("unknown com interface '{}'", args.com),
        )
    })?;
    let interface: Box<dyn ComInterface> = match com_type {
        ComType::Tcp => Box::new(TcpComInterface::new(args.host.clone(), args.port)),
        ComType::Udp => Box::new(UdpComInterface::new(
            "0.0.0.0:0".to_string(),
            format!("{}:{}", args.host, args.port),
        )),
        ComType::Serial => Box::new(SerialComInterface::new(args.device.clone(), args.baud)),
        ComType::Dummy => Box::new(DummyComInterface::new()),
    };
    Ok(interface)
}

/// Give straggling verification reports a short window to arrive before
/// shutting the loop down.
fn drain_remaining_verification(
    backend: &mut TmtcBackend,
    com: &mut dyn ComInterface,
    commander: &mut Commander,
    tracker: &Arc<Mutex<VerificationTracker>>,
) -> Result<(), Error> {
    let grace = Countdown::new(Some(Duration::from_secs(2)));
    while grace.busy() {
        backend.periodic_op(com, commander)?;
        if tracker.lock().unwrap().is_empty() {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(20));
    }
    let open = tracker.lock().unwrap().len();
    warn!("{} telecommand(s) without complete verification", open);
    Ok(())
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    let console_level = LevelFilter::from_str(&args.verbosity).unwrap_or(LevelFilter::Info);
    logging::init_logger(&args.log_dir, console_level);
    info!("Beginning ground station commander...");

    let mut com = build_com_interface(&args)?;
    com.open()?;
    info!("{} link open", args.com);

    let tracker = Arc::new(Mutex::new(VerificationTracker::new()));
    let mut commander = Commander::new(args.apid, Arc::clone(&tracker), &args.log_dir)?;

    let mut backend = TmtcBackend::new(BackendConfig {
        default_inter_cmd_delay: Duration::from_millis(args.delay_ms),
        ..BackendConfig::default()
    });
    backend.set_tm_mode(TmMode::Listener);
    backend.register_tm_handler(
        args.apid,
        Box::new(VerificationReporter::new(Arc::clone(&tracker), args.color)),
    );

    match args.procedure.as_deref() {
        Some(name) => {
            info!("executing procedure '{}'", name);
            backend.start_tc_operation(TcMode::OneQueue, ProcedureInfo::new(name, &args.op_code));
        }
        None => info!("no procedure given, listener-only mode"),
    }

    loop {
        let state = *backend.periodic_op(com.as_mut(), &mut commander)?;
        match state.request {
            BackendRequest::TerminationNoError => {
                info!("procedure finished");
                if !args.listen {
                    drain_remaining_verification(
                        &mut backend,
                        com.as_mut(),
                        &mut commander,
                        &tracker,
                    )?;
                    break;
                }
            }
            BackendRequest::DelayIdle
            | BackendRequest::DelayListener
            | BackendRequest::DelayCustom(_) => thread::sleep(state.recommended_delay),
            BackendRequest::CallNext | BackendRequest::None => {}
        }
    }

    com.close()?;
    info!("commander shutting down");
    Ok(())
}
