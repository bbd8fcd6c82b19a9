/*
Minimal PUS/CCSDS packet model shared between the dispatch core and the
front end.

The dispatch core treats telecommands and telemetry as byte buffers plus the
handful of header fields it needs (APID, service, subservice, request id).
This crate owns those field layouts. Flight-grade encoding concerns (CRC,
CUC time stamps, source ids) belong to the packet library used against real
hardware and are not reproduced here.
*/

use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::io::{Error, ErrorKind};

use common::pus;

pub const CCSDS_HEADER_LEN: usize = 6;
pub const PUS_SEC_HEADER_LEN: usize = 3;

/// Version 0, packet type TC, secondary header flag set
const TC_PACKET_ID_BASE: u16 = 0x1800;
/// Version 0, packet type TM, secondary header flag set
const TM_PACKET_ID_BASE: u16 = 0x0800;
const SEQ_FLAGS_UNSEGMENTED: u16 = 0xC000;
const APID_MASK: u16 = 0x07FF;
const SEQ_COUNT_MASK: u16 = 0x3FFF;

/// PUS version nibble plus acknowledge-all flags for the TC secondary header
const TC_VERSION_AND_ACK: u8 = 0x2F;
/// PUS version nibble for the TM secondary header
const TM_VERSION: u8 = 0x20;

/// A structured telecommand awaiting sequence-count assignment and packing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PusTc {
    pub apid: u16,
    pub service: u8,
    pub subservice: u8,
    pub app_data: Vec<u8>,
}

impl PusTc {
    pub fn new(apid: u16, service: u8, subservice: u8, app_data: Vec<u8>) -> Self {
        PusTc {
            apid,
            service,
            subservice,
            app_data,
        }
    }

    /// Pack into wire bytes with the given packet sequence count
    pub fn pack(&self, seq_count: u16) -> Vec<u8> {
        let packet_id = TC_PACKET_ID_BASE | (self.apid & APID_MASK);
        let psc = SEQ_FLAGS_UNSEGMENTED | (seq_count & SEQ_COUNT_MASK);
        // CCSDS data length field counts one less than the bytes after the header
        let data_len = (PUS_SEC_HEADER_LEN + self.app_data.len() - 1) as u16;

        let mut raw = Vec::with_capacity(CCSDS_HEADER_LEN + PUS_SEC_HEADER_LEN + self.app_data.len());
        raw.extend_from_slice(&packet_id.to_be_bytes());
        raw.extend_from_slice(&psc.to_be_bytes());
        raw.extend_from_slice(&data_len.to_be_bytes());
        raw.push(TC_VERSION_AND_ACK);
        raw.push(self.service);
        raw.push(self.subservice);
        raw.extend_from_slice(&self.app_data);
        raw
    }
}

/// A CCSDS space packet without a PUS secondary header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpacePacket {
    pub apid: u16,
    pub user_data: Vec<u8>,
}

impl SpacePacket {
    pub fn new(apid: u16, user_data: Vec<u8>) -> Self {
        SpacePacket { apid, user_data }
    }

    pub fn pack(&self, seq_count: u16) -> Vec<u8> {
        // TC type bit set, secondary header flag cleared
        let packet_id = 0x1000 | (self.apid & APID_MASK);
        let psc = SEQ_FLAGS_UNSEGMENTED | (seq_count & SEQ_COUNT_MASK);
        let data_len = self.user_data.len().saturating_sub(1) as u16;

        let mut raw = Vec::with_capacity(CCSDS_HEADER_LEN + self.user_data.len());
        raw.extend_from_slice(&packet_id.to_be_bytes());
        raw.extend_from_slice(&psc.to_be_bytes());
        raw.extend_from_slice(&data_len.to_be_bytes());
        raw.extend_from_slice(&self.user_data);
        raw
    }
}

/// Correlation key between a sent telecommand and its verification reports.
/// Derived from the packet id and packet sequence control words, so it is
/// unique among telecommands concurrently in flight as long as sequence
/// counts do not wrap while a command is still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId {
    pub packet_id: u16,
    pub psc: u16,
}

impl RequestId {
    /// Read the request id out of a packed telecommand
    pub fn from_tc_bytes(raw: &[u8]) -> Option<RequestId> {
        if raw.len() < 4 {
            return None;
        }
        Some(RequestId {
            packet_id: u16::from_be_bytes([raw[0], raw[1]]),
            psc: u16::from_be_bytes([raw[2], raw[3]]),
        })
    }

    pub fn raw(&self) -> u32 {
        ((self.packet_id as u32) << 16) | self.psc as u32
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.raw())
    }
}

/// Extract the APID from any CCSDS packet
pub fn apid_of(raw: &[u8]) -> Option<u16> {
    if raw.len() < CCSDS_HEADER_LEN {
        return None;
    }
    Some(u16::from_be_bytes([raw[0], raw[1]]) & APID_MASK)
}

/// Extract (service, subservice) from a packet carrying a PUS secondary header
pub fn service_of(raw: &[u8]) -> Option<(u8, u8)> {
    if raw.len() < CCSDS_HEADER_LEN + PUS_SEC_HEADER_LEN {
        return None;
    }
    let packet_id = u16::from_be_bytes([raw[0], raw[1]]);
    if packet_id & 0x0800 == 0 {
        // No secondary header on board
        return None;
    }
    Some((raw[6], raw[7]))
}

/// The verification stage a service 1 report refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    Acceptance,
    Start,
    Step,
    Completion,
}

impl fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            VerificationStage::Acceptance => write!(f, "acceptance"),
            VerificationStage::Start => write!(f, "start"),
            VerificationStage::Step => write!(f, "step"),
            VerificationStage::Completion => write!(f, "completion"),
        }
    }
}

/// One decoded service 1 verification report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationTm {
    pub request_id: RequestId,
    pub stage: VerificationStage,
    pub success: bool,
    pub step: Option<u8>,
}

/// Decode a service 1 telemetry packet into a verification record.
/// Subservices 1..=8 map to success/failure pairs for acceptance, start,
/// step and completion. Step reports carry the step number behind the
/// request id.
pub fn parse_verification_tm(raw: &[u8]) -> Result<VerificationTm, Error> {
    let (service, subservice) = service_of(raw).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            "packet too short for a PUS secondary header",
        )
    })?;
    if service != pus::SERVICE_VERIFICATION {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("not a verification report, service {}", service),
        ));
    }
    let body = &raw[CCSDS_HEADER_LEN + PUS_SEC_HEADER_LEN..];
    if body.len() < 4 {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "verification report without a request id",
        ));
    }
    let request_id = RequestId {
        packet_id: u16::from_be_bytes([body[0], body[1]]),
        psc: u16::from_be_bytes([body[2], body[3]]),
    };

    let stage = match subservice {
        pus::SUBSERVICE_ACCEPTANCE_SUCCESS | pus::SUBSERVICE_ACCEPTANCE_FAILURE => {
            VerificationStage::Acceptance
        }
        pus::SUBSERVICE_START_SUCCESS | pus::SUBSERVICE_START_FAILURE => VerificationStage::Start,
        pus::SUBSERVICE_STEP_SUCCESS | pus::SUBSERVICE_STEP_FAILURE => VerificationStage::Step,
        pus::SUBSERVICE_COMPLETION_SUCCESS | pus::SUBSERVICE_COMPLETION_FAILURE => {
            VerificationStage::Completion
        }
        other => {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("unknown verification subservice {}", other),
            ))
        }
    };
    let step = if stage == VerificationStage::Step {
        if body.len() < 5 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "step report without a step number",
            ));
        }
        Some(body[4])
    } else {
        None
    };

    Ok(VerificationTm {
        request_id,
        stage,
        // Success subservices are the odd ones in each pair
        success: subservice % 2 == 1,
        step,
    })
}

/// Pack a telemetry packet with a PUS secondary header
pub fn pack_tm(apid: u16, seq_count: u16, service: u8, subservice: u8, source_data: &[u8]) -> Vec<u8> {
    let packet_id = TM_PACKET_ID_BASE | (apid & APID_MASK);
    let psc = SEQ_FLAGS_UNSEGMENTED | (seq_count & SEQ_COUNT_MASK);
    let data_len = (PUS_SEC_HEADER_LEN + source_data.len() - 1) as u16;

    let mut raw = Vec::with_capacity(CCSDS_HEADER_LEN + PUS_SEC_HEADER_LEN + source_data.len());
    raw.extend_from_slice(&packet_id.to_be_bytes());
    raw.extend_from_slice(&psc.to_be_bytes());
    raw.extend_from_slice(&data_len.to_be_bytes());
    raw.push(TM_VERSION);
    raw.push(service);
    raw.push(subservice);
    raw.extend_from_slice(source_data);
    raw
}

/// Pack a service 1 report referring to the given request id. Used by the
/// dummy link and by tests to fabricate spacecraft responses.
pub fn pack_verification_tm(
    apid: u16,
    seq_count: u16,
    subservice: u8,
    request_id: RequestId,
    step: Option<u8>,
) -> Vec<u8> {
    let mut source_data = Vec::with_capacity(5);
    source_data.extend_from_slice(&request_id.packet_id.to_be_bytes());
    source_data.extend_from_slice(&request_id.psc.to_be_bytes());
    if let Some(step_num) = step {
        source_data.push(step_num);
    }
    pack_tm(
        apid,
        seq_count,
        pus::SERVICE_VERIFICATION,
        subservice,
        &source_data,
    )
}
