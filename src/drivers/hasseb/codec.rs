use crate::drivers::driver::{DaliBusEventType, DaliFrame, DaliSendResult};
use crate::drivers::send_flags::{Flags, EXPECT_ANSWER, NO_FLAG, SEND_TWICE};
use std::fmt;

pub const FRAME_START: u8 = 0xAA;

pub const READ_FIRMWARE_VERSION: u8 = 0x02;
pub const CONFIGURE_DEVICE: u8 = 0x05;
pub const DALI_FRAME: u8 = 0x07;

const DALI_FRAME_LENGTH: u8 = 0x10;
// The adapter repeats the frame when this field is non-zero
const SEND_TWICE_MAGNITUDE: u8 = 10;

pub const NO_DATA_AVAILABLE: u8 = 0;

pub mod status {
    pub const NO_ANSWER: u8 = 1;
    pub const OK: u8 = 2;
    pub const INVALID_ANSWER: u8 = 3;
    pub const TOO_EARLY: u8 = 4;
    pub const SNIFFER_BYTE: u8 = 5;
    pub const SNIFFER_BYTE_ERROR: u8 = 6;
}

const RESPONSE_TYPE: usize = 1;
const RESPONSE_SERIAL: usize = 2;
const RESPONSE_STATUS: usize = 3;
const RESPONSE_SIZE: usize = 4;
const RESPONSE_FRAME: usize = 5;

pub type WireFrame = [u8; 10];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Packet too short ({0} bytes)")]
    Truncated(usize),
}

/// Outgoing DALI frame:
/// ```text
/// 0xAA 0x07 serial 0x10 expect_answer 0x00 send_twice data0 data1 data2
/// ```
/// The adapter echoes `serial` in its report.
pub fn encode_dali_frame(frame: &DaliFrame, serial: u8, flags: &Flags) -> WireFrame {
    let data = match *frame {
        DaliFrame::Frame16([a, b]) => [a, b, 0],
        DaliFrame::Frame24(d) => d,
    };
    [
        FRAME_START,
        DALI_FRAME,
        serial,
        DALI_FRAME_LENGTH,
        u8::from(flags.expect_answer()),
        0x00,
        if flags.send_twice() {
            SEND_TWICE_MAGNITUDE
        } else {
            0
        },
        data[0],
        data[1],
        data[2],
    ]
}

pub fn encode_firmware_query() -> WireFrame {
    [FRAME_START, READ_FIRMWARE_VERSION, 0, 0, 0, 0, 0, 0, 0, 0]
}

pub fn encode_configure(sniffing: bool) -> WireFrame {
    [
        FRAME_START,
        CONFIGURE_DEVICE,
        u8::from(sniffing),
        0,
        0,
        0,
        0,
        0,
        0,
        0,
    ]
}

/// Contents of an outgoing DALI frame, as read back from the wire
#[derive(Debug, Clone, PartialEq)]
pub struct SentFrame {
    pub frame_type: u8,
    pub serial: u8,
    pub flags: Flags,
    pub data: [u8; 3],
}

pub fn parse_dali_frame(bytes: &[u8]) -> Option<SentFrame> {
    if bytes.len() < 10 || bytes[0] != FRAME_START || bytes[1] != DALI_FRAME {
        return None;
    }
    let mut flags = NO_FLAG;
    if bytes[4] != 0 {
        flags |= EXPECT_ANSWER;
    }
    if bytes[6] != 0 {
        flags |= SEND_TWICE;
    }
    Some(SentFrame {
        frame_type: bytes[1],
        serial: bytes[2],
        flags,
        data: [bytes[7], bytes[8], bytes[9]],
    })
}

/// A report read from the adapter:
/// ```text
/// ?? type serial status size data...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseRecord {
    pub response_type: u8,
    pub serial: u8,
    pub status: u8,
    pub size: u8,
    /// Reply byte first. Sniffed forward frames use all three.
    pub frame: [u8; 3],
}

impl ResponseRecord {
    /// Returns `None` for "no data available" reports.
    pub fn parse(bytes: &[u8]) -> Result<Option<ResponseRecord>, CodecError> {
        if bytes.len() <= RESPONSE_TYPE {
            return Err(CodecError::Truncated(bytes.len()));
        }
        if bytes[RESPONSE_TYPE] == NO_DATA_AVAILABLE {
            return Ok(None);
        }
        if bytes.len() <= RESPONSE_FRAME {
            return Err(CodecError::Truncated(bytes.len()));
        }
        let mut frame = [0u8; 3];
        for (dst, src) in frame.iter_mut().zip(&bytes[RESPONSE_FRAME..]) {
            *dst = *src;
        }
        Ok(Some(ResponseRecord {
            response_type: bytes[RESPONSE_TYPE],
            serial: bytes[RESPONSE_SERIAL],
            status: bytes[RESPONSE_STATUS],
            size: bytes[RESPONSE_SIZE],
            frame,
        }))
    }

    pub fn data(&self) -> u8 {
        self.frame[0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// What a report means to the driver
#[derive(Debug)]
pub enum Inbound {
    /// Completes the request sent with `serial`
    Reply { serial: u8, result: DaliSendResult },
    /// Bus traffic observed while sniffing
    Sniffed(DaliBusEventType),
    FirmwareVersion(FirmwareVersion),
    Ignored,
}

pub fn interpret(record: &ResponseRecord) -> Inbound {
    match record.response_type {
        DALI_FRAME => {}
        READ_FIRMWARE_VERSION => {
            // The version is reported in the serial and status positions
            return Inbound::FirmwareVersion(FirmwareVersion {
                major: record.serial,
                minor: record.status,
            });
        }
        _ => return Inbound::Ignored,
    }
    let result = match record.status {
        status::NO_ANSWER => DaliSendResult::Timeout,
        status::OK if record.size == 1 => DaliSendResult::Answer(record.data()),
        status::OK => DaliSendResult::InvalidFrame(*record),
        status::INVALID_ANSWER => DaliSendResult::Framing,
        status::TOO_EARLY => DaliSendResult::AnswerTooEarly,
        status::SNIFFER_BYTE => {
            let [a, b, c] = record.frame;
            return Inbound::Sniffed(match record.size {
                1 => DaliBusEventType::Frame8(a),
                2 => DaliBusEventType::Frame16([a, b]),
                3 => DaliBusEventType::Frame24([a, b, c]),
                _ => DaliBusEventType::FramingError,
            });
        }
        status::SNIFFER_BYTE_ERROR => {
            return Inbound::Sniffed(DaliBusEventType::FramingError);
        }
        s => DaliSendResult::DriverError(format!("Unknown adapter status {}", s).into()),
    };
    Inbound::Reply {
        serial: record.serial,
        result,
    }
}
