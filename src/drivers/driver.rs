use super::send_flags::Flags;
use crate::drivers::hasseb::codec::ResponseRecord;
use crate::utils::dyn_future::DynFuture;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

/// A forward frame as sent on the bus
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DaliFrame {
    Frame16([u8; 2]),
    Frame24([u8; 3]),
}

impl DaliFrame {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            DaliFrame::Frame16(f) => f,
            DaliFrame::Frame24(f) => f,
        }
    }
}

impl TryFrom<&[u8]> for DaliFrame {
    type Error = &'static str;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        match *bytes {
            [a, b] => Ok(DaliFrame::Frame16([a, b])),
            [a, b, c] => Ok(DaliFrame::Frame24([a, b, c])),
            _ => Err("DALI frames are two or three bytes long"),
        }
    }
}

impl fmt::Display for DaliFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum DaliSendResult {
    /// Frame sent, no answer was requested
    Ok,
    Answer(u8),
    /// No gear answered
    Timeout,
    /// Garbled answer, normally several gears answering at once
    Framing,
    /// The adapter saw an answer before the settling time had elapsed
    AnswerTooEarly,
    /// The adapter reported an answer with an unexpected size
    InvalidFrame(ResponseRecord),
    /// The adapter never reported back for this request
    NoResponse,
    DriverError(Box<dyn Error + Send + Sync>),
}

impl DaliSendResult {
    pub fn check_send(self) -> Result<(), DaliSendResult> {
        match self {
            DaliSendResult::Ok => Ok(()),
            e => Err(e),
        }
    }
}

impl fmt::Display for DaliSendResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaliSendResult::Ok => write!(f, "OK"),
            DaliSendResult::Answer(a) => write!(f, "Answer: 0x{:02x}", a),
            DaliSendResult::Timeout => write!(f, "No answer"),
            DaliSendResult::Framing => write!(f, "Invalid answer"),
            DaliSendResult::AnswerTooEarly => write!(f, "Answer too early"),
            DaliSendResult::InvalidFrame(record) => {
                write!(f, "Invalid frame (declared size {})", record.size)
            }
            DaliSendResult::NoResponse => write!(f, "No response from adapter"),
            DaliSendResult::DriverError(e) => write!(f, "Driver error: {}", e),
        }
    }
}

impl Error for DaliSendResult {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaliBusEventType {
    Frame8(u8),
    Frame16([u8; 2]),
    Frame24([u8; 3]),
    FramingError,
}

#[derive(Debug, Clone)]
pub struct DaliBusEvent {
    pub timestamp: Instant,
    pub event_type: DaliBusEventType,
}

pub type DaliBusEventResult = Result<DaliBusEvent, Box<dyn Error + Send + Sync>>;

pub trait DaliDriver: Send {
    /// Send a frame on the bus
    ///
    /// # Arguments
    /// * `cmd` - Frame to send
    /// * `flags` - Options for transaction
    fn send_frame(&mut self, cmd: DaliFrame, flags: Flags) -> DynFuture<'static, DaliSendResult>;

    /// Wait for traffic seen on the bus that was not a reply to one of
    /// our own requests.
    fn next_bus_event(&mut self) -> DynFuture<'_, DaliBusEventResult>;

    /// Release the device. Requests still pending are failed.
    fn close(&mut self) -> DynFuture<'_, ()> {
        Box::pin(std::future::ready(()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("Driver not found")]
    NotFound,
    #[error("Parameter error: {0}")]
    ParameterError(String),
    #[error("{0}")]
    DriverError(Box<dyn Error + Send + Sync>),
}

#[derive(Clone)]
pub struct DriverInfo {
    pub name: String,
    pub description: String,
    pub open: fn(HashMap<String, String>) -> Result<Box<dyn DaliDriver>, OpenError>,
}

lazy_static! {
    static ref DRIVERS: Mutex<Vec<DriverInfo>> = Mutex::new(Vec::new());
}

pub fn add_driver(info: DriverInfo) {
    if let Ok(mut drivers) = DRIVERS.lock() {
        if !drivers.iter().any(|d| d.name == info.name) {
            drivers.push(info);
        }
    }
}

pub fn driver_names() -> Vec<String> {
    match DRIVERS.lock() {
        Ok(drivers) => drivers.iter().map(|d| d.name.clone()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Split a device name on the form `NAME[:key=value,key=value...]`
fn parse_device_name(device: &str) -> Result<(&str, HashMap<String, String>), OpenError> {
    let (name, param_str) = match device.split_once(':') {
        Some((name, params)) => (name, params),
        None => (device, ""),
    };
    let mut params = HashMap::new();
    for param in param_str.split(',').filter(|p| !p.trim().is_empty()) {
        let Some((key, value)) = param.split_once('=') else {
            return Err(OpenError::ParameterError(format!(
                "Expected key=value, got '{}'",
                param
            )));
        };
        params.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok((name.trim(), params))
}

/// Open a registered driver.
///
/// The name `default` selects the first registered driver.
pub fn open(device: &str) -> Result<Box<dyn DaliDriver>, OpenError> {
    let (name, params) = parse_device_name(device)?;
    let info = {
        let drivers = DRIVERS
            .lock()
            .map_err(|_| OpenError::DriverError("Driver list poisoned".into()))?;
        let found = if name == "default" {
            drivers.first()
        } else {
            drivers.iter().find(|d| d.name.eq_ignore_ascii_case(name))
        };
        found.cloned().ok_or(OpenError::NotFound)?
    };
    (info.open)(params)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn device_name_params() {
        let (name, params) = parse_device_name("HASSEB:timeout_ms=200, sniff=1").unwrap();
        assert_eq!(name, "HASSEB");
        assert_eq!(params.get("timeout_ms").map(|s| s.as_str()), Some("200"));
        assert_eq!(params.get("sniff").map(|s| s.as_str()), Some("1"));

        let (name, params) = parse_device_name("default").unwrap();
        assert_eq!(name, "default");
        assert!(params.is_empty());

        assert!(matches!(
            parse_device_name("HASSEB:timeout_ms"),
            Err(OpenError::ParameterError(_))
        ));
    }

    #[test]
    fn frame_from_bytes() {
        assert_eq!(
            DaliFrame::try_from(&[0xa5u8, 0x00][..]),
            Ok(DaliFrame::Frame16([0xa5, 0x00]))
        );
        assert_eq!(
            DaliFrame::try_from(&[0xc1u8, 0x00, 0x01][..]),
            Ok(DaliFrame::Frame24([0xc1, 0x00, 0x01]))
        );
        assert!(DaliFrame::try_from(&[0xa5u8][..]).is_err());
        assert_eq!(DaliFrame::Frame16([0xa5, 0x0f]).to_string(), "a5 0f");
    }

    #[test]
    fn unknown_driver() {
        assert!(matches!(open("NO_SUCH_DRIVER"), Err(OpenError::NotFound)));
    }
}
