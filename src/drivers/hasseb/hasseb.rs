use super::codec::{self, FirmwareVersion, Inbound, ResponseRecord};
use super::correlator::{Correlator, PendingRequest};
use super::serial::SerialAllocator;
use super::settling::{SettlingTimer, SETTLING_TIME};
use super::transport::{HassebTransport, TransportError};
use crate::drivers::driver::{
    DaliBusEvent, DaliBusEventResult, DaliDriver, DaliFrame, DaliSendResult, OpenError,
};
use crate::drivers::send_flags::Flags;
use crate::drivers::utils::{DALIcmd, DALIreq};
use crate::utils::dyn_future::DynFuture;
use futures::future;
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::select;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

pub const HASSEB_USB_VENDOR: u16 = 0x04cc;
pub const HASSEB_USB_PRODUCT: u16 = 0x0802;

pub const REPLY_TIMEOUT: Duration = Duration::from_millis(1000);

const REQUEST_QUEUE_LEN: usize = 64;
const MONITOR_QUEUE_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct HassebConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Minimum idle time between transmissions
    pub settling_time: Duration,
    /// How long to wait for the adapter to report on a request
    pub reply_timeout: Duration,
    /// Report bus traffic from other masters
    pub sniffing: bool,
}

impl Default for HassebConfig {
    fn default() -> Self {
        HassebConfig {
            vendor_id: HASSEB_USB_VENDOR,
            product_id: HASSEB_USB_PRODUCT,
            settling_time: SETTLING_TIME,
            reply_timeout: REPLY_TIMEOUT,
            sniffing: false,
        }
    }
}

fn parse_usb_id(value: &str) -> Option<u16> {
    let value = value.trim();
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u16::from_str_radix(hex, 16).ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl HassebConfig {
    /// Build a configuration from driver parameters. Unknown keys are
    /// ignored.
    pub fn from_params(params: &HashMap<String, String>) -> Result<HassebConfig, OpenError> {
        let mut config = HassebConfig::default();
        if let Some(v) = params.get("vendor_id") {
            config.vendor_id = parse_usb_id(v).ok_or_else(|| {
                OpenError::ParameterError("vendor_id has invalid value".to_string())
            })?;
        }
        if let Some(v) = params.get("product_id") {
            config.product_id = parse_usb_id(v).ok_or_else(|| {
                OpenError::ParameterError("product_id has invalid value".to_string())
            })?;
        }
        if let Some(v) = params.get("settling_ms") {
            let ms = u64::from_str(v.trim()).map_err(|_| {
                OpenError::ParameterError("settling_ms has invalid value".to_string())
            })?;
            config.settling_time = Duration::from_millis(ms);
        }
        if let Some(v) = params.get("timeout_ms") {
            let ms = u64::from_str(v.trim())
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| {
                    OpenError::ParameterError("timeout_ms has invalid value".to_string())
                })?;
            config.reply_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = params.get("sniff") {
            config.sniffing = parse_bool(v)
                .ok_or_else(|| OpenError::ParameterError("sniff has invalid value".to_string()))?;
        }
        Ok(config)
    }
}

enum HassebReq {
    Frame(DALIreq),
    FirmwareVersion(oneshot::Sender<Result<FirmwareVersion, DaliSendResult>>),
    Configure {
        sniffing: bool,
        reply: oneshot::Sender<DaliSendResult>,
    },
}

struct FirmwareQuery {
    reply: oneshot::Sender<Result<FirmwareVersion, DaliSendResult>>,
    deadline: Instant,
}

/// State of one connection to the adapter
struct Session {
    serials: SerialAllocator,
    settling: SettlingTimer,
    pending: Correlator,
    reply_timeout: Duration,
    firmware_query: Option<FirmwareQuery>,
}

impl Session {
    fn new(config: &HassebConfig) -> Session {
        Session {
            serials: SerialAllocator::new(),
            settling: SettlingTimer::new(config.settling_time),
            pending: Correlator::new(),
            reply_timeout: config.reply_timeout,
            firmware_query: None,
        }
    }

    async fn write(
        &mut self,
        transport: &mut dyn HassebTransport,
        data: &[u8],
    ) -> Result<Instant, TransportError> {
        self.settling.wait_if_needed().await;
        trace!("Writing {:02x?}", data);
        transport.write(data).await?;
        let now = Instant::now();
        self.settling.mark_activity(now);
        Ok(now)
    }

    async fn send_frame(&mut self, transport: &mut dyn HassebTransport, req: DALIreq) {
        let DALIreq { cmd, reply } = req;
        let serial = self.serials.next_serial();
        let expect_answer = cmd.flags.expect_answer();
        if expect_answer && self.pending.is_pending(serial) {
            warn!("Serial {} still waiting for a reply", serial);
            reply
                .send(DaliSendResult::DriverError(
                    "Too many requests waiting for replies".into(),
                ))
                .unwrap_or(());
            return;
        }
        let frame = codec::encode_dali_frame(&cmd.data, serial, &cmd.flags);
        let sent_at = match self.write(transport, &frame).await {
            Ok(t) => t,
            Err(e) => {
                warn!("Failed to send frame {}: {}", cmd.data, e);
                reply
                    .send(DaliSendResult::DriverError(Box::new(e)))
                    .unwrap_or(());
                return;
            }
        };
        if !expect_answer {
            reply.send(DaliSendResult::Ok).unwrap_or(());
            return;
        }
        let request = PendingRequest {
            reply,
            deadline: sent_at + self.reply_timeout,
        };
        if let Err(request) = self.pending.register(serial, request) {
            request
                .reply
                .send(DaliSendResult::DriverError("Serial number in use".into()))
                .unwrap_or(());
        }
    }

    async fn query_firmware(
        &mut self,
        transport: &mut dyn HassebTransport,
        reply: oneshot::Sender<Result<FirmwareVersion, DaliSendResult>>,
    ) {
        if self.firmware_query.is_some() {
            reply
                .send(Err(DaliSendResult::DriverError(
                    "Firmware query already in progress".into(),
                )))
                .unwrap_or(());
            return;
        }
        match self.write(transport, &codec::encode_firmware_query()).await {
            Ok(sent_at) => {
                self.firmware_query = Some(FirmwareQuery {
                    reply,
                    deadline: sent_at + self.reply_timeout,
                })
            }
            Err(e) => reply
                .send(Err(DaliSendResult::DriverError(Box::new(e))))
                .unwrap_or(()),
        }
    }

    async fn configure(
        &mut self,
        transport: &mut dyn HassebTransport,
        sniffing: bool,
    ) -> DaliSendResult {
        debug!("Sniffing {}", if sniffing { "enabled" } else { "disabled" });
        match self.write(transport, &codec::encode_configure(sniffing)).await {
            Ok(_) => DaliSendResult::Ok,
            Err(e) => DaliSendResult::DriverError(Box::new(e)),
        }
    }

    async fn handle_request(&mut self, transport: &mut dyn HassebTransport, req: HassebReq) {
        match req {
            HassebReq::Frame(req) => self.send_frame(transport, req).await,
            HassebReq::FirmwareVersion(reply) => self.query_firmware(transport, reply).await,
            HassebReq::Configure { sniffing, reply } => {
                let res = self.configure(transport, sniffing).await;
                reply.send(res).unwrap_or(());
            }
        }
    }

    fn receive(&mut self, data: &[u8], monitor: &mpsc::Sender<DaliBusEvent>) {
        let record = match ResponseRecord::parse(data) {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                debug!("Dropping report: {}", e);
                return;
            }
        };
        self.settling.mark_activity(Instant::now());
        match codec::interpret(&record) {
            Inbound::Reply { serial, result } => {
                self.pending.dispatch(serial, result);
            }
            Inbound::Sniffed(event_type) => {
                let event = DaliBusEvent {
                    timestamp: std::time::Instant::now(),
                    event_type,
                };
                if monitor.try_send(event).is_err() {
                    trace!("Bus event dropped");
                }
            }
            Inbound::FirmwareVersion(version) => {
                if let Some(query) = self.firmware_query.take() {
                    query.reply.send(Ok(version)).unwrap_or(());
                }
            }
            Inbound::Ignored => trace!("Ignored report type {}", record.response_type),
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let firmware = self.firmware_query.as_ref().map(|q| q.deadline);
        match (self.pending.next_deadline(), firmware) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn expire(&mut self, now: Instant) {
        self.pending.expire(now);
        if self
            .firmware_query
            .as_ref()
            .map_or(false, |q| q.deadline <= now)
        {
            if let Some(query) = self.firmware_query.take() {
                query.reply.send(Err(DaliSendResult::NoResponse)).unwrap_or(());
            }
        }
    }

    fn shutdown(&mut self) {
        self.pending
            .fail_all(|| DaliSendResult::DriverError("Driver closed".into()));
        if let Some(query) = self.firmware_query.take() {
            query
                .reply
                .send(Err(DaliSendResult::DriverError("Driver closed".into())))
                .unwrap_or(());
        }
    }
}

async fn driver_thread(
    mut transport: Box<dyn HassebTransport>,
    mut inbound: mpsc::Receiver<Vec<u8>>,
    mut recv: mpsc::Receiver<HassebReq>,
    monitor: mpsc::Sender<DaliBusEvent>,
    config: HassebConfig,
) {
    debug!("driver_thread");
    let mut session = Session::new(&config);
    if config.sniffing {
        if let DaliSendResult::DriverError(e) = session.configure(&mut *transport, true).await {
            warn!("Failed to enable sniffing: {}", e);
        }
    }
    loop {
        let deadline = session.next_deadline();
        select! {
            req = recv.recv() => {
                match req {
                    Some(req) => session.handle_request(&mut *transport, req).await,
                    None => break,
                }
            },
            data = inbound.recv() => {
                match data {
                    Some(data) => session.receive(&data, &monitor),
                    None => {
                        warn!("Adapter connection lost");
                        break;
                    }
                }
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
            if deadline.is_some() => {
                session.expire(Instant::now());
            }
        }
    }
    session.shutdown();
    // Stop receiving before closing so the reader can't block on a full queue
    drop(inbound);
    transport.close();
    debug!("Driver exited");
}

/// Driver for the Hasseb USB DALI master. All connection state lives in a
/// task that owns the transport.
pub struct HassebDriver {
    join: Option<JoinHandle<()>>,
    // Needs to be an option so that it can be dropped to signal the task
    send_cmd: Option<mpsc::Sender<HassebReq>>,
    rx_monitor: mpsc::Receiver<DaliBusEvent>,
}

impl HassebDriver {
    /// Start a driver on an open transport. The transport is closed if
    /// the driver can't be started.
    pub fn new(
        mut transport: Box<dyn HassebTransport>,
        config: HassebConfig,
    ) -> Result<HassebDriver, TransportError> {
        let Some(inbound) = transport.subscribe() else {
            transport.close();
            return Err(TransportError::AlreadySubscribed);
        };
        let (tx, rx) = mpsc::channel::<HassebReq>(REQUEST_QUEUE_LEN);
        let (tx_monitor, rx_monitor) = mpsc::channel::<DaliBusEvent>(MONITOR_QUEUE_LEN);
        let join = tokio::spawn(driver_thread(transport, inbound, rx, tx_monitor, config));
        Ok(HassebDriver {
            join: Some(join),
            send_cmd: Some(tx),
            rx_monitor,
        })
    }

    fn queue(&mut self, req: HassebReq) -> Result<(), DaliSendResult> {
        let Some(send_cmd) = &self.send_cmd else {
            return Err(DaliSendResult::DriverError("Driver closed".into()));
        };
        send_cmd.try_send(req).map_err(|e| match e {
            TrySendError::Full(_) => DaliSendResult::DriverError("Request queue full".into()),
            TrySendError::Closed(_) => DaliSendResult::DriverError("Driver closed".into()),
        })
    }

    pub fn read_firmware_version(
        &mut self,
    ) -> DynFuture<'static, Result<FirmwareVersion, DaliSendResult>> {
        let (tx, rx) = oneshot::channel();
        if let Err(e) = self.queue(HassebReq::FirmwareVersion(tx)) {
            return Box::pin(future::ready(Err(e)));
        }
        Box::pin(async move {
            match rx.await {
                Ok(r) => r,
                Err(e) => Err(DaliSendResult::DriverError(Box::new(e))),
            }
        })
    }

    /// Turn reporting of other bus traffic on or off
    pub fn set_sniffing(&mut self, sniffing: bool) -> DynFuture<'static, DaliSendResult> {
        let (reply, rx) = oneshot::channel();
        if let Err(e) = self.queue(HassebReq::Configure { sniffing, reply }) {
            return Box::pin(future::ready(e));
        }
        Box::pin(async move {
            match rx.await {
                Ok(r) => r,
                Err(e) => DaliSendResult::DriverError(Box::new(e)),
            }
        })
    }
}

impl DaliDriver for HassebDriver {
    fn send_frame(&mut self, cmd: DaliFrame, flags: Flags) -> DynFuture<'static, DaliSendResult> {
        let (tx, rx) = oneshot::channel();
        let req = DALIreq {
            cmd: DALIcmd { data: cmd, flags },
            reply: tx,
        };
        if let Err(e) = self.queue(HassebReq::Frame(req)) {
            return Box::pin(future::ready(e));
        }
        Box::pin(async move {
            match rx.await {
                Ok(r) => r,
                Err(e) => DaliSendResult::DriverError(Box::new(e)),
            }
        })
    }

    fn next_bus_event(&mut self) -> DynFuture<'_, DaliBusEventResult> {
        Box::pin(async move {
            let res: DaliBusEventResult = match self.rx_monitor.recv().await {
                Some(event) => Ok(event),
                None => Err("Event source closed".into()),
            };
            res
        })
    }

    fn close(&mut self) -> DynFuture<'_, ()> {
        self.send_cmd = None;
        let join = self.join.take();
        Box::pin(async move {
            if let Some(join) = join {
                if let Err(e) = join.await {
                    warn!("Driver task failed: {}", e);
                }
            }
        })
    }
}

impl Drop for HassebDriver {
    fn drop(&mut self) {
        // The task closes the transport once the request queue is gone
        self.send_cmd = None;
    }
}

#[cfg(feature = "hasseb_driver")]
fn driver_open(params: HashMap<String, String>) -> Result<Box<dyn DaliDriver>, OpenError> {
    use super::hid::HidTransport;
    let config = HassebConfig::from_params(&params)?;
    let transport = HidTransport::open(config.vendor_id, config.product_id)
        .map_err(|e| OpenError::DriverError(Box::new(e)))?;
    match HassebDriver::new(Box::new(transport), config) {
        Err(e) => Err(OpenError::DriverError(Box::new(e))),
        Ok(d) => Ok(Box::new(d)),
    }
}

#[cfg(feature = "hasseb_driver")]
pub fn driver_info() -> crate::drivers::driver::DriverInfo {
    crate::drivers::driver::DriverInfo {
        name: "HASSEB".to_string(),
        description: "Driver for Hasseb USB DALI master".to_string(),
        open: driver_open,
    }
}
