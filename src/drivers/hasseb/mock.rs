use super::codec::{self, parse_dali_frame, status, DALI_FRAME, FRAME_START};
use super::transport::{HassebTransport, TransportError};
use crate::utils::dyn_future::DynFuture;
use std::future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Produces the reports the adapter sends in response to a write
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

type WriteLog = Arc<Mutex<Vec<(Instant, Vec<u8>)>>>;

pub struct MockTransport {
    responder: Responder,
    tx_inbound: mpsc::Sender<Vec<u8>>,
    rx_inbound: Option<mpsc::Receiver<Vec<u8>>>,
    writes: WriteLog,
    fail_writes: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

pub struct MockHandle {
    writes: WriteLog,
    tx_inbound: mpsc::Sender<Vec<u8>>,
    pub fail_writes: Arc<AtomicBool>,
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new(responder: Responder) -> (MockTransport, MockHandle) {
        let (tx_inbound, rx_inbound) = mpsc::channel(64);
        let writes = WriteLog::default();
        let fail_writes = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));
        let handle = MockHandle {
            writes: writes.clone(),
            tx_inbound: tx_inbound.clone(),
            fail_writes: fail_writes.clone(),
            closed: closed.clone(),
        };
        let transport = MockTransport {
            responder,
            tx_inbound,
            rx_inbound: Some(rx_inbound),
            writes,
            fail_writes,
            closed,
        };
        (transport, handle)
    }
}

impl HassebTransport for MockTransport {
    fn write(&mut self, data: &[u8]) -> DynFuture<'_, Result<(), TransportError>> {
        if self.closed.load(Ordering::SeqCst) {
            return Box::pin(future::ready(Err(TransportError::Closed)));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Box::pin(future::ready(Err(TransportError::Device(
                "Write failed".to_string(),
            ))));
        }
        self.writes
            .lock()
            .unwrap()
            .push((Instant::now(), data.to_vec()));
        for report in (self.responder)(data) {
            self.tx_inbound.try_send(report).unwrap();
        }
        Box::pin(future::ready(Ok(())))
    }

    fn subscribe(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.rx_inbound.take()
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl MockHandle {
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub fn write_times(&self) -> Vec<Instant> {
        self.writes.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    /// Inject a report as if it was read from the adapter
    pub fn report(&self, data: Vec<u8>) {
        self.tx_inbound.try_send(data).unwrap();
    }
}

pub fn report(serial: u8, status: u8, size: u8, data: u8) -> Vec<u8> {
    vec![FRAME_START, DALI_FRAME, serial, status, size, data]
}

/// Never reports anything
pub fn silent() -> Responder {
    Box::new(|_: &[u8]| Vec::new())
}

/// Reports "no answer" for every DALI frame
pub fn no_answer() -> Responder {
    answer_with(|_| None)
}

/// Answers frames sent with `EXPECT_ANSWER` with the value returned by
/// `answer`. Other frames, and frames where `answer` returns `None`,
/// get a "no answer" report.
pub fn answer_with<F>(answer: F) -> Responder
where
    F: Fn([u8; 2]) -> Option<u8> + Send + 'static,
{
    Box::new(move |data: &[u8]| {
        let Some(sent) = parse_dali_frame(data) else {
            return Vec::new();
        };
        let reply = if sent.flags.expect_answer() {
            answer([sent.data[0], sent.data[1]])
        } else {
            None
        };
        match reply {
            Some(value) => vec![report(sent.serial, status::OK, 1, value)],
            None => vec![report(sent.serial, status::NO_ANSWER, 0, 0)],
        }
    })
}
