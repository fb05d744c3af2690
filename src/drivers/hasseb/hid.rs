use super::transport::{HassebTransport, TransportError};
use crate::utils::dyn_future::DynFuture;
use hidapi::HidApi;
use log::{debug, warn};
use std::sync::mpsc as std_mpsc;
use std::sync::mpsc::TryRecvError;
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot};

// Short enough that queued writes are not delayed noticeably
const READ_TIMEOUT_MS: i32 = 5;
const REPORT_SIZE: usize = 64;
const INBOUND_QUEUE_LEN: usize = 32;

struct WriteReq {
    data: Vec<u8>,
    done: oneshot::Sender<Result<(), TransportError>>,
}

/// HID connection to the adapter.
///
/// hidapi only offers blocking calls so the device is owned by a thread
/// that alternates between writing queued data and polling for reports.
pub struct HidTransport {
    // Dropping the sender stops the thread
    write_tx: Option<std_mpsc::Sender<WriteReq>>,
    inbound: Option<mpsc::Receiver<Vec<u8>>>,
    join: Option<JoinHandle<()>>,
}

fn device_thread(
    vendor_id: u16,
    product_id: u16,
    write_rx: std_mpsc::Receiver<WriteReq>,
    inbound: mpsc::Sender<Vec<u8>>,
    ready: std_mpsc::SyncSender<Result<(), TransportError>>,
) {
    let api = match HidApi::new() {
        Ok(api) => api,
        Err(e) => {
            ready.send(Err(TransportError::Device(e.to_string()))).unwrap_or(());
            return;
        }
    };
    let device = match api.open(vendor_id, product_id) {
        Ok(d) => d,
        Err(e) => {
            ready.send(Err(TransportError::Device(e.to_string()))).unwrap_or(());
            return;
        }
    };
    debug!("Opened HID device {:04x}:{:04x}", vendor_id, product_id);
    ready.send(Ok(())).unwrap_or(());

    let mut buf = [0u8; REPORT_SIZE];
    loop {
        loop {
            match write_rx.try_recv() {
                Ok(req) => {
                    let res = device
                        .write(&req.data)
                        .map(|_| ())
                        .map_err(|e| TransportError::Device(e.to_string()));
                    req.done.send(res).unwrap_or(());
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("HID device closed");
                    return;
                }
            }
        }
        match device.read_timeout(&mut buf[..], READ_TIMEOUT_MS) {
            Ok(0) => {}
            Ok(n) => {
                if inbound.blocking_send(buf[..n].to_vec()).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to read from HID device: {}", e);
                return;
            }
        }
    }
}

impl HidTransport {
    pub fn open(vendor_id: u16, product_id: u16) -> Result<HidTransport, TransportError> {
        let (write_tx, write_rx) = std_mpsc::channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_LEN);
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);
        let join = thread::spawn(move || {
            device_thread(vendor_id, product_id, write_rx, inbound_tx, ready_tx)
        });
        let ready = ready_rx.recv().unwrap_or(Err(TransportError::Closed));
        if let Err(e) = ready {
            join.join().unwrap_or(());
            return Err(e);
        }
        Ok(HidTransport {
            write_tx: Some(write_tx),
            inbound: Some(inbound_rx),
            join: Some(join),
        })
    }
}

impl HassebTransport for HidTransport {
    fn write(&mut self, data: &[u8]) -> DynFuture<'_, Result<(), TransportError>> {
        let (done, result) = oneshot::channel();
        let queued = match &self.write_tx {
            Some(tx) => tx
                .send(WriteReq {
                    data: data.to_vec(),
                    done,
                })
                .is_ok(),
            None => false,
        };
        Box::pin(async move {
            if !queued {
                return Err(TransportError::Closed);
            }
            result.await.unwrap_or(Err(TransportError::Closed))
        })
    }

    fn subscribe(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.inbound.take()
    }

    fn close(&mut self) {
        self.write_tx = None;
        if let Some(join) = self.join.take() {
            join.join().unwrap_or(());
        }
    }
}

impl Drop for HidTransport {
    fn drop(&mut self) {
        self.close();
    }
}
