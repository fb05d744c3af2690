use crate::drivers::driver::DaliSendResult;
use log::{debug, trace};
use std::collections::hash_map::{Entry, HashMap};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// A request waiting for the adapter to report back
pub struct PendingRequest {
    pub reply: oneshot::Sender<DaliSendResult>,
    /// The request fails with `NoResponse` after this
    pub deadline: Instant,
}

/// Outstanding requests keyed by serial number.
///
/// Each request is removed from the table when it is resolved, so it
/// can only be resolved once.
#[derive(Default)]
pub struct Correlator {
    pending: HashMap<u8, PendingRequest>,
}

impl Correlator {
    pub fn new() -> Correlator {
        Correlator {
            pending: HashMap::new(),
        }
    }

    pub fn is_pending(&self, serial: u8) -> bool {
        self.pending.contains_key(&serial)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Hands the request back if the serial number is already taken
    pub fn register(&mut self, serial: u8, request: PendingRequest) -> Result<(), PendingRequest> {
        match self.pending.entry(serial) {
            Entry::Occupied(_) => Err(request),
            Entry::Vacant(slot) => {
                slot.insert(request);
                Ok(())
            }
        }
    }

    /// Complete the request with `serial`. Returns false if there was
    /// none, which covers duplicates and unsolicited reports.
    pub fn dispatch(&mut self, serial: u8, result: DaliSendResult) -> bool {
        match self.pending.remove(&serial) {
            Some(request) => {
                trace!("Serial {}: {}", serial, result);
                // The caller may have given up on the request
                request.reply.send(result).unwrap_or(());
                true
            }
            None => {
                trace!("No request for serial {}", serial);
                false
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|r| r.deadline).min()
    }

    /// Fail all requests whose deadline has passed. Returns the number
    /// of expired requests.
    pub fn expire(&mut self, now: Instant) -> usize {
        let expired: Vec<u8> = self
            .pending
            .iter()
            .filter(|(_, r)| r.deadline <= now)
            .map(|(s, _)| *s)
            .collect();
        for serial in &expired {
            debug!("No response for serial {}", serial);
            if let Some(request) = self.pending.remove(serial) {
                request.reply.send(DaliSendResult::NoResponse).unwrap_or(());
            }
        }
        expired.len()
    }

    pub fn fail_all<F>(&mut self, mut result: F)
    where
        F: FnMut() -> DaliSendResult,
    {
        for (_, request) in self.pending.drain() {
            request.reply.send(result()).unwrap_or(());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::sync::oneshot::error::TryRecvError;
    use tokio::time::Duration;

    fn request(deadline: Instant) -> (PendingRequest, oneshot::Receiver<DaliSendResult>) {
        let (reply, rx) = oneshot::channel();
        (PendingRequest { reply, deadline }, rx)
    }

    #[test]
    fn resolves_once() {
        let mut table = Correlator::new();
        let (req, mut rx) = request(Instant::now());
        assert!(table.register(7, req).is_ok());
        assert!(table.is_pending(7));

        assert!(table.dispatch(7, DaliSendResult::Answer(0x12)));
        assert!(!table.is_pending(7));
        assert!(matches!(rx.try_recv(), Ok(DaliSendResult::Answer(0x12))));

        // Duplicate report
        assert!(!table.dispatch(7, DaliSendResult::Answer(0x13)));
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_serial_is_ignored() {
        let mut table = Correlator::new();
        let (req, mut rx) = request(Instant::now());
        table.register(1, req).ok();
        assert!(!table.dispatch(2, DaliSendResult::Timeout));
        assert_eq!(table.len(), 1);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn occupied_serial() {
        let mut table = Correlator::new();
        let (first, mut first_rx) = request(Instant::now());
        let (second, _second_rx) = request(Instant::now());
        assert!(table.register(3, first).is_ok());
        assert!(table.register(3, second).is_err());
        table.dispatch(3, DaliSendResult::Timeout);
        assert!(matches!(first_rx.try_recv(), Ok(DaliSendResult::Timeout)));
    }

    #[test]
    fn receiver_dropped() {
        let mut table = Correlator::new();
        let (req, rx) = request(Instant::now());
        table.register(9, req).ok();
        drop(rx);
        assert!(table.dispatch(9, DaliSendResult::Answer(1)));
        assert!(table.is_empty());
    }

    #[test]
    fn expire_by_deadline() {
        let mut table = Correlator::new();
        let now = Instant::now();
        let (early, mut early_rx) = request(now + Duration::from_millis(100));
        let (late, mut late_rx) = request(now + Duration::from_millis(300));
        table.register(1, early).ok();
        table.register(2, late).ok();
        assert_eq!(table.next_deadline(), Some(now + Duration::from_millis(100)));

        assert_eq!(table.expire(now + Duration::from_millis(50)), 0);
        assert_eq!(table.expire(now + Duration::from_millis(100)), 1);
        assert!(matches!(early_rx.try_recv(), Ok(DaliSendResult::NoResponse)));
        assert!(matches!(late_rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(table.next_deadline(), Some(now + Duration::from_millis(300)));

        // A late report for the expired request changes nothing
        assert!(!table.dispatch(1, DaliSendResult::Answer(0)));
    }

    #[test]
    fn fail_all_on_close() {
        let mut table = Correlator::new();
        let (a, mut a_rx) = request(Instant::now());
        let (b, mut b_rx) = request(Instant::now());
        table.register(10, a).ok();
        table.register(11, b).ok();
        table.fail_all(|| DaliSendResult::DriverError("closed".into()));
        assert!(table.is_empty());
        assert!(matches!(a_rx.try_recv(), Ok(DaliSendResult::DriverError(_))));
        assert!(matches!(b_rx.try_recv(), Ok(DaliSendResult::DriverError(_))));
    }
}
