use super::driver::{DaliFrame, DaliSendResult};
use super::send_flags::Flags;
use tokio::sync::oneshot;

pub struct DALIcmd {
    pub data: DaliFrame,
    pub flags: Flags,
}

/// A frame queued for a driver task together with the channel that
/// receives its result.
pub struct DALIreq {
    pub cmd: DALIcmd,
    pub reply: oneshot::Sender<DaliSendResult>,
}
