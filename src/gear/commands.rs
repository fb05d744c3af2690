use crate::drivers::driver::{self, DaliDriver, DaliFrame, DaliSendResult, OpenError};
use crate::drivers::driver_utils::DaliDriverExt;
use crate::drivers::send_flags::Flags;
use crate::gear::address::{Address, AddressByte, Group, Short};
use crate::gear::cmd_defs::*;
use log::debug;

/// Reply value used when several gears answered at once
pub const INVALID_ANSWER: u8 = 0xff;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Send(#[from] DaliSendResult),
}

/// Turn a query result into the reply value. A garbled answer counts as
/// [`INVALID_ANSWER`], no answer as `None`.
pub fn check_reply(res: DaliSendResult) -> Result<Option<u8>, DaliSendResult> {
    match res {
        DaliSendResult::Answer(a) => Ok(Some(a)),
        DaliSendResult::Framing => Ok(Some(INVALID_ANSWER)),
        DaliSendResult::Timeout => Ok(None),
        e => Err(e),
    }
}

/// Group numbers of the set bits in `mask`, offset by `start`. Bits that
/// would land outside groups 0..16 are skipped.
pub fn decode_groups(mask: u8, start: u8) -> Vec<Group> {
    (0..8)
        .filter(|bit| mask & (1u8 << *bit) != 0)
        .filter_map(|bit| start.checked_add(bit))
        .filter(|g| *g < 16)
        .map(Group::new)
        .collect()
}

/// Gears selected by INITIALISE
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InitialiseTarget {
    All,
    /// Gears without a short address
    Unaddressed,
    Device(Short),
}

pub struct GearCommands {
    driver: Box<dyn DaliDriver>,
}

impl GearCommands {
    /// Open a registered driver, see [`driver::open`]
    pub fn open(device: &str) -> Result<GearCommands, OpenError> {
        driver::open(device).map(GearCommands::new)
    }

    pub fn new(driver: Box<dyn DaliDriver>) -> GearCommands {
        GearCommands { driver }
    }

    pub async fn close(mut self) {
        self.driver.close().await
    }

    /// Send an arbitrary frame. The result is returned as is.
    pub async fn send_frame(&mut self, frame: DaliFrame, flags: Flags) -> DaliSendResult {
        self.driver.send_frame(frame, flags).await
    }

    async fn send<const TWICE: bool>(&mut self, cmd: Command<false, TWICE>) -> Result<(), Error> {
        self.driver
            .send_frame16(&cmd.0, cmd.flags())
            .await
            .check_send()?;
        Ok(())
    }

    async fn query(&mut self, cmd: Command<true, false>) -> Result<Option<u8>, Error> {
        let res = self
            .driver
            .send_frame16(&cmd.0, cmd.flags())
            .await;
        Ok(check_reply(res)?)
    }

    async fn query_yes_no(&mut self, cmd: Command<true, false>) -> Result<bool, Error> {
        Ok(self.query(cmd).await? == Some(INVALID_ANSWER))
    }

    pub async fn initialise(&mut self, target: InitialiseTarget) -> Result<(), Error> {
        let cmd = match target {
            InitialiseTarget::All => INITIALISE_ALL(),
            InitialiseTarget::Unaddressed => INITIALISE_NO_ADDR(),
            InitialiseTarget::Device(addr) => INITIALISE_ADDR(addr),
        };
        self.send(cmd).await
    }

    pub async fn randomise(&mut self) -> Result<(), Error> {
        self.send(RANDOMISE()).await
    }

    /// True if at least one gear has a random address at or below the
    /// search address
    pub async fn compare(&mut self) -> Result<bool, Error> {
        self.query_yes_no(COMPARE()).await
    }

    pub async fn withdraw(&mut self) -> Result<(), Error> {
        self.send(WITHDRAW()).await
    }

    pub async fn terminate(&mut self) -> Result<(), Error> {
        self.send(TERMINATE()).await
    }

    /// Set the 24-bit search address, high byte first
    pub async fn set_search_address(&mut self, addr: u32) -> Result<(), Error> {
        self.send(SEARCHADDRH((addr >> 16) as u8)).await?;
        self.send(SEARCHADDRM((addr >> 8) as u8)).await?;
        self.send(SEARCHADDRL(addr as u8)).await
    }

    /// Give the selected gear a short address. `None` removes it.
    pub async fn program_short_address(&mut self, addr: Option<Short>) -> Result<(), Error> {
        self.send(PROGRAM_SHORT_ADDRESS(addr)).await
    }

    pub async fn verify_short_address(&mut self, addr: Short) -> Result<bool, Error> {
        self.query_yes_no(VERIFY_SHORT_ADDRESS(addr)).await
    }

    /// Short address byte of the selected gear, `None` if nothing
    /// answered
    pub async fn query_short_address(&mut self) -> Result<Option<u8>, Error> {
        self.query(QUERY_SHORT_ADDRESS()).await
    }

    pub async fn store_dtr(&mut self, value: u8) -> Result<(), Error> {
        self.send(DTR0(value)).await
    }

    pub async fn store_dtr_as_short_address(&mut self, addr: Address) -> Result<(), Error> {
        self.send(SET_SHORT_ADDRESS(addr)).await
    }

    /// Move a gear from `old` to `new`. `None` removes the short address.
    pub async fn change_short_address(
        &mut self,
        old: Address,
        new: Option<Short>,
    ) -> Result<(), Error> {
        debug!("Changing address {} to {:?}", old, new);
        self.store_dtr(AddressByte::from(new).0).await?;
        self.store_dtr_as_short_address(old).await
    }

    pub async fn direct_arc_power(&mut self, addr: Address, level: u8) -> Result<(), Error> {
        self.send(DAPC(addr, level)).await
    }

    pub async fn add_to_group(&mut self, addr: Address, group: Group) -> Result<(), Error> {
        self.send(ADD_TO_GROUP(addr, group.value())).await
    }

    pub async fn remove_from_group(&mut self, addr: Address, group: Group) -> Result<(), Error> {
        self.send(REMOVE_FROM_GROUP(addr, group.value())).await
    }

    /// Groups the gear belongs to. `None` if either query goes
    /// unanswered.
    pub async fn query_groups(&mut self, addr: Address) -> Result<Option<Vec<Group>>, Error> {
        let Some(low) = self.query(QUERY_GROUPS_0_7(addr)).await? else {
            return Ok(None);
        };
        let Some(high) = self.query(QUERY_GROUPS_8_15(addr)).await? else {
            return Ok(None);
        };
        let mut groups = decode_groups(low, 0);
        groups.extend(decode_groups(high, 8));
        Ok(Some(groups))
    }

    pub async fn query_control_gear_present(&mut self, addr: Address) -> Result<bool, Error> {
        self.query_yes_no(QUERY_CONTROL_GEAR_PRESENT(addr)).await
    }

    pub async fn query_version(&mut self, addr: Address) -> Result<Option<u8>, Error> {
        self.query(QUERY_VERSION_NUMBER(addr)).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::drivers::hasseb::codec::{parse_dali_frame, status};
    use crate::drivers::hasseb::mock::{self, MockHandle, MockTransport};
    use crate::drivers::hasseb::{HassebConfig, HassebDriver};
    use crate::drivers::send_flags::{NO_FLAG, SEND_TWICE};

    fn gear(responder: mock::Responder) -> (GearCommands, MockHandle) {
        let (transport, handle) = MockTransport::new(responder);
        let driver = HassebDriver::new(Box::new(transport), HassebConfig::default()).unwrap();
        (GearCommands::new(Box::new(driver)), handle)
    }

    fn payloads(handle: &MockHandle) -> Vec<[u8; 2]> {
        handle
            .written()
            .iter()
            .filter_map(|w| parse_dali_frame(w))
            .map(|f| [f.data[0], f.data[1]])
            .collect()
    }

    #[test]
    fn groups_from_mask() {
        assert_eq!(decode_groups(0b101, 0), vec![Group::new(0), Group::new(2)]);
        assert_eq!(decode_groups(0b101, 8), vec![Group::new(8), Group::new(10)]);
        assert_eq!(decode_groups(0, 8), vec![]);
        assert_eq!(decode_groups(0xff, 0).len(), 8);
    }

    #[test]
    fn groups_out_of_range() {
        assert_eq!(decode_groups(0x80, 9), vec![]);
        assert_eq!(decode_groups(0x81, 9), vec![Group::new(9)]);
        assert_eq!(decode_groups(0xff, 250), vec![]);
    }

    #[test]
    fn reply_values() {
        assert!(matches!(check_reply(DaliSendResult::Answer(3)), Ok(Some(3))));
        assert!(matches!(
            check_reply(DaliSendResult::Framing),
            Ok(Some(INVALID_ANSWER))
        ));
        assert!(matches!(check_reply(DaliSendResult::Timeout), Ok(None)));
        assert!(matches!(
            check_reply(DaliSendResult::NoResponse),
            Err(DaliSendResult::NoResponse)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn query_groups() {
        let (mut gear, handle) = gear(mock::answer_with(|frame| match frame {
            [0x07, 0xc0] => Some(0b0000_0101),
            [0x07, 0xc1] => Some(0b1000_0000),
            _ => None,
        }));
        let groups = gear.query_groups(Short::new(3).into()).await.unwrap();
        assert_eq!(
            groups,
            Some(vec![Group::new(0), Group::new(2), Group::new(15)])
        );
        assert_eq!(payloads(&handle), vec![[0x07, 0xc0], [0x07, 0xc1]]);
        gear.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn query_groups_without_answer() {
        let (mut gear, handle) = gear(mock::answer_with(|frame| match frame {
            [0x07, 0xc0] => Some(0x01),
            _ => None,
        }));
        let groups = gear.query_groups(Short::new(3).into()).await.unwrap();
        assert_eq!(groups, None);
        assert_eq!(handle.written().len(), 2);

        let groups = gear.query_groups(Short::new(4).into()).await.unwrap();
        assert_eq!(groups, None);
        // Second query is skipped when the first goes unanswered
        assert_eq!(handle.written().len(), 3);
        gear.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn initialise_all() {
        let (mut gear, handle) = gear(mock::no_answer());
        gear.initialise(InitialiseTarget::All).await.unwrap();
        let written = handle.written();
        assert_eq!(written.len(), 1);
        let sent = parse_dali_frame(&written[0]).unwrap();
        assert_eq!(sent.flags, SEND_TWICE);
        assert_eq!(written[0], vec![0xaa, 0x07, 0, 0x10, 0, 0, 10, 0xa5, 0x00, 0x00]);

        gear.initialise(InitialiseTarget::Unaddressed).await.unwrap();
        gear.initialise(InitialiseTarget::Device(Short::new(5)))
            .await
            .unwrap();
        assert_eq!(
            payloads(&handle)[1..],
            [[0xa5, 0xff], [0xa5, 0x0b]]
        );
        gear.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn compare_with_collision() {
        let (transport, handle) = MockTransport::new(Box::new(|data: &[u8]| {
            match parse_dali_frame(data) {
                Some(sent) => vec![mock::report(sent.serial, status::INVALID_ANSWER, 0, 0)],
                None => Vec::new(),
            }
        }));
        let driver = HassebDriver::new(Box::new(transport), HassebConfig::default()).unwrap();
        let mut gear = GearCommands::new(Box::new(driver));
        assert!(gear.compare().await.unwrap());
        assert_eq!(payloads(&handle), vec![[0xa9, 0x00]]);
        gear.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn yes_no_queries() {
        let (mut gear, _handle) = gear(mock::answer_with(|frame| match frame {
            [0xa9, 0x00] => Some(0xff),
            [0xb9, 0x0b] => Some(0xff),
            [0x0b, 0x91] => Some(0xff),
            [0x0d, 0x91] => Some(0x00),
            _ => None,
        }));
        assert!(gear.compare().await.unwrap());
        assert!(gear.verify_short_address(Short::new(5)).await.unwrap());
        assert!(!gear.verify_short_address(Short::new(6)).await.unwrap());
        assert!(gear
            .query_control_gear_present(Short::new(5).into())
            .await
            .unwrap());
        assert!(!gear
            .query_control_gear_present(Short::new(6).into())
            .await
            .unwrap());
        assert!(!gear
            .query_control_gear_present(Short::new(7).into())
            .await
            .unwrap());
        gear.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn search_address() {
        let (mut gear, handle) = gear(mock::no_answer());
        gear.set_search_address(0x123456).await.unwrap();
        assert_eq!(
            payloads(&handle),
            vec![[0xb1, 0x12], [0xb3, 0x34], [0xb5, 0x56]]
        );
        gear.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn change_short_address() {
        let (mut gear, handle) = gear(mock::no_answer());
        gear.change_short_address(Short::new(2).into(), Some(Short::new(9)))
            .await
            .unwrap();
        gear.change_short_address(Address::Broadcast, None)
            .await
            .unwrap();
        assert_eq!(
            payloads(&handle),
            vec![[0xa3, 0x13], [0x05, 0x80], [0xa3, 0xff], [0xff, 0x80]]
        );
        let twice: Vec<bool> = handle
            .written()
            .iter()
            .map(|w| parse_dali_frame(w).unwrap().flags.send_twice())
            .collect();
        assert_eq!(twice, vec![false, true, false, true]);
        gear.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn addressing_commands() {
        let (mut gear, handle) = gear(mock::answer_with(|frame| match frame {
            [0xbb, 0x00] => Some(0x0b),
            [0x0b, 0x97] => Some(0x08),
            _ => None,
        }));
        let short = Short::new(5);
        gear.direct_arc_power(short.into(), 200).await.unwrap();
        gear.direct_arc_power(Group::new(5).into(), 0).await.unwrap();
        gear.add_to_group(short.into(), Group::new(4)).await.unwrap();
        gear.remove_from_group(short.into(), Group::new(4))
            .await
            .unwrap();
        gear.program_short_address(Some(short)).await.unwrap();
        gear.program_short_address(None).await.unwrap();
        gear.randomise().await.unwrap();
        gear.withdraw().await.unwrap();
        gear.terminate().await.unwrap();
        assert_eq!(gear.query_short_address().await.unwrap(), Some(0x0b));
        assert_eq!(gear.query_version(short.into()).await.unwrap(), Some(0x08));
        assert_eq!(
            payloads(&handle),
            vec![
                [0x0a, 200],
                [0x8a, 0],
                [0x0b, 0x64],
                [0x0b, 0x74],
                [0xb7, 0x0b],
                [0xb7, 0xff],
                [0xa7, 0x00],
                [0xab, 0x00],
                [0xa1, 0x00],
                [0xbb, 0x00],
                [0x0b, 0x97],
            ]
        );
        gear.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn raw_frames_and_errors() {
        let (mut gear, handle) = gear(mock::answer_with(|_| Some(0x42)));
        let res = gear
            .send_frame(DaliFrame::Frame24([0xc1, 0x00, 0x10]), NO_FLAG)
            .await;
        assert!(matches!(res, DaliSendResult::Ok));
        assert_eq!(&handle.written()[0][7..], &[0xc1, 0x00, 0x10]);

        handle
            .fail_writes
            .store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(matches!(
            gear.withdraw().await,
            Err(Error::Send(DaliSendResult::DriverError(_)))
        ));
        gear.close().await;
    }
}
