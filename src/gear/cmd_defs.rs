use crate::drivers::send_flags::Flags;
use crate::gear::address::{Address, AddressByte};

/// A 16-bit forward frame. `ANSWER` marks queries, `TWICE` configuration
/// commands that must be repeated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Command<const ANSWER: bool, const TWICE: bool>(pub [u8; 2]);

impl<const ANSWER: bool, const TWICE: bool> Command<ANSWER, TWICE> {
    pub fn flags(&self) -> Flags {
        Flags::ExpectAnswer(ANSWER) | Flags::SendTwice(TWICE)
    }
}

macro_rules! cmd_type {
    () => {Command<false,false>};
    (Answer) => {Command<true,false>};
    (Twice) => {Command<false,true>};
}

macro_rules! dev_cmd_def {
    ($sym: ident, $opcode: expr $(,$attr: ident)?) => {
        #[allow(non_snake_case)]
        #[inline(always)]
        pub fn $sym<A>(addr: A) -> cmd_type!($($attr)?)
        where
            A: Into<AddressByte>,
        {
            Command([addr.into().0, $opcode])
        }
    };
}

macro_rules! offset_cmd_def {
    ($sym: ident, $opcode: expr $(,$attr: ident)?) => {
        #[allow(non_snake_case)]
        #[inline(always)]
        pub fn $sym<A>(addr: A, offset: u8) -> cmd_type!($($attr)?)
        where
            A: Into<AddressByte>,
        {
            Command([addr.into().0, $opcode + (offset & 0x0f)])
        }
    };
}

macro_rules! special_cmd_def {
    ($sym: ident, $byte1: expr, $byte2: expr $(,$attr: ident)?) => {
        #[allow(non_snake_case)]
        #[inline(always)]
        pub const fn $sym() -> cmd_type!($($attr)?) {
            Command([$byte1, $byte2])
        }
    };
}

macro_rules! special_data_cmd_def {
    ($sym: ident, $byte1: expr $(,$attr: ident)?) => {
        #[allow(non_snake_case)]
        #[inline(always)]
        pub const fn $sym(data: u8) -> cmd_type!($($attr)?) {
            Command([$byte1, data])
        }
    };
}

/// Direct arc power
#[allow(non_snake_case)]
#[inline(always)]
pub fn DAPC<A>(addr: A, level: u8) -> Command<false, false>
where
    A: Into<Address>,
{
    Command([addr.into().direct_byte(), level])
}

offset_cmd_def!(ADD_TO_GROUP, 0x60, Twice);
offset_cmd_def!(REMOVE_FROM_GROUP, 0x70, Twice);

dev_cmd_def!(SET_SHORT_ADDRESS, 0x80, Twice);

dev_cmd_def!(QUERY_CONTROL_GEAR_PRESENT, 0x91, Answer);
dev_cmd_def!(QUERY_VERSION_NUMBER, 0x97, Answer);

dev_cmd_def!(QUERY_GROUPS_0_7, 0xc0, Answer);
dev_cmd_def!(QUERY_GROUPS_8_15, 0xc1, Answer);

special_cmd_def!(TERMINATE, 0xa1, 0x00);

special_data_cmd_def!(DTR0, 0xa3);

#[allow(non_snake_case)]
#[inline(always)]
pub fn INITIALISE_ADDR<A>(addr: A) -> Command<false, true>
where
    A: Into<AddressByte>,
{
    Command([0xa5, addr.into().0])
}

special_cmd_def!(INITIALISE_ALL, 0xa5, 0x00, Twice);
special_cmd_def!(INITIALISE_NO_ADDR, 0xa5, 0xff, Twice);
special_cmd_def!(RANDOMISE, 0xa7, 0x00, Twice);
special_cmd_def!(COMPARE, 0xa9, 0x00, Answer);
special_cmd_def!(WITHDRAW, 0xab, 0x00);

special_data_cmd_def!(SEARCHADDRH, 0xb1);
special_data_cmd_def!(SEARCHADDRM, 0xb3);
special_data_cmd_def!(SEARCHADDRL, 0xb5);

/// `None` clears the short address
#[allow(non_snake_case)]
#[inline(always)]
pub fn PROGRAM_SHORT_ADDRESS<A>(addr: A) -> Command<false, false>
where
    A: Into<AddressByte>,
{
    Command([0xb7, addr.into().0])
}

#[allow(non_snake_case)]
#[inline(always)]
pub fn VERIFY_SHORT_ADDRESS<A>(addr: A) -> Command<true, false>
where
    A: Into<AddressByte>,
{
    Command([0xb9, addr.into().0])
}

special_cmd_def!(QUERY_SHORT_ADDRESS, 0xbb, 0x00, Answer);
