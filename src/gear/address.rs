use core::ops::RangeInclusive;
use core::str::FromStr;

/// First byte of a command frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AddressByte(pub u8);

/// Address byte for direct arc power commands. Bit 0 is clear.
pub fn direct_address(a: u8, group: bool) -> u8 {
    let a = a << 1;
    if group {
        (a & 0x1e) | 0x80
    } else {
        a & 0x7e
    }
}

/// Address byte for ordinary commands. Bit 0 is set.
pub fn command_address(a: u8, group: bool) -> u8 {
    let a = a << 1;
    if group {
        (a & 0x1f) | 0x81
    } else {
        (a & 0x7f) | 0x01
    }
}

/// Value used for display, 1 based
pub trait DisplayValue {
    fn display_value(&self) -> u8;
    fn from_display_value<A>(value: A) -> Result<Self, AddressError>
    where
        A: TryInto<u8>,
        Self: Sized;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Not a short address")]
    NotShort,
    #[error("Not a group address")]
    NotGroup,
    #[error("Invalid address")]
    InvalidAddress,
}

fn convert_display_value<A>(a: A, range: RangeInclusive<u8>) -> Result<u8, AddressError>
where
    A: TryInto<u8>,
{
    let Ok(a) = a.try_into() else {
        return Err(AddressError::InvalidAddress);
    };
    if !range.contains(&a) {
        return Err(AddressError::InvalidAddress);
    }
    Ok(a - range.start())
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Short(u8);

impl Short {
    const DISPLAY_RANGE: RangeInclusive<u8> = 1..=64;

    /// Panics if `a` is not below 64
    pub fn new(a: u8) -> Short {
        assert!(a < 64);
        Short(a)
    }
}

impl DisplayValue for Short {
    fn display_value(&self) -> u8 {
        self.0 + Self::DISPLAY_RANGE.start()
    }
    fn from_display_value<A>(a: A) -> Result<Short, AddressError>
    where
        A: TryInto<u8>,
    {
        convert_display_value(a, Self::DISPLAY_RANGE).map(Short)
    }
}

impl TryFrom<Address> for Short {
    type Error = AddressError;
    fn try_from(addr: Address) -> Result<Short, Self::Error> {
        if let Address::Short(s) = addr {
            Ok(s)
        } else {
            Err(AddressError::NotShort)
        }
    }
}

impl std::fmt::Display for Short {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.display_value().fmt(fmt)
    }
}

impl FromStr for Short {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u8::from_str(s.trim()).map_or(Err(AddressError::InvalidAddress), Self::from_display_value)
    }
}

impl From<Short> for AddressByte {
    fn from(short: Short) -> Self {
        AddressByte(command_address(short.0, false))
    }
}

/// No address is encoded as a mask
impl From<Option<Short>> for AddressByte {
    fn from(short_or_mask: Option<Short>) -> AddressByte {
        match short_or_mask {
            Some(addr) => AddressByte::from(addr),
            None => AddressByte(0xff),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Group(u8);

impl Group {
    const DISPLAY_RANGE: RangeInclusive<u8> = 1..=16;

    /// Panics if `a` is not below 16
    pub fn new(a: u8) -> Group {
        assert!(a < 16);
        Group(a)
    }

    /// Group 0..16
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl DisplayValue for Group {
    fn display_value(&self) -> u8 {
        self.0 + Self::DISPLAY_RANGE.start()
    }

    fn from_display_value<A>(a: A) -> Result<Group, AddressError>
    where
        A: TryInto<u8>,
    {
        convert_display_value(a, Self::DISPLAY_RANGE).map(Group)
    }
}

impl TryFrom<Address> for Group {
    type Error = AddressError;
    fn try_from(addr: Address) -> Result<Group, Self::Error> {
        if let Address::Group(g) = addr {
            Ok(g)
        } else {
            Err(AddressError::NotGroup)
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.display_value().fmt(fmt)
    }
}

impl FromStr for Group {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u8::from_str(s.trim()).map_or(Err(AddressError::InvalidAddress), Self::from_display_value)
    }
}

impl From<Group> for AddressByte {
    fn from(group: Group) -> AddressByte {
        AddressByte(command_address(group.0, true))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Address {
    Short(Short),
    Group(Group),
    Broadcast,
    BroadcastUnaddressed,
}

impl Address {
    /// Address byte for direct arc power commands
    pub fn direct_byte(&self) -> u8 {
        match *self {
            Address::Short(a) => direct_address(a.0, false),
            Address::Group(g) => direct_address(g.0, true),
            Address::Broadcast => 0xfe,
            Address::BroadcastUnaddressed => 0xfc,
        }
    }
}

impl From<Short> for Address {
    fn from(a: Short) -> Self {
        Address::Short(a)
    }
}

impl From<Group> for Address {
    fn from(a: Group) -> Self {
        Address::Group(a)
    }
}

impl PartialEq<Short> for Address {
    fn eq(&self, other: &Short) -> bool {
        matches!(self, Address::Short(a) if a == other)
    }
}

impl PartialEq<Group> for Address {
    fn eq(&self, other: &Group) -> bool {
        matches!(self, Address::Group(a) if a == other)
    }
}

impl From<Address> for AddressByte {
    fn from(addr: Address) -> AddressByte {
        match addr {
            Address::Short(a) => a.into(),
            Address::Group(a) => a.into(),
            Address::Broadcast => AddressByte(0xff),
            Address::BroadcastUnaddressed => AddressByte(0xfd),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Address::Short(a) => write!(fmt, "{}", a),
            Address::Group(g) => write!(fmt, "G{}", g),
            Address::Broadcast => write!(fmt, "*"),
            Address::BroadcastUnaddressed => write!(fmt, "*?"),
        }
    }
}

/// Parses the format written by `Display`: `N`, `GN`, `*` or `*?`
impl FromStr for Address {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "*" => Ok(Address::Broadcast),
            "*?" => Ok(Address::BroadcastUnaddressed),
            _ => {
                if let Some(g) = s.strip_prefix('G').or_else(|| s.strip_prefix('g')) {
                    Group::from_str(g).map(Address::Group)
                } else {
                    Short::from_str(s).map(Address::Short)
                }
            }
        }
    }
}
