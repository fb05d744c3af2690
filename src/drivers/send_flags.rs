const SEND_TWICE_BIT: u16 = 0x01;
const EXPECT_ANSWER_BIT: u16 = 0x02; // Expect an answer

pub const EXPECT_ANSWER: Flags = ExpectAnswer(true);
pub const SEND_TWICE: Flags = SendTwice(true);
pub const NO_FLAG: Flags = Combined(0);

/// Transmission options for a single DALI frame.
///
/// Flags are combined with `|`. A later flag of the same kind replaces
/// an earlier one, so `SEND_TWICE | SendTwice(false)` clears the bit.
#[derive(Debug, Clone)]
pub enum Flags {
    Empty,
    SendTwice(bool),
    ExpectAnswer(bool),
    Combined(u16),
}

use Flags::*;
impl Flags {
    const fn bits(&self) -> u16 {
        match *self {
            Empty => 0,
            SendTwice(s) => {
                if s {
                    SEND_TWICE_BIT
                } else {
                    0
                }
            }
            ExpectAnswer(e) => {
                if e {
                    EXPECT_ANSWER_BIT
                } else {
                    0
                }
            }
            Combined(b) => b,
        }
    }

    const fn mask(&self) -> u16 {
        match *self {
            Empty | Combined(_) => 0,
            SendTwice(_) => SEND_TWICE_BIT,
            ExpectAnswer(_) => EXPECT_ANSWER_BIT,
        }
    }

    pub const fn send_twice(&self) -> bool {
        (self.bits() & SEND_TWICE_BIT) != 0
    }

    pub const fn expect_answer(&self) -> bool {
        (self.bits() & EXPECT_ANSWER_BIT) != 0
    }
}

impl Default for Flags {
    fn default() -> Self {
        NO_FLAG
    }
}

impl PartialEq for Flags {
    fn eq(&self, other: &Flags) -> bool {
        self.bits() == other.bits()
    }
}

impl std::ops::BitOr<Flags> for Flags {
    type Output = Self;
    fn bitor(self, other: Flags) -> Self::Output {
        Combined((self.bits() & !other.mask()) | other.bits())
    }
}

impl std::ops::BitOrAssign<Flags> for Flags {
    fn bitor_assign(&mut self, other: Flags) {
        *self = self.clone() | other;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn combine_flags() {
        let f = SEND_TWICE | EXPECT_ANSWER;
        assert!(f.send_twice());
        assert!(f.expect_answer());

        let f = f | SendTwice(false);
        assert!(!f.send_twice());
        assert!(f.expect_answer());

        let mut f = NO_FLAG;
        assert!(!f.send_twice());
        assert!(!f.expect_answer());
        f |= EXPECT_ANSWER;
        assert_eq!(f, EXPECT_ANSWER);
    }
}
