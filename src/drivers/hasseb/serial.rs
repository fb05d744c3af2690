/// Cyclic serial number attached to every DALI frame sent to the adapter.
///
/// Counts 0..=255 and starts over. The allocator does not know which
/// numbers are still waiting for a reply, the caller checks that.
#[derive(Debug, Default)]
pub struct SerialAllocator {
    next: u8,
}

impl SerialAllocator {
    pub fn new() -> SerialAllocator {
        SerialAllocator { next: 0 }
    }

    pub fn next_serial(&mut self) -> u8 {
        let serial = self.next;
        self.next = self.next.wrapping_add(1);
        serial
    }
}

#[cfg(test)]
mod test {
    use super::SerialAllocator;
    use std::collections::HashSet;

    #[test]
    fn full_cycle() {
        let mut serials = SerialAllocator::new();
        let mut seen = HashSet::new();
        for expected in 0..=255u8 {
            let s = serials.next_serial();
            assert_eq!(s, expected);
            assert!(seen.insert(s));
        }
        assert_eq!(seen.len(), 256);
        assert_eq!(serials.next_serial(), 0);
        assert_eq!(serials.next_serial(), 1);
    }
}
