/// Announces checkpoints right after the header, followed by the period.
pub(crate) const SENTINEL_ON: u8 = 0xF0;
/// Closes a stream that announced checkpoints.
pub(crate) const SENTINEL_OFF: u8 = 0xF1;
/// Fixed-width start of every checkpoint.
pub(crate) const SENTINEL_MAGIC: u32 = 0x5EA7_C0DE;

/// Counts values on either side of a stream and says when a checkpoint is due.
///
/// Writer and reader tick at the same points, so a driver that writes more
/// bytes than it reads is caught at the next checkpoint instead of much later.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Sentinel {
    period: u32,
    count: u64,
}

impl Sentinel {
    #[inline]
    pub const fn new(period: u32) -> Self {
        Self { period, count: 0 }
    }

    #[inline]
    pub const fn period(&self) -> u32 {
        self.period
    }

    /// Counts one value. Returns the counter value when a checkpoint is due.
    #[inline]
    pub fn tick(&mut self) -> Option<u64> {
        self.count += 1;
        (self.count % u64::from(self.period) == 0).then_some(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::Sentinel;

    #[test]
    fn ticks_every_period() {
        let mut sentinel = Sentinel::new(3);
        let due: Vec<_> = (0..7).filter_map(|_| sentinel.tick()).collect();
        assert_eq!(due, [3, 6]);
    }
}
