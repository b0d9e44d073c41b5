//! Deadline spin-waits on the 8-bit step timer.

use super::StepTimer;

/// Largest number of step-timer counts waited per increment.
///
/// Kept below the 8-bit wrap so a slow poll can never miss the target count.
pub const SPIN_CHUNK: u8 = 200;

/// Busy-waits `us` microseconds on the step timer.
///
/// The wait is split into increments of at most [`SPIN_CHUNK`] counts. Each
/// increment resets the counter and clears its overflow flag before polling,
/// so error from one increment never carries into the next.
///
/// # Examples
///
/// ```
/// use openaero_io::sim::SimBoard;
/// use openaero_io::timing::spin_wait;
///
/// let mut board = SimBoard::new(1);
/// spin_wait(&mut board, 900);
/// assert_eq!(board.time_us(), 900);
/// ```
pub fn spin_wait<T: StepTimer + ?Sized>(timer: &mut T, us: u32) {
    let mut remaining = us;
    while remaining > 0 {
        let chunk = remaining.min(u32::from(SPIN_CHUNK)) as u8;
        wait_step(timer, chunk);
        remaining -= u32::from(chunk);
    }
}

/// One reset-and-poll increment of `counts` step-timer counts.
#[inline]
pub fn wait_step<T: StepTimer + ?Sized>(timer: &mut T, counts: u8) {
    if counts == 0 {
        return;
    }
    timer.clear_overflow();
    timer.reset();
    while timer.count() < counts && !timer.overflowed() {}
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Step timer that advances one count per poll and records resets.
    struct CountingTimer {
        value: u16,
        polls: u32,
        resets: u32,
        overflow: bool,
    }

    impl CountingTimer {
        fn new() -> Self {
            Self { value: 0, polls: 0, resets: 0, overflow: false }
        }
    }

    impl StepTimer for CountingTimer {
        fn reset(&mut self) {
            self.value = 0;
            self.resets += 1;
        }

        fn count(&mut self) -> u8 {
            self.polls += 1;
            self.value += 1;
            if self.value > 255 {
                self.value -= 256;
                self.overflow = true;
            }
            self.value as u8
        }

        fn overflowed(&self) -> bool {
            self.overflow
        }

        fn clear_overflow(&mut self) {
            self.overflow = false;
        }
    }

    #[test]
    fn test_zero_wait_does_not_touch_timer() {
        let mut timer = CountingTimer::new();
        spin_wait(&mut timer, 0);
        assert_eq!(timer.polls, 0);
        assert_eq!(timer.resets, 0);
    }

    #[test]
    fn test_wait_shorter_than_chunk() {
        let mut timer = CountingTimer::new();
        spin_wait(&mut timer, 150);
        assert_eq!(timer.polls, 150);
        assert_eq!(timer.resets, 1);
    }

    #[test]
    fn test_wait_is_split_into_chunks() {
        let mut timer = CountingTimer::new();
        spin_wait(&mut timer, 1_000);
        assert_eq!(timer.polls, 1_000);
        assert_eq!(timer.resets, 5);
    }

    #[test]
    fn test_wait_with_remainder() {
        let mut timer = CountingTimer::new();
        spin_wait(&mut timer, 450);
        assert_eq!(timer.polls, 450);
        // 200 + 200 + 50
        assert_eq!(timer.resets, 3);
    }

    #[test]
    fn test_wait_step_clears_overflow() {
        let mut timer = CountingTimer::new();
        timer.overflow = true;
        wait_step(&mut timer, 4);
        assert_eq!(timer.polls, 4);
        assert!(!timer.overflowed());
    }
}
