//! Per-switch debounce logic.
//!
//! EvenOdd debounce, a variant of Kenneth A. Kuhn's integrator algorithm.
//! The whole state of one switch lives in a single byte:
//!
//! ```text
//! .-------------.-.
//! |7 6 5 4 3 2 1|0|
//! '-------------'-'
//!  counter       debounced state
//! ```
//!
//! A sample that disagrees with the debounced state adds 2 to the byte, a
//! sample that agrees subtracts 2, so the counter moves without touching the
//! state bit. Once the counter saturates the state flips and the counter
//! restarts from zero. All-zero is "released, no history", so a fresh filter
//! needs no setup.

use crate::config::MATRIX_DEBOUNCE_TICKS;

/// Debounce filter for one input line.
///
/// `TICKS` is the number of disagreeing samples (net of agreeing ones)
/// needed to flip the state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Debouncer<const TICKS: u8 = MATRIX_DEBOUNCE_TICKS> {
    state: u8,
}

impl<const TICKS: u8> Debouncer<TICKS> {
    // The counter plus the state bit must fit in the byte.
    const CEILING: u8 = {
        assert!(TICKS >= 1 && TICKS <= 127);
        TICKS * 2
    };

    pub const fn new() -> Self {
        Self { state: 0 }
    }

    /// Current debounced state.
    pub const fn is_pressed(&self) -> bool {
        self.state & 1 != 0
    }

    /// Feed one raw sample. Returns the new state when it flips.
    pub fn update(&mut self, pressed: bool) -> Option<bool> {
        if pressed != self.is_pressed() {
            self.state += 2;
        } else if self.state >= 2 {
            self.state -= 2;
        }

        if self.state >= Self::CEILING {
            self.state = pressed as u8;
            return Some(pressed);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed<const T: u8>(debouncer: &mut Debouncer<T>, samples: &[bool]) -> [u8; 2] {
        // [presses, releases]
        let mut edges = [0u8; 2];
        for &sample in samples {
            match debouncer.update(sample) {
                Some(true) => edges[0] += 1,
                Some(false) => edges[1] += 1,
                None => {}
            }
        }
        edges
    }

    #[test]
    fn flips_after_threshold_samples() {
        let mut d = Debouncer::<8>::new();
        for _ in 0..7 {
            assert_eq!(d.update(true), None);
        }
        assert_eq!(d.update(true), Some(true));
        assert!(d.is_pressed());
    }

    #[test]
    fn steady_signal_reports_exactly_once() {
        let mut d = Debouncer::<8>::new();
        assert_eq!(feed(&mut d, &[true; 100]), [1, 0]);
        assert_eq!(feed(&mut d, &[true; 100]), [0, 0]);
    }

    #[test]
    fn release_needs_threshold_samples_too() {
        let mut d = Debouncer::<8>::new();
        feed(&mut d, &[true; 8]);
        for _ in 0..7 {
            assert_eq!(d.update(false), None);
        }
        assert_eq!(d.update(false), Some(false));
        assert!(!d.is_pressed());
    }

    #[test]
    fn alternating_noise_never_flips() {
        let mut d = Debouncer::<8>::new();
        let noise: [bool; 64] = core::array::from_fn(|i| i % 2 == 0);
        assert_eq!(feed(&mut d, &noise), [0, 0]);
        assert!(!d.is_pressed());
    }

    #[test]
    fn short_bursts_are_rejected() {
        let mut d = Debouncer::<8>::new();
        for _ in 0..10 {
            assert_eq!(feed(&mut d, &[true; 5]), [0, 0]);
            // Enough agreeing samples to drain the counter again.
            assert_eq!(feed(&mut d, &[false; 5]), [0, 0]);
        }
    }

    #[test]
    fn bounce_delays_but_does_not_duplicate() {
        let mut d = Debouncer::<4>::new();
        let bouncy = [true, false, true, true, false, true, true, true, true, true];
        assert_eq!(feed(&mut d, &bouncy), [1, 0]);
        assert!(d.is_pressed());
    }

    #[test]
    fn single_tick_threshold() {
        let mut d = Debouncer::<1>::new();
        assert_eq!(d.update(true), Some(true));
        assert_eq!(d.update(false), Some(false));
    }

    #[test]
    fn largest_threshold_fits_a_byte() {
        let mut d = Debouncer::<127>::new();
        assert_eq!(feed(&mut d, &[true; 126]), [0, 0]);
        assert_eq!(d.update(true), Some(true));
        assert_eq!(feed(&mut d, &[false; 127]), [0, 1]);
    }
}
