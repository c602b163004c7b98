//! # Rolling Window
//! Trailing mean over the last `N` buckets of a series (default 7).
//!
//! Edge buckets near the start average over however many buckets exist so
//! far; there is no look-ahead and no wraparound.

use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 7;

/// Fixed-length trailing window over `f64` samples.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    buf: VecDeque<f64>,
    len: usize,
}

impl RollingWindow {
    /// `len` of 0 is treated as 1.
    pub fn with_len(len: usize) -> Self {
        let len = len.max(1);
        Self {
            buf: VecDeque::with_capacity(len),
            len,
        }
    }

    /// Push a sample, evicting the oldest once the window is full.
    pub fn record(&mut self, value: f64) {
        if self.buf.len() == self.len {
            self.buf.pop_front();
        }
        self.buf.push_back(value);
    }

    /// Mean and sample count of the current window.
    pub fn average_and_count(&self) -> (f64, usize) {
        let n = self.buf.len();
        if n == 0 {
            return (0.0, 0);
        }
        // Summed oldest-first so results match a direct slice mean exactly.
        let sum: f64 = self.buf.iter().sum();
        (sum / n as f64, n)
    }

    pub fn window_len(&self) -> usize {
        self.len
    }
}

/// Trailing means for every position: `out[i] = mean(values[max(0, i-len+1)..=i])`.
pub fn trailing_means(values: &[f64], len: usize) -> Vec<f64> {
    let mut w = RollingWindow::with_len(len);
    values
        .iter()
        .map(|v| {
            w.record(*v);
            w.average_and_count().0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_positions_use_available_buckets() {
        let out = trailing_means(&[7.0, 1.0, 4.0], 7);
        assert_eq!(out, vec![7.0, 4.0, 4.0]);
    }

    #[test]
    fn window_slides_after_filling() {
        let values: Vec<f64> = (1..=9).map(f64::from).collect();
        let out = trailing_means(&values, 7);
        // positions 7 and 8 average 2..=8 and 3..=9
        assert_eq!(out[7], 5.0);
        assert_eq!(out[8], 6.0);
    }

    #[test]
    fn zero_len_behaves_like_one() {
        let w = RollingWindow::with_len(0);
        assert_eq!(w.window_len(), 1);
        assert_eq!(trailing_means(&[3.0, 5.0], 0), vec![3.0, 5.0]);
    }
}
