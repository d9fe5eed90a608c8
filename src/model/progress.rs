/*!
 * Transient progress sample produced during `Running` (spec §3 "Progress sample")
 */

use super::transfer_record::TransferId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub transfer_id: TransferId,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub instantaneous_bps: f64,
    pub smoothed_bps: f64,
    pub eta_seconds: Option<f64>,
}

impl ProgressSample {
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            1.0
        } else {
            self.transferred_bytes as f64 / self.total_bytes as f64
        }
    }
}

/// Exponential smoothing of instantaneous speed samples (spec §4.1
/// "Progress sampling"): `smoothed <- 0.9*instant + 0.1*smoothed`, with the
/// first sample adopting `instant` directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeedSmoother {
    smoothed: Option<f64>,
}

impl SpeedSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, instantaneous_bps: f64) -> f64 {
        let smoothed = match self.smoothed {
            None => instantaneous_bps,
            Some(prev) => 0.9 * instantaneous_bps + 0.1 * prev,
        };
        self.smoothed = Some(smoothed);
        smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_adopts_instant() {
        let mut smoother = SpeedSmoother::new();
        assert_eq!(smoother.sample(100.0), 100.0);
    }

    #[test]
    fn subsequent_samples_blend() {
        let mut smoother = SpeedSmoother::new();
        smoother.sample(100.0);
        let second = smoother.sample(200.0);
        assert!((second - (0.9 * 200.0 + 0.1 * 100.0)).abs() < 1e-9);
    }
}
