//! Measured sounding data.
//!
//! A [`Sounding`] holds receiver times (seconds), observed responses and
//! their relative errors. Observations must be strictly positive because the
//! inversion fits them in log space. Gate filtering uses the same
//! microsecond [`TimeWindow`] as the forward configuration, so a filtered
//! sounding lines up with an operator prepared with the same window.
use crate::forward::config::{TimeWindow, validate_receiver_times};
use crate::model::errors::{ConfigError, ConfigResult};
use ndarray::Array1;

#[derive(Debug, Clone, PartialEq)]
pub struct Sounding {
    times: Array1<f64>,
    observed: Array1<f64>,
    rel_error: Array1<f64>,
}

impl Sounding {
    /// # Errors
    /// - [`ConfigError::DataLengthMismatch`] if the three vectors differ in length.
    /// - Receiver-time errors from [`validate_receiver_times`].
    /// - [`ConfigError::InvalidObservation`] for non-finite or non-positive data.
    /// - [`ConfigError::InvalidRelativeError`] for non-finite or non-positive errors.
    pub fn new(times: Array1<f64>, observed: Array1<f64>, rel_error: Array1<f64>) -> ConfigResult<Self> {
        for found in [observed.len(), rel_error.len()] {
            if found != times.len() {
                return Err(ConfigError::DataLengthMismatch { expected: times.len(), found });
            }
        }
        validate_receiver_times(&times)?;
        for (index, &value) in observed.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidObservation {
                    index,
                    value,
                    reason: "Observations must be finite and > 0.",
                });
            }
        }
        for (index, &value) in rel_error.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidRelativeError { index, value });
            }
        }
        Ok(Self { times, observed, rel_error })
    }

    /// Same relative error on every gate.
    pub fn with_constant_error(times: Array1<f64>, observed: Array1<f64>, rel_error: f64) -> ConfigResult<Self> {
        let rel = Array1::from_elem(observed.len(), rel_error);
        Self::new(times, observed, rel)
    }

    /// Keep only the gates inside `window`.
    ///
    /// # Errors
    /// - [`ConfigError::EmptyTimeWindow`] if no gate survives.
    pub fn filter(&self, window: &TimeWindow) -> ConfigResult<Self> {
        let keep = window.mask(&self.times);
        if keep.is_empty() {
            return Err(ConfigError::EmptyTimeWindow { t_min: window.t_min, t_max: window.t_max });
        }
        let pick = |a: &Array1<f64>| keep.iter().map(|&i| a[i]).collect::<Array1<f64>>();
        Ok(Self {
            times: pick(&self.times),
            observed: pick(&self.observed),
            rel_error: pick(&self.rel_error),
        })
    }

    pub fn times(&self) -> &Array1<f64> {
        &self.times
    }

    pub fn observed(&self) -> &Array1<f64> {
        &self.observed
    }

    pub fn rel_error(&self) -> &Array1<f64> {
        &self.rel_error
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Rejection of malformed soundings (lengths, observations, relative errors).
    // - Time-window filtering of all three vectors together.
    //
    // They intentionally DO NOT cover:
    // - Agreement with an operator's receiver times, checked by the driver.
    // -------------------------------------------------------------------------

    #[test]
    fn rejects_malformed_data() {
        let t = array![1e-5, 2e-5, 4e-5];

        assert_eq!(
            Sounding::new(t.clone(), array![1.0, 2.0], array![0.05, 0.05, 0.05]),
            Err(ConfigError::DataLengthMismatch { expected: 3, found: 2 })
        );
        assert!(matches!(
            Sounding::new(t.clone(), array![1.0, -2.0, 3.0], array![0.05, 0.05, 0.05]),
            Err(ConfigError::InvalidObservation { index: 1, .. })
        ));
        assert_eq!(
            Sounding::with_constant_error(t, array![1.0, 2.0, 3.0], 0.0),
            Err(ConfigError::InvalidRelativeError { index: 0, value: 0.0 })
        );
    }

    #[test]
    // Purpose
    // -------
    // Filtering keeps the gates inside the microsecond window, in order.
    //
    // Given
    // -----
    // - Gates at 10, 20, 40, 80 µs; window [15, 50] µs.
    //
    // Expect
    // ------
    // - The 20 and 40 µs gates with their data and errors.
    fn filter_keeps_gates_inside_window() {
        let s = Sounding::new(
            array![1e-5, 2e-5, 4e-5, 8e-5],
            array![4.0, 3.0, 2.0, 1.0],
            array![0.1, 0.2, 0.3, 0.4],
        )
        .unwrap();
        let window = TimeWindow::new(15.0, 50.0).unwrap();

        let f = s.filter(&window).expect("two gates inside");

        assert_eq!(f.times(), &array![2e-5, 4e-5]);
        assert_eq!(f.observed(), &array![3.0, 2.0]);
        assert_eq!(f.rel_error(), &array![0.2, 0.3]);

        let empty = TimeWindow::new(500.0, 900.0).unwrap();
        assert!(matches!(s.filter(&empty), Err(ConfigError::EmptyTimeWindow { .. })));
    }
}
