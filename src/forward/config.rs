//! Forward configuration — immutable description of one forward-solver setup.
//!
//! Purpose
//! -------
//! Bundle everything the external EM solver needs besides the layer matrix:
//! instrument identity and loop geometry, receiver times, layer and parameter
//! counts, IP model type, response transform and the apparent-resistivity
//! flag. A [`ForwardConfig`] is built once per prepared forward operator and
//! never modified afterwards.
//!
//! Key behaviors
//! -------------
//! - Validate receiver times (finite, > 0, strictly increasing, non-empty).
//! - Cross-check the IP model type against the number of parameters per
//!   layer (`IpModel::None` ⇔ 1 parameter, every IP model ⇔ 4).
//! - Apply a microsecond receiver-gate window to second-valued receiver
//!   times ([`TimeWindow::apply`]).
//!
//! Conventions
//! -----------
//! - `n_params` counts physical parameters only; the solver receives
//!   `n_params + 1` columns because the adapter prepends the depth column
//!   ([`ForwardConfig::n_columns`]).
//! - IP model names and response transforms are passed to the solver
//!   verbatim; this crate never interprets them.
//! - Plain records derive serde so batch drivers can load them from files.
use crate::model::{
    errors::{ConfigError, ConfigResult},
    layout::{IP_PARAMS, ParamKind, RESISTIVITY_PARAMS},
};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Instrument identity and acquisition geometry.
///
/// Defaults describe a TEM-FAST 48 with a 12.5 m single-turn coincident loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSetup {
    /// Instrument name understood by the forward solver.
    pub name: String,
    /// Transmitter loop side length (m).
    pub tx_loop: f64,
    /// Receiver loop side length (m).
    pub rx_loop: f64,
    /// Instrument time key (selects the gate table).
    pub time_key: u32,
    /// Instrument current key.
    pub current_key: u32,
    /// Injected current (A).
    pub current_inj: f64,
    /// Power-line filter frequency (Hz).
    pub filter_powerline: u32,
}

impl Default for DeviceSetup {
    fn default() -> Self {
        Self {
            name: "TEMfast".to_string(),
            tx_loop: 12.5,
            rx_loop: 12.5,
            time_key: 5,
            current_key: 4,
            current_inj: 4.1,
            filter_powerline: 50,
        }
    }
}

/// IP (complex resistivity) model type passed to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IpModel {
    /// Real resistivity only.
    #[default]
    None,
    /// Pelton (Cole–Cole resistivity form).
    Pelton,
    /// Cole–Cole conductivity form.
    ColeCole,
    /// Maximum phase angle form.
    MaxPhaseAngle,
}

impl IpModel {
    /// Number of physical parameters per layer this model requires.
    pub fn n_params(self) -> usize {
        match self {
            IpModel::None => RESISTIVITY_PARAMS,
            IpModel::Pelton | IpModel::ColeCole | IpModel::MaxPhaseAngle => IP_PARAMS,
        }
    }

    /// Solver-facing name (`None` for real resistivity).
    pub fn solver_name(self) -> Option<&'static str> {
        match self {
            IpModel::None => None,
            IpModel::Pelton => Some("pelton"),
            IpModel::ColeCole => Some("cole_cole"),
            IpModel::MaxPhaseAngle => Some("mpa"),
        }
    }
}

impl fmt::Display for IpModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.solver_name().unwrap_or("none"))
    }
}

impl FromStr for IpModel {
    type Err = ConfigError;

    /// Case-insensitive; accepts `none`, `pelton`, `cole_cole`/`colecole`, `mpa`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(IpModel::None),
            "pelton" => Ok(IpModel::Pelton),
            "cole_cole" | "colecole" => Ok(IpModel::ColeCole),
            "mpa" => Ok(IpModel::MaxPhaseAngle),
            other => Err(ConfigError::IpModelMismatch { ip_model: other.to_string(), n_params: 0 }),
        }
    }
}

/// Transform the solver applies to its raw response before returning it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseTransform {
    /// Raw response.
    #[default]
    Identity,
    /// Late-time apparent resistivity.
    ApparentResistivity,
    /// Any other solver-specific transform, by name.
    Named(String),
}

impl ResponseTransform {
    /// Solver-facing name (`None` for the raw response).
    pub fn solver_name(&self) -> Option<&str> {
        match self {
            ResponseTransform::Identity => None,
            ResponseTransform::ApparentResistivity => Some("rhoa"),
            ResponseTransform::Named(name) => Some(name.as_str()),
        }
    }
}

impl From<Option<String>> for ResponseTransform {
    fn from(name: Option<String>) -> Self {
        match name.as_deref() {
            None | Some("") => ResponseTransform::Identity,
            Some("rhoa") => ResponseTransform::ApparentResistivity,
            Some(other) => ResponseTransform::Named(other.to_string()),
        }
    }
}

/// Receiver-gate window in microseconds (`filter_times`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub t_min: f64,
    pub t_max: f64,
}

impl TimeWindow {
    /// Validated window with finite `0 <= t_min < t_max` (µs).
    ///
    /// # Errors
    /// - [`ConfigError::InvalidTimeWindow`] otherwise.
    pub fn new(t_min: f64, t_max: f64) -> ConfigResult<Self> {
        if !t_min.is_finite() || !t_max.is_finite() || t_min < 0.0 || t_min >= t_max {
            return Err(ConfigError::InvalidTimeWindow { t_min, t_max });
        }
        Ok(Self { t_min, t_max })
    }

    /// Whether a receiver time in seconds lies inside the window (inclusive).
    pub fn contains(&self, time_s: f64) -> bool {
        let us = time_s * 1e6;
        us >= self.t_min && us <= self.t_max
    }

    /// Indices of the receiver times (seconds) kept by the window.
    pub fn mask(&self, times_s: &Array1<f64>) -> Vec<usize> {
        times_s.iter().enumerate().filter(|(_, &t)| self.contains(t)).map(|(i, _)| i).collect()
    }

    /// Keep the receiver times inside the window.
    ///
    /// # Errors
    /// - [`ConfigError::EmptyTimeWindow`] if no time survives.
    pub fn apply(&self, times_s: &Array1<f64>) -> ConfigResult<Array1<f64>> {
        let kept = self.mask(times_s);
        if kept.is_empty() {
            return Err(ConfigError::EmptyTimeWindow { t_min: self.t_min, t_max: self.t_max });
        }
        Ok(Array1::from_iter(kept.into_iter().map(|i| times_s[i])))
    }
}

/// Immutable forward-solver configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardConfig {
    pub device: DeviceSetup,
    pub times_rx: Array1<f64>,
    pub n_layers: usize,
    pub n_params: usize,
    pub ip_model: IpModel,
    pub resp_trafo: ResponseTransform,
    pub return_rhoa: bool,
}

impl ForwardConfig {
    /// Build and validate a forward configuration.
    ///
    /// # Errors
    /// - [`ConfigError::EmptyDepthGrid`] if `n_layers == 0`.
    /// - [`ConfigError::UnsupportedParameterCount`] unless `n_params` is 1 or 4.
    /// - [`ConfigError::IpModelMismatch`] if `ip_model` needs a different
    ///   parameter count.
    /// - [`ConfigError::EmptyReceiverTimes`] / [`ConfigError::InvalidReceiverTimes`]
    ///   for malformed receiver times.
    pub fn new(
        device: DeviceSetup, times_rx: Array1<f64>, n_layers: usize, n_params: usize,
        ip_model: IpModel, resp_trafo: ResponseTransform, return_rhoa: bool,
    ) -> ConfigResult<Self> {
        if n_layers == 0 {
            return Err(ConfigError::EmptyDepthGrid);
        }
        ParamKind::columns(n_params)?;
        if ip_model.n_params() != n_params {
            return Err(ConfigError::IpModelMismatch { ip_model: ip_model.to_string(), n_params });
        }
        validate_receiver_times(&times_rx)?;
        Ok(Self { device, times_rx, n_layers, n_params, ip_model, resp_trafo, return_rhoa })
    }

    /// Number of receiver times (length of every simulated response).
    pub fn n_times(&self) -> usize {
        self.times_rx.len()
    }

    /// Number of columns in the solver's layer matrix (depth included).
    pub fn n_columns(&self) -> usize {
        self.n_params + 1
    }

    /// Parameter count announced to an external solver factory.
    ///
    /// IP solvers size their model for the four Pelton-type columns;
    /// resistivity-only solvers expect two (depth and resistivity).
    pub fn solver_nparam(&self) -> usize {
        match self.ip_model {
            IpModel::None => RESISTIVITY_PARAMS + 1,
            _ => self.ip_model.n_params(),
        }
    }
}

/// Receiver times must be non-empty, finite, > 0 and strictly increasing.
///
/// # Errors
/// - [`ConfigError::EmptyReceiverTimes`] for an empty vector.
/// - [`ConfigError::InvalidReceiverTimes`] for the first offending entry.
pub fn validate_receiver_times(times: &Array1<f64>) -> ConfigResult<()> {
    if times.is_empty() {
        return Err(ConfigError::EmptyReceiverTimes);
    }
    for (index, &value) in times.iter().enumerate() {
        if !value.is_finite() {
            return Err(ConfigError::InvalidReceiverTimes {
                index,
                value,
                reason: "Receiver times must be finite.",
            });
        }
        if value <= 0.0 {
            return Err(ConfigError::InvalidReceiverTimes {
                index,
                value,
                reason: "Receiver times must be positive.",
            });
        }
        if index > 0 && value <= times[index - 1] {
            return Err(ConfigError::InvalidReceiverTimes {
                index,
                value,
                reason: "Receiver times must be strictly increasing.",
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Resistivity-only configs carry one physical parameter but hand the
    // solver two columns (depth + resistivity).
    fn resistivity_config_has_two_solver_columns() {
        let cfg = ForwardConfig::new(
            DeviceSetup::default(),
            array![1e-5, 2e-5, 4e-5],
            12,
            1,
            IpModel::None,
            ResponseTransform::Identity,
            false,
        )
        .expect("valid config");

        assert_eq!(cfg.n_times(), 3);
        assert_eq!(cfg.n_columns(), 2);
        assert_eq!(cfg.solver_nparam(), 2);
    }

    #[test]
    // Purpose
    // -------
    // Solver factories are told the physical column count of an IP model
    // (4), not the layer-matrix width (5).
    fn ip_config_announces_four_solver_parameters() {
        let cfg = ForwardConfig::new(
            DeviceSetup::default(),
            array![1e-5, 2e-5],
            8,
            4,
            IpModel::Pelton,
            ResponseTransform::Identity,
            false,
        )
        .expect("valid config");

        assert_eq!(cfg.n_columns(), 5);
        assert_eq!(cfg.solver_nparam(), 4);
    }

    #[test]
    fn ip_model_must_match_parameter_count() {
        let err = ForwardConfig::new(
            DeviceSetup::default(),
            array![1e-5],
            8,
            1,
            IpModel::Pelton,
            ResponseTransform::Identity,
            false,
        )
        .unwrap_err();

        assert_eq!(err, ConfigError::IpModelMismatch { ip_model: "pelton".into(), n_params: 1 });
    }

    #[test]
    fn receiver_times_must_increase() {
        let err = validate_receiver_times(&array![1e-5, 1e-5]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidReceiverTimes { index: 1, .. }));
        assert_eq!(validate_receiver_times(&Array1::zeros(0)), Err(ConfigError::EmptyReceiverTimes));
    }

    #[test]
    // Purpose
    // -------
    // The window is expressed in µs while receiver times are seconds.
    //
    // Given
    // -----
    // - Times 5, 7, 100, 700, 900 µs and the window (7, 700) µs.
    //
    // Expect
    // ------
    // - The three inner gates survive; an out-of-range window errors.
    fn time_window_filters_microsecond_range() {
        let times = array![5e-6, 7e-6, 1e-4, 7e-4, 9e-4];
        let window = TimeWindow::new(7.0, 700.0).expect("valid window");

        let kept = window.apply(&times).expect("non-empty");

        assert_eq!(kept.len(), 3);
        assert_eq!(window.mask(&times), vec![1, 2, 3]);
        let empty = TimeWindow::new(1000.0, 2000.0).unwrap().apply(&times).unwrap_err();
        assert!(matches!(empty, ConfigError::EmptyTimeWindow { .. }));
        assert!(TimeWindow::new(10.0, 1.0).is_err());
    }

    #[test]
    fn ip_model_parses_case_insensitively() {
        assert_eq!("Pelton".parse::<IpModel>().unwrap(), IpModel::Pelton);
        assert_eq!("MPA".parse::<IpModel>().unwrap(), IpModel::MaxPhaseAngle);
        assert!("debye".parse::<IpModel>().is_err());
    }

    #[test]
    fn response_transform_names_round_trip() {
        assert_eq!(ResponseTransform::from(None), ResponseTransform::Identity);
        assert_eq!(ResponseTransform::from(Some("rhoa".to_string())), ResponseTransform::ApparentResistivity);
        let named = ResponseTransform::from(Some("min_to_1".to_string()));
        assert_eq!(named.solver_name(), Some("min_to_1"));
        assert_eq!(ResponseTransform::Identity.solver_name(), None);
    }

    #[test]
    fn device_setup_deserializes_with_defaults() {
        let device: DeviceSetup =
            serde_json::from_str(r#"{"tx_loop": 25.0, "rx_loop": 25.0}"#).expect("valid json");

        assert_eq!(device.tx_loop, 25.0);
        assert_eq!(device.name, "TEMfast");
        assert_eq!(device.filter_powerline, 50);
    }
}
