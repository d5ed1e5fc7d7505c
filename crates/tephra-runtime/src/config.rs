//! Runtime configuration: device selection, verbosity, and timing calibration.
//!
//! All environment lookups happen once, in [`RuntimeConfig::from_env`]; the
//! rest of the runtime only ever sees the parsed values.

/// Configuration injected into [`DeviceContext`](crate::DeviceContext)
/// construction.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Index into the enumerated adapter list (default 0).
    pub device_index: usize,

    /// Diagnostic verbosity. 0 is silent; 1 announces the selected device;
    /// 3 logs failing kernel source; 5 hands program artifacts to the
    /// diagnostic sink.
    pub debug: u8,

    /// Prefer half-precision channels for image-backed storage.
    pub prefer_half: bool,

    /// Device-clock calibration applied to profiled durations.
    pub calibration: TimingCalibration,
}

impl RuntimeConfig {
    /// Read overrides from the environment.
    ///
    /// Recognized variables: `TEPHRA_DEVICE` (adapter index), `TEPHRA_DEBUG`
    /// (verbosity level), `TEPHRA_FLOAT16` (nonzero enables half-precision
    /// image storage). Unset or unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        Self {
            device_index: env_usize("TEPHRA_DEVICE", 0),
            debug: env_usize("TEPHRA_DEBUG", 0) as u8,
            prefer_half: env_usize("TEPHRA_FLOAT16", 0) != 0,
            calibration: TimingCalibration::host_default(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            debug: 0,
            prefer_half: false,
            calibration: TimingCalibration::host_default(),
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Multiplier correcting profiled device durations for a known clock-domain
/// discrepancy on macOS hosts.
///
/// Selected once at startup from platform detection and injected, rather than
/// branched on at every timed launch. The identity multiplier is used on
/// every other platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingCalibration {
    multiplier: f64,
}

impl TimingCalibration {
    /// Calibration for the current host OS family.
    pub fn host_default() -> Self {
        // Empirically determined GPU-clock ratio on macOS.
        let multiplier = if cfg!(target_os = "macos") {
            125.0 / 3.0
        } else {
            1.0
        };
        Self { multiplier }
    }

    /// The identity calibration (no correction).
    pub fn identity() -> Self {
        Self { multiplier: 1.0 }
    }

    /// A calibration with an explicit multiplier, for tests and unusual
    /// deployments.
    pub fn with_multiplier(multiplier: f64) -> Self {
        Self { multiplier }
    }

    /// Apply the calibration to a raw duration in seconds.
    pub fn apply(&self, seconds: f64) -> f64 {
        seconds * self.multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.device_index, 0);
        assert_eq!(config.debug, 0);
        assert!(!config.prefer_half);
    }

    #[test]
    fn test_identity_calibration_passes_through() {
        let cal = TimingCalibration::identity();
        assert_eq!(cal.apply(0.25), 0.25);
    }

    #[test]
    fn test_explicit_multiplier() {
        let cal = TimingCalibration::with_multiplier(2.0);
        assert_eq!(cal.apply(1.5), 3.0);
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_host_default_is_identity_off_macos() {
        assert_eq!(TimingCalibration::host_default(), TimingCalibration::identity());
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_host_default_corrects_on_macos() {
        let cal = TimingCalibration::host_default();
        assert!(cal.apply(1.0) > 1.0);
    }
}
