//! GPU device discovery and context construction.
//!
//! One [`DeviceContext`] is constructed per process and passed by reference
//! to every buffer allocation, program compilation, and launch. The context
//! is read-only after construction; a single host thread and a single
//! in-order queue are assumed throughout.

use crate::config::{RuntimeConfig, TimingCalibration};
use crate::diagnostics::{DiagnosticSink, NoopDiagnostics};
use crate::error::{Result, RuntimeError};
use tracing::info;

/// Process-wide handle to one compute device, one logical device, and one
/// in-order command queue.
///
/// Construction enumerates adapters across all available backends, preferring
/// GPU-class adapters and settling for CPU-class ones when no GPU exists.
/// The adapter index is taken from [`RuntimeConfig::device_index`].
///
/// Callers own exactly one instance per process; this contract is documented
/// rather than enforced by hidden global state, so tests may construct
/// short-lived contexts freely.
pub struct DeviceContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
    timestamps: bool,
    timestamp_period: f32,
    config: RuntimeConfig,
    diagnostics: Box<dyn DiagnosticSink>,
}

impl DeviceContext {
    /// Initialize the context with the default (no-op) diagnostic sink.
    ///
    /// # Errors
    /// Returns [`RuntimeError::NoDeviceAvailable`] if no adapter of any kind
    /// exists, or an execution error if logical device creation fails.
    pub async fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_diagnostics(config, Box::new(NoopDiagnostics)).await
    }

    /// Initialize the context with an explicit diagnostic sink.
    pub async fn with_diagnostics(
        config: RuntimeConfig,
        diagnostics: Box<dyn DiagnosticSink>,
    ) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(wgpu::Backends::all()).await;
        let (gpus, cpus): (Vec<_>, Vec<_>) = adapters
            .into_iter()
            .partition(|a| a.get_info().device_type != wgpu::DeviceType::Cpu);

        // Settle for a CPU adapter when no GPU-class adapter exists.
        let candidates = if gpus.is_empty() { cpus } else { gpus };
        if candidates.is_empty() {
            return Err(RuntimeError::NoDeviceAvailable);
        }

        let announce = candidates.len() > 1 || config.debug >= 1;
        let count = candidates.len();
        let adapter = candidates
            .into_iter()
            .nth(config.device_index)
            .ok_or_else(|| {
                RuntimeError::Unsupported(format!(
                    "device index {} out of range ({count} adapters)",
                    config.device_index
                ))
            })?;

        let adapter_info = adapter.get_info();
        if announce {
            info!("using {} ({:?})", adapter_info.name, adapter_info.backend);
        }

        // Profiling: timestamp queries, when the adapter has them.
        let required_features = adapter.features() & wgpu::Features::TIMESTAMP_QUERY;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tephra device"),
                required_features,
                required_limits: adapter.limits(),
                ..Default::default()
            })
            .await
            .map_err(|e| RuntimeError::Execution(format!("failed to create device: {e}")))?;

        let limits = device.limits();
        let timestamps = device.features().contains(wgpu::Features::TIMESTAMP_QUERY);
        let timestamp_period = queue.get_timestamp_period();

        Ok(Self {
            device,
            queue,
            adapter_info,
            limits,
            timestamps,
            timestamp_period,
            config,
            diagnostics,
        })
    }

    /// Information about the selected adapter.
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Largest total number of invocations a single workgroup may contain.
    ///
    /// Callers use this to size dispatches safely.
    pub fn max_work_group_size(&self) -> u32 {
        self.limits.max_compute_invocations_per_workgroup
    }

    /// Whether image-backed buffers should use half-precision channels.
    pub fn prefer_half(&self) -> bool {
        self.config.prefer_half
    }

    /// Diagnostic verbosity level.
    pub fn debug(&self) -> u8 {
        self.config.debug
    }

    /// The calibration applied to profiled durations.
    pub fn calibration(&self) -> TimingCalibration {
        self.config.calibration
    }

    pub(crate) fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub(crate) fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub(crate) fn timestamps_supported(&self) -> bool {
        self.timestamps
    }

    pub(crate) fn timestamp_period(&self) -> f32 {
        self.timestamp_period
    }

    pub(crate) fn diagnostics(&self) -> &dyn DiagnosticSink {
        self.diagnostics.as_ref()
    }

    /// Block the host until every command submitted so far has completed.
    ///
    /// This is a device-level fence over the whole queue, not a wait on any
    /// single command.
    pub(crate) fn drain(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| RuntimeError::Execution(format!("device poll failed: {e:?}")))?;
        Ok(())
    }
}
