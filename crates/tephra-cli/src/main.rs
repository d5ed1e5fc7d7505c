//! Tephra CLI - list compute adapters and smoke-test kernels on hardware.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tephra_runtime::{
    Arg, CompiledProgram, DeviceBuffer, DeviceContext, Dispatch, ElementType, ProgramSource,
    RuntimeConfig, StorageType,
};

#[derive(Parser)]
#[command(name = "tephra")]
#[command(about = "GPU kernel execution runtime tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every compute adapter visible to the runtime
    Devices,
    /// Compile a WGSL kernel, run it over a float ramp, and report timing
    Run {
        /// Path to the WGSL kernel file
        #[arg(value_name = "KERNEL")]
        kernel: PathBuf,

        /// Entry point name
        #[arg(short, long, default_value = "main")]
        entry: String,

        /// Element count for the input/output buffers
        #[arg(short, long, default_value = "1024")]
        size: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Devices => cmd_devices(),
        Commands::Run {
            kernel,
            entry,
            size,
        } => cmd_run(kernel, &entry, size),
    }
}

/// Enumerate adapters the way the runtime does: GPU-class first, CPU-class
/// fallback, in selection order.
fn cmd_devices() -> Result<()> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapters = pollster::block_on(instance.enumerate_adapters(wgpu::Backends::all()));
    if adapters.is_empty() {
        anyhow::bail!("no compute device available");
    }

    for (index, adapter) in adapters.iter().enumerate() {
        let info = adapter.get_info();
        println!(
            "[{index}] {} ({:?}, {:?})",
            info.name, info.device_type, info.backend
        );
    }
    Ok(())
}

/// Run a kernel of the form `fn <entry>(input, output)` over a ramp and
/// print the device-timed duration.
fn cmd_run(kernel_path: PathBuf, entry: &str, size: usize) -> Result<()> {
    let source = std::fs::read_to_string(&kernel_path)
        .with_context(|| format!("failed to read kernel from {}", kernel_path.display()))?;

    let ctx = pollster::block_on(DeviceContext::new(RuntimeConfig::from_env()))?;
    println!("device: {}", ctx.adapter_info().name);

    let program = CompiledProgram::compile(&ctx, entry, ProgramSource::Wgsl(source), None)?;
    let local = program.local_size();

    let input = DeviceBuffer::allocate(&ctx, size, StorageType::Linear(ElementType::F32))?;
    let output = DeviceBuffer::allocate(&ctx, size, StorageType::Linear(ElementType::F32))?;
    let ramp: Vec<f32> = (0..size).map(|i| i as f32).collect();
    input.copy_in(&ctx, &ramp)?;

    let elapsed = program.launch(
        &ctx,
        Dispatch {
            global: [size, 1, 1],
            local: [local[0] as usize, local[1] as usize, local[2] as usize],
            args: vec![Arg::Buffer(&input), Arg::Buffer(&output)],
            wait: true,
        },
    )?;

    let mut result = vec![0.0f32; size];
    output.copy_out(&ctx, &mut result)?;

    if let Some(seconds) = elapsed {
        println!("{entry}: {:.3} us over {size} elements", seconds * 1e6);
    }
    println!(
        "output[..4] = {:?}",
        &result[..result.len().min(4)]
    );
    Ok(())
}
