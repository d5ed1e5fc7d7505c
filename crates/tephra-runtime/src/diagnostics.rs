//! Pluggable diagnostic hooks for compiled programs.
//!
//! At the highest verbosity the runtime hands every successfully built
//! program to a [`DiagnosticSink`], which may disassemble, pretty-print, or
//! archive it. The hook is strictly observational: it must never affect the
//! numerical behavior of a program, and the default implementation does
//! nothing.

use crate::program::ProgramSource;

/// Receiver for program artifacts at high verbosity.
pub trait DiagnosticSink: Send + Sync {
    /// Called after a program builds successfully, with the artifact the
    /// caller submitted (source text or binary blob).
    fn dump_program(&self, name: &str, source: &ProgramSource);
}

/// The default sink: discards everything.
pub struct NoopDiagnostics;

impl DiagnosticSink for NoopDiagnostics {
    fn dump_program(&self, _name: &str, _source: &ProgramSource) {}
}

/// A sink that prints program text to stderr, decoding binaries as UTF-8
/// where possible.
pub struct StderrDiagnostics;

impl DiagnosticSink for StderrDiagnostics {
    fn dump_program(&self, name: &str, source: &ProgramSource) {
        match source {
            ProgramSource::Wgsl(text) => eprintln!("=== {name} ===\n{text}"),
            ProgramSource::SpirV(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => eprintln!("=== {name} ===\n{text}"),
                Err(_) => eprintln!("=== {name} === ({} bytes of SPIR-V)", bytes.len()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_sink_accepts_both_artifact_kinds() {
        let sink = NoopDiagnostics;
        sink.dump_program("a", &ProgramSource::Wgsl("fn main() {}".to_string()));
        sink.dump_program("b", &ProgramSource::SpirV(vec![0x03, 0x02, 0x23, 0x07]));
    }
}
