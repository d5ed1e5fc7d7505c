//! Program compilation tests: build failures, entry points, device limits.

mod common;

use common::{test_context, COPY_WGSL};
use tephra_runtime::{CompiledProgram, ProgramSource, RuntimeError};

#[test]
fn test_valid_kernel_builds_and_exposes_workgroup_size() {
    let Some(ctx) = test_context() else { return };

    let program = CompiledProgram::compile(
        &ctx,
        "copy",
        ProgramSource::Wgsl(COPY_WGSL.to_string()),
        None,
    )
    .expect("valid kernel should build");

    assert_eq!(program.name(), "copy");
    assert_eq!(program.local_size(), [64, 1, 1]);
    assert!(program.max_work_group_size(&ctx) > 0);
}

#[test]
fn test_malformed_source_raises_build_failure_carrying_source() {
    let Some(ctx) = test_context() else { return };

    let bad = "@compute fn copy( {".to_string();
    let err = CompiledProgram::compile(&ctx, "copy", ProgramSource::Wgsl(bad.clone()), None)
        .unwrap_err();

    match err {
        RuntimeError::BuildFailure { name, log, source } => {
            assert_eq!(name, "copy");
            assert!(!log.is_empty(), "diagnostics should not be empty");
            match source {
                ProgramSource::Wgsl(text) => assert_eq!(text, bad),
                ProgramSource::SpirV(_) => panic!("source kind should be preserved"),
            }
        }
        other => panic!("expected BuildFailure, got {other:?}"),
    }
}

#[test]
fn test_missing_entry_point_raises_build_failure() {
    let Some(ctx) = test_context() else { return };

    let err = CompiledProgram::compile(
        &ctx,
        "does_not_exist",
        ProgramSource::Wgsl(COPY_WGSL.to_string()),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, RuntimeError::BuildFailure { .. }));
}
