//! Exit codes for the `acs` binary.
//!
//! - 0: success
//! - 1: any failure (bad input, missing file, extraction or clustering error)
//! - 2: integrity failure (a taxonomy file whose class hashes do not verify)

use acs_taxonomy::TaxonomyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CliExitCode {
    Success = 0,
    Error = 1,
    Integrity = 2,
}

impl From<CliExitCode> for i32 {
    fn from(code: CliExitCode) -> Self {
        code as i32
    }
}

/// Map a handler error onto an exit code.
///
/// Walks the `anyhow` chain so a hash mismatch wrapped in file context is
/// still reported as an integrity failure.
pub fn exit_code_for_error(err: &anyhow::Error) -> CliExitCode {
    let tampered = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<TaxonomyError>(),
            Some(TaxonomyError::HashMismatch { .. })
        )
    });
    if tampered {
        CliExitCode::Integrity
    } else {
        CliExitCode::Error
    }
}
