//! Error types for ABC emission.
//!
//! Emission distinguishes two tiers of problems:
//!
//! ```text
//! EmitError   - fatal internal error, aborts the compilation unit
//! Diagnostic  - soft condition, logged and collected, emission continues
//! ```
//!
//! By the time the emitter runs, user-level diagnostics have already been
//! reported upstream. Any [`EmitError`] therefore indicates a defect in the
//! component driving the emitter, never a problem in the user's program.

use std::fmt;

use thiserror::Error;

// ============================================================================
// Fatal Errors
// ============================================================================

/// Fatal internal errors raised while building an ABC module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    /// An identity table and its backing record table disagree on size.
    #[error("{table} table out of sync: index {index} but {len} records")]
    TableOutOfSync {
        /// Name of the table (methods, classes, scripts, metadata).
        table: &'static str,
        /// Index handed out by the identity map.
        index: usize,
        /// Number of records actually present.
        len: usize,
    },

    /// A pool or table index does not refer to an existing entry.
    #[error("invalid {what} index {index}")]
    InvalidIndex { what: &'static str, index: i64 },

    /// Decimal constants were added to a module whose version predates them.
    #[error("decimal constants require minor version {required}, module is {minor}")]
    DecimalUnsupported { minor: u16, required: u16 },

    /// A versioned namespace set was requested with no versions.
    #[error("empty API version set for namespace '{uri}'")]
    EmptyVersionSet { uri: String },

    /// An API version in member metadata could not be interpreted.
    #[error("unrecognized API version '{value}' in {id} metadata")]
    BadApiVersion { id: String, value: String },

    /// A construct the emitter deliberately does not support.
    #[error("unimplemented: {construct}")]
    Unimplemented { construct: &'static str },

    /// A construct that is no longer supported by the instruction set.
    #[error("deprecated: {construct}")]
    Deprecated { construct: &'static str },

    /// An instruction would pop more values than the operand stack holds.
    #[error("operand stack underflow at offset {offset}: depth {depth}, effect {delta}")]
    StackUnderflow { offset: usize, depth: i32, delta: i32 },

    /// An instruction would pop more scopes than the scope stack holds.
    #[error("scope stack underflow at offset {offset}: depth {depth}, effect {delta}")]
    ScopeUnderflow { offset: usize, depth: i32, delta: i32 },

    /// A patch was requested with no pending jump site of that kind.
    #[error("no pending {site} site to patch")]
    NoPendingSite { site: &'static str },

    /// A break or continue named a loop frame that is not open.
    #[error("loop index {index} out of range ({open} frames open)")]
    InvalidLoopIndex { index: i32, open: usize },

    /// A catch or finally operation ran outside any try region.
    #[error("no open exception region for {operation}")]
    NoExceptionRegion { operation: &'static str },

    /// A relative branch does not fit in a signed 24-bit operand.
    #[error("branch offset {offset} does not fit in 24 bits")]
    BranchOutOfRange { offset: i64 },

    /// A register was released that was never allocated.
    #[error("register {register} freed but only {live} registers are live")]
    InvalidRegister { register: u32, live: u32 },

    /// A method operation ran while no method was being emitted.
    #[error("{operation} called outside of a method")]
    NoCurrentMethod { operation: &'static str },
}

impl EmitError {
    /// Shorthand for an out-of-sync identity table.
    pub fn out_of_sync(table: &'static str, index: usize, len: usize) -> Self {
        EmitError::TableOutOfSync { table, index, len }
    }

    /// Shorthand for a bad index into a named pool or table.
    pub fn invalid_index(what: &'static str, index: impl Into<i64>) -> Self {
        EmitError::InvalidIndex {
            what,
            index: index.into(),
        }
    }
}

// ============================================================================
// Soft Diagnostics
// ============================================================================

/// Non-fatal conditions noticed during emission.
///
/// These never stop emission. The emitter logs each one with
/// `tracing::warn!` and keeps it until the caller drains the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A temporary register was released out of allocation order.
    TempFreedOutOfOrder {
        /// The register that was released.
        register: u32,
        /// The register that should have been released next.
        expected: u32,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TempFreedOutOfOrder { register, expected } => write!(
                f,
                "temp register {register} freed out of order, expected {expected}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let err = EmitError::out_of_sync("methods", 4, 3);
        assert_eq!(err.to_string(), "methods table out of sync: index 4 but 3 records");

        let err = EmitError::DecimalUnsupported {
            minor: 16,
            required: 17,
        };
        assert!(err.to_string().contains("minor version 17"));
    }

    #[test]
    fn invalid_index_accepts_unsigned() {
        let err = EmitError::invalid_index("namespace", 7u32);
        assert_eq!(
            err,
            EmitError::InvalidIndex {
                what: "namespace",
                index: 7
            }
        );
    }

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic::TempFreedOutOfOrder {
            register: 3,
            expected: 4,
        };
        assert_eq!(
            diag.to_string(),
            "temp register 3 freed out of order, expected 4"
        );
    }
}
