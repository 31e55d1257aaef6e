// SPDX-License-Identifier: Apache-2.0

// =============================================================================
// Error Types
// =============================================================================

/// Failure returned from a [`crate::backend::TimeBackend::init`]
/// implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendError {
    /// The underlying peripheral clock tree was not ready (wrong clock
    /// source selected, PLL not locked, etc).
    ClockNotReady,
    /// The peripheral failed to start counting within its expected window.
    NotResponding,
    /// A backend-specific failure not covered above.
    Other,
}

impl core::fmt::Display for BackendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BackendError::ClockNotReady => write!(f, "backend clock source not ready"),
            BackendError::NotResponding => write!(f, "backend counter did not start"),
            BackendError::Other => write!(f, "backend initialization failed"),
        }
    }
}

/// Failure surface for the system time service and its POSIX veneer.
///
/// Mirrors `core/sys/systime.c`'s `errno` classification: `InvalidClock`
/// and `InvalidNanos`/`InvalidMicros` map to `EINVAL`, `NullOutput` maps to
/// `EFAULT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeError {
    /// The requested clock identifier is not `REALTIME` or `MONOTONIC`.
    InvalidClock,
    /// `nanos >= 1_000_000_000`.
    InvalidNanos,
    /// `usec >= 1_000_000` (POSIX veneer only).
    InvalidMicros,
    /// A required output pointer/reference was null.
    NullOutput,
}

impl core::fmt::Display for TimeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TimeError::InvalidClock => write!(f, "unknown clock id"),
            TimeError::InvalidNanos => write!(f, "nanoseconds out of range"),
            TimeError::InvalidMicros => write!(f, "microseconds out of range"),
            TimeError::NullOutput => write!(f, "null output pointer"),
        }
    }
}
