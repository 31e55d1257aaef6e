// SPDX-License-Identifier: Apache-2.0

//! Event-driven soft-timer core for single-core microcontrollers.
//!
//! Three layers, each usable on its own:
//!
//! - [`backend`]: the [`backend::TimeBackend`] trait a concrete counter
//!   driver implements, plus [`backend::MonotonicCounter`], the race-free
//!   narrow-counter-plus-overflow combinator every backend is built from.
//! - [`service::SystemTime`]: the monotonic/realtime clock pair and
//!   `trigger_at`, built on one [`backend::TimeBackend`].
//! - [`timer`]: [`timer::Timer`] and [`timer::TimerManager`], a queue of
//!   software timers sharing the single hardware compare channel a
//!   [`service::SystemTime`] exposes through `trigger_at`.
//!
//! [`idle::EventLatch`] is the glue between an ISR wake source and a
//! cooperative mainloop's sleep routine; it doesn't depend on the other
//! three layers and can be used standalone.
//!
//! This crate ports the timer core the teacher's SysTick-only crate built
//! for one fixed counter shape into a shape any single free-running
//! counter plus one compare channel can implement — see
//! `backend::mock::MockBackend` for the reference implementation used by
//! this crate's own tests, and `backend::cortex_m_syst` (feature
//! `cortex-m`) for the real one.

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backend;
pub mod error;
pub mod idle;
pub mod service;
pub mod timer;
pub mod timestamp;

#[cfg(feature = "posix")]
pub mod posix;

pub use backend::{FireCallback, TimeBackend};
pub use error::{BackendError, TimeError};
pub use idle::EventLatch;
pub use service::SystemTime;
pub use timer::{Timer, TimerManager};
pub use timestamp::Timestamp;

/// `log::trace!` when the `log` feature is enabled, a no-op otherwise, so
/// call sites don't need to be `#[cfg]`-gated individually.
macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
    };
}

/// `log::debug!`, see [`trace!`].
macro_rules! debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::debug!($($arg)*);
    };
}

pub(crate) use debug;
pub(crate) use trace;
