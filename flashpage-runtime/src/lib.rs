//! Cooperative main-loop registries
//!
//! Two fixed-capacity tables that firmware fills once at start-up and then
//! drives from its main loop:
//!
//! - [`Timers`]: millisecond interval timers polled by [`Timers::tick`]
//! - [`Services`]: named services exchanging state bits, delivered by
//!   [`Services::process_states`]
//!
//! Callbacks are plain function pointers that receive an explicit context
//! `C` owned by the caller. Nothing here is global; interrupt handlers that
//! want to post state must reach the registry through the caller's own
//! synchronization (for example a critical-section mutex).
//!
//! ```text
//! loop {
//!     timers.tick(now_ms(), &mut ctx);
//!     services.process_states(&mut ctx);
//! }
//! ```

#![no_std]
#![deny(unsafe_code)]

mod fmt;

pub mod service;
pub mod timer;

pub use service::{ServiceEntry, Services, StateBits};
pub use timer::{TimerAction, TimerCallback, TimerId, Timers};

/// A registry has no free slot left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistryFull;
