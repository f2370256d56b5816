//! Interval timers
//!
//! Each timer has an interval, a deadline and an enabled flag. [`Timers::tick`]
//! fires every enabled timer whose deadline has been reached and re-arms it
//! one interval after the current time. Time is a free-running `u32`
//! millisecond counter; deadlines are compared with wrapping arithmetic so
//! the counter may roll over.

use heapless::Vec;

use crate::RegistryFull;

/// Timer callback, called with the caller's context
pub type TimerCallback<C> = fn(&mut C) -> TimerAction;

/// What a timer does after its callback ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerAction {
    /// Keep firing every interval
    Continue,
    /// Disable the timer
    Stop,
}

/// Handle returned by [`Timers::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerId(u8);

#[derive(Debug, Clone, Copy, Default)]
struct TimerState {
    interval: u32,
    deadline: u32,
    enabled: bool,
}

struct Slot<C> {
    callback: TimerCallback<C>,
    state: TimerState,
}

/// Fixed table of up to `N` timers
pub struct Timers<C, const N: usize> {
    slots: Vec<Slot<C>, N>,
}

impl<C, const N: usize> Default for Timers<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// True once `now` has reached `deadline`, across counter wrap
fn is_due(deadline: u32, now: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

impl<C, const N: usize> Timers<C, N> {
    /// Create an empty table
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Add a timer; it starts disabled
    pub fn register(&mut self, callback: TimerCallback<C>) -> Result<TimerId, RegistryFull> {
        let index = u8::try_from(self.slots.len()).map_err(|_| RegistryFull)?;
        self.slots
            .push(Slot {
                callback,
                state: TimerState::default(),
            })
            .map_err(|_| RegistryFull)?;
        Ok(TimerId(index))
    }

    /// Number of registered timers
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no timer is registered
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Arm a timer to fire `interval_ms` after `now_ms`
    ///
    /// A running timer is left alone unless `restart` is set, in which case
    /// it takes the new interval and counts from `now_ms`. Returns true if
    /// the timer was (re)armed.
    pub fn start(&mut self, id: TimerId, interval_ms: u32, now_ms: u32, restart: bool) -> bool {
        let Some(slot) = self.slots.get_mut(usize::from(id.0)) else {
            return false;
        };
        if slot.state.enabled && !restart {
            return false;
        }

        slot.state = TimerState {
            interval: interval_ms,
            deadline: now_ms.wrapping_add(interval_ms),
            enabled: true,
        };
        true
    }

    /// Disable a timer, keeping its interval
    pub fn stop(&mut self, id: TimerId) {
        if let Some(slot) = self.slots.get_mut(usize::from(id.0)) {
            slot.state.enabled = false;
        }
    }

    /// True if the timer is armed
    pub fn is_started(&self, id: TimerId) -> bool {
        self.slots
            .get(usize::from(id.0))
            .is_some_and(|slot| slot.state.enabled)
    }

    /// Interval last given to [`start`](Self::start)
    pub fn interval(&self, id: TimerId) -> Option<u32> {
        self.slots
            .get(usize::from(id.0))
            .map(|slot| slot.state.interval)
    }

    /// Fire every due timer in registration order
    ///
    /// Returns the number of callbacks run. A due timer is re-armed to
    /// `now_ms + interval` before its callback runs, so missed periods are
    /// not replayed.
    pub fn tick(&mut self, now_ms: u32, ctx: &mut C) -> usize {
        let mut fired = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.state.enabled || !is_due(slot.state.deadline, now_ms) {
                continue;
            }

            slot.state.deadline = now_ms.wrapping_add(slot.state.interval);
            fired += 1;
            trace!("timer {} fired at {}", index, now_ms);

            if (slot.callback)(ctx) == TimerAction::Stop {
                slot.state.enabled = false;
            }
        }
        fired
    }
}
