//! Named services exchanging state bits
//!
//! Every service owns a word of state bits. Setting bits records which of
//! them actually changed; [`Services::process_states`] then tells every
//! other service about the change, gives the owner a chance to clear pulse
//! bits, and resets the change mask. Local bits are a separate channel,
//! usually raised from an interrupt, delivered only to the owner.
//!
//! Services are identified by name. Only enabled services accept state.

use heapless::Vec;

use crate::RegistryFull;

/// State word of a service
pub type StateBits = u32;

/// Enable or disable request: `(ctx, service name, enable) -> accepted`
///
/// Also called on every other service after a successful change, with the
/// name of the service that changed; the result is then ignored.
pub type EnableCallback<C> = fn(&mut C, &'static str, bool) -> bool;

/// Another service changed: `(ctx, its name, its bits, changed mask)`
pub type StateChangedCallback<C> = fn(&mut C, &'static str, StateBits, StateBits);

/// Own state changed: `(ctx, own name, own bits, changed mask)`
pub type StateChangedByCallback<C> = fn(&mut C, &'static str, &mut StateBits, StateBits);

/// Own local bits raised: `(ctx, own name, local bits)`
///
/// The callback is expected to clear the bits it handled.
pub type LocalStateChangedCallback<C> = fn(&mut C, &'static str, &mut StateBits);

/// Static description of a service
pub struct ServiceEntry<C> {
    /// Unique name used for lookups
    pub name: &'static str,
    pub enable: Option<EnableCallback<C>>,
    pub state_changed: Option<StateChangedCallback<C>>,
    pub state_changed_by: Option<StateChangedByCallback<C>>,
    pub local_state_changed: Option<LocalStateChangedCallback<C>>,
}

impl<C> ServiceEntry<C> {
    /// Entry with no callbacks
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            enable: None,
            state_changed: None,
            state_changed_by: None,
            local_state_changed: None,
        }
    }

    pub const fn with_enable(mut self, callback: EnableCallback<C>) -> Self {
        self.enable = Some(callback);
        self
    }

    pub const fn with_state_changed(mut self, callback: StateChangedCallback<C>) -> Self {
        self.state_changed = Some(callback);
        self
    }

    pub const fn with_state_changed_by(mut self, callback: StateChangedByCallback<C>) -> Self {
        self.state_changed_by = Some(callback);
        self
    }

    pub const fn with_local_state_changed(
        mut self,
        callback: LocalStateChangedCallback<C>,
    ) -> Self {
        self.local_state_changed = Some(callback);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ServiceState {
    enabled: bool,
    bits: StateBits,
    /// Bits that really changed since the last round
    changed: StateBits,
    local: StateBits,
}

impl ServiceState {
    fn set(&mut self, bits: StateBits, mask: StateBits) -> bool {
        if !self.enabled {
            return false;
        }
        self.changed |= (self.bits ^ bits) & mask;
        self.bits = (self.bits & !mask) | (bits & mask);
        true
    }

    fn set_local(&mut self, bits: StateBits) -> bool {
        if !self.enabled {
            return false;
        }
        self.local |= bits;
        true
    }
}

struct Slot<C> {
    entry: ServiceEntry<C>,
    state: ServiceState,
}

/// Fixed table of up to `N` services, processed in registration order
pub struct Services<C, const N: usize> {
    slots: Vec<Slot<C>, N>,
}

impl<C, const N: usize> Default for Services<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, const N: usize> Services<C, N> {
    /// Create an empty table
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Add a service; it starts disabled with all bits clear
    pub fn register(&mut self, entry: ServiceEntry<C>) -> Result<(), RegistryFull> {
        self.slots
            .push(Slot {
                entry,
                state: ServiceState::default(),
            })
            .map_err(|_| RegistryFull)
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no service is registered
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.entry.name == name)
    }

    /// Enable or disable one service, or all of them when `name` is `None`
    ///
    /// The service's own enable callback may refuse the change; a service
    /// without one always accepts. After a named service changes, every
    /// other service's enable callback is told about it.
    ///
    /// For a named service, returns true if it ends up in the requested
    /// state. With `None`, always returns true.
    pub fn enable(&mut self, name: Option<&str>, enable: bool, ctx: &mut C) -> bool {
        for index in 0..self.slots.len() {
            let slot = &self.slots[index];
            if name.is_some_and(|name| slot.entry.name != name) {
                continue;
            }

            if slot.state.enabled != enable {
                let own = slot.entry.name;
                let accepted = slot.entry.enable.map_or(true, |cb| cb(ctx, own, enable));
                if accepted {
                    self.slots[index].state.enabled = enable;
                    debug!("service {}: enabled = {}", own, enable);
                    if name.is_some() {
                        self.notify_enable(index, own, enable, ctx);
                    }
                } else {
                    debug!("service {}: refused enable = {}", own, enable);
                }
            }

            if name.is_some() {
                return self.slots[index].state.enabled == enable;
            }
        }
        name.is_none()
    }

    fn notify_enable(&self, changed: usize, name: &'static str, enable: bool, ctx: &mut C) {
        for (index, slot) in self.slots.iter().enumerate() {
            if index == changed {
                continue;
            }
            if let Some(cb) = slot.entry.enable {
                let _ = cb(ctx, name, enable);
            }
        }
    }

    /// True if the named service exists and is enabled
    pub fn is_enabled(&self, name: &str) -> bool {
        self.find(name)
            .is_some_and(|index| self.slots[index].state.enabled)
    }

    /// Replace the bits selected by `mask` with those of `bits`
    ///
    /// Returns false if the service is unknown or disabled.
    pub fn set_state(&mut self, name: &str, bits: StateBits, mask: StateBits) -> bool {
        match self.find(name) {
            Some(index) => self.slots[index].state.set(bits, mask),
            None => false,
        }
    }

    /// Set `bits` without touching the others
    pub fn set_bits(&mut self, name: &str, bits: StateBits) -> bool {
        self.set_state(name, bits, bits)
    }

    /// Current bits of the named service, zero if unknown
    pub fn state(&self, name: &str) -> StateBits {
        self.find(name)
            .map_or(0, |index| self.slots[index].state.bits)
    }

    /// Raise local bits for the owner only
    ///
    /// Returns false if the service is unknown or disabled.
    pub fn set_local_state(&mut self, name: &str, bits: StateBits) -> bool {
        match self.find(name) {
            Some(index) => self.slots[index].state.set_local(bits),
            None => false,
        }
    }

    /// Run one delivery round over all enabled services
    pub fn process_states(&mut self, ctx: &mut C) {
        for index in 0..self.slots.len() {
            if !self.slots[index].state.enabled {
                continue;
            }

            let name = self.slots[index].entry.name;
            let changed = self.slots[index].state.changed;
            if changed != 0 {
                let bits = self.slots[index].state.bits;
                for (other, slot) in self.slots.iter().enumerate() {
                    if other == index {
                        continue;
                    }
                    if let Some(cb) = slot.entry.state_changed {
                        cb(ctx, name, bits, changed);
                    }
                }

                let slot = &mut self.slots[index];
                if let Some(cb) = slot.entry.state_changed_by {
                    cb(ctx, name, &mut slot.state.bits, changed);
                }
                slot.state.changed = 0;
                trace!("service {}: delivered {=u32:x}", name, changed);
            }

            let slot = &mut self.slots[index];
            if slot.state.local != 0 {
                if let Some(cb) = slot.entry.local_state_changed {
                    cb(ctx, name, &mut slot.state.local);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec as StdVec;

    use super::*;

    const MAIN: &str = "main";
    const BUTTON: &str = "button";
    const LED: &str = "led";

    const START: StateBits = 1;
    const PRESSED: StateBits = 4;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Enable(&'static str, bool),
        Changed(&'static str, StateBits, StateBits),
        ChangedBy(&'static str, StateBits, StateBits),
        Local(&'static str, StateBits),
    }

    #[derive(Default)]
    struct Log {
        calls: StdVec<Call>,
        refuse: bool,
    }

    fn on_enable(ctx: &mut Log, name: &'static str, enable: bool) -> bool {
        ctx.calls.push(Call::Enable(name, enable));
        true
    }

    fn on_enable_picky(ctx: &mut Log, name: &'static str, enable: bool) -> bool {
        ctx.calls.push(Call::Enable(name, enable));
        !ctx.refuse
    }

    fn on_changed(ctx: &mut Log, name: &'static str, bits: StateBits, changed: StateBits) {
        ctx.calls.push(Call::Changed(name, bits, changed));
    }

    fn clear_pressed(ctx: &mut Log, name: &'static str, bits: &mut StateBits, changed: StateBits) {
        ctx.calls.push(Call::ChangedBy(name, *bits, changed));
        // Pulse bit: visible to others for exactly one round
        *bits &= !PRESSED;
    }

    fn on_local(ctx: &mut Log, name: &'static str, bits: &mut StateBits) {
        ctx.calls.push(Call::Local(name, *bits));
        *bits = 0;
    }

    fn registry() -> Services<Log, 4> {
        let mut services = Services::new();
        services
            .register(
                ServiceEntry::new(MAIN)
                    .with_enable(on_enable)
                    .with_state_changed(on_changed),
            )
            .unwrap();
        services
            .register(
                ServiceEntry::new(BUTTON)
                    .with_enable(on_enable_picky)
                    .with_state_changed_by(clear_pressed)
                    .with_local_state_changed(on_local),
            )
            .unwrap();
        services
            .register(ServiceEntry::new(LED).with_state_changed(on_changed))
            .unwrap();
        services
    }

    #[test]
    fn test_disabled_service_rejects_state() {
        let mut services = registry();
        assert!(!services.is_enabled(MAIN));
        assert!(!services.set_state(MAIN, START, START));
        assert!(!services.set_local_state(BUTTON, 1));
        assert_eq!(services.state(MAIN), 0);
    }

    #[test]
    fn test_enable_named_notifies_others() {
        let mut services = registry();
        let mut log = Log::default();

        assert!(services.enable(Some(MAIN), true, &mut log));
        assert!(services.is_enabled(MAIN));
        assert_eq!(
            log.calls,
            [Call::Enable(MAIN, true), Call::Enable(MAIN, true)]
        );

        // Already enabled: no callbacks
        log.calls.clear();
        assert!(services.enable(Some(MAIN), true, &mut log));
        assert!(log.calls.is_empty());
    }

    #[test]
    fn test_enable_refused() {
        let mut services = registry();
        let mut log = Log {
            refuse: true,
            ..Log::default()
        };

        assert!(!services.enable(Some(BUTTON), true, &mut log));
        assert!(!services.is_enabled(BUTTON));
        assert_eq!(log.calls, [Call::Enable(BUTTON, true)]);
    }

    #[test]
    fn test_enable_all() {
        let mut services = registry();
        let mut log = Log::default();

        assert!(services.enable(None, true, &mut log));
        assert!(services.is_enabled(MAIN));
        assert!(services.is_enabled(BUTTON));
        assert!(services.is_enabled(LED));
        // Broadcast enable does not cross-notify
        assert_eq!(log.calls.len(), 2);
    }

    #[test]
    fn test_unknown_service() {
        let mut services = registry();
        let mut log = Log::default();
        assert!(!services.enable(Some("missing"), true, &mut log));
        assert!(!services.is_enabled("missing"));
        assert!(!services.set_bits("missing", 1));
        assert_eq!(services.state("missing"), 0);
    }

    #[test]
    fn test_set_state_tracks_real_changes() {
        let mut services = registry();
        let mut log = Log::default();
        services.enable(None, true, &mut log);
        log.calls.clear();

        assert!(services.set_state(MAIN, 0b0011, 0b0011));
        services.process_states(&mut log);
        assert_eq!(log.calls, [Call::Changed(MAIN, 0b0011, 0b0011)]);

        // Bit 0 already set, only bit 2 changes
        log.calls.clear();
        assert!(services.set_state(MAIN, 0b0101, 0b0101));
        services.process_states(&mut log);
        assert_eq!(log.calls, [Call::Changed(MAIN, 0b0111, 0b0100)]);

        // No change, no delivery
        log.calls.clear();
        services.set_bits(MAIN, 0b0001);
        services.process_states(&mut log);
        assert!(log.calls.is_empty());
    }

    #[test]
    fn test_mask_limits_update() {
        let mut services = registry();
        let mut log = Log::default();
        services.enable(None, true, &mut log);

        services.set_state(LED, 0b1111, 0b1111);
        services.set_state(LED, 0b0000, 0b0101);
        assert_eq!(services.state(LED), 0b1010);
        services.set_state(LED, 0b0001, 0b0000);
        assert_eq!(services.state(LED), 0b1010);
    }

    #[test]
    fn test_process_delivers_to_others_then_owner() {
        let mut services = registry();
        let mut log = Log::default();
        services.enable(None, true, &mut log);
        log.calls.clear();

        services.set_bits(BUTTON, PRESSED);
        services.process_states(&mut log);

        assert_eq!(
            log.calls,
            [
                Call::Changed(BUTTON, PRESSED, PRESSED),
                Call::Changed(BUTTON, PRESSED, PRESSED),
                Call::ChangedBy(BUTTON, PRESSED, PRESSED),
            ]
        );
        // Owner cleared the pulse bit
        assert_eq!(services.state(BUTTON), 0);

        log.calls.clear();
        services.process_states(&mut log);
        assert!(log.calls.is_empty());
    }

    #[test]
    fn test_local_state_owner_only() {
        let mut services = registry();
        let mut log = Log::default();
        services.enable(None, true, &mut log);
        log.calls.clear();

        assert!(services.set_local_state(BUTTON, 0b10));
        assert!(services.set_local_state(BUTTON, 0b01));
        services.process_states(&mut log);
        assert_eq!(log.calls, [Call::Local(BUTTON, 0b11)]);

        // Callback consumed the bits
        log.calls.clear();
        services.process_states(&mut log);
        assert!(log.calls.is_empty());
    }

    #[test]
    fn test_disabled_services_skipped_in_round() {
        let mut services = registry();
        let mut log = Log::default();
        services.enable(None, true, &mut log);
        services.set_bits(MAIN, START);
        services.enable(Some(MAIN), false, &mut log);
        log.calls.clear();

        services.process_states(&mut log);
        assert!(log.calls.is_empty());

        services.enable(Some(MAIN), true, &mut log);
        log.calls.clear();
        services.process_states(&mut log);
        assert_eq!(log.calls, [Call::Changed(MAIN, START, START)]);
    }

    #[test]
    fn test_registry_full() {
        let mut services = Services::<Log, 1>::new();
        services.register(ServiceEntry::new(MAIN)).unwrap();
        assert_eq!(services.register(ServiceEntry::new(LED)), Err(RegistryFull));
    }
}
