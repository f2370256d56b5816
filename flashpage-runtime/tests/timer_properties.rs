//! Timer deadlines hold across counter wrap

use flashpage_runtime::{TimerAction, Timers};
use proptest::prelude::*;

#[derive(Default)]
struct Fired {
    at: Vec<u32>,
    now: u32,
}

fn record(ctx: &mut Fired) -> TimerAction {
    ctx.at.push(ctx.now);
    TimerAction::Continue
}

proptest! {
    #[test]
    fn prop_fires_match_model(
        start in any::<u32>(),
        interval in 1u32..1_000,
        steps in prop::collection::vec(0u32..400, 1..64),
    ) {
        let mut timers = Timers::<Fired, 1>::new();
        let id = timers.register(record).unwrap();
        timers.start(id, interval, start, false);

        let mut ctx = Fired::default();
        let mut now = start;
        let mut elapsed_since_arm = 0u64;
        let mut expected = 0usize;

        for step in steps {
            now = now.wrapping_add(step);
            elapsed_since_arm += u64::from(step);
            ctx.now = now;

            let fired = timers.tick(now, &mut ctx);
            if elapsed_since_arm >= u64::from(interval) {
                prop_assert_eq!(fired, 1);
                elapsed_since_arm = 0;
                expected += 1;
            } else {
                prop_assert_eq!(fired, 0);
            }
        }

        prop_assert_eq!(ctx.at.len(), expected);
        prop_assert!(timers.is_started(id));
    }
}
