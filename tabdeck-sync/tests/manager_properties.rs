//! Property tests for the initial load vs change event race.

use std::sync::Arc;

use proptest::prelude::*;
use tabdeck_storage::StorageInterface;
use tabdeck_sync::{StoreManager, StoreManagerEvent};
use tabdeck_test_utils::generators::arb_key;
use tabdeck_test_utils::{fixtures, EventRecorder, GatedStorage};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("build runtime")
}

/// Events a manager publishes when `before_load` changes fire while its
/// initial load of `stored` is held, and `after_load` changes follow it.
fn race(
    key: String,
    stored: Option<u32>,
    before_load: Vec<u32>,
    after_load: Vec<u32>,
) -> (Vec<StoreManagerEvent<u32>>, Option<u32>) {
    runtime().block_on(async move {
        let gated = GatedStorage::new(key, stored);
        let store: Arc<dyn StorageInterface<u32>> = gated.clone();
        let manager = StoreManager::new(store, fixtures::notifier());
        manager.init().unwrap();
        let recorder = EventRecorder::<StoreManagerEvent<u32>>::new();
        recorder.attach(manager.data_event());

        for value in before_load {
            gated.emit_change(value);
        }
        gated.release();
        manager.settled().await;
        for value in after_load {
            gated.emit_change(value);
        }

        (recorder.events(), manager.data())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_latest_change_wins_over_held_load(
        key in arb_key(),
        stored in prop::option::of(any::<u32>()),
        before_load in prop::collection::vec(any::<u32>(), 0..4),
        after_load in prop::collection::vec(any::<u32>(), 0..3),
    ) {
        let (events, data) = race(key, stored, before_load.clone(), after_load.clone());

        let expected = after_load.last().or(before_load.last()).copied().or(stored);
        prop_assert_eq!(data, expected);

        // The load only publishes when no change beat it.
        let load_events = usize::from(before_load.is_empty());
        prop_assert_eq!(events.len(), before_load.len() + load_events + after_load.len());
        prop_assert!(events.iter().all(|event| event.is_initialized && event.error.is_none()));
        prop_assert!(events.windows(2).all(|w| w[0].payload_index < w[1].payload_index));
        prop_assert!(events.iter().all(|event| event.write_seq.is_none()));
    }
}
