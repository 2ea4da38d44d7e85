//! Order-independence properties of the merge rule.
//!
//! Deletes carry no ordering token, so only put reorderings are required to
//! converge; delete races are pinned by the deterministic tests in
//! `integration.rs` and the store's unit tests.

use channel_mirror::{ChannelKey, DecodedPayload, LogicalTime, SnapshotStore};
use proptest::prelude::*;
use std::collections::HashMap;

const KEYS: [&str; 5] = ["s/1/a", "s/1/b", "s/2/a", "s/2/b", "s/3/x"];

#[derive(Clone, Debug)]
struct PutEvent {
    key: &'static str,
    value: i64,
    timestamp: u64,
    fallback: bool,
}

fn arb_puts() -> impl Strategy<Value = Vec<PutEvent>> {
    prop::collection::vec((0usize..KEYS.len(), any::<i64>(), any::<bool>()), 1..64).prop_map(
        |raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (key, value, fallback))| PutEvent {
                    key: KEYS[key],
                    value,
                    // Distinct by construction.
                    timestamp: i as u64 + 1,
                    fallback,
                })
                .collect()
        },
    )
}

fn arb_puts_with_order() -> impl Strategy<Value = (Vec<PutEvent>, Vec<usize>)> {
    arb_puts().prop_flat_map(|events| {
        let order: Vec<usize> = (0..events.len()).collect();
        (Just(events), Just(order).prop_shuffle())
    })
}

fn apply(store: &SnapshotStore, event: &PutEvent) {
    store.apply_put(
        ChannelKey::new(event.key),
        DecodedPayload::Integer(event.value),
        LogicalTime(event.timestamp),
        event.fallback,
    );
}

fn table(store: &SnapshotStore) -> HashMap<String, (i64, u64, bool)> {
    store
        .snapshot()
        .iter()
        .map(|(key, state)| {
            let value = match state.value {
                DecodedPayload::Integer(i) => i,
                ref other => panic!("unexpected value {:?}", other),
            };
            (
                key.to_string(),
                (value, state.timestamp.as_micros(), state.fallback_timestamp),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn converges_under_any_application_order((events, order) in arb_puts_with_order()) {
        let in_order = SnapshotStore::new();
        for event in &events {
            apply(&in_order, event);
        }

        let shuffled = SnapshotStore::new();
        for &i in &order {
            apply(&shuffled, &events[i]);
        }

        prop_assert_eq!(table(&in_order), table(&shuffled));
    }

    #[test]
    fn redelivery_is_idempotent((events, order) in arb_puts_with_order()) {
        let store = SnapshotStore::new();
        for event in &events {
            apply(&store, event);
        }
        let once = table(&store);

        // Replay the whole multiset again, in a different order.
        for &i in &order {
            apply(&store, &events[i]);
        }
        prop_assert_eq!(table(&store), once);
    }

    #[test]
    fn authoritative_wins_ties_regardless_of_arrival(
        auth_value in any::<i64>(),
        fallback_value in any::<i64>(),
        ts in 1u64..1_000_000,
    ) {
        let key = ChannelKey::new("s/1/a");

        let auth_first = SnapshotStore::new();
        auth_first.apply_put(key.clone(), DecodedPayload::Integer(auth_value), LogicalTime(ts), false);
        auth_first.apply_put(key.clone(), DecodedPayload::Integer(fallback_value), LogicalTime(ts), true);

        let fallback_first = SnapshotStore::new();
        fallback_first.apply_put(key.clone(), DecodedPayload::Integer(fallback_value), LogicalTime(ts), true);
        fallback_first.apply_put(key.clone(), DecodedPayload::Integer(auth_value), LogicalTime(ts), false);

        for store in [&auth_first, &fallback_first] {
            let state = store.get(&key).unwrap();
            prop_assert_eq!(&state.value, &DecodedPayload::Integer(auth_value));
            prop_assert!(!state.fallback_timestamp);
        }
    }

    #[test]
    fn snapshot_matches_store_after_quiescence(events in arb_puts()) {
        let store = SnapshotStore::new();
        for event in &events {
            apply(&store, event);
        }

        let snapshot = store.snapshot();
        prop_assert_eq!(snapshot.len(), store.len());
        for (key, state) in snapshot.iter() {
            let live = store.get(key).unwrap();
            prop_assert_eq!(&live.value, &state.value);
            prop_assert_eq!(live.timestamp, state.timestamp);
        }
    }
}
