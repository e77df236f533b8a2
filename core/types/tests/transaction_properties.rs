// meridian/core/types/tests/transaction_properties.rs

// Property tests for transaction encoding and hashing

use meridian_types::{Action, Amount, KeyPair, ToBytesLevel, Transaction};
use proptest::prelude::*;

fn arb_action() -> impl Strategy<Value = Action> {
    ("[a-z.]{1,12}", "[a-z_]{1,12}", "\\[[a-z0-9\",]{0,24}\\]")
        .prop_map(|(contract, name, data)| Action::new(contract, name, data))
}

fn arb_tx() -> impl Strategy<Value = Transaction> {
    (
        prop::collection::vec(arb_action(), 0..4),
        prop::collection::vec("[a-z]{1,8}", 0..3),
        500i64..100_000,
        100i64..=10_000,
        0i64..i64::MAX / 4,
        0i64..1_000_000,
        prop::collection::vec(("[a-z]{1,5}", "[0-9]{1,4}"), 0..3),
    )
        .prop_map(|(actions, signers, gas_limit, gas_price, time, window, limits)| {
            Transaction::new(
                actions,
                signers,
                gas_limit,
                gas_price,
                time,
                time + window,
                0,
            )
            .with_amount_limit(
                limits
                    .into_iter()
                    .map(|(token, val)| Amount::new(token, val))
                    .collect(),
            )
        })
}

proptest! {
    #[test]
    fn prop_hash_is_stable(tx in arb_tx()) {
        prop_assert_eq!(tx.hash(), tx.hash());
        prop_assert_eq!(tx.clone().hash(), tx.hash());
    }

    #[test]
    fn prop_levels_nest(tx in arb_tx(), seed in any::<[u8; 32]>()) {
        let mut tx = tx;
        tx.sign_publish("publisher", &[KeyPair::from_seed(seed)], vec![]);
        let base = tx.to_bytes(ToBytesLevel::Base);
        let publish = tx.to_bytes(ToBytesLevel::Publish);
        let full = tx.to_bytes(ToBytesLevel::Full);
        prop_assert!(publish.starts_with(&base));
        prop_assert!(full.starts_with(&publish));
    }

    #[test]
    fn prop_decode_reproduces_full_bytes(tx in arb_tx(), seed in any::<[u8; 32]>()) {
        let mut tx = tx;
        tx.sign_publish("publisher", &[KeyPair::from_seed(seed)], vec![]);
        let decoded = Transaction::decode(&tx.encode()).unwrap();
        prop_assert_eq!(
            decoded.to_bytes(ToBytesLevel::Full),
            tx.to_bytes(ToBytesLevel::Full)
        );
    }

    #[test]
    fn prop_sign_publish_changes_hash(tx in arb_tx(), seed in any::<[u8; 32]>()) {
        let mut tx = tx;
        let before = tx.hash();
        tx.sign_publish("publisher", &[KeyPair::from_seed(seed)], vec![]);
        prop_assert_ne!(before, tx.hash());
    }

    #[test]
    fn prop_time_checks_never_overflow(
        time in any::<i64>(),
        expiration in any::<i64>(),
        delay in any::<i64>(),
        ct in any::<i64>(),
    ) {
        let tx = Transaction::new(vec![], vec![], 1_000, 100, time, expiration, delay);
        if tx.is_time_valid(ct) {
            prop_assert!(time <= ct && ct < expiration);
        }
        let defer = tx.defer_tx();
        if defer.verify_defer(&tx).is_ok() {
            prop_assert_eq!(time.checked_add(delay), Some(defer.time()));
        }
    }
}
