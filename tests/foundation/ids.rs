//! Integration tests for composite entity ids

use cairn_foundation::EntityId;

// =============================================================================
// Packing
// =============================================================================

#[test]
fn compose_and_split() {
    let id = EntityId::compose(42, 7);
    assert_eq!(id.local_id(), 42);
    assert_eq!(id.entity_set_id(), 7);
    assert_eq!(id.raw(), 7 * (1 << 32) + 42);
}

#[test]
fn packed_ids_survive_a_double() {
    let id = EntityId::compose(u32::MAX, EntityId::MAX_ENTITY_SET_ID);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let through_float = (id.raw() as f64) as u64;
    assert_eq!(through_float, id.raw());
}

#[test]
fn set_id_is_masked() {
    let id = EntityId::compose(1, EntityId::MAX_ENTITY_SET_ID + 1);
    assert_eq!(id.entity_set_id(), 0);
    assert_eq!(id.local_id(), 1);
}

#[test]
fn rehoming_keeps_local_id() {
    let id = EntityId::compose(9, 1).with_entity_set_id(3);
    assert_eq!(id, EntityId::compose(9, 3));
}

#[test]
fn none_and_provisional() {
    assert!(EntityId::NONE.is_none());
    assert!(!EntityId::NONE.is_provisional());
    let p = EntityId::provisional(5);
    assert!(p.is_provisional());
    assert_eq!(p.local_id(), 5);
    assert!(!EntityId::compose(5, 1).is_provisional());
}

// =============================================================================
// Byte Encoding
// =============================================================================

#[test]
fn big_endian_bytes() {
    let id = EntityId::compose(1, 1);
    let bytes = id.to_be_bytes();
    assert_eq!(bytes, [0, 0, 0, 1, 0, 0, 0, 1]);
    assert_eq!(EntityId::from_be_bytes(bytes).unwrap(), id);
}

#[test]
fn out_of_range_bytes_are_rejected() {
    let err = EntityId::from_be_bytes(u64::MAX.to_be_bytes()).unwrap_err();
    assert!(err.to_string().contains("packed range"));
}

#[test]
fn ordering_follows_raw_value() {
    let mut ids = vec![EntityId::compose(2, 1), EntityId::compose(9, 0), EntityId::compose(1, 1)];
    ids.sort();
    assert_eq!(
        ids,
        vec![EntityId::compose(9, 0), EntityId::compose(1, 1), EntityId::compose(2, 1)]
    );
}

mod properties {
    use cairn_foundation::EntityId;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn packing_round_trips(local in any::<u32>(), esid in 0u32..=EntityId::MAX_ENTITY_SET_ID) {
            let id = EntityId::compose(local, esid);
            prop_assert_eq!(id.local_id(), local);
            prop_assert_eq!(id.entity_set_id(), esid);
            prop_assert_eq!(EntityId::from_be_bytes(id.to_be_bytes()).unwrap(), id);
        }
    }
}
