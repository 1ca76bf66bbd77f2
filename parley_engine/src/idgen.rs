//! ** idgen module **
//! Namespaces and helpers for generating stable v5 uuids for named conversation participants.
//! Hosts that already track their own entity ids can hand those in directly instead.
use uuid::Uuid;

pub const NAMESPACE_ACTOR: Uuid = uuid::uuid!("5f0c2a6e-8d0b-4b55-9a3e-2f6f1c4d7b90");

/// Generate a v5 UUID for a participant known only by name.
pub fn uuid_from_name(namespace: &Uuid, name: &str) -> Uuid {
    Uuid::new_v5(namespace, name.as_bytes())
}

/// Generate a random id for a participant created at runtime.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_map_to_stable_ids() {
        let a = uuid_from_name(&NAMESPACE_ACTOR, "grandpa");
        let b = uuid_from_name(&NAMESPACE_ACTOR, "grandpa");
        assert_eq!(a, b);
        assert_ne!(a, uuid_from_name(&NAMESPACE_ACTOR, "gork"));
        assert_ne!(new_id(), new_id());
    }
}
