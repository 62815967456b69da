//! Identifier capability.
//!
//! Accounts, buckets, and events carry globally unique opaque string ids
//! minted by an injected source, so tests can use readable sequential ids.

use uuid::Uuid;

/// Mints globally unique opaque identifiers.
pub trait IdSource {
    fn next_id(&mut self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Prefixed sequential ids (`e-1`, `e-2`, ...), for deterministic tests.
#[derive(Debug)]
pub struct SequentialIdSource {
    prefix: String,
    next: u64,
}

impl SequentialIdSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        SequentialIdSource {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdSource for SequentialIdSource {
    fn next_id(&mut self) -> String {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_source_is_unique() {
        let mut ids = UuidSource;
        assert_ne!(ids.next_id(), ids.next_id());
    }

    #[test]
    fn test_sequential_source_counts_up() {
        let mut ids = SequentialIdSource::new("b");
        assert_eq!(ids.next_id(), "b-1");
        assert_eq!(ids.next_id(), "b-2");
    }
}
