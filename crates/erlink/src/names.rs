//! Name resolution for peers: who listens where.
//!
//! The registration daemon that real clusters run is an external
//! collaborator; the core only consumes this interface. [`StaticNames`]
//! is the in-memory implementation used by tests and single-host
//! clusters, where every node shares one table.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::NodeError;

/// Publication and lookup of node listen ports.
pub trait NameService: Send + Sync {
    /// Announces that `alive` (the part before `@`) listens on `port`.
    /// Returns the creation counter assigned to this incarnation.
    fn publish(&self, alive: &str, port: u16) -> Result<u8, NodeError>;

    /// Withdraws a publication.
    fn unpublish(&self, alive: &str);

    /// Resolves a peer's alive name to `(host, port, creation)`.
    fn lookup(&self, alive: &str) -> Result<(String, u16, u8), NodeError>;
}

#[derive(Default)]
struct NamesInner {
    entries: HashMap<String, (String, u16, u8)>,
    creations: HashMap<String, u8>,
}

/// A shared in-memory name table.
///
/// Clones share the same table, so handing one `StaticNames` to every
/// node on a host makes them mutually resolvable. Each republication of
/// the same alive name advances its 2-bit creation counter.
#[derive(Clone, Default)]
pub struct StaticNames {
    inner: Arc<Mutex<NamesInner>>,
}

impl StaticNames {
    /// Creates an empty table.
    pub fn new() -> StaticNames {
        StaticNames::default()
    }
}

impl NameService for StaticNames {
    fn publish(&self, alive: &str, port: u16) -> Result<u8, NodeError> {
        let mut inner = self.inner.lock();
        let creation = {
            let slot = inner.creations.entry(alive.to_string()).or_insert(0);
            *slot = (*slot % 3) + 1;
            *slot
        };
        inner
            .entries
            .insert(alive.to_string(), ("127.0.0.1".to_string(), port, creation));
        Ok(creation)
    }

    fn unpublish(&self, alive: &str) {
        self.inner.lock().entries.remove(alive);
    }

    fn lookup(&self, alive: &str) -> Result<(String, u16, u8), NodeError> {
        self.inner
            .lock()
            .entries
            .get(alive)
            .cloned()
            .ok_or_else(|| {
                NodeError::Connection(format!("node '{}' is not published", alive))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_lookup() {
        let names = StaticNames::new();
        let creation = names.publish("alpha", 4000).unwrap();
        assert_eq!(creation, 1);
        assert_eq!(
            names.lookup("alpha").unwrap(),
            ("127.0.0.1".to_string(), 4000, 1)
        );
    }

    #[test]
    fn republish_advances_creation() {
        let names = StaticNames::new();
        assert_eq!(names.publish("alpha", 4000).unwrap(), 1);
        assert_eq!(names.publish("alpha", 4001).unwrap(), 2);
        assert_eq!(names.publish("alpha", 4002).unwrap(), 3);
        // Wraps within the 2-bit space, never returning to 0.
        assert_eq!(names.publish("alpha", 4003).unwrap(), 1);
    }

    #[test]
    fn unpublish_removes_entry() {
        let names = StaticNames::new();
        names.publish("alpha", 4000).unwrap();
        names.unpublish("alpha");
        assert!(names.lookup("alpha").is_err());
    }

    #[test]
    fn clones_share_the_table() {
        let names = StaticNames::new();
        let other = names.clone();
        names.publish("alpha", 4000).unwrap();
        assert!(other.lookup("alpha").is_ok());
    }
}
