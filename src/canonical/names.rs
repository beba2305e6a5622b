//! Canonical Name Generation
//!
//! Canonical names have the form `{prefix}{batch}_{index}`. The batch number
//! comes from a [`BatchCounter`] and changes on every canonicalization run;
//! the index counts distinct structural keys within the run. Names therefore
//! never collide across runs, and within a run a name is bound to exactly
//! one key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::key::StructuralKey;
use crate::datatype::TypeName;

static GLOBAL_BATCH_COUNTER: BatchCounter = BatchCounter::new();

/// Monotonic source of batch numbers
#[derive(Debug, Default)]
pub struct BatchCounter {
    last: AtomicU64,
}

impl BatchCounter {
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Process-wide counter used when no counter is injected
    pub fn global() -> &'static BatchCounter {
        &GLOBAL_BATCH_COUNTER
    }

    /// Start a new batch and return its number (first batch is 1)
    pub fn next_batch(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of the most recently started batch (0 if none)
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }

    /// Forget all started batches so generated names repeat
    pub fn reset(&self) {
        self.last.store(0, Ordering::SeqCst);
    }
}

/// Reset the process-wide batch counter
pub fn reset_batch_counter() {
    GLOBAL_BATCH_COUNTER.reset();
}

/// Batch-scoped assignment of canonical names to structural keys
#[derive(Debug)]
pub struct NameGenerator {
    prefix: String,
    batch: u64,
    assigned: HashMap<StructuralKey, TypeName>,
}

impl NameGenerator {
    /// Create a generator for an explicit batch number
    pub fn new(prefix: impl Into<String>, batch: u64) -> Self {
        Self {
            prefix: prefix.into(),
            batch,
            assigned: HashMap::new(),
        }
    }

    /// Create a generator for the next batch of `counter`
    pub fn begin(counter: &BatchCounter, prefix: impl Into<String>) -> Self {
        Self::new(prefix, counter.next_batch())
    }

    pub fn batch(&self) -> u64 {
        self.batch
    }

    /// Canonical name for `key`, minting one on first sighting.
    ///
    /// The flag is true when the name was minted by this call.
    pub fn assign(&mut self, key: &StructuralKey) -> (TypeName, bool) {
        if let Some(name) = self.assigned.get(key) {
            return (name.clone(), false);
        }
        let name = format!("{}{}_{}", self.prefix, self.batch, self.assigned.len());
        self.assigned.insert(key.clone(), name.clone());
        (name, true)
    }

    /// Name already assigned to `key`, if any
    pub fn lookup(&self, key: &StructuralKey) -> Option<&TypeName> {
        self.assigned.get(key)
    }

    /// Number of distinct keys seen in this batch
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{Catalog, FieldDescriptor, TypeDefinition};
    use crate::graph::CyclePolicy;

    fn key_for(ty: &str) -> StructuralKey {
        let mut catalog = Catalog::new();
        catalog.insert("R", TypeDefinition::new(vec![FieldDescriptor::primitive("v", ty)]));
        StructuralKey::derive(&catalog, "R", CyclePolicy::Allow).unwrap()
    }

    #[test]
    fn test_repeated_key_reuses_name() {
        let mut names = NameGenerator::new("datatype", 3);
        let (first, minted) = names.assign(&key_for("float64"));
        assert!(minted);
        assert_eq!(first, "datatype3_0");

        let (again, minted) = names.assign(&key_for("float64"));
        assert!(!minted);
        assert_eq!(again, first);
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_distinct_keys_get_distinct_names() {
        let mut names = NameGenerator::new("datatype", 1);
        let (a, _) = names.assign(&key_for("float64"));
        let (b, _) = names.assign(&key_for("int32"));
        assert_ne!(a, b);
        assert_eq!(b, "datatype1_1");
        assert_eq!(names.lookup(&key_for("int32")), Some(&b));
    }

    #[test]
    fn test_counter_advances_and_resets() {
        let counter = BatchCounter::new();
        assert_eq!(counter.current(), 0);
        assert_eq!(NameGenerator::begin(&counter, "t").batch(), 1);
        assert_eq!(NameGenerator::begin(&counter, "t").batch(), 2);
        assert_eq!(counter.current(), 2);
        counter.reset();
        assert_eq!(NameGenerator::begin(&counter, "t").batch(), 1);
    }

    #[test]
    fn test_names_differ_across_batches() {
        let counter = BatchCounter::new();
        let key = key_for("float64");
        let (a, _) = NameGenerator::begin(&counter, "datatype").assign(&key);
        let (b, _) = NameGenerator::begin(&counter, "datatype").assign(&key);
        assert_ne!(a, b);
    }
}
