//! Canonical Renaming
//!
//! Assigns content-addressed names to the datatype graphs declared by many
//! independent sources. Every local datatype is keyed by its structural key;
//! equal keys share one generated name within a batch, distinct keys never
//! do. Each source's local catalog is rewritten under the generated names and
//! merged into one output catalog.
//!
//! Sources with byte-identical declarations (and the same root hint) are
//! grouped and processed once. A group whose closures fail is reported as a
//! [`GroupFailure`] and leaves the batch's name assignments untouched.

pub mod key;
pub mod names;

pub use key::{explain_difference, StructuralKey};
pub use names::{reset_batch_counter, BatchCounter, NameGenerator};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::config::CanonConfig;
use crate::datatype::{Catalog, Source, TypeDefinition, TypeName};
use crate::error::{DatatypeError, Result};
use crate::graph::{closure_with_policy, reference_cycles, CyclePolicy, ReferenceGraph};

/// Original local datatype name -> canonical name, for one source
pub type NameMapping = BTreeMap<TypeName, TypeName>;

/// Options controlling a canonicalization run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalizeOptions {
    /// Prefix of generated names
    pub prefix: String,
    /// Process sources with identical declarations once
    pub dedup_identical_declarations: bool,
    pub cycle_policy: CyclePolicy,
}

impl Default for CanonicalizeOptions {
    fn default() -> Self {
        Self {
            prefix: "datatype".to_string(),
            dedup_identical_declarations: true,
            cycle_policy: CyclePolicy::Allow,
        }
    }
}

impl From<&CanonConfig> for CanonicalizeOptions {
    fn from(config: &CanonConfig) -> Self {
        Self {
            prefix: config.naming.prefix.clone(),
            dedup_identical_declarations: config.batching.dedup_identical_declarations,
            cycle_policy: config.closure.cycle_policy,
        }
    }
}

/// A group of sources that failed to canonicalize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFailure {
    pub source_keys: Vec<String>,
    pub error: String,
}

/// Counters describing one canonicalization run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub sources: usize,
    /// Groups actually processed (equals `sources` without dedup)
    pub groups: usize,
    pub distinct_keys: usize,
    pub definitions: usize,
    pub unresolved_sources: usize,
    pub failed_sources: usize,
}

/// Output of one canonicalization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalBatch {
    pub batch: u64,
    /// Source key -> canonical name of its root datatype
    pub source_names: BTreeMap<String, TypeName>,
    /// Source key -> canonical names of all its local datatypes
    pub name_mappings: BTreeMap<String, NameMapping>,
    /// Every canonical definition produced in this batch
    pub catalog: Catalog,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<GroupFailure>,
    pub stats: BatchStats,
}

impl CanonicalBatch {
    /// Canonical root name of a source, if it resolved
    pub fn name_of(&self, source_key: &str) -> Option<&str> {
        self.source_names.get(source_key).map(String::as_str)
    }
}

/// Result of processing one group representative
struct RenamedGroup {
    root_name: TypeName,
    mapping: NameMapping,
    catalog: Catalog,
}

/// Sources sharing one declaration, processed through a representative
struct SourceGroup<'s> {
    representative: &'s Source,
    source_keys: Vec<String>,
}

/// Runs batches of sources through closure extraction, keying and renaming
pub struct Canonicalizer<'c> {
    options: CanonicalizeOptions,
    counter: &'c BatchCounter,
}

impl Canonicalizer<'static> {
    /// Canonicalizer using the process-wide batch counter
    pub fn new(options: CanonicalizeOptions) -> Self {
        Self {
            options,
            counter: BatchCounter::global(),
        }
    }
}

impl<'c> Canonicalizer<'c> {
    /// Canonicalizer drawing batch numbers from `counter`
    pub fn with_counter(options: CanonicalizeOptions, counter: &'c BatchCounter) -> Self {
        Self { options, counter }
    }

    pub fn options(&self) -> &CanonicalizeOptions {
        &self.options
    }

    /// Canonicalize one batch of sources.
    ///
    /// Never fails as a whole: unresolved roots and failing groups are
    /// reported through the returned batch.
    pub fn canonicalize(&self, sources: &[Source]) -> CanonicalBatch {
        let mut names = NameGenerator::begin(self.counter, self.options.prefix.as_str());
        let groups = self.group_sources(sources);

        let mut batch = CanonicalBatch {
            batch: names.batch(),
            source_names: BTreeMap::new(),
            name_mappings: BTreeMap::new(),
            catalog: Catalog::new(),
            failures: Vec::new(),
            stats: BatchStats {
                sources: sources.len(),
                groups: groups.len(),
                ..BatchStats::default()
            },
        };

        for group in groups {
            let source = group.representative;
            match self.rename_source(source, &mut names) {
                Ok(Some(renamed)) => {
                    debug!(
                        source = %source.source_key,
                        members = group.source_keys.len(),
                        root = %renamed.root_name,
                        "canonicalized source group"
                    );
                    for source_key in group.source_keys {
                        batch.source_names.insert(source_key.clone(), renamed.root_name.clone());
                        batch.name_mappings.insert(source_key, renamed.mapping.clone());
                    }
                    batch.catalog.extend(renamed.catalog);
                }
                Ok(None) => {
                    warn!(
                        source = %source.source_key,
                        root = %source.root_type_hint,
                        "root datatype not declared by source, skipping"
                    );
                    batch.stats.unresolved_sources += group.source_keys.len();
                }
                Err(e) => {
                    warn!(
                        source = %source.source_key,
                        members = group.source_keys.len(),
                        error = %e,
                        "failed to canonicalize source group"
                    );
                    batch.stats.failed_sources += group.source_keys.len();
                    batch.failures.push(GroupFailure {
                        source_keys: group.source_keys,
                        error: e.to_string(),
                    });
                }
            }
        }

        batch.stats.distinct_keys = names.len();
        batch.stats.definitions = batch.catalog.len();
        info!(
            batch = batch.batch,
            sources = batch.stats.sources,
            groups = batch.stats.groups,
            distinct_keys = batch.stats.distinct_keys,
            failed = batch.stats.failed_sources,
            "canonicalization batch complete"
        );
        batch
    }

    /// Structural key of a source's root datatype, if declared
    pub fn root_key(&self, source: &Source) -> Result<Option<StructuralKey>> {
        let local = source.local_catalog();
        if !local.contains(&source.root_type_hint) {
            return Ok(None);
        }
        StructuralKey::derive(&local, &source.root_type_hint, self.options.cycle_policy).map(Some)
    }

    fn group_sources<'s>(&self, sources: &'s [Source]) -> Vec<SourceGroup<'s>> {
        let mut groups: Vec<SourceGroup<'s>> = Vec::with_capacity(sources.len());
        let mut by_declaration: HashMap<(&str, String), usize> = HashMap::new();

        for source in sources {
            if self.options.dedup_identical_declarations {
                if let Ok(fingerprint) = source.declaration_fingerprint() {
                    let slot = (source.root_type_hint.as_str(), fingerprint);
                    if let Some(&idx) = by_declaration.get(&slot) {
                        groups[idx].source_keys.push(source.source_key.clone());
                        continue;
                    }
                    by_declaration.insert(slot, groups.len());
                }
            }
            groups.push(SourceGroup {
                representative: source,
                source_keys: vec![source.source_key.clone()],
            });
        }

        groups
    }

    /// Rename one source's local catalog.
    ///
    /// All keys are derived before the first name is assigned, so an error
    /// leaves `names` exactly as it was.
    fn rename_source(&self, source: &Source, names: &mut NameGenerator) -> Result<Option<RenamedGroup>> {
        let local = source.local_catalog();
        if !local.contains(&source.root_type_hint) {
            return Ok(None);
        }

        let cycles = reference_cycles(&ReferenceGraph::from_catalog(&local));
        if !cycles.is_empty() {
            warn!(source = %source.source_key, cycles = ?cycles, "source declares cyclic datatypes");
        }

        let mut keys: Vec<(&TypeName, StructuralKey)> = Vec::with_capacity(local.len());
        for name in local.names() {
            let sub_catalog = closure_with_policy(&local, [name], self.options.cycle_policy)?;
            keys.push((name, StructuralKey::from_closure(&sub_catalog, name)?));
        }

        let mut mapping = NameMapping::new();
        for (name, key) in keys {
            let (canonical, minted) = names.assign(&key);
            if minted {
                debug!(
                    batch = names.batch(),
                    datatype = %name,
                    canonical = %canonical,
                    key = %key.short_digest(),
                    "minted canonical datatype name"
                );
            }
            mapping.insert(name.clone(), canonical);
        }

        let catalog = rewrite_catalog(&local, &mapping);
        let root_name = mapping
            .get(&source.root_type_hint)
            .cloned()
            .ok_or_else(|| DatatypeError::missing(source.root_type_hint.as_str()))?;

        Ok(Some(RenamedGroup {
            root_name,
            mapping,
            catalog,
        }))
    }
}

/// Rewrite a local catalog under canonical names.
///
/// Complex fields referencing a renamed datatype point at its canonical
/// name; every other field is copied verbatim.
pub fn rewrite_catalog(local: &Catalog, mapping: &NameMapping) -> Catalog {
    local
        .iter()
        .filter_map(|(name, definition)| {
            let canonical = mapping.get(name)?;
            let fields = definition
                .fields
                .iter()
                .map(|field| {
                    let mut field = field.clone();
                    if field.is_complex {
                        if let Some(target) = mapping.get(&field.ty) {
                            field.ty = target.clone();
                        }
                    }
                    field
                })
                .collect();
            Some((canonical.clone(), TypeDefinition::new(fields)))
        })
        .collect()
}
