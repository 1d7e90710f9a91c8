//! The type registry: durable identity for published schema types.
//!
//! One explicit `Registry` value is created at process start and passed by
//! shared reference into every `close()` call and accessor. It owns every
//! closed node for the rest of the process, partitioned by kind: records
//! and selections keyed by content hash, abstracts keyed by name, plus the
//! descendant table and the pending forward references collected during
//! declaration.
//!
//! Declaration runs single-threaded at startup; the interior lock exists
//! so the closed, finished registry can afterwards be read concurrently by
//! workers validating independent input trees.

use crate::error::{Result, SchemaError};
use crate::hash::TypeHash;
use crate::node::SchemaNode;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// A forward reference recorded while declarations run, resolved by
/// [`Registry::lazy_finish`].
#[derive(Debug, Clone)]
struct PendingRef {
    /// Name of the abstract type being referenced.
    name: String,
    /// Type that holds the reference, for diagnostics.
    referrer: String,
}

#[derive(Debug, Default)]
struct Repositories {
    records: HashMap<TypeHash, Arc<SchemaNode>>,
    selections: HashMap<TypeHash, Arc<SchemaNode>>,
    abstracts: HashMap<String, Arc<SchemaNode>>,
    /// abstract name -> descendant type name -> record
    descendants: HashMap<String, BTreeMap<String, Arc<SchemaNode>>>,
    pending: Vec<PendingRef>,
    finished: bool,
}

/// Process-wide store of published schema types.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Repositories>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a closed record or tuple, deduplicating structurally
    /// identical types to one canonical instance.
    pub(crate) fn add_record(&self, node: Arc<SchemaNode>) -> Arc<SchemaNode> {
        let mut inner = self.write();
        let canonical = inner
            .records
            .entry(node.content_hash().clone())
            .or_insert_with(|| {
                tracing::debug!(name = %node.type_name(), "registered record type");
                node
            });
        canonical.clone()
    }

    /// Insert a closed selection, deduplicating by content hash.
    pub(crate) fn add_selection(&self, node: Arc<SchemaNode>) -> Arc<SchemaNode> {
        let mut inner = self.write();
        let canonical = inner
            .selections
            .entry(node.content_hash().clone())
            .or_insert_with(|| {
                tracing::debug!(name = %node.type_name(), "registered selection type");
                node
            });
        canonical.clone()
    }

    /// Insert a closed abstract type under its name. Re-registering the
    /// identical type is a no-op; a different type under the same name is
    /// a declaration conflict and panics.
    pub(crate) fn add_abstract(&self, node: Arc<SchemaNode>) -> Arc<SchemaNode> {
        let name = node.type_name();
        let mut inner = self.write();
        if let Some(existing) = inner.abstracts.get(&name) {
            assert!(
                existing.content_hash() == node.content_hash(),
                "abstract type name '{}' declared twice with different content",
                name
            );
            return existing.clone();
        }
        tracing::debug!(name = %name, "registered abstract type");
        inner.abstracts.insert(name, node.clone());
        node
    }

    /// Record a forward reference for the deferred resolution pass.
    pub(crate) fn note_deferred(&self, name: &str, referrer: &str) {
        let mut inner = self.write();
        tracing::debug!(name, referrer, "noted deferred type reference");
        inner.pending.push(PendingRef {
            name: name.to_string(),
            referrer: referrer.to_string(),
        });
    }

    /// Register a record as a selectable descendant of an abstract type.
    /// The abstract may not exist yet; the edge is validated at finish.
    pub(crate) fn add_descendant(&self, abstract_name: &str, record: Arc<SchemaNode>) {
        let type_name = record.type_name();
        let mut inner = self.write();
        inner
            .descendants
            .entry(abstract_name.to_string())
            .or_default()
            .insert(type_name, record);
    }

    /// Look a closed abstract type up by name.
    pub fn abstract_by_name(&self, name: &str) -> Option<Arc<SchemaNode>> {
        self.read().abstracts.get(name).cloned()
    }

    /// Look a canonical record up by content hash.
    pub fn record_by_hash(&self, hash: &TypeHash) -> Option<Arc<SchemaNode>> {
        self.read().records.get(hash).cloned()
    }

    /// Look a canonical selection up by content hash.
    pub fn selection_by_hash(&self, hash: &TypeHash) -> Option<Arc<SchemaNode>> {
        self.read().selections.get(hash).cloned()
    }

    /// Resolve the concrete descendant of an abstract type by its name.
    pub fn descendant(&self, abstract_name: &str, type_name: &str) -> Option<Arc<SchemaNode>> {
        self.read()
            .descendants
            .get(abstract_name)
            .and_then(|set| set.get(type_name))
            .cloned()
    }

    /// Descendant type names registered for an abstract type.
    pub fn descendant_names(&self, abstract_name: &str) -> Vec<String> {
        self.read()
            .descendants
            .get(abstract_name)
            .map(|set| set.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        self.read().finished
    }

    /// The deferred resolution pass, run once after all static schema
    /// declarations have executed. Every pending forward reference and
    /// every descendant edge must name an abstract type that is now
    /// registered; a dangling reference is fatal. Idempotent: a second
    /// invocation observes the finished flag and is a no-op.
    pub fn lazy_finish(&self) -> Result<()> {
        let mut inner = self.write();
        if inner.finished {
            return Ok(());
        }

        for pending in &inner.pending {
            if !inner.abstracts.contains_key(&pending.name) {
                return Err(SchemaError::UnresolvedReference {
                    name: pending.name.clone(),
                    referrer: pending.referrer.clone(),
                });
            }
        }
        for abstract_name in inner.descendants.keys() {
            if !inner.abstracts.contains_key(abstract_name) {
                let referrer = inner.descendants[abstract_name]
                    .keys()
                    .next()
                    .cloned()
                    .unwrap_or_default();
                return Err(SchemaError::UnresolvedReference {
                    name: abstract_name.clone(),
                    referrer,
                });
            }
        }

        tracing::debug!(
            records = inner.records.len(),
            selections = inner.selections.len(),
            abstracts = inner.abstracts.len(),
            resolved = inner.pending.len(),
            "registry finished"
        );
        inner.pending.clear();
        inner.finished = true;
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Repositories> {
        self.inner.read().expect("registry lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Repositories> {
        self.inner.write().expect("registry lock poisoned")
    }
}
