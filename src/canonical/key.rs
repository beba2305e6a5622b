//! Structural Keys
//!
//! A structural key is the identity of a datatype graph: two datatypes get
//! the same key exactly when their closures serialize identically once
//! local names are replaced by positions.
//!
//! Closure members are numbered by a depth-first walk from the keyed type
//! that follows declared field order. Complex fields serialize the number of
//! the member they reference, so the key depends only on field content and
//! reference topology.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use similar::TextDiff;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::datatype::{Catalog, FieldDescriptor, TypeName};
use crate::error::{DatatypeError, Result};
use crate::graph::{closure_with_policy, CyclePolicy};

/// Canonical serialization of a datatype's closure
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuralKey(String);

/// Field as it appears in a structural key
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyField<'a> {
    name: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    primitive: Option<&'a str>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    reference: Option<usize>,
    is_array: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    array_length: Option<u64>,
    is_constant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_text: Option<&'a str>,
}

impl<'a> KeyField<'a> {
    fn new(field: &'a FieldDescriptor, ordinals: &HashMap<&str, usize>) -> Result<Self> {
        let (primitive, reference) = match field.referenced_type() {
            Some(target) => {
                let ordinal = ordinals
                    .get(target)
                    .copied()
                    .ok_or_else(|| DatatypeError::missing(target))?;
                (None, Some(ordinal))
            }
            None => (Some(field.ty.as_str()), None),
        };

        Ok(Self {
            name: &field.name,
            primitive,
            reference,
            is_array: field.is_array,
            array_length: field.array_length,
            is_constant: field.is_constant,
            value: field.value.as_ref(),
            value_text: field.value_text.as_deref(),
        })
    }
}

impl StructuralKey {
    /// Key of `name` within `catalog`, computing its closure first
    pub fn derive(catalog: &Catalog, name: &str, policy: CyclePolicy) -> Result<Self> {
        let sub_catalog = closure_with_policy(catalog, [name], policy)?;
        Self::from_closure(&sub_catalog, name)
    }

    /// Key of `root` given a catalog that already contains its closure.
    ///
    /// Definitions in `closure` that are not reachable from `root` do not
    /// contribute to the key.
    pub fn from_closure(closure: &Catalog, root: &str) -> Result<Self> {
        let order = member_order(closure, root)?;
        let ordinals: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut lines = Vec::new();
        for (ordinal, name) in order.iter().enumerate() {
            let definition = closure
                .get(name)
                .ok_or_else(|| DatatypeError::missing(name.as_str()))?;
            lines.push(format!("#{} {}", ordinal, definition.fields.len()));
            for field in &definition.fields {
                lines.push(serde_json::to_string(&KeyField::new(field, &ordinals)?)?);
            }
        }

        Ok(Self(lines.join("\n")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA256 hex digest of the key, for logs and reports
    pub fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(self.0.as_bytes()))
    }

    /// First 12 hex digits of the digest
    pub fn short_digest(&self) -> String {
        self.digest()[..12].to_string()
    }
}

impl fmt::Display for StructuralKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closure members of `root` in depth-first preorder along field order
fn member_order(closure: &Catalog, root: &str) -> Result<Vec<TypeName>> {
    let mut order: Vec<TypeName> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![root];

    while let Some(name) = stack.pop() {
        if !seen.insert(name) {
            continue;
        }
        let definition = closure.get(name).ok_or_else(|| DatatypeError::missing(name))?;
        order.push(name.to_string());

        let refs: Vec<&str> = definition.complex_refs().collect();
        for target in refs.into_iter().rev() {
            if !seen.contains(target) {
                stack.push(target);
            }
        }
    }

    Ok(order)
}

/// Line diff between two keys, explaining why two datatypes differ.
///
/// Returns an empty string when the keys are equal.
pub fn explain_difference(left: &StructuralKey, right: &StructuralKey) -> String {
    if left == right {
        return String::new();
    }
    let mut left_text = left.0.clone();
    left_text.push('\n');
    let mut right_text = right.0.clone();
    right_text.push('\n');

    TextDiff::from_lines(&left_text, &right_text)
        .unified_diff()
        .context_radius(2)
        .header(&left.short_digest(), &right.short_digest())
        .to_string()
}
