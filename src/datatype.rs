//! Datatype definitions, catalogs and topic sources

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

/// Name of a datatype within a catalog
pub type TypeName = String;

/// A single field of a datatype definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Field name, unique within its definition
    pub name: String,
    /// Referenced datatype name or primitive tag (e.g. "float64")
    #[serde(rename = "type")]
    pub ty: TypeName,
    /// True when `ty` names another definition rather than a primitive
    #[serde(default)]
    pub is_complex: bool,
    #[serde(default)]
    pub is_array: bool,
    /// Fixed array length (None for variable length arrays)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_length: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_constant: bool,
    /// Parsed constant value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Constant value exactly as declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_text: Option<String>,
}

impl FieldDescriptor {
    /// Create a field holding a primitive value
    pub fn primitive(name: impl Into<String>, ty: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            is_complex: false,
            is_array: false,
            array_length: None,
            is_constant: false,
            value: None,
            value_text: None,
        }
    }

    /// Create a field referencing another datatype
    pub fn complex(name: impl Into<String>, ty: impl Into<TypeName>) -> Self {
        Self {
            is_complex: true,
            ..Self::primitive(name, ty)
        }
    }

    /// Turn this field into an array, optionally of fixed length
    pub fn array(mut self, length: Option<u64>) -> Self {
        self.is_array = true;
        self.array_length = length;
        self
    }

    /// Turn this field into a constant
    pub fn constant(mut self, value: serde_json::Value, value_text: impl Into<String>) -> Self {
        self.is_constant = true;
        self.value = Some(value);
        self.value_text = Some(value_text.into());
        self
    }

    /// Datatype referenced by this field, if complex
    pub fn referenced_type(&self) -> Option<&str> {
        self.is_complex.then_some(self.ty.as_str())
    }
}

/// An ordered list of fields making up one datatype
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDefinition {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Names of datatypes referenced by complex fields, in field order
    pub fn complex_refs(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|f| f.referenced_type())
    }
}

/// A name-indexed set of datatype definitions.
///
/// All edges between definitions are name lookups into this map, so a
/// catalog may be partial relative to the names its fields reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    definitions: BTreeMap<TypeName, TypeDefinition>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Insert a definition, returning the previous one under that name
    pub fn insert(&mut self, name: impl Into<TypeName>, definition: TypeDefinition) -> Option<TypeDefinition> {
        self.definitions.insert(name.into(), definition)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Datatype names in lexicographic order
    pub fn names(&self) -> impl Iterator<Item = &TypeName> {
        self.definitions.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, TypeName, TypeDefinition> {
        self.definitions.iter()
    }
}

impl FromIterator<(TypeName, TypeDefinition)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (TypeName, TypeDefinition)>>(iter: I) -> Self {
        Self {
            definitions: iter.into_iter().collect(),
        }
    }
}

impl Extend<(TypeName, TypeDefinition)> for Catalog {
    fn extend<I: IntoIterator<Item = (TypeName, TypeDefinition)>>(&mut self, iter: I) {
        self.definitions.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = (&'a TypeName, &'a TypeDefinition);
    type IntoIter = btree_map::Iter<'a, TypeName, TypeDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.definitions.iter()
    }
}

impl IntoIterator for Catalog {
    type Item = (TypeName, TypeDefinition);
    type IntoIter = btree_map::IntoIter<TypeName, TypeDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.definitions.into_iter()
    }
}

/// One parsed declaration from a message definition.
///
/// The root declaration carries no name; it is keyed by the source's
/// root type hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<TypeName>,
    #[serde(alias = "definitions")]
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDeclaration {
    /// Declaration of the root type
    pub fn root(fields: Vec<FieldDescriptor>) -> Self {
        Self { name: None, fields }
    }

    /// Declaration of a named dependency
    pub fn named(name: impl Into<TypeName>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: Some(name.into()),
            fields,
        }
    }
}

/// One external declarer of a datatype graph (typically a topic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Unique key of this source (e.g. the topic name)
    pub source_key: String,
    /// Message definition text as received, if available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_declaration: Option<String>,
    /// Declarations parsed from the message definition
    #[serde(default)]
    pub parsed_fields: Vec<TypeDeclaration>,
    /// Datatype name of the source's root declaration
    pub root_type_hint: TypeName,
}

impl Source {
    pub fn new(
        source_key: impl Into<String>,
        root_type_hint: impl Into<TypeName>,
        parsed_fields: Vec<TypeDeclaration>,
    ) -> Self {
        Self {
            source_key: source_key.into(),
            raw_declaration: None,
            parsed_fields,
            root_type_hint: root_type_hint.into(),
        }
    }

    /// Attach the raw message definition text
    pub fn with_raw_declaration(mut self, raw: impl Into<String>) -> Self {
        self.raw_declaration = Some(raw.into());
        self
    }

    /// Text identifying this source's declaration for batching.
    ///
    /// The raw declaration when present, otherwise the serialized parsed
    /// declarations. Prefixed so the two forms never compare equal.
    pub fn declaration_fingerprint(&self) -> serde_json::Result<String> {
        match &self.raw_declaration {
            Some(raw) => Ok(format!("raw:{}", raw)),
            None => Ok(format!("parsed:{}", serde_json::to_string(&self.parsed_fields)?)),
        }
    }

    /// Build the catalog declared by this source.
    ///
    /// The unnamed declaration is keyed by the root type hint. When a name
    /// is declared twice the first declaration wins.
    pub fn local_catalog(&self) -> Catalog {
        let mut catalog = Catalog::new();
        for declaration in &self.parsed_fields {
            let name = declaration.name.as_deref().unwrap_or(&self.root_type_hint);
            if catalog.contains(name) {
                tracing::warn!(
                    source = %self.source_key,
                    datatype = %name,
                    "ignoring duplicate datatype declaration"
                );
                continue;
            }
            catalog.insert(name, TypeDefinition::new(declaration.fields.clone()));
        }
        catalog
    }
}
