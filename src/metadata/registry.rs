//! Metadata field, structure and document record registries
//!
//! The persistence layer that owns these definitions is an external
//! collaborator. The document core consumes it through the traits below;
//! `InMemoryRegistry` is the bundled implementation, loadable from JSON.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::DocumentResult;

/// Configuration scope identifier (0 = unset)
pub type ScopeId = u32;

/// Field definition as consumed by metadata extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub index_name: String,
    #[serde(default)]
    pub xpath: String,
    #[serde(default)]
    pub xpath_sorting: String,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub default_value: String,
}

/// Metadata field definitions per configuration scope
pub trait MetadataRegistry: Send + Sync {
    /// Fields with an explicit query for the given encoding
    fn field_definitions(&self, scope: ScopeId, encoding: &str) -> Vec<FieldDefinition>;

    /// Fields without any encoding binding but with a default value
    fn default_only_definitions(&self, scope: ScopeId) -> Vec<FieldDefinition>;
}

/// Structure type → thumbnail structure type associations
pub trait StructureRegistry: Send + Sync {
    /// Structure type whose first node supplies the thumbnail of documents
    /// of `structure_type`, if one is mapped
    fn thumbnail_structure_type(&self, scope: ScopeId, structure_type: &str) -> Option<String>;
}

/// Stored document row used for title and root resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub uid: u64,
    #[serde(default)]
    pub title: String,
    /// UID of the parent document, 0 if none
    #[serde(default)]
    pub part_of: u64,
}

/// Lookup of stored document rows
pub trait RecordStore: Send + Sync {
    fn document_record(&self, uid: u64) -> Option<DocumentRecord>;
}

/// Query of one field for one encoding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldQuery {
    pub xpath: String,
    #[serde(default)]
    pub xpath_sorting: String,
}

/// Field as configured in a scope, possibly bound to several encodings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub index_name: String,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub default_value: String,
    /// Encoding name → query
    #[serde(default)]
    pub formats: HashMap<String, FieldQuery>,
}

impl FieldSpec {
    pub fn new(index_name: &str) -> Self {
        Self {
            index_name: index_name.to_string(),
            ..Default::default()
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn with_default(mut self, value: &str) -> Self {
        self.default_value = value.to_string();
        self
    }

    pub fn with_query(mut self, encoding: &str, xpath: &str) -> Self {
        self.formats.insert(
            encoding.to_string(),
            FieldQuery {
                xpath: xpath.to_string(),
                xpath_sorting: String::new(),
            },
        );
        self
    }

    pub fn with_sort_query(mut self, encoding: &str, xpath: &str, xpath_sorting: &str) -> Self {
        self.formats.insert(
            encoding.to_string(),
            FieldQuery {
                xpath: xpath.to_string(),
                xpath_sorting: xpath_sorting.to_string(),
            },
        );
        self
    }
}

/// Definitions of one configuration scope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDefinitions {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Structure type → thumbnail structure type (`null` = use toplevel)
    #[serde(default)]
    pub structures: HashMap<String, Option<String>>,
}

/// In-memory registry implementing all lookup traits
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryRegistry {
    #[serde(default)]
    pub scopes: HashMap<ScopeId, ScopeDefinitions>,
    #[serde(default)]
    pub documents: Vec<DocumentRecord>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry from its JSON representation
    pub fn from_json(json: &str) -> DocumentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a registry from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> DocumentResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn with_field(mut self, scope: ScopeId, field: FieldSpec) -> Self {
        self.scopes.entry(scope).or_default().fields.push(field);
        self
    }

    pub fn with_structure(
        mut self,
        scope: ScopeId,
        structure_type: &str,
        thumbnail: Option<&str>,
    ) -> Self {
        self.scopes
            .entry(scope)
            .or_default()
            .structures
            .insert(structure_type.to_string(), thumbnail.map(str::to_string));
        self
    }

    pub fn with_document(mut self, record: DocumentRecord) -> Self {
        self.documents.push(record);
        self
    }
}

impl MetadataRegistry for InMemoryRegistry {
    fn field_definitions(&self, scope: ScopeId, encoding: &str) -> Vec<FieldDefinition> {
        let Some(definitions) = self.scopes.get(&scope) else {
            return Vec::new();
        };

        definitions
            .fields
            .iter()
            .filter_map(|field| {
                let query = field.formats.get(encoding)?;
                if query.xpath.is_empty() {
                    return None;
                }
                Some(FieldDefinition {
                    index_name: field.index_name.clone(),
                    xpath: query.xpath.clone(),
                    xpath_sorting: query.xpath_sorting.clone(),
                    sortable: field.sortable,
                    default_value: field.default_value.clone(),
                })
            })
            .collect()
    }

    fn default_only_definitions(&self, scope: ScopeId) -> Vec<FieldDefinition> {
        let Some(definitions) = self.scopes.get(&scope) else {
            return Vec::new();
        };

        definitions
            .fields
            .iter()
            .filter(|field| field.formats.is_empty() && !field.default_value.is_empty())
            .map(|field| FieldDefinition {
                index_name: field.index_name.clone(),
                xpath: String::new(),
                xpath_sorting: String::new(),
                sortable: field.sortable,
                default_value: field.default_value.clone(),
            })
            .collect()
    }
}

impl StructureRegistry for InMemoryRegistry {
    fn thumbnail_structure_type(&self, scope: ScopeId, structure_type: &str) -> Option<String> {
        self.scopes
            .get(&scope)?
            .structures
            .get(structure_type)
            .cloned()
            .flatten()
    }
}

impl RecordStore for InMemoryRegistry {
    fn document_record(&self, uid: u64) -> Option<DocumentRecord> {
        self.documents.iter().find(|record| record.uid == uid).cloned()
    }
}
