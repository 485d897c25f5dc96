//! Canonical metadata record
//!
//! Format-independent mapping of semantic field names to ordered value
//! sequences. An empty sequence means the field is absent; a record without
//! any fields is the neutral "no metadata" result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fields every populated record starts with
pub const CANONICAL_FIELDS: &[&str] = &[
    "title",
    "title_sorting",
    "description",
    "author",
    "holder",
    "place",
    "year",
    "prod_id",
    "record_id",
    "opac_id",
    "union_id",
    "urn",
    "purl",
    "type",
    "volume",
    "volume_sorting",
    "date",
    "license",
    "terms",
    "restrictions",
    "out_of_print",
    "rights_info",
    "collection",
    "owner",
    "mets_label",
    "mets_orderlabel",
];

/// Canonical metadata record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataRecord {
    fields: BTreeMap<String, Vec<String>>,
}

impl MetadataRecord {
    /// Record with all canonical fields present but empty
    pub fn new(document_format: &str) -> Self {
        let mut fields: BTreeMap<String, Vec<String>> = CANONICAL_FIELDS
            .iter()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        fields.insert(
            "document_format".to_string(),
            vec![document_format.to_string()],
        );
        Self { fields }
    }

    /// Name of the sortable variant of a field
    pub fn sorting_field(name: &str) -> String {
        format!("{}_sorting", name)
    }

    /// True for the neutral record (no fields at all)
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Values of a field (empty when absent)
    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field).first().map(String::as_str)
    }

    /// True when the field has no first value or the first value is empty
    pub fn is_blank(&self, field: &str) -> bool {
        self.first(field).map_or(true, str::is_empty)
    }

    pub fn title(&self) -> &[String] {
        self.get("title")
    }

    /// Replace all values of a field
    pub fn set(&mut self, field: &str, values: Vec<String>) {
        self.fields.insert(field.to_string(), values);
    }

    /// Append a value to a field
    pub fn push(&mut self, field: &str, value: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(value.into());
    }

    /// Overwrite (or create) the first value of a field
    pub fn set_first(&mut self, field: &str, value: impl Into<String>) {
        let values = self.fields.entry(field.to_string()).or_default();
        match values.first_mut() {
            Some(first) => *first = value.into(),
            None => values.push(value.into()),
        }
    }

    /// Insert a value in front of the existing ones
    pub fn prepend(&mut self, field: &str, value: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .insert(0, value.into());
    }

    pub fn contains_value(&self, field: &str, value: &str) -> bool {
        self.get(field).iter().any(|candidate| candidate == value)
    }

    /// All fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}
