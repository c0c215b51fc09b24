use itertools::Itertools;
use serde_json::Value;
use tracing::debug;

use crate::models::{ClassificationRecord, DisplayField, FieldValue, Taxonomy, TaxonomyField};

pub const RESOURCES_NAMESPACE: &str = "resources";

/// Merge taxonomy classifications and resource annotations into one list.
///
/// Classification records keep their namespace; resource records are tagged
/// `"resources"`. Nothing is deduplicated.
pub fn normalize(
    classifications: Vec<ClassificationRecord>,
    resources: Vec<ClassificationRecord>,
) -> Vec<ClassificationRecord> {
    let total = classifications.len() + resources.len();
    let mut out = Vec::with_capacity(total);
    out.extend(classifications);
    out.extend(resources.into_iter().map(|mut r| {
        r.namespace = RESOURCES_NAMESPACE.to_string();
        r
    }));
    debug!("Classifications normalized - records={}", out.len());
    out
}

/// Display string for a raw classification value.
pub fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::Bool(true) => "Yes".into(),
        FieldValue::Bool(false) => "No".into(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Text(s) => s.clone(),
        FieldValue::List(items) => items.iter().join(", "),
        FieldValue::Other(Value::Array(items)) if items.iter().all(is_scalar) => {
            items.iter().map(scalar_text).join(", ")
        }
        FieldValue::Other(v) => v.to_string(),
    }
}

fn is_scalar(v: &Value) -> bool {
    !matches!(v, Value::Array(_) | Value::Object(_))
}

// mixed lists read the way they were entered: no quotes, null as empty
fn scalar_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fields ordered by descending weight; equal weights keep their stored order.
pub fn sorted_fields(fields: &[TaxonomyField]) -> Vec<TaxonomyField> {
    fields
        .iter()
        .cloned()
        .sorted_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .collect()
}

/// Project one taxonomy's fields and an incident's classification values into
/// display rows.
///
/// `records` are the incident's classification records (any namespace). The
/// first record in the taxonomy's namespace is used; without one the result is
/// empty. Hidden fields and fields whose value is absent or formats to an empty
/// string are left out.
pub fn project_fields(records: &[&ClassificationRecord], taxonomy: &Taxonomy) -> Vec<DisplayField> {
    let Some(record) = records.iter().find(|r| r.namespace == taxonomy.namespace) else {
        return Vec::new();
    };

    sorted_fields(&taxonomy.field_list)
        .into_iter()
        .filter(TaxonomyField::is_public)
        .filter_map(|field| {
            let raw = record.field_values.get(&field.value_key())?;
            let value = format_value(raw);
            if value.is_empty() {
                return None;
            }
            Some(DisplayField {
                name: field.short_name,
                value,
                weight: field.weight,
                long_description: field.long_description,
                short_description: field.short_description,
                render_as: field.render_as,
            })
        })
        .collect()
}
