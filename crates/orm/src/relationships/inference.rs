//! Relationship Type Inference - classifying a field by looking at both ends
//!
//! The declaring side contributes the prefix (`model` ⇒ `1:`, `collection` ⇒
//! `many:`); the reciprocal attribute on the target model contributes the
//! suffix (`collection` ⇒ `many`, anything else ⇒ `1`).

use std::collections::BTreeMap;

use crate::attributes::{Attribute, AttributeSet, Multiplicity};
use crate::error::{ModelError, ModelResult};

use super::types::{ConnectionInfo, ConnectionType};

/// Classify `field` of `model`.
///
/// Returns `Ok(None)` for plain columns. A relation that cannot be
/// classified is a definition defect and fails immediately.
pub fn resolve_connection(
    model: &str,
    field: &str,
    models: &BTreeMap<String, AttributeSet>,
) -> ModelResult<Option<ConnectionInfo>> {
    let attribute = models
        .get(model)
        .and_then(|attrs| attrs.get(field))
        .ok_or_else(|| ModelError::definition(model, field, "unknown attribute"))?;

    let (multiplicity, target) = match (attribute.multiplicity(), attribute.target()) {
        (Some(multiplicity), Some(target)) => (multiplicity, target),
        _ => return Ok(None),
    };

    let other = models.get(target).ok_or_else(|| {
        ModelError::definition(model, field, format!("references unknown model '{}'", target))
    })?;

    let other_attribute = match multiplicity {
        Multiplicity::Collection => {
            let via = attribute.via().ok_or_else(|| {
                ModelError::definition(model, field, "collection is missing `via`")
            })?;
            other.get(via).ok_or_else(|| {
                ModelError::definition(
                    model,
                    field,
                    format!("reciprocal attribute '{}' not found on '{}'", via, target),
                )
            })?
        }
        Multiplicity::Single => find_reciprocal(model, field, other).ok_or_else(|| {
            ModelError::definition(
                model,
                field,
                format!("no attribute on '{}' points back at '{}'", target, model),
            )
        })?,
    };

    let reciprocal_is_collection = other_attribute.multiplicity() == Some(Multiplicity::Collection);
    let connection_type = match (multiplicity, reciprocal_is_collection) {
        (Multiplicity::Single, false) => ConnectionType::OneToOne,
        (Multiplicity::Single, true) => ConnectionType::OneToMany,
        (Multiplicity::Collection, false) => ConnectionType::ManyToOne,
        (Multiplicity::Collection, true) => ConnectionType::ManyToMany,
    };

    Ok(Some(ConnectionInfo {
        connection_type,
        dominant: attribute.is_dominant(),
        attribute: attribute.clone(),
        other_model: target.to_string(),
        other_attribute: other_attribute.clone(),
    }))
}

/// For a single-valued field: prefer a collection on the other model whose
/// `via` names this field, else any single pointer back at this model.
fn find_reciprocal<'a>(model: &str, field: &str, other: &'a AttributeSet) -> Option<&'a Attribute> {
    other
        .relations()
        .find(|attr| {
            attr.multiplicity() == Some(Multiplicity::Collection)
                && attr.target() == Some(model)
                && attr.via() == Some(field)
        })
        .or_else(|| {
            other.relations().find(|attr| {
                attr.multiplicity() == Some(Multiplicity::Single) && attr.target() == Some(model)
            })
        })
}
