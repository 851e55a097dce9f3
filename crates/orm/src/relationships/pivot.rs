//! Join tables for `many:many` connections
//!
//! The join model is synthesized rather than declared: its key and table are
//! `"{first}_{second}"` where `first` is the dominant model, and its only
//! columns are the two models' keys.

use crate::definition::ModelDefinition;
use crate::error::{ModelError, ModelResult};

use super::types::{ConnectionInfo, ConnectionType};

const JOIN_COLUMN_TYPE: &str = "uuid";

/// `(first, second)` model keys in join-table order.
///
/// The side flagged `dominant` goes first. When neither side is flagged the
/// keys are ordered lexicographically so both ends agree on the name.
fn join_order<'a>(this_model: &'a str, info: &'a ConnectionInfo) -> (&'a str, &'a str) {
    let other_model = info.other_model.as_str();
    if info.dominant {
        (this_model, other_model)
    } else if info.other_attribute.is_dominant() || other_model < this_model {
        (other_model, this_model)
    } else {
        (this_model, other_model)
    }
}

/// Registry key (and table name) of the join model for a `many:many` edge
pub fn join_model_key(this_model: &str, info: &ConnectionInfo) -> String {
    let (first, second) = join_order(this_model, info);
    format!("{}_{}", first, second)
}

/// Synthesize the join model definition for a `many:many` edge.
pub fn join_definition(
    this_model: &str,
    info: &ConnectionInfo,
    site_only: bool,
) -> ModelResult<(String, ModelDefinition)> {
    if info.connection_type != ConnectionType::ManyToMany {
        return Err(ModelError::definition(
            this_model,
            &info.attribute.attr_name,
            format!("join table requested for a {} connection", info.connection_type),
        ));
    }

    if this_model == info.other_model {
        return Err(ModelError::definition(
            this_model,
            &info.attribute.attr_name,
            "many:many connections of a model with itself are not supported",
        ));
    }

    if info.dominant && info.other_attribute.is_dominant() {
        return Err(ModelError::definition(
            this_model,
            &info.attribute.attr_name,
            format!("both ends of the connection with '{}' are dominant", info.other_model),
        ));
    }

    let (first, second) = join_order(this_model, info);
    let key = format!("{}_{}", first, second);
    let definition = ModelDefinition::new(key.clone())
        .site_only(site_only)
        .attribute(first, JOIN_COLUMN_TYPE)
        .attribute(second, JOIN_COLUMN_TYPE)
        .without_timestamps();

    Ok((key, definition))
}
