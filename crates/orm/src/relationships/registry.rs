//! Relationship Graph - every connection resolved once, read many times

use std::collections::BTreeMap;

use crate::attributes::AttributeSet;
use crate::error::ModelResult;

use super::inference::resolve_connection;
use super::types::ConnectionInfo;

/// Read-only map of model key -> relation field -> connection
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    edges: BTreeMap<String, BTreeMap<String, ConnectionInfo>>,
}

impl RelationshipGraph {
    /// Resolve every relation attribute of every model.
    ///
    /// Fails on the first relation that cannot be classified.
    pub fn build(models: &BTreeMap<String, AttributeSet>) -> ModelResult<Self> {
        let mut edges = BTreeMap::new();

        for (model, attributes) in models {
            let mut fields = BTreeMap::new();
            for attribute in attributes.relations() {
                if let Some(info) = resolve_connection(model, &attribute.attr_name, models)? {
                    tracing::debug!(
                        "Resolved {}.{} as {} with '{}'",
                        model,
                        attribute.attr_name,
                        info.connection_type,
                        info.other_model
                    );
                    fields.insert(attribute.attr_name.clone(), info);
                }
            }
            edges.insert(model.clone(), fields);
        }

        Ok(Self { edges })
    }

    pub fn connection(&self, model: &str, field: &str) -> Option<&ConnectionInfo> {
        self.edges.get(model).and_then(|fields| fields.get(field))
    }

    /// All resolved relation fields of a model
    pub fn connections(&self, model: &str) -> impl Iterator<Item = (&String, &ConnectionInfo)> {
        self.edges.get(model).into_iter().flat_map(|fields| fields.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeDescriptor, RawAttribute};
    use crate::relationships::ConnectionType;

    #[test]
    fn test_graph_resolves_all_relations() {
        let mut models = BTreeMap::new();
        let user: BTreeMap<String, RawAttribute> = [
            ("uuid".to_string(), "uuid".into()),
            ("posts".to_string(), AttributeDescriptor::collection("post", "author").into()),
        ]
        .into_iter()
        .collect();
        let post: BTreeMap<String, RawAttribute> = [
            ("uuid".to_string(), "uuid".into()),
            ("author".to_string(), AttributeDescriptor::model("user").into()),
        ]
        .into_iter()
        .collect();
        models.insert("user".to_string(), AttributeSet::normalize("user", &user).unwrap());
        models.insert("post".to_string(), AttributeSet::normalize("post", &post).unwrap());

        let graph = RelationshipGraph::build(&models).unwrap();
        assert_eq!(
            graph.connection("user", "posts").unwrap().connection_type,
            ConnectionType::ManyToOne
        );
        assert_eq!(
            graph.connection("post", "author").unwrap().connection_type,
            ConnectionType::OneToMany
        );
        assert!(graph.connection("post", "uuid").is_none());
        assert_eq!(graph.connections("user").count(), 1);
        assert_eq!(graph.connections("nobody").count(), 0);
    }
}
