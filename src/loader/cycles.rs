//! In-place cycle detection
//!
//! `$ref`, `allOf`, `anyOf`, `oneOf`, `not`, `extends` and schema
//! dependencies apply a subschema to the *same* instance. A cycle made only of
//! those edges would never terminate during validation, so it is reported as a
//! loading error. Cycles through `properties`, `items` and friends are fine:
//! each step descends into a smaller instance.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::debug;

use super::report::{IssueCode, LoadingIssue};
use crate::keyword::registry::keys;
use crate::schema::{Schema, SchemaArena, SchemaId, SchemaKeyword};

/// Subschemas applied to the same instance, with the keyword that applies them
fn in_place_edges(schema: &Schema) -> Vec<(&'static str, SchemaId)> {
    let mut edges = Vec::new();
    for (keyword, value) in schema.keywords() {
        match (keyword.key, value) {
            (keys::REF | keys::NOT, SchemaKeyword::SingleSchema(id)) => edges.push((keyword.key, *id)),
            (keys::ALL_OF | keys::ANY_OF | keys::ONE_OF | keys::EXTENDS, SchemaKeyword::SchemaList(ids)) => {
                edges.extend(ids.iter().map(|id| (keyword.key, *id)));
            }
            (keys::DEPENDENCIES, SchemaKeyword::DependenciesValue(deps)) => {
                edges.extend(deps.schemas.values().map(|id| (keyword.key, *id)));
            }
            _ => {}
        }
    }
    edges
}

/// One `schema.cycle` issue per strongly connected component of in-place edges
pub(crate) fn find_cycles(arena: &SchemaArena) -> Vec<LoadingIssue> {
    let mut graph: DiGraph<SchemaId, &'static str> = DiGraph::with_capacity(arena.len(), arena.len());
    let nodes: Vec<NodeIndex> = (0..arena.len()).map(|i| graph.add_node(SchemaId(i))).collect();

    for (index, from) in nodes.iter().enumerate() {
        let Some(schema) = arena.get(SchemaId(index)) else {
            continue;
        };
        for (keyword, target) in in_place_edges(schema) {
            if let Some(to) = nodes.get(target.index()) {
                graph.add_edge(*from, *to, keyword);
            }
        }
    }

    let mut issues = Vec::new();
    for scc in kosaraju_scc(&graph) {
        let is_cycle = scc.len() > 1
            || graph
                .edges_directed(scc[0], Direction::Outgoing)
                .any(|e| e.target() == scc[0]);
        if !is_cycle {
            continue;
        }

        let mut members: Vec<SchemaId> = scc.iter().filter_map(|idx| graph.node_weight(*idx).copied()).collect();
        members.sort();
        let locations: Vec<String> = members
            .iter()
            .filter_map(|id| arena.location(*id))
            .map(ToString::to_string)
            .collect();
        debug!(members = ?locations, "In-place schema cycle");

        let Some(first) = locations.first() else {
            continue;
        };
        issues.push(
            LoadingIssue::new(
                IssueCode::SchemaCycle,
                first.clone(),
                format!(
                    "schemas apply each other to the same instance without end: {}",
                    locations.join(" -> ")
                ),
            )
            .with_argument(locations.clone()),
        );
    }
    issues
}
