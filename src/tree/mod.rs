//! Lazily populated result tree
//!
//! Nodes live in an arena owned by [`ResultTree`] and are addressed by
//! [`NodeId`]. The synthetic root is populated when the tree is created;
//! every other node queries the remote peer for its children the first time
//! they are asked for.

mod ordering;

pub use ordering::natural_cmp;

use std::cmp::Ordering;
use std::fmt::{self, Write};

use dicom_object::InMemDicomObject;
use dimse::MoveSummary;
use tracing::{debug, info, warn};

use crate::association::AssociationService;
use crate::attributes;
use crate::filter::Filter;
use crate::information_model::InformationModel;
use crate::model::{InformationEntity, ResponseRecord, UniqueKey, UniqueKeySet};
use crate::query_model::QueryModel;
use crate::{QrError, Result};

/// Index of a node inside its [`ResultTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Whether a node's children have been fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopulationState {
    #[default]
    NotPopulated,
    Populated,
    /// The query failed; the node is shown as a leaf and never queried again
    /// unless [`ResultTree::retry_population`] is called
    PopulationFailed,
}

/// One response in the tree, or the synthetic root
#[derive(Debug, Clone)]
pub struct TreeNode {
    record: Option<ResponseRecord>,
    entity: InformationEntity,
    unique_keys: UniqueKeySet,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    state: PopulationState,
}

impl TreeNode {
    fn root(entity: InformationEntity) -> Self {
        Self {
            record: None,
            entity,
            unique_keys: UniqueKeySet::new(),
            parent: None,
            children: Vec::new(),
            state: PopulationState::NotPopulated,
        }
    }

    pub fn is_root(&self) -> bool {
        self.record.is_none()
    }

    /// Level of this node; the model's root level for the synthetic root
    pub fn entity(&self) -> InformationEntity {
        self.entity
    }

    pub fn record(&self) -> Option<&ResponseRecord> {
        self.record.as_ref()
    }

    pub fn attributes(&self) -> Option<&InMemDicomObject> {
        self.record.as_ref().map(|r| &r.attributes)
    }

    pub fn label(&self) -> &str {
        self.record.as_ref().map_or("", |r| r.label.as_str())
    }

    /// Unique keys of this node and all its ancestors
    pub fn unique_keys(&self) -> &UniqueKeySet {
        &self.unique_keys
    }

    /// This node's own unique key value
    pub fn unique_key(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.unique_keys.get(self.entity)
    }

    pub fn child_count_hint(&self) -> Option<usize> {
        self.record.as_ref().and_then(|r| r.child_count_hint)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn state(&self) -> PopulationState {
        self.state
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.record {
            Some(record) => write!(f, "{}", record.label),
            None => write!(f, "{} query results", self.entity),
        }
    }
}

/// Sibling order: label first, own unique key as tiebreak
pub fn compare_nodes(a: &TreeNode, b: &TreeNode) -> Ordering {
    natural_cmp(a.label(), b.label())
        .then_with(|| a.unique_key().unwrap_or("").cmp(b.unique_key().unwrap_or("")))
}

/// Browsable result of a hierarchical query
pub struct ResultTree<'a, M, S: AssociationService> {
    query_model: &'a mut QueryModel<M, S>,
    filter: Filter,
    nodes: Vec<TreeNode>,
}

impl<'a, M: InformationModel, S: AssociationService> ResultTree<'a, M, S> {
    /// Create the synthetic root and fetch the first level below it
    pub fn new(query_model: &'a mut QueryModel<M, S>, filter: Filter) -> Self {
        let root = TreeNode::root(query_model.model().root_level());
        let mut tree = Self {
            query_model,
            filter,
            nodes: vec![root],
        };
        tree.populate_children(tree.root());
        tree
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Panics if `id` was not handed out by this tree
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn query_model(&self) -> &QueryModel<M, S> {
        &*self.query_model
    }

    pub fn query_model_mut(&mut self) -> &mut QueryModel<M, S> {
        &mut *self.query_model
    }

    /// Number of children of `id`.
    ///
    /// An unexpanded node with an inline hint reports the hint without
    /// querying; otherwise the children are fetched first.
    pub fn child_count(&mut self, id: NodeId) -> usize {
        let node = &self.nodes[id.0];
        match node.state {
            PopulationState::NotPopulated => {
                if let Some(hint) = node.child_count_hint() {
                    return hint;
                }
                self.populate_children(id);
                self.nodes[id.0].children.len()
            }
            PopulationState::Populated => node.children.len(),
            PopulationState::PopulationFailed => 0,
        }
    }

    /// The `index`-th child of `id` in sibling order
    pub fn child_at(&mut self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    /// All children of `id` in sibling order, fetching them if needed
    pub fn children(&mut self, id: NodeId) -> &[NodeId] {
        self.populate_children(id);
        &self.nodes[id.0].children
    }

    /// Fetch the children of `id` once.
    ///
    /// Query failures are logged and leave the node as a leaf; a response
    /// without a usable unique key is dropped on its own.
    pub fn populate_children(&mut self, id: NodeId) -> PopulationState {
        let node = &self.nodes[id.0];
        if node.state != PopulationState::NotPopulated {
            return node.state;
        }

        let model = self.query_model.model();
        let level = if node.is_root() {
            Some(model.root_level())
        } else {
            model.child_level(node.entity)
        };
        let Some(level) = level else {
            self.nodes[id.0].state = PopulationState::Populated;
            return PopulationState::Populated;
        };

        let ancestor_keys = node.unique_keys.clone();
        let mut responses = Vec::new();
        let outcome = self.query_model.query(
            &self.filter,
            &ancestor_keys,
            level,
            &mut |response| responses.push(response),
        );

        if let Err(e) = outcome {
            warn!(
                "Population of {} level below [{}] failed: {}",
                level, ancestor_keys, e
            );
            self.nodes[id.0].state = PopulationState::PopulationFailed;
            return PopulationState::PopulationFailed;
        }

        let received = responses.len();
        for response in responses {
            match self.new_child_node(id, level, response) {
                Ok(child) => {
                    self.add_child(id, child);
                }
                Err(e) => warn!("Dropping {} level response: {}", level, e),
            }
        }

        let node = &mut self.nodes[id.0];
        node.state = PopulationState::Populated;
        if let Some(hint) = node.child_count_hint() {
            if hint != node.children.len() {
                debug!(
                    "Peer announced {} children below [{}], received {}",
                    hint,
                    node.unique_keys,
                    node.children.len()
                );
            }
        }
        info!(
            "Populated {} level below [{}]: {} of {} responses kept",
            level,
            node.unique_keys,
            node.children.len(),
            received
        );
        PopulationState::Populated
    }

    /// Make a failed node eligible for population again.
    ///
    /// Returns false when the node had not failed.
    pub fn retry_population(&mut self, id: NodeId) -> bool {
        let node = &mut self.nodes[id.0];
        if node.state != PopulationState::PopulationFailed {
            return false;
        }
        debug!("Population of [{}] will be retried", node.unique_keys);
        node.state = PopulationState::NotPopulated;
        true
    }

    /// Turn one response at `entity` level into a detached node below `parent`
    pub fn new_child_node(
        &self,
        parent: NodeId,
        entity: InformationEntity,
        response: InMemDicomObject,
    ) -> Result<TreeNode> {
        let model = self.query_model.model();
        let tag = model.unique_key_tag(entity).ok_or_else(|| {
            QrError::configuration(format!("no unique key defined for {} level", entity))
        })?;
        let value = attributes::string_value(&response, tag).ok_or_else(|| {
            QrError::protocol(format!(
                "{} level response carries no value for unique key {}",
                entity, tag
            ))
        })?;
        let vr = attributes::declared_vr(tag).ok_or_else(|| {
            QrError::configuration(format!(
                "no value representation known for unique key {}",
                tag
            ))
        })?;

        let child_count_hint = model
            .child_count_hint_tag(entity)
            .and_then(|hint_tag| attributes::string_value(&response, hint_tag))
            .and_then(|text| text.parse::<usize>().ok());
        let label = model.render_label(entity, &response);

        let unique_keys = self.nodes[parent.0]
            .unique_keys
            .with(entity, UniqueKey { tag, vr, value });

        Ok(TreeNode {
            record: Some(ResponseRecord {
                entity,
                attributes: response,
                label,
                child_count_hint,
            }),
            entity,
            unique_keys,
            parent: Some(parent),
            children: Vec::new(),
            state: PopulationState::NotPopulated,
        })
    }

    /// Insert `node` among the children of `parent` at its sorted position
    pub fn add_child(&mut self, parent: NodeId, mut node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);

        let nodes = &self.nodes;
        let position = match nodes[parent.0]
            .children
            .binary_search_by(|sibling| compare_nodes(&nodes[sibling.0], &node))
        {
            Ok(equal) => equal + 1,
            Err(insert_at) => insert_at,
        };

        self.nodes.push(node);
        self.nodes[parent.0].children.insert(position, id);
        id
    }

    /// Insert `node` next to `sibling`, at its sorted position.
    ///
    /// The root has no siblings, so `None` is returned for it.
    pub fn add_sibling(&mut self, sibling: NodeId, node: TreeNode) -> Option<NodeId> {
        let parent = self.nodes[sibling.0].parent?;
        Some(self.add_child(parent, node))
    }

    pub fn compare(&self, a: NodeId, b: NodeId) -> Ordering {
        compare_nodes(&self.nodes[a.0], &self.nodes[b.0])
    }

    /// Retrieve the subtree rooted at `id` to `destination_aet`
    pub fn move_node(&mut self, id: NodeId, destination_aet: &str) -> Result<MoveSummary> {
        let keys = self.nodes[id.0].unique_keys.clone();
        self.query_model.perform_hierarchical_move(&keys, destination_aet)
    }

    /// Indented listing of the tree, expanding nodes down to `max_depth` levels
    pub fn render(&mut self, max_depth: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.nodes[0]);
        self.render_children(self.root(), 1, max_depth, &mut out);
        out
    }

    fn render_children(&mut self, id: NodeId, depth: usize, max_depth: usize, out: &mut String) {
        if depth > max_depth {
            return;
        }
        let children = self.children(id).to_vec();
        for child in children {
            let _ = writeln!(out, "{}{}", "  ".repeat(depth), self.nodes[child.0]);
            self.render_children(child, depth + 1, max_depth, out);
        }
        if self.nodes[id.0].state == PopulationState::PopulationFailed {
            let _ = writeln!(out, "{}(children unavailable)", "  ".repeat(depth));
        }
    }
}

impl<M, S: AssociationService> fmt::Debug for ResultTree<'_, M, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultTree")
            .field("filter", &self.filter)
            .field("nodes", &self.nodes)
            .finish()
    }
}
