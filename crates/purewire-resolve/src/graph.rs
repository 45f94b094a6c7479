//! Per-root resolution graph using `petgraph`.
//!
//! Nodes are resolved contracts, edges point from a consumer to the
//! dependency it receives. Edges are eager (constructed before the
//! consumer) or deferred (reachable only through a provider invoked later).
//! The graph supports checkpoints so the builder can discard a failed
//! constructor candidate without leaving stray nodes behind.

use std::collections::HashSet;
use std::fmt::{self, Write as _};

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::{EdgeFiltered, EdgeRef, IntoEdgeReferences};
use serde::Serialize;

use purewire_common::config::ShapeStrategy;
use purewire_common::types::SourceLocation;

use crate::merger::BindingId;
use crate::model::{Contract, Lifetime};
use crate::types::{Substitution, TypeRef};

/// When a dependency is constructed relative to its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Constructed before the consumer.
    Eager,
    /// Constructed when a provider is invoked.
    Deferred,
}

/// A dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    /// Eager or deferred.
    pub kind: EdgeKind,
    /// Position among the consumer's dependencies.
    pub position: usize,
    /// Parameter or variable receiving the value; empty for synthesized edges.
    pub site: String,
    /// Injection site.
    pub location: SourceLocation,
}

impl Edge {
    /// Creates an edge without a named site.
    #[must_use]
    pub fn synthesized(kind: EdgeKind, position: usize) -> Self {
        Self {
            kind,
            position,
            site: String::new(),
            location: SourceLocation::default(),
        }
    }
}

/// A construction block: the root's body or one provider invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockId(pub usize);

/// Where a node's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOrigin {
    /// A binding of the effective table.
    Binding {
        /// The binding.
        binding: BindingId,
        /// Marker substitution for generic bindings.
        #[serde(serialize_with = "serialize_display")]
        substitution: Substitution,
        /// Chosen constructor of a construct recipe.
        constructor: Option<usize>,
    },
    /// A synthesized collection, provider, task or tuple.
    Virtual {
        /// Synthesis strategy.
        strategy: ShapeStrategy,
        /// Argument types of a `Func` provider.
        provider_args: Vec<TypeRef>,
    },
    /// A value passed to a provider call.
    ProviderArgument {
        /// Block opened by the provider.
        block: BlockId,
        /// Argument position.
        index: usize,
    },
}

fn serialize_display<S: serde::Serializer>(
    value: &Substitution,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// A resolved contract in a root's graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionNode {
    /// The contract this node satisfies.
    pub contract: Contract,
    /// Block the node is constructed in.
    pub block: BlockId,
    /// Value source.
    pub origin: NodeOrigin,
    /// Effective lifetime.
    pub lifetime: Lifetime,
    /// Scope of a scoped node.
    pub scope: Option<String>,
    /// Whether the instance needs disposal.
    pub disposable: bool,
    /// Human-readable description for diagnostics.
    pub label: String,
    /// Declaration site of the originating binding.
    pub location: SourceLocation,
}

impl ResolutionNode {
    /// The originating binding, if any.
    #[must_use]
    pub const fn binding(&self) -> Option<BindingId> {
        match &self.origin {
            NodeOrigin::Binding { binding, .. } => Some(*binding),
            _ => None,
        }
    }
}

/// Position in the node and edge logs that can be restored later.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    nodes: usize,
    edges: usize,
}

/// The dependency graph of one composition root.
#[derive(Debug, Clone)]
pub struct ResolutionGraph {
    graph: StableGraph<ResolutionNode, Edge>,
    root: Option<NodeIndex>,
    blocks: usize,
    node_log: Vec<NodeIndex>,
    edge_log: Vec<EdgeIndex>,
}

impl ResolutionGraph {
    /// Creates an empty graph whose first block is the root body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            root: None,
            blocks: 1,
            node_log: Vec::new(),
            edge_log: Vec::new(),
        }
    }

    /// The block of the root body.
    #[must_use]
    pub const fn root_block() -> BlockId {
        BlockId(0)
    }

    /// Allocates a new provider block.
    pub fn new_block(&mut self) -> BlockId {
        let block = BlockId(self.blocks);
        self.blocks += 1;
        block
    }

    /// Adds a node.
    pub fn add_node(&mut self, node: ResolutionNode) -> NodeIndex {
        let index = self.graph.add_node(node);
        self.node_log.push(index);
        index
    }

    /// Adds an edge from `consumer` to `dependency`.
    pub fn add_edge(&mut self, consumer: NodeIndex, dependency: NodeIndex, edge: Edge) {
        let index = self.graph.add_edge(consumer, dependency, edge);
        self.edge_log.push(index);
    }

    /// Marks the root node.
    pub fn set_root(&mut self, root: NodeIndex) {
        self.root = Some(root);
    }

    /// The root node, if the root contract resolved.
    #[must_use]
    pub const fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    /// Returns a node.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> &ResolutionNode {
        &self.graph[index]
    }

    /// Returns a node for update.
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut ResolutionNode {
        &mut self.graph[index]
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All node indices.
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Dependencies of `index` in position order.
    #[must_use]
    pub fn dependencies(&self, index: NodeIndex) -> Vec<(NodeIndex, &Edge)> {
        let mut children: Vec<(NodeIndex, &Edge)> = self
            .graph
            .edges(index)
            .map(|e| (e.target(), e.weight()))
            .collect();
        children.sort_by_key(|(_, edge)| edge.position);
        children
    }

    /// Captures the current state for a later [`Self::rollback`].
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            nodes: self.node_log.len(),
            edges: self.edge_log.len(),
        }
    }

    /// Removes every node and edge added since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        for edge in self.edge_log.drain(checkpoint.edges..).rev() {
            let _ = self.graph.remove_edge(edge);
        }
        for node in self.node_log.drain(checkpoint.nodes..).rev() {
            let _ = self.graph.remove_node(node);
            if self.root == Some(node) {
                self.root = None;
            }
        }
    }

    /// Returns `true` if eager edges alone form a cycle.
    #[must_use]
    pub fn has_eager_cycle(&self) -> bool {
        let eager = EdgeFiltered::from_fn(&self.graph, |e| e.weight().kind == EdgeKind::Eager);
        petgraph::algo::is_cyclic_directed(&eager)
    }

    /// Returns `true` if `index` eagerly depends on itself.
    #[must_use]
    pub fn has_self_loop(&self, index: NodeIndex) -> bool {
        self.graph
            .edges(index)
            .any(|e| e.target() == index && e.weight().kind == EdgeKind::Eager)
    }

    /// The underlying `petgraph` graph.
    #[must_use]
    pub const fn petgraph(&self) -> &StableGraph<ResolutionNode, Edge> {
        &self.graph
    }

    /// Renders the graph as an indented tree starting at the root.
    ///
    /// Deferred edges are drawn with `~>`; nodes already printed are
    /// referenced by index instead of being expanded again.
    #[must_use]
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root {
            let mut printed = HashSet::new();
            self.render_node(root, 0, "", &mut printed, &mut out);
        }
        out
    }

    fn render_node(
        &self,
        index: NodeIndex,
        depth: usize,
        arrow: &str,
        printed: &mut HashSet<NodeIndex>,
        out: &mut String,
    ) {
        let node = &self.graph[index];
        let indent = "  ".repeat(depth);
        if !printed.insert(index) {
            let _ = writeln!(out, "{indent}{arrow}{} (see #{})", node.contract, index.index());
            return;
        }
        let _ = writeln!(
            out,
            "{indent}{arrow}#{} {} [{}] {}",
            index.index(),
            node.contract,
            node.lifetime,
            node.label
        );
        for (child, edge) in self.dependencies(index) {
            let arrow = match edge.kind {
                EdgeKind::Eager => "-> ",
                EdgeKind::Deferred => "~> ",
            };
            self.render_node(child, depth + 1, arrow, printed, out);
        }
    }

    /// A serializable snapshot of nodes and edges.
    #[must_use]
    pub fn view(&self) -> GraphView<'_> {
        GraphView {
            root: self.root.map(NodeIndex::index),
            nodes: self
                .graph
                .node_indices()
                .map(|i| NodeView {
                    id: i.index(),
                    node: &self.graph[i],
                })
                .collect(),
            edges: self
                .graph
                .edge_references()
                .map(|e| EdgeView {
                    from: e.source().index(),
                    to: e.target().index(),
                    edge: e.weight(),
                })
                .collect(),
        }
    }
}

impl Default for ResolutionGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResolutionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_tree())
    }
}

/// Serializable view of a [`ResolutionGraph`].
#[derive(Debug, Serialize)]
pub struct GraphView<'a> {
    /// Root node id.
    pub root: Option<usize>,
    /// Nodes with their ids.
    pub nodes: Vec<NodeView<'a>>,
    /// Edges by node id.
    pub edges: Vec<EdgeView<'a>>,
}

/// A node in a [`GraphView`].
#[derive(Debug, Serialize)]
pub struct NodeView<'a> {
    /// Node id.
    pub id: usize,
    /// Node payload.
    #[serde(flatten)]
    pub node: &'a ResolutionNode,
}

/// An edge in a [`GraphView`].
#[derive(Debug, Serialize)]
pub struct EdgeView<'a> {
    /// Consumer id.
    pub from: usize,
    /// Dependency id.
    pub to: usize,
    /// Edge payload.
    #[serde(flatten)]
    pub edge: &'a Edge,
}
