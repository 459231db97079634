//! Computation-graph value model and pattern matching.
//!
//! A graph is a DAG of [`Node`]s; every edge is an [`Output`] handle, the
//! pair of a producing node and an output index. Optimization passes
//! describe the subgraphs they want to fuse as pattern DAGs (see
//! [`pattern`]) and run a [`Matcher`] over candidate graph values to obtain
//! a binding from pattern placeholders to concrete values. Repeating
//! structures such as RNN chains are peeled cell by cell with a
//! [`RecurrentMatcher`].
//!
//! The matcher never mutates the graph: nodes are shared-immutable behind
//! `Arc`, and the only mutable state of a match (bind map and trail) is
//! owned by the matcher itself.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use smallvec::{SmallVec, smallvec};

pub use weft_dtype::ElementType;

pub mod config;
pub mod error;
pub mod matcher;
pub mod pattern;
pub mod shape;

#[cfg(test)]
pub mod test;

pub use config::MatchConfig;
pub use error::{Error, Result};
pub use matcher::{BindMap, Matcher, RecurrentMatcher};
pub use shape::{Dimension, PartialShape};

use pattern::PatternKind;

// Monotonic node ids. Never reused, so `(id, index)` identifies an output
// for the whole process lifetime even after the node is dropped.
static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_node_id() -> u64 {
    NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Operation carried by a concrete (non-pattern) graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    Parameter,
    Constant,

    Add,
    Sub,
    Mul,
    Div,
    Maximum,

    Negative,
    Relu,

    /// Single-output identity projection of one input value. The matcher
    /// optionally unwraps these during descent (`follow_projections`).
    Projection,
    /// Splits its input into several outputs along the first dimension.
    Split,
}

impl OpType {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Parameter => "Parameter",
            Self::Constant => "Constant",
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "Div",
            Self::Maximum => "Maximum",
            Self::Negative => "Negative",
            Self::Relu => "Relu",
            Self::Projection => "Projection",
            Self::Split => "Split",
        }
    }

    /// Whether operand order is semantically irrelevant.
    pub const fn is_commutative(&self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::Maximum)
    }

    pub const fn is_pass_through(&self) -> bool {
        matches!(self, Self::Projection)
    }
}

/// What a node is: a concrete operation or a pattern operator.
///
/// Pattern operators are ordinary nodes so that pattern DAGs and graphs
/// share one representation; the matcher dispatches on this tag.
#[derive(Clone)]
pub enum NodeKind {
    Op(OpType),
    Pattern(PatternKind),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Op(op) => op.name(),
            Self::Pattern(pattern) => pattern.variant_name(),
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Op(op) => f.debug_tuple("Op").field(op).finish(),
            Self::Pattern(pattern) => f.debug_tuple("Pattern").field(pattern).finish(),
        }
    }
}

/// Element type and shape of one node output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputInfo {
    pub element_type: ElementType,
    pub shape: PartialShape,
}

impl OutputInfo {
    pub fn new(element_type: ElementType, shape: PartialShape) -> Self {
        Self { element_type, shape }
    }

    /// Fully dynamic type and shape.
    pub fn dynamic() -> Self {
        Self { element_type: ElementType::Dynamic, shape: PartialShape::dynamic() }
    }
}

/// A node of the computation graph.
///
/// Nodes are immutable once constructed, except for the weak consumer list
/// that constructors of downstream nodes append to; that list exists only
/// for subgraph-containment queries and is never read during matching.
pub struct Node {
    id: u64,
    kind: NodeKind,
    name: String,
    inputs: SmallVec<[Output; 2]>,
    outputs: SmallVec<[OutputInfo; 1]>,
    users: RwLock<Vec<Weak<Node>>>,
}

impl Node {
    fn build(kind: NodeKind, inputs: SmallVec<[Output; 2]>, outputs: SmallVec<[OutputInfo; 1]>) -> Arc<Self> {
        let id = next_node_id();
        let name = format!("{}_{id}", kind.name());
        let node = Arc::new(Self { id, kind, name, inputs, outputs, users: RwLock::new(Vec::new()) });
        for input in node.inputs.iter() {
            input.node().users.write().push(Arc::downgrade(&node));
        }
        node
    }

    /// Create a graph input leaf.
    pub fn parameter(element_type: ElementType, shape: PartialShape) -> Arc<Self> {
        Self::build(NodeKind::Op(OpType::Parameter), smallvec![], smallvec![OutputInfo::new(element_type, shape)])
    }

    /// Create a constant leaf.
    pub fn constant(element_type: ElementType, shape: PartialShape) -> Arc<Self> {
        Self::build(NodeKind::Op(OpType::Constant), smallvec![], smallvec![OutputInfo::new(element_type, shape)])
    }

    /// Create an elementwise unary node. The output mirrors the input.
    pub fn unary(op: OpType, input: Output) -> Arc<Self> {
        let info = input.info().clone();
        Self::build(NodeKind::Op(op), smallvec![input], smallvec![info])
    }

    /// Create an elementwise binary node. The output takes the left-hand
    /// operand's type and shape; concrete type agreement is the graph
    /// builder's concern, not the matcher's.
    pub fn binary(op: OpType, lhs: Output, rhs: Output) -> Arc<Self> {
        let info = lhs.info().clone();
        Self::build(NodeKind::Op(op), smallvec![lhs, rhs], smallvec![info])
    }

    /// Create an identity projection of `input`.
    pub fn projection(input: Output) -> Arc<Self> {
        let info = input.info().clone();
        Self::build(NodeKind::Op(OpType::Projection), smallvec![input], smallvec![info])
    }

    /// Split `input` into `parts` outputs along the first dimension.
    ///
    /// When the first dimension is static and divisible by `parts` each
    /// output carries the divided extent; otherwise the output shapes are
    /// dynamic.
    pub fn split(input: Output, parts: usize) -> Arc<Self> {
        assert!(parts > 0, "Split requires at least one output");
        let element_type = input.element_type();
        let part_shape = input.partial_shape().split_first_dim(parts).unwrap_or_else(PartialShape::dynamic);
        let outputs = (0..parts).map(|_| OutputInfo::new(element_type, part_shape.clone())).collect();
        Self::build(NodeKind::Op(OpType::Split), smallvec![input], outputs)
    }

    pub(crate) fn pattern(
        kind: PatternKind,
        inputs: SmallVec<[Output; 2]>,
        info: OutputInfo,
    ) -> Arc<Self> {
        Self::build(NodeKind::Pattern(kind), inputs, smallvec![info])
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Diagnostic name, unique per node (`"Add_17"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[Output] {
        &self.inputs
    }

    pub fn input(&self, index: usize) -> Output {
        self.inputs[index].clone()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn output_info(&self, index: usize) -> &OutputInfo {
        &self.outputs[index]
    }

    /// Handle to the `index`-th output of this node.
    pub fn output(self: &Arc<Self>, index: usize) -> Output {
        assert!(index < self.outputs.len(), "output index {index} out of range for {self}");
        Output { node: self.clone(), index }
    }

    /// Handle to the single/first output.
    pub fn default_output(self: &Arc<Self>) -> Output {
        self.output(0)
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self.kind, NodeKind::Pattern(_))
    }

    pub fn is_commutative(&self) -> bool {
        matches!(&self.kind, NodeKind::Op(op) if op.is_commutative())
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(&self.kind, NodeKind::Op(op) if op.is_pass_through())
    }

    /// Live consumers of any output of this node.
    pub fn users(&self) -> Vec<Arc<Node>> {
        self.users.read().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn has_users(&self) -> bool {
        self.users.read().iter().any(|user| user.strong_count() > 0)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs.iter().map(Output::to_string).collect::<Vec<_>>())
            .finish()
    }
}

/// Handle designating one output of a graph node.
///
/// Equality, ordering and hashing are structural: same node identity and
/// same output index. Ordering follows node creation order, which is what
/// makes commutative permutation enumeration reproducible.
#[derive(Clone)]
pub struct Output {
    node: Arc<Node>,
    index: usize,
}

impl Output {
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn info(&self) -> &OutputInfo {
        self.node.output_info(self.index)
    }

    pub fn element_type(&self) -> ElementType {
        self.info().element_type
    }

    pub fn partial_shape(&self) -> &PartialShape {
        &self.info().shape
    }

    fn key(&self) -> (u64, usize) {
        (self.node.id, self.index)
    }
}

impl PartialEq for Output {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Output {}

impl PartialOrd for Output {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Output {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl std::hash::Hash for Output {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.node, self.index)
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Output({self})")
    }
}

/// Values produced inside `nodes` but consumed outside of it.
///
/// A node is reported at most once. Nodes in `exclusions` are never
/// reported. With `ignore_unused`, an outside consumer that itself has no
/// consumers does not count.
pub fn subgraph_outputs(nodes: &[Arc<Node>], exclusions: &[Arc<Node>], ignore_unused: bool) -> Vec<Arc<Node>> {
    let inside: HashSet<u64> = nodes.iter().map(|node| node.id).collect();
    let excluded: HashSet<u64> = exclusions.iter().map(|node| node.id).collect();

    let mut outputs: Vec<Arc<Node>> = Vec::new();
    for node in nodes {
        if excluded.contains(&node.id) || outputs.iter().any(|seen| seen.id == node.id) {
            continue;
        }
        let escapes = node
            .users()
            .iter()
            .any(|user| !inside.contains(&user.id) && (!ignore_unused || user.has_users()));
        if escapes {
            outputs.push(node.clone());
        }
    }
    outputs
}
