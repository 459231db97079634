//! Single-shot and recurrent graph matchers.
//!
//! [`Matcher`] descends in lockstep over a pattern DAG and a graph,
//! delegating to pattern operators where the pattern node is one (see
//! [`pattern`](crate::pattern)) and otherwise requiring node-type equality
//! plus a full pairing of inputs. Backtracking is watermark-based: every
//! descent frame records the trail length and truncates back to it on
//! failure, and every speculative branch brackets the bind map with a
//! snapshot. Nothing unwinds.

mod bind;
mod recurrent;

use std::sync::Arc;

use crate::config::MatchConfig;
use crate::error::{AmbiguousUniqueInputSnafu, Result};
use crate::{Node, NodeKind, OpType, Output, subgraph_outputs};
use indexmap::IndexMap;
use snafu::ensure;

pub use bind::BindMap;
pub use recurrent::RecurrentMatcher;

/// Matches a pattern DAG against graph values.
///
/// A matcher is reusable: every call to [`matches`](Self::matches) resets
/// the transient state (bind map, trail, match root). It is not meant for
/// concurrent use; run one matcher per thread over the shared immutable
/// graph instead.
///
/// # Example
///
/// ```
/// use weft_dtype::ElementType;
/// use weft_graph::{Matcher, Node, OpType, PartialShape, pattern};
///
/// let x = Node::parameter(ElementType::Float32, PartialShape::scalar()).default_output();
/// let y = Node::parameter(ElementType::Float32, PartialShape::scalar()).default_output();
/// let graph = Node::binary(OpType::Mul, x, y).default_output();
///
/// let factor = pattern::label("factor");
/// let template = Node::binary(OpType::Mul, factor, pattern::label("other")).default_output();
///
/// let mut matcher = Matcher::new(template).named("mul-fusion");
/// assert!(matcher.matches(&graph));
/// assert_eq!(matcher.match_root(), Some(&graph));
/// ```
pub struct Matcher {
    pattern: Output,
    name: String,
    strict: bool,
    follow_projections: bool,
    config: MatchConfig,

    bindings: BindMap,
    trail: Vec<Output>,
    marks: Vec<usize>,
    match_root: Option<Output>,
    depth: usize,
}

impl Matcher {
    /// Matcher over `pattern`, lenient mode, default configuration.
    pub fn new(pattern: Output) -> Self {
        Self {
            pattern,
            name: "unnamed".to_string(),
            strict: false,
            follow_projections: false,
            config: MatchConfig::global().clone(),
            bindings: BindMap::new(),
            trail: Vec::new(),
            marks: Vec::new(),
            match_root: None,
            depth: 0,
        }
    }

    /// Name used in diagnostics.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Strict mode: every pattern/graph pairing must also agree on element
    /// type and partial shape (up to compatibility).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Transparently unwrap single-output identity projections on either
    /// side during descent.
    pub fn follow_projections(mut self, follow: bool) -> Self {
        self.follow_projections = follow;
        self
    }

    /// Override the environment-derived configuration (test hook for the
    /// abort pattern).
    pub fn with_config(mut self, config: MatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Try to match the pattern against `graph_value`.
    pub fn matches(&mut self, graph_value: &Output) -> bool {
        self.matches_seeded(graph_value, &BindMap::new())
    }

    /// As [`matches`](Self::matches), with the bind map pre-populated from
    /// `seed`. Labels present in the seed only accept their seeded values.
    pub fn matches_seeded(&mut self, graph_value: &Output, seed: &BindMap) -> bool {
        self.match_root = None;
        self.trail.clear();
        self.marks.clear();
        self.bindings = seed.clone();

        tracing::trace!(matcher = %self.name, graph = %graph_value, "match attempt");
        let pattern = self.pattern.clone();
        let matched = self.match_value(&pattern, graph_value);
        if matched {
            self.match_root = Some(graph_value.clone());
        }
        matched
    }

    /// Match one pattern value against one graph value.
    ///
    /// This is the single entry point pattern operators recurse through;
    /// it owns the projection unwrap, the output-index and strict-mode
    /// gates, the abort probe, and the trail watermark for this frame.
    pub fn match_value(&mut self, pattern_value: &Output, graph_value: &Output) -> bool {
        let pattern_value = self.resolve_projection(pattern_value);
        let graph_value = self.resolve_projection(graph_value);

        if pattern_value.index() != graph_value.index() {
            tracing::debug!(matcher = %self.name, pattern = %pattern_value, graph = %graph_value, "output index mismatch");
            return false;
        }
        if self.strict && !self.compatible(&pattern_value, &graph_value) {
            tracing::debug!(matcher = %self.name, pattern = %pattern_value, graph = %graph_value, "strict mode: type or shape mismatch");
            return false;
        }
        if self.config.should_abort_at(graph_value.node().name()) {
            tracing::debug!(matcher = %self.name, pattern = %pattern_value, graph = %graph_value, "aborting: node name hit the abort pattern");
            return false;
        }

        let watermark = self.add_node(graph_value.clone());
        self.depth += 1;
        let matched = match pattern_value.node().kind() {
            NodeKind::Pattern(pattern) => pattern.match_value(self, &pattern_value, &graph_value),
            NodeKind::Op(op) => match graph_value.node().kind() {
                NodeKind::Op(graph_op) if graph_op == op => self.match_arguments(&pattern_value, &graph_value),
                _ => {
                    tracing::debug!(matcher = %self.name, pattern = %pattern_value, graph = %graph_value, depth = self.depth, "node type mismatch");
                    false
                }
            },
        };
        self.depth -= 1;
        self.abort_match(watermark, matched)
    }

    /// Pair the inputs of the pattern node against the inputs of the graph
    /// node. For commutative graph nodes, pattern inputs are permuted in
    /// lexicographic order starting from the sorted arrangement; the first
    /// succeeding permutation wins.
    pub fn match_arguments(&mut self, pattern_value: &Output, graph_value: &Output) -> bool {
        tracing::trace!(matcher = %self.name, pattern = %pattern_value, graph = %graph_value, depth = self.depth, "matching arguments");

        let graph_node = graph_value.node().clone();
        let args = graph_node.inputs();
        let mut pattern_args: Vec<Output> = pattern_value.node().inputs().to_vec();

        if args.len() != pattern_args.len() {
            tracing::debug!(matcher = %self.name, pattern = %pattern_value, graph = %graph_value, "arity mismatch");
            return false;
        }

        if graph_node.is_commutative() {
            pattern_args.sort();
            loop {
                self.snapshot();
                if self.match_permutation(&pattern_args, args) {
                    self.commit();
                    return true;
                }
                self.rollback();
                if !next_permutation(&mut pattern_args) {
                    break;
                }
            }
        } else {
            self.snapshot();
            if self.match_permutation(&pattern_args, args) {
                self.commit();
                return true;
            }
            self.rollback();
        }

        tracing::debug!(matcher = %self.name, pattern = %pattern_value, graph = %graph_value, "no argument pairing matched");
        false
    }

    fn match_permutation(&mut self, pattern_args: &[Output], args: &[Output]) -> bool {
        pattern_args.iter().zip(args.iter()).all(|(pattern, graph)| self.match_value(pattern, graph))
    }

    fn resolve_projection(&self, value: &Output) -> Output {
        if self.follow_projections && value.node().is_pass_through() { value.node().input(0) } else { value.clone() }
    }

    fn compatible(&self, pattern_value: &Output, graph_value: &Output) -> bool {
        pattern_value.element_type().compatible(&graph_value.element_type())
            && pattern_value.partial_shape().compatible(graph_value.partial_shape())
    }

    /// Append a graph value to the trail, returning the watermark for this
    /// frame.
    fn add_node(&mut self, value: Output) -> usize {
        let watermark = self.trail.len();
        self.trail.push(value);
        watermark
    }

    /// On failure, truncate the trail back to `watermark`.
    fn abort_match(&mut self, watermark: usize, matched: bool) -> bool {
        if !matched {
            self.trail.truncate(watermark);
        }
        matched
    }

    /// Record bind map state and trail length; pair with `commit` or
    /// `rollback`.
    pub(crate) fn snapshot(&mut self) {
        self.bindings.snapshot();
        self.marks.push(self.trail.len());
    }

    pub(crate) fn commit(&mut self) {
        self.bindings.commit();
        self.marks.pop();
    }

    pub(crate) fn rollback(&mut self) {
        self.bindings.rollback();
        if let Some(mark) = self.marks.pop() {
            self.trail.truncate(mark);
        }
    }

    pub(crate) fn bind(&mut self, pattern: Output, graph: Output) {
        self.bindings.insert(pattern, graph);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn pattern(&self) -> &Output {
        &self.pattern
    }

    /// Bindings of the most recent successful match, keyed by pattern
    /// output, in insertion order.
    pub fn bindings(&self) -> &BindMap {
        &self.bindings
    }

    /// Bindings projected onto label names.
    pub fn named_bindings(&self) -> IndexMap<String, Output> {
        self.bindings
            .iter()
            .filter_map(|(pattern, graph)| match pattern.node().kind() {
                NodeKind::Pattern(kind) => kind.label_name().map(|name| (name.to_string(), graph.clone())),
                NodeKind::Op(_) => None,
            })
            .collect()
    }

    /// Graph values visited by the most recent match, in DFS pre-order.
    pub fn matched_values(&self) -> &[Output] {
        &self.trail
    }

    /// The graph value the pattern root matched, if the last match
    /// succeeded.
    pub fn match_root(&self) -> Option<&Output> {
        self.match_root.as_ref()
    }

    pub fn match_root_node(&self) -> Option<Arc<Node>> {
        self.match_root.as_ref().map(|value| value.node().clone())
    }

    /// Whether the matched subgraph leaks at most one value to consumers
    /// outside of it, the usual precondition for replacing it.
    ///
    /// With empty `exclusions`, the values bound to leaf pattern outputs
    /// (labels) are excluded, since those are the subgraph's intended
    /// inputs.
    pub fn is_contained_match(&self, exclusions: &[Arc<Node>], ignore_unused: bool) -> bool {
        let matched: Vec<Arc<Node>> = self.trail.iter().map(|value| value.node().clone()).collect();
        if exclusions.is_empty() {
            let label_exclusions: Vec<Arc<Node>> = self
                .bindings
                .iter()
                .filter(|(pattern, _)| pattern.node().inputs().is_empty())
                .map(|(_, graph)| graph.node().clone())
                .collect();
            return subgraph_outputs(&matched, &label_exclusions, ignore_unused).len() < 2;
        }
        subgraph_outputs(&matched, exclusions, ignore_unused).len() < 2
    }

    /// The unique input of `node` produced by an `op`-typed node, if any.
    /// Two or more such inputs are an error.
    pub fn unique_input(node: &Arc<Node>, op: OpType) -> Result<Option<Output>> {
        let mut found: Option<Output> = None;
        for input in node.inputs() {
            if matches!(input.node().kind(), NodeKind::Op(kind) if *kind == op) {
                ensure!(
                    found.is_none(),
                    AmbiguousUniqueInputSnafu { node: node.name().to_string(), op: op.name().to_string() }
                );
                found = Some(input.clone());
            }
        }
        Ok(found)
    }
}

/// Advance `items` to the lexicographically next permutation; false once
/// the last permutation has been seen.
fn next_permutation<T: Ord>(items: &mut [T]) -> bool {
    if items.len() < 2 {
        return false;
    }
    let Some(pivot) = items.windows(2).rposition(|pair| pair[0] < pair[1]) else {
        return false;
    };
    let successor = items.iter().rposition(|item| item > &items[pivot]).unwrap_or(pivot + 1);
    items.swap(pivot, successor);
    items[pivot + 1..].reverse();
    true
}
