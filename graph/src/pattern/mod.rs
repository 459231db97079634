//! Pattern operator family.
//!
//! Patterns are DAGs built from ordinary graph nodes plus five pattern
//! operators, constructed through the factory functions below:
//!
//! - [`label`]: a named placeholder that captures the graph value it
//!   first matches and thereafter only accepts that same value
//! - [`any`]: matches any node accepted by a predicate, pairing its
//!   wrapped sub-patterns against the node's inputs
//! - [`any_of`]: matches a node when at least one of its inputs matches
//!   the single wrapped sub-pattern
//! - [`or`]: first-success disjunction over alternatives
//! - [`star`]: repeat marker, meaningful only to
//!   [`RecurrentMatcher`](crate::RecurrentMatcher)
//!
//! # Example
//!
//! ```
//! use weft_dtype::ElementType;
//! use weft_graph::{Matcher, Node, OpType, PartialShape, pattern};
//!
//! let x = Node::parameter(ElementType::Float32, PartialShape::scalar()).default_output();
//! let y = Node::parameter(ElementType::Float32, PartialShape::scalar()).default_output();
//! let sum = Node::binary(OpType::Add, x.clone(), y).default_output();
//!
//! let a = pattern::label("a");
//! let b = pattern::label("b");
//! let template = Node::binary(OpType::Add, a.clone(), b).default_output();
//!
//! let mut matcher = Matcher::new(template);
//! assert!(matcher.matches(&sum));
//! assert_eq!(matcher.bindings().get(&a), Some(&x));
//! ```

mod op;

use std::sync::Arc;

use smallvec::SmallVec;

use weft_dtype::ElementType;

use crate::shape::PartialShape;
use crate::{NodeKind, OpType, Output, OutputInfo};

pub use op::{PatternKind, PatternOp};

/// Predicate over a graph value. Every pattern node carries one; the
/// default accepts everything.
pub type Predicate = Arc<dyn Fn(&Output) -> bool + Send + Sync>;

/// The default predicate: accepts every value.
pub fn accept_all() -> Predicate {
    Arc::new(|_| true)
}

/// Predicate accepting values produced by an `op`-typed node.
pub fn has_op(op: OpType) -> Predicate {
    Arc::new(move |value: &Output| matches!(value.node().kind(), NodeKind::Op(kind) if *kind == op))
}

/// A named placeholder with dynamic type and shape, accepting any value.
pub fn label(name: impl Into<String>) -> Output {
    label_with(name, ElementType::Dynamic, PartialShape::dynamic(), accept_all(), Vec::new())
}

/// A named placeholder with a concrete element type and shape, which strict
/// mode will enforce on the bound value.
pub fn typed_label(name: impl Into<String>, element_type: ElementType, shape: PartialShape) -> Output {
    label_with(name, element_type, shape, accept_all(), Vec::new())
}

/// Fully general label: predicate-gated, optionally wrapping sub-patterns
/// that the bound value must additionally satisfy (first success wins).
pub fn label_with(
    name: impl Into<String>,
    element_type: ElementType,
    shape: PartialShape,
    predicate: Predicate,
    wrapped: Vec<Output>,
) -> Output {
    let kind = PatternKind::new(PatternOp::Label { name: name.into() }, predicate);
    crate::Node::pattern(kind, wrapped.into(), OutputInfo::new(element_type, shape)).default_output()
}

/// Matches any node accepted by `predicate` whose inputs pair against
/// `wrapped` under the usual argument-matching rules (arity must agree,
/// commutativity is honored).
pub fn any(predicate: Predicate, wrapped: Vec<Output>) -> Output {
    let kind = PatternKind::new(PatternOp::Any, predicate);
    crate::Node::pattern(kind, wrapped.into(), OutputInfo::dynamic()).default_output()
}

/// Matches any node accepted by `predicate` with at least one input
/// matching `wrapped`. Unlike [`any`] no full input pairing is required.
pub fn any_of(predicate: Predicate, wrapped: Output) -> Output {
    let kind = PatternKind::new(PatternOp::AnyOf, predicate);
    let inputs: SmallVec<[Output; 2]> = std::iter::once(wrapped).collect();
    crate::Node::pattern(kind, inputs, OutputInfo::dynamic()).default_output()
}

/// First-success disjunction: tries `alternatives` in declared order.
pub fn or(alternatives: Vec<Output>) -> Output {
    assert!(!alternatives.is_empty(), "Or requires at least one alternative");
    let kind = PatternKind::new(PatternOp::Or, accept_all());
    crate::Node::pattern(kind, alternatives.into(), OutputInfo::dynamic()).default_output()
}

/// Repeat marker for recurrent matching. A non-recurrent
/// [`Matcher`](crate::Matcher) encountering a star fails the match.
pub fn star(exits: Vec<Output>) -> Output {
    let kind = PatternKind::new(PatternOp::Star, accept_all());
    crate::Node::pattern(kind, exits.into(), OutputInfo::dynamic()).default_output()
}
