//! Pattern operator variants and their matching behavior.

use std::fmt;

use crate::Output;
use crate::matcher::Matcher;

use super::Predicate;

/// The five pattern operators, a closed set so the matcher's dispatch is
/// exhaustively checked.
#[derive(Clone)]
pub enum PatternOp {
    /// Named placeholder capturing a graph value.
    Label { name: String },
    /// Predicate-gated node with full input pairing.
    Any,
    /// Predicate-gated node satisfied by a single matching input.
    AnyOf,
    /// Ordered disjunction over wrapped alternatives.
    Or,
    /// Repeat marker for recurrent matching.
    Star,
}

/// A pattern operator together with its value predicate. This is what a
/// pattern node carries as its [`NodeKind`](crate::NodeKind).
#[derive(Clone)]
pub struct PatternKind {
    op: PatternOp,
    predicate: Predicate,
}

impl PatternKind {
    pub(crate) fn new(op: PatternOp, predicate: Predicate) -> Self {
        Self { op, predicate }
    }

    pub fn op(&self) -> &PatternOp {
        &self.op
    }

    pub fn variant_name(&self) -> &'static str {
        match self.op {
            PatternOp::Label { .. } => "Label",
            PatternOp::Any => "Any",
            PatternOp::AnyOf => "AnyOf",
            PatternOp::Or => "Or",
            PatternOp::Star => "Star",
        }
    }

    /// The user-facing label name, for labels.
    pub fn label_name(&self) -> Option<&str> {
        match &self.op {
            PatternOp::Label { name } => Some(name),
            _ => None,
        }
    }

    fn accepts(&self, value: &Output) -> bool {
        (self.predicate)(value)
    }

    /// Match `graph_value` against the pattern node behind `pattern_value`.
    ///
    /// Returns true with the matcher's bind map updated, or false with bind
    /// map and trail logically unchanged.
    pub(crate) fn match_value(&self, matcher: &mut Matcher, pattern_value: &Output, graph_value: &Output) -> bool {
        match &self.op {
            PatternOp::Label { .. } => self.match_label(matcher, pattern_value, graph_value),
            PatternOp::Any => self.accepts(graph_value) && matcher.match_arguments(pattern_value, graph_value),
            PatternOp::AnyOf => self.match_any_of(matcher, pattern_value, graph_value),
            PatternOp::Or => self.match_or(matcher, pattern_value, graph_value),
            PatternOp::Star => {
                tracing::debug!(pattern = %pattern_value, graph = %graph_value, "star outside a recurrent matcher never matches");
                false
            }
        }
    }

    /// First binding wins; later encounters of the same label only accept
    /// the already-bound value. A label wrapping sub-patterns binds only if
    /// one of them matches the same graph value.
    fn match_label(&self, matcher: &mut Matcher, pattern_value: &Output, graph_value: &Output) -> bool {
        if let Some(bound) = matcher.bindings().get(pattern_value) {
            return bound == graph_value;
        }
        if !self.accepts(graph_value) {
            tracing::debug!(pattern = %pattern_value, graph = %graph_value, "label predicate rejected value");
            return false;
        }

        let wrapped = pattern_value.node().inputs();
        if wrapped.is_empty() {
            matcher.bind(pattern_value.clone(), graph_value.clone());
            return true;
        }
        for sub_pattern in wrapped {
            matcher.snapshot();
            if matcher.match_value(sub_pattern, graph_value) {
                matcher.bind(pattern_value.clone(), graph_value.clone());
                matcher.commit();
                return true;
            }
            matcher.rollback();
        }
        false
    }

    fn match_any_of(&self, matcher: &mut Matcher, pattern_value: &Output, graph_value: &Output) -> bool {
        if !self.accepts(graph_value) {
            return false;
        }
        let wrapped = pattern_value.node().input(0);
        for input in graph_value.node().inputs() {
            matcher.snapshot();
            if matcher.match_value(&wrapped, input) {
                matcher.commit();
                return true;
            }
            matcher.rollback();
        }
        false
    }

    fn match_or(&self, matcher: &mut Matcher, pattern_value: &Output, graph_value: &Output) -> bool {
        if !self.accepts(graph_value) {
            return false;
        }
        for alternative in pattern_value.node().inputs() {
            matcher.snapshot();
            if matcher.match_value(alternative, graph_value) {
                matcher.commit();
                return true;
            }
            matcher.rollback();
        }
        false
    }
}

impl fmt::Debug for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            PatternOp::Label { name } => f.debug_struct("Label").field("name", name).finish(),
            _ => f.write_str(self.variant_name()),
        }
    }
}
