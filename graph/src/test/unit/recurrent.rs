use weft_dtype::ElementType;

use crate::error::Error;
use crate::shape::PartialShape;
use crate::{Node, OpType, Output, RecurrentMatcher, pattern};

fn param() -> Output {
    Node::parameter(ElementType::Float32, PartialShape::fixed(&[2, 2])).default_output()
}

fn cell(weight: &Output, carry: &Output, input: &Output) -> Output {
    let scaled = Node::binary(OpType::Mul, weight.clone(), carry.clone()).default_output();
    Node::binary(OpType::Add, scaled, input.clone()).default_output()
}

/// Cell template `Add(Mul(w, h), x)` plus the three label handles.
fn cell_pattern() -> (Output, Output, Output, Output) {
    let w = pattern::label("w");
    let h = pattern::label("h");
    let x = pattern::label("x");
    let template = cell(&w, &h, &x);
    (template, w, h, x)
}

#[test]
fn peels_a_three_cell_chain() {
    let w = param();
    let h0 = param();
    let (x1, x2, x3) = (param(), param(), param());
    let c1 = cell(&w, &h0, &x1);
    let c2 = cell(&w, &c1, &x2);
    let c3 = cell(&w, &c2, &x3);

    let (template, w_label, h_label, x_label) = cell_pattern();
    let mut matcher = RecurrentMatcher::new(template, h_label.clone(), [w_label.clone()]);

    assert_eq!(matcher.matches(&c3), Ok(true));
    assert_eq!(matcher.cell_count(), 3);
    assert_eq!(matcher.bound_label_count(), 3);
    assert_eq!(matcher.match_root(), Some(&c3));

    // Cells are peeled from the chain root downwards.
    assert_eq!(matcher.history_for(&x_label).unwrap(), &[x3, x2, x1]);
    assert_eq!(matcher.history_for(&h_label).unwrap(), &[c2, c1, h0]);
    assert_eq!(matcher.history_for(&w_label).unwrap(), &[w.clone(), w.clone(), w]);
}

#[test]
fn unshared_weights_end_the_chain() {
    let (w1, w2) = (param(), param());
    let h0 = param();
    let (x1, x2) = (param(), param());
    let c1 = cell(&w1, &h0, &x1);
    let c2 = cell(&w2, &c1, &x2);

    let (template, w_label, h_label, _) = cell_pattern();
    let mut matcher = RecurrentMatcher::new(template, h_label, [w_label.clone()]);

    // The second cell cannot rebind the correlated weight, so only one
    // cell matches.
    assert_eq!(matcher.matches(&c2), Ok(true));
    assert_eq!(matcher.cell_count(), 1);
    assert_eq!(matcher.history_for(&w_label).unwrap(), &[w2]);
}

#[test]
fn uncorrelated_weights_may_differ_per_cell() {
    let (w1, w2) = (param(), param());
    let h0 = param();
    let (x1, x2) = (param(), param());
    let c1 = cell(&w1, &h0, &x1);
    let c2 = cell(&w2, &c1, &x2);

    let (template, w_label, h_label, _) = cell_pattern();
    let mut matcher = RecurrentMatcher::new(template, h_label, []);

    assert_eq!(matcher.matches(&c2), Ok(true));
    assert_eq!(matcher.cell_count(), 2);
    assert_eq!(matcher.history_for(&w_label).unwrap(), &[w2, w1]);
}

#[test]
fn no_cell_matching_reports_false() {
    let (x, y) = (param(), param());
    let graph = Node::binary(OpType::Sub, x, y).default_output();

    let (template, _, h_label, _) = cell_pattern();
    let mut matcher = RecurrentMatcher::new(template, h_label, []);

    assert_eq!(matcher.matches(&graph), Ok(false));
    assert_eq!(matcher.cell_count(), 0);
    assert_eq!(matcher.match_root(), None);
}

#[test]
fn history_for_an_unbound_output_is_a_hard_error() {
    let w = param();
    let h0 = param();
    let x1 = param();
    let c1 = cell(&w, &h0, &x1);

    let (template, _, h_label, _) = cell_pattern();
    let mut matcher = RecurrentMatcher::new(template, h_label, []);
    assert_eq!(matcher.matches(&c1), Ok(true));

    let stranger = pattern::label("stranger");
    assert!(matches!(matcher.history_for(&stranger), Err(Error::NoBoundValues { .. })));
}

#[test]
fn distinct_initial_pattern_applies_to_the_first_cell_only() {
    // First cell is gated through Relu, the rest are plain cells.
    let w = param();
    let h0 = param();
    let (x1, x2) = (param(), param());
    let c1 = cell(&w, &h0, &x1);
    let c2 = cell(&w, &c1, &x2);
    let gated = Node::unary(OpType::Relu, c2.clone()).default_output();

    let (template, w_label, h_label, _) = cell_pattern();
    let initial = Node::unary(OpType::Relu, template.clone()).default_output();

    let mut matcher =
        RecurrentMatcher::with_initial(initial, template.clone(), h_label.clone(), [w_label]);
    assert_eq!(matcher.matches(&gated), Ok(true));
    assert_eq!(matcher.cell_count(), 2);

    // The plain template alone does not accept the gated root.
    let mut plain = RecurrentMatcher::new(template, h_label, []);
    assert_eq!(plain.matches(&gated), Ok(false));
}
