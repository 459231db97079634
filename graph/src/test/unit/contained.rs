use weft_dtype::ElementType;

use crate::error::Error;
use crate::shape::PartialShape;
use crate::{Matcher, Node, OpType, Output, pattern, subgraph_outputs};

fn param() -> Output {
    Node::parameter(ElementType::Float32, PartialShape::scalar()).default_output()
}

fn binary(op: OpType, lhs: &Output, rhs: &Output) -> Output {
    Node::binary(op, lhs.clone(), rhs.clone()).default_output()
}

fn fused_template() -> Output {
    binary(
        OpType::Add,
        &binary(OpType::Mul, &pattern::label("p"), &pattern::label("q")),
        &pattern::label("c"),
    )
}

#[test]
fn single_escaping_value_is_contained() {
    let (x, y, z) = (param(), param(), param());
    let mul = binary(OpType::Mul, &x, &y);
    let graph = binary(OpType::Add, &mul, &z);
    // Keep the root alive downstream, as a consumed graph would.
    let _sink = Node::unary(OpType::Relu, graph.clone());
    let _sink_user = Node::unary(OpType::Relu, _sink.default_output());

    let mut matcher = Matcher::new(fused_template());
    assert!(matcher.matches(&graph));
    assert!(matcher.is_contained_match(&[], false));
}

#[test]
fn interior_value_used_outside_breaks_containment() {
    let (x, y, z) = (param(), param(), param());
    let mul = binary(OpType::Mul, &x, &y);
    let graph = binary(OpType::Add, &mul, &z);
    let _sink = Node::unary(OpType::Relu, graph.clone());
    let _sink_user = Node::unary(OpType::Relu, _sink.default_output());
    // Second consumer of the interior Mul, outside the match.
    let escape = Node::unary(OpType::Negative, mul.clone());
    let _escape_user = Node::unary(OpType::Relu, escape.default_output());

    let mut matcher = Matcher::new(fused_template());
    assert!(matcher.matches(&graph));
    assert!(!matcher.is_contained_match(&[], false));

    // Excluding the leaking node restores containment.
    assert!(matcher.is_contained_match(&[mul.node().clone()], false));

    // An unused escape route is forgiven when requested: drop the
    // consumer of the escaping Negative so it dangles.
    drop(_escape_user);
    assert!(matcher.is_contained_match(&[], true));
    assert!(!matcher.is_contained_match(&[], false));
}

#[test]
fn bound_leaf_labels_are_excluded_by_default() {
    // The shared parameter x is consumed by an unrelated node, but label
    // bindings do not count against containment.
    let (x, y) = (param(), param());
    let _elsewhere = Node::unary(OpType::Relu, x.clone());
    let _elsewhere_user = Node::unary(OpType::Relu, _elsewhere.default_output());
    let graph = binary(OpType::Add, &x, &y);
    let _sink = Node::unary(OpType::Relu, graph.clone());
    let _sink_user = Node::unary(OpType::Relu, _sink.default_output());

    let template = binary(OpType::Add, &pattern::label("a"), &pattern::label("b"));
    let mut matcher = Matcher::new(template);
    assert!(matcher.matches(&graph));
    assert!(matcher.is_contained_match(&[], false));
}

#[test]
fn subgraph_outputs_reports_each_node_once() {
    let (x, y) = (param(), param());
    let mul = binary(OpType::Mul, &x, &y);
    let consumer_one = Node::unary(OpType::Relu, mul.clone());
    let consumer_two = Node::unary(OpType::Negative, mul.clone());
    let _keep = (
        Node::unary(OpType::Relu, consumer_one.default_output()),
        Node::unary(OpType::Relu, consumer_two.default_output()),
    );

    let nodes = vec![mul.node().clone(), mul.node().clone()];
    let outputs = subgraph_outputs(&nodes, &[], false);
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].id(), mul.node().id());

    assert!(subgraph_outputs(&nodes, &[mul.node().clone()], false).is_empty());
}

#[test]
fn unique_input_finds_a_single_candidate() {
    let x = param();
    let konst = Node::constant(ElementType::Float32, PartialShape::scalar()).default_output();
    let add = binary(OpType::Add, &x, &konst);

    let found = Matcher::unique_input(add.node(), OpType::Constant).unwrap();
    assert_eq!(found, Some(konst));

    assert_eq!(Matcher::unique_input(add.node(), OpType::Relu).unwrap(), None);
}

#[test]
fn unique_input_with_two_candidates_is_a_hard_error() {
    let lhs = Node::constant(ElementType::Float32, PartialShape::scalar()).default_output();
    let rhs = Node::constant(ElementType::Float32, PartialShape::scalar()).default_output();
    let add = binary(OpType::Add, &lhs, &rhs);

    let result = Matcher::unique_input(add.node(), OpType::Constant);
    assert!(matches!(result, Err(Error::AmbiguousUniqueInput { .. })));
}
