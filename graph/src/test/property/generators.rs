//! Proptest strategies for random operator trees.

use proptest::prelude::*;

use weft_dtype::ElementType;

use crate::shape::PartialShape;
use crate::{Node, OpType, Output};

/// Binary operators, commutative and not.
pub fn arb_binary_op() -> impl Strategy<Value = OpType> {
    prop_oneof![
        Just(OpType::Add),
        Just(OpType::Mul),
        Just(OpType::Maximum),
        Just(OpType::Sub),
        Just(OpType::Div),
    ]
}

/// A fresh float parameter leaf.
fn arb_leaf() -> impl Strategy<Value = Output> {
    any::<bool>().prop_map(|_| Node::parameter(ElementType::Float32, PartialShape::fixed(&[4])).default_output())
}

/// Random binary operator tree, up to three levels deep.
pub fn arb_tree() -> impl Strategy<Value = Output> {
    arb_leaf().prop_recursive(3, 24, 2, |inner| {
        (arb_binary_op(), inner.clone(), inner)
            .prop_map(|(op, lhs, rhs)| Node::binary(op, lhs, rhs).default_output())
    })
}
