use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Hard failures of the matching engine.
///
/// Ordinary pattern mismatches are not errors; they are `false` returns.
/// Only invariant violations surface here.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// A correlated label bound to different values in different cells.
    #[snafu(display("correlated label {label} bound inconsistently across cells: {previous} vs {current}"))]
    CorrelatedBindingMismatch { label: String, previous: String, current: String },

    /// History was requested for a pattern output no cell ever bound.
    #[snafu(display("no bound values recorded for pattern output {pattern}"))]
    NoBoundValues { pattern: String },

    /// A unique-input query found more than one candidate.
    #[snafu(display("node {node} has more than one {op} input"))]
    AmbiguousUniqueInput { node: String, op: String },
}
