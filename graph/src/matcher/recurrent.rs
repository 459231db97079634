//! Iterated matching of repeating cell patterns.

use std::collections::HashSet;

use indexmap::IndexMap;
use snafu::{OptionExt, ensure};

use crate::Output;
use crate::error::{CorrelatedBindingMismatchSnafu, NoBoundValuesSnafu, Result};

use super::{BindMap, Matcher};

/// Matches repeating chains such as stacked RNN cells.
///
/// One cell at a time is matched with a single-shot [`Matcher`]; the value
/// bound to `recurrent_output` becomes the root of the next cell's match.
/// Labels listed in `correlated` (shared weights, typically) are carried
/// into every subsequent cell's seed bindings and must bind identically in
/// all cells; a disagreement is an invariant violation, not a mismatch.
///
/// After a successful match every bound pattern output has one history
/// entry per cell, so all histories share the length
/// [`cell_count`](Self::cell_count).
pub struct RecurrentMatcher {
    initial_pattern: Output,
    pattern: Output,
    recurrent_output: Output,
    correlated: HashSet<Output>,
    history: IndexMap<Output, Vec<Output>>,
    match_root: Option<Output>,
}

impl RecurrentMatcher {
    /// Matcher where the first cell uses the same pattern as every other
    /// cell.
    pub fn new(pattern: Output, recurrent_output: Output, correlated: impl IntoIterator<Item = Output>) -> Self {
        Self::with_initial(pattern.clone(), pattern, recurrent_output, correlated)
    }

    /// Matcher with a distinct pattern for the first (outermost) cell.
    pub fn with_initial(
        initial_pattern: Output,
        pattern: Output,
        recurrent_output: Output,
        correlated: impl IntoIterator<Item = Output>,
    ) -> Self {
        Self {
            initial_pattern,
            pattern,
            recurrent_output,
            correlated: correlated.into_iter().collect(),
            history: IndexMap::new(),
            match_root: None,
        }
    }

    /// Peel cells off the chain rooted at `graph` until one fails to
    /// match. True if at least one cell matched.
    pub fn matches(&mut self, graph: &Output) -> Result<bool> {
        self.history.clear();
        self.match_root = Some(graph.clone());

        let mut initial = Matcher::new(self.initial_pattern.clone());
        let mut repeat = Matcher::new(self.pattern.clone());
        let mut carry = BindMap::new();
        let mut current = graph.clone();
        let mut matched = false;

        loop {
            let cell = if matched { &mut repeat } else { &mut initial };
            if !cell.matches_seeded(&current, &carry) {
                break;
            }
            matched = true;

            for (pattern_value, graph_value) in cell.bindings().iter() {
                self.history.entry(pattern_value.clone()).or_default().push(graph_value.clone());
            }

            for correlated in &self.correlated {
                if let Some(bound) = cell.bindings().get(correlated) {
                    if let Some(previous) = carry.get(correlated) {
                        ensure!(
                            previous == bound,
                            CorrelatedBindingMismatchSnafu {
                                label: correlated.to_string(),
                                previous: previous.to_string(),
                                current: bound.to_string(),
                            }
                        );
                    }
                    carry.insert(correlated.clone(), bound.clone());
                }
            }

            // Advance to the next cell down the chain. A cell that did not
            // bind the recurrent output ends the chain.
            match cell.bindings().get(&self.recurrent_output) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }

        if !matched {
            self.match_root = None;
        }
        Ok(matched)
    }

    /// Values bound to `pattern`, one per cell in match order.
    pub fn history_for(&self, pattern: &Output) -> Result<&[Output]> {
        self.history
            .get(pattern)
            .map(Vec::as_slice)
            .context(NoBoundValuesSnafu { pattern: pattern.to_string() })
    }

    /// Number of cells the last match peeled off.
    pub fn cell_count(&self) -> usize {
        self.history.first().map(|(_, values)| values.len()).unwrap_or(0)
    }

    /// Number of distinct pattern outputs that bound at least once.
    pub fn bound_label_count(&self) -> usize {
        self.history.len()
    }

    /// The chain root handed to the last successful match.
    pub fn match_root(&self) -> Option<&Output> {
        self.match_root.as_ref()
    }
}
