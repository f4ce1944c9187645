//! Stream algebra: labelled streams, graph operations and the ordered graph.
//!
//! A [`FilterGraph`] is the ordered list of operations handed to FFmpeg as
//! `-filter_complex`. Every operation consumes one or more labelled streams
//! and produces one or more new labels. The graph enforces the rules FFmpeg
//! relies on: a label is produced once, consumed at most once, and only after
//! the operation that produces it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::error::{GraphError, GraphResult};

/// Name of one stream in the graph.
///
/// Input streams are addressed FFmpeg style (`3:v`, `5:a`); every other label
/// is produced by an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamLabel(String);

impl StreamLabel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Video stream of input `index`.
    pub fn video_input(index: usize) -> Self {
        Self(format!("{}:v", index))
    }

    /// Audio stream of input `index`.
    pub fn audio_input(index: usize) -> Self {
        Self(format!("{}:a", index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this label addresses an input file rather than a filter output.
    pub fn is_input(&self) -> bool {
        self.0.contains(':')
    }

    /// Argument for `-map`.
    pub fn map_arg(&self) -> String {
        if self.is_input() {
            self.0.clone()
        } else {
            format!("[{}]", self.0)
        }
    }
}

impl fmt::Display for StreamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out labels for one primitive instance: `prefix`, `prefix_1`, `prefix_2`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labeler {
    prefix: String,
}

impl Labeler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn label(&self, index: usize) -> StreamLabel {
        if index == 0 {
            StreamLabel(self.prefix.clone())
        } else {
            StreamLabel(format!("{}_{}", self.prefix, index))
        }
    }
}

/// One graph operation: `[in..]expression[out..]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOp {
    pub inputs: Vec<StreamLabel>,
    pub expression: String,
    pub outputs: Vec<StreamLabel>,
}

impl FilterOp {
    pub fn new(
        inputs: Vec<StreamLabel>,
        expression: impl Into<String>,
        outputs: Vec<StreamLabel>,
    ) -> Self {
        Self {
            inputs,
            expression: expression.into(),
            outputs,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{}]", input)?;
        }
        write!(f, "{}", self.expression)?;
        for output in &self.outputs {
            write!(f, "[{}]", output)?;
        }
        Ok(())
    }
}

/// Result of compiling one primitive or combinator against a set of inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stage {
    pub ops: Vec<FilterOp>,
    pub outputs: Vec<StreamLabel>,
}

impl Stage {
    pub fn new(ops: Vec<FilterOp>, outputs: Vec<StreamLabel>) -> Self {
        Self { ops, outputs }
    }
}

/// Ordered, validated list of graph operations.
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    ops: Vec<FilterOp>,
    produced: HashSet<StreamLabel>,
    consumed: HashSet<StreamLabel>,
    stages: usize,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh label prefix for a new primitive instance.
    ///
    /// `base` must be alphabetic; the stage counter keeps prefixes distinct
    /// even when the same base is requested many times.
    pub fn labeler(&mut self, base: &str) -> Labeler {
        debug_assert!(base.chars().all(|c| c.is_ascii_alphabetic()));
        let labeler = Labeler::new(format!("{}{}", base, self.stages));
        self.stages += 1;
        labeler
    }

    /// Append one operation after checking label rules.
    pub fn push(&mut self, op: FilterOp) -> GraphResult<()> {
        if op.inputs.is_empty() {
            return Err(GraphError::NoInputs {
                primitive: "operation",
            });
        }
        if op.outputs.is_empty() {
            return Err(GraphError::NoOutputs);
        }

        for input in &op.inputs {
            if input.is_input() {
                continue;
            }
            if !self.produced.contains(input) {
                return Err(GraphError::UnknownLabel(input.to_string()));
            }
            if !self.consumed.insert(input.clone()) {
                return Err(GraphError::LabelReused(input.to_string()));
            }
        }

        for output in &op.outputs {
            if output.is_input() || !self.produced.insert(output.clone()) {
                return Err(GraphError::DuplicateLabel(output.to_string()));
            }
        }

        self.ops.push(op);
        Ok(())
    }

    /// Append every operation of a compiled stage and return its outputs.
    pub fn append(&mut self, stage: Stage) -> GraphResult<Vec<StreamLabel>> {
        for op in stage.ops {
            self.push(op)?;
        }
        Ok(stage.outputs)
    }

    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Render as a `-filter_complex` argument.
    pub fn render(&self) -> String {
        self.ops
            .iter()
            .map(|op| op.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Input labels the given stream ultimately depends on.
    pub fn trace_inputs(&self, label: &StreamLabel) -> BTreeSet<StreamLabel> {
        let producer: HashMap<&StreamLabel, &FilterOp> = self
            .ops
            .iter()
            .flat_map(|op| op.outputs.iter().map(move |out| (out, op)))
            .collect();

        let mut found = BTreeSet::new();
        let mut pending = vec![label];
        let mut seen = HashSet::new();

        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            if current.is_input() {
                found.insert(current.clone());
                continue;
            }
            if let Some(op) = producer.get(current) {
                pending.extend(op.inputs.iter());
            }
        }

        found
    }
}

/// Format a number for a filter expression without float noise.
pub(crate) fn num(value: f64) -> String {
    let rounded = (value * 1_000_000.0).round() / 1_000_000.0;
    if rounded == 0.0 {
        // Avoid "-0"
        return "0".to_string();
    }
    format!("{}", rounded)
}
