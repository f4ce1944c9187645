//! Composition of primitives into stages.

use super::{Expression, Filter};
use crate::error::{GraphError, GraphResult};
use crate::graph::{FilterOp, Labeler, Stage, StreamLabel};

/// Fuse several per-stream expressions into one operation per input.
///
/// The expression for input `i` is every part's expression for `i`, joined
/// with `,` in order.
pub struct Combine {
    labels: Labeler,
    parts: Vec<Box<dyn Expression>>,
    first_index: usize,
}

impl Combine {
    pub fn new(labels: Labeler) -> Self {
        Self {
            labels,
            parts: Vec::new(),
            first_index: 0,
        }
    }

    /// Append a primitive.
    pub fn with(mut self, part: impl Expression + 'static) -> Self {
        self.parts.push(Box::new(part));
        self
    }

    /// Append a primitive only when present.
    pub fn with_opt<E: Expression + 'static>(self, part: Option<E>) -> Self {
        match part {
            Some(p) => self.with(p),
            None => self,
        }
    }

    /// Position passed to the parts for the first input.
    ///
    /// Lets a single-stream stage alternate variants by slide position.
    pub fn starting_at(mut self, index: usize) -> Self {
        self.first_index = index;
        self
    }
}

impl Expression for Combine {
    fn expression(&self, index: usize) -> String {
        self.parts
            .iter()
            .map(|p| p.expression(index))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Filter for Combine {
    fn compile(&self, inputs: &[StreamLabel]) -> GraphResult<Stage> {
        if inputs.is_empty() {
            return Err(GraphError::NoInputs {
                primitive: "combine",
            });
        }
        if self.parts.is_empty() {
            return Err(GraphError::NoOutputs);
        }

        let mut stage = Stage::default();
        for (i, input) in inputs.iter().enumerate() {
            let out = self.labels.label(i);
            stage.ops.push(FilterOp::new(
                vec![input.clone()],
                self.expression(self.first_index + i),
                vec![out.clone()],
            ));
            stage.outputs.push(out);
        }
        Ok(stage)
    }
}

/// Apply stages in sequence, each consuming the previous stage's outputs.
#[derive(Default)]
pub struct Chain {
    stages: Vec<Box<dyn Filter>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, stage: impl Filter + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }
}

impl Filter for Chain {
    fn compile(&self, inputs: &[StreamLabel]) -> GraphResult<Stage> {
        let mut ops = Vec::new();
        let mut current = inputs.to_vec();

        for stage in &self.stages {
            let compiled = stage.compile(&current)?;
            ops.extend(compiled.ops);
            current = compiled.outputs;
        }

        Ok(Stage::new(ops, current))
    }
}
