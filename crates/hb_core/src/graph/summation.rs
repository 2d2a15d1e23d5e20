//! Combines named partial residuals into one aggregate field.

use super::{FieldGraph, NodeKind, OperatorNode};
use crate::error::GraphError;
use crate::scalar::Scalar;
use tracing::debug;

/// Declares `output` as the ordered sum of `operands`.
pub fn sum<T: Scalar>(
    graph: &mut FieldGraph<T>,
    output: &str,
    operands: &[String],
) -> Result<(), GraphError> {
    if operands.is_empty() {
        return Err(GraphError::EmptyOperandList(output.to_string()));
    }
    debug!(residual = output, terms = operands.len(), "residual aggregate");
    graph.declare(OperatorNode {
        output: output.to_string(),
        inputs: operands.to_vec(),
        multiplier: 1.0,
        kind: NodeKind::Sum,
    })
}
