//! Operator builders: each declares exactly one node in a [`FieldGraph`].
//!
//! Builders record names and descriptors only. Inputs are referenced by name
//! and resolved when the graph is finalized; basis/rule compatibility is the
//! discretization layer's concern.

use super::{FieldGraph, NodeKind, OperatorNode};
use crate::basis::{BasisDescriptor, IntegrationDescriptor};
use crate::error::GraphError;
use crate::scalar::Scalar;

/// Residual contribution `m (s, φ)` of a scalar field `input_value`.
pub fn mass_term<T: Scalar>(
    graph: &mut FieldGraph<T>,
    output: &str,
    input_value: &str,
    basis: &BasisDescriptor,
    rule: &IntegrationDescriptor,
    multiplier: f64,
) -> Result<(), GraphError> {
    graph.declare(OperatorNode {
        output: output.to_string(),
        inputs: vec![input_value.to_string()],
        multiplier,
        kind: NodeKind::BasisTimesScalar {
            basis: *basis,
            rule: *rule,
        },
    })
}

/// Residual contribution `m (F, ∇φ)` of a vector field `input_flux`.
pub fn gradient_dot_term<T: Scalar>(
    graph: &mut FieldGraph<T>,
    output: &str,
    input_flux: &str,
    basis: &BasisDescriptor,
    rule: &IntegrationDescriptor,
    multiplier: f64,
) -> Result<(), GraphError> {
    graph.declare(OperatorNode {
        output: output.to_string(),
        inputs: vec![input_flux.to_string()],
        multiplier,
        kind: NodeKind::GradBasisDotVector {
            basis: *basis,
            rule: *rule,
        },
    })
}

/// Produces the field `dof` at the quadrature points from gathered coefficients.
pub fn dof_gather<T: Scalar>(
    graph: &mut FieldGraph<T>,
    dof: &str,
    basis: &BasisDescriptor,
) -> Result<(), GraphError> {
    graph.declare(OperatorNode {
        output: dof.to_string(),
        inputs: Vec::new(),
        multiplier: 1.0,
        kind: NodeKind::DofGather {
            dof: dof.to_string(),
            basis: *basis,
        },
    })
}

/// Produces the gradient of `dof` under the name `output`.
pub fn dof_gradient<T: Scalar>(
    graph: &mut FieldGraph<T>,
    dof: &str,
    output: &str,
    basis: &BasisDescriptor,
) -> Result<(), GraphError> {
    graph.declare(OperatorNode {
        output: output.to_string(),
        inputs: Vec::new(),
        multiplier: 1.0,
        kind: NodeKind::DofGradient {
            dof: dof.to_string(),
            basis: *basis,
        },
    })
}
