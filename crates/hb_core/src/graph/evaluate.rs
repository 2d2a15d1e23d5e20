//! Numeric evaluation of a finalized graph over one cell.

use super::{FinalizedGraph, NodeKind, OperatorNode};
use crate::basis::Workset;
use crate::error::EvaluationError;
use crate::scalar::Scalar;
use std::collections::BTreeMap;

/// Named arrays of values, one array per field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValues<T> {
    values: BTreeMap<String, Vec<T>>,
}

impl<T> Default for FieldValues<T> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<T> FieldValues<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, values: Vec<T>) -> Self {
        self.insert(name, values);
        self
    }

    pub fn insert(&mut self, name: &str, values: Vec<T>) {
        self.values.insert(name.to_string(), values);
    }

    pub fn get(&self, name: &str) -> Option<&[T]> {
        self.values.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.keys().map(String::as_str)
    }
}

struct Evaluator<'a, T: Scalar> {
    workset: &'a Workset,
    solution: &'a FieldValues<T>,
    external: &'a FieldValues<f64>,
    computed: FieldValues<T>,
}

impl<'a, T: Scalar> Evaluator<'a, T> {
    /// Looks up a field produced earlier in the pass, or lifts an external one.
    fn input(&self, name: &str, expected: usize) -> Result<Vec<T>, EvaluationError> {
        let values: Vec<T> = if let Some(values) = self.computed.get(name) {
            values.to_vec()
        } else if let Some(values) = self.external.get(name) {
            values.iter().map(|&v| T::constant(v)).collect()
        } else {
            return Err(EvaluationError::MissingField(name.to_string()));
        };
        check_len(name, &values, expected)?;
        Ok(values)
    }

    fn coefficients(&self, dof: &str) -> Result<&'a [T], EvaluationError> {
        let solution: &'a FieldValues<T> = self.solution;
        let coeffs = solution
            .get(dof)
            .ok_or_else(|| EvaluationError::MissingField(dof.to_string()))?;
        check_len(dof, coeffs, self.workset.num_basis)?;
        Ok(coeffs)
    }

    fn run(&mut self, node: &OperatorNode) -> Result<Vec<T>, EvaluationError> {
        let ws = self.workset;
        let (nb, np, dim) = (ws.num_basis, ws.num_points, ws.dim);
        let m = T::constant(node.multiplier);

        let out = match &node.kind {
            NodeKind::DofGather { dof, .. } => {
                let c = self.coefficients(dof)?;
                (0..np)
                    .map(|q| {
                        (0..nb).fold(T::zero(), |acc, i| acc + c[i] * T::constant(ws.phi(i, q)))
                    })
                    .collect()
            }
            NodeKind::DofGradient { dof, .. } => {
                let c = self.coefficients(dof)?;
                let mut grad = vec![T::zero(); np * dim];
                for q in 0..np {
                    for d in 0..dim {
                        grad[q * dim + d] = (0..nb).fold(T::zero(), |acc, i| {
                            acc + c[i] * T::constant(ws.grad_phi(i, q, d))
                        });
                    }
                }
                grad
            }
            NodeKind::BasisTimesScalar { .. } => {
                let s = self.input(&node.inputs[0], np)?;
                (0..nb)
                    .map(|i| {
                        let integral = (0..np).fold(T::zero(), |acc, q| {
                            acc + T::constant(ws.weights[q] * ws.phi(i, q)) * s[q]
                        });
                        m * integral
                    })
                    .collect()
            }
            NodeKind::GradBasisDotVector { .. } => {
                let flux = self.input(&node.inputs[0], np * dim)?;
                (0..nb)
                    .map(|i| {
                        let mut integral = T::zero();
                        for q in 0..np {
                            for d in 0..dim {
                                integral = integral
                                    + T::constant(ws.weights[q] * ws.grad_phi(i, q, d))
                                        * flux[q * dim + d];
                            }
                        }
                        m * integral
                    })
                    .collect()
            }
            NodeKind::Sum => {
                let mut total = vec![T::zero(); nb];
                for name in &node.inputs {
                    let term = self.input(name, nb)?;
                    for (acc, v) in total.iter_mut().zip(term) {
                        *acc = *acc + v;
                    }
                }
                total.into_iter().map(|v| m * v).collect()
            }
        };
        Ok(out)
    }
}

fn check_len<T>(field: &str, values: &[T], expected: usize) -> Result<(), EvaluationError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(EvaluationError::LengthMismatch {
            field: field.to_string(),
            expected,
            actual: values.len(),
        })
    }
}

impl<T: Scalar> FinalizedGraph<T> {
    /// Evaluates every node in topological order.
    ///
    /// `solution` holds the gathered coefficients of each DOF (`num_basis`
    /// entries), `external` the closure-model fields at the quadrature points.
    pub fn evaluate(
        &self,
        workset: &Workset,
        solution: &FieldValues<T>,
        external: &FieldValues<f64>,
    ) -> Result<FieldValues<T>, EvaluationError> {
        workset.check()?;
        let mut evaluator = Evaluator {
            workset,
            solution,
            external,
            computed: FieldValues::new(),
        };
        for node in self.nodes() {
            let values = evaluator.run(node)?;
            evaluator.computed.insert(&node.output, values);
        }
        Ok(evaluator.computed)
    }
}
