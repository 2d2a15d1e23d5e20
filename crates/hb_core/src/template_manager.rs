//! One equation set per computation mode.
//!
//! The set of modes is fixed: [`EvaluationMode::Residual`] evaluates over
//! `f64`, [`EvaluationMode::Jacobian`] over [`Dual`]. Each mode owns its own
//! graph; no mode can observe another's.

use crate::basis::Workset;
use crate::equation_set::EquationSet;
use crate::error::{EquationSetError, EvaluationError};
use crate::graph::FieldValues;
use crate::scalar::{Dual, Scalar};
use nalgebra::{DMatrix, DVector};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationMode {
    Residual,
    Jacobian,
}

impl EvaluationMode {
    pub const ALL: [EvaluationMode; 2] = [EvaluationMode::Residual, EvaluationMode::Jacobian];

    pub fn name(&self) -> &'static str {
        match self {
            EvaluationMode::Residual => "Residual",
            EvaluationMode::Jacobian => "Jacobian",
        }
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds one fully constructed equation set for any scalar type.
pub trait EquationSetBuilder {
    fn build<T: Scalar>(&self) -> Result<EquationSet<T>, EquationSetError>;
}

/// Callback applied to every mode's equation set.
pub trait ModeVisitor {
    fn visit<T: Scalar>(&mut self, mode: EvaluationMode, equation_set: &EquationSet<T>);
}

#[derive(Debug)]
pub struct TemplateManager {
    residual: EquationSet<f64>,
    jacobian: EquationSet<Dual>,
}

impl TemplateManager {
    /// Instantiates the builder once per mode. The first failure aborts the
    /// whole construction.
    pub fn build_objects<B: EquationSetBuilder>(builder: &B) -> Result<Self, EquationSetError> {
        let residual = builder.build::<f64>()?;
        let jacobian = builder.build::<Dual>()?;
        Ok(Self { residual, jacobian })
    }

    pub fn residual(&self) -> &EquationSet<f64> {
        &self.residual
    }

    pub fn jacobian(&self) -> &EquationSet<Dual> {
        &self.jacobian
    }

    pub fn for_each_mode<V: ModeVisitor>(&self, visitor: &mut V) {
        visitor.visit(EvaluationMode::Residual, &self.residual);
        visitor.visit(EvaluationMode::Jacobian, &self.jacobian);
    }

    /// Residual aggregates of every DOF, evaluated in the Residual mode and
    /// stacked in DOF order (`num_basis` entries per DOF).
    pub fn local_residual(
        &self,
        workset: &Workset,
        solution: &FieldValues<f64>,
        external: &FieldValues<f64>,
    ) -> Result<DVector<f64>, EvaluationError> {
        let values = evaluate(&self.residual, workset, solution, external)?;
        let mut stacked = Vec::with_capacity(self.residual.dofs().len() * workset.num_basis);
        for aggregate in self.residual.residual_aggregates() {
            let residual = values
                .get(&aggregate.name)
                .ok_or_else(|| EvaluationError::MissingField(aggregate.name.clone()))?;
            stacked.extend_from_slice(residual);
        }
        Ok(DVector::from_vec(stacked))
    }

    /// Local Jacobian of the stacked residual with respect to the stacked DOF
    /// coefficients, computed in the Jacobian mode one seeded column at a time.
    pub fn local_jacobian(
        &self,
        workset: &Workset,
        solution: &FieldValues<f64>,
        external: &FieldValues<f64>,
    ) -> Result<DMatrix<f64>, EvaluationError> {
        let set = &self.jacobian;
        let nb = workset.num_basis;
        let rows = set.residual_aggregates().len() * nb;
        let cols = set.dofs().len() * nb;
        let mut jacobian = DMatrix::zeros(rows, cols);

        let base: Vec<(&str, &[f64])> = set
            .dofs()
            .iter()
            .map(|dof| {
                solution
                    .get(&dof.name)
                    .map(|coeffs| (dof.name.as_str(), coeffs))
                    .ok_or_else(|| EvaluationError::MissingField(dof.name.clone()))
            })
            .collect::<Result<_, _>>()?;

        for (k, &(_, seeded_coeffs)) in base.iter().enumerate() {
            for j in 0..seeded_coeffs.len().min(nb) {
                let mut dual_solution = FieldValues::new();
                for (m, &(name, coeffs)) in base.iter().enumerate() {
                    let lifted = coeffs
                        .iter()
                        .enumerate()
                        .map(|(i, &c)| {
                            if m == k && i == j {
                                Dual::variable(c)
                            } else {
                                Dual::constant(c)
                            }
                        })
                        .collect();
                    dual_solution.insert(name, lifted);
                }

                let values = evaluate(set, workset, &dual_solution, external)?;
                let col = k * nb + j;
                for (a, aggregate) in set.residual_aggregates().iter().enumerate() {
                    let residual = values
                        .get(&aggregate.name)
                        .ok_or_else(|| EvaluationError::MissingField(aggregate.name.clone()))?;
                    for (i, r) in residual.iter().enumerate() {
                        jacobian[(a * nb + i, col)] = r.eps;
                    }
                }
            }
        }
        Ok(jacobian)
    }
}

fn evaluate<T: Scalar>(
    set: &EquationSet<T>,
    workset: &Workset,
    solution: &FieldValues<T>,
    external: &FieldValues<f64>,
) -> Result<FieldValues<T>, EvaluationError> {
    let Some(graph) = set.graph() else {
        panic!(
            "{} equation set evaluated before it was finalized",
            set.kind()
        );
    };
    graph.evaluate(workset, solution, external)
}
