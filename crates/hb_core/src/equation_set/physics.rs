//! Time-domain physics: the concrete residual terms of each equation.

use super::{CommonParams, DofDescriptor, DofRegistry, TermTable};
use crate::error::GraphError;
use crate::graph::operators::{gradient_dot_term, mass_term};
use crate::graph::FieldGraph;
use crate::scalar::Scalar;

/// Equations that can be built on their own or wrapped in the frequency domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeDomainEquation {
    /// `(u, φ) - (f, φ) = 0`
    Projection,
    /// `(u, φ) - (f, φ) + (∇u, ∇φ) = 0`
    Helmholtz,
}

impl TimeDomainEquation {
    pub const ALL: [TimeDomainEquation; 2] =
        [TimeDomainEquation::Helmholtz, TimeDomainEquation::Projection];

    pub fn name(&self) -> &'static str {
        match self {
            TimeDomainEquation::Projection => "Projection",
            TimeDomainEquation::Helmholtz => "Helmholtz",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|eq| eq.name() == name)
    }

    pub fn supported_names() -> String {
        Self::ALL
            .iter()
            .map(|eq| format!("\"{}\"", eq.name()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn needs_gradient(&self) -> bool {
        matches!(self, TimeDomainEquation::Helmholtz)
    }

    /// Declares the primary unknown (and its gradient where the physics uses it).
    /// Returns the DOF name.
    pub fn declare_dofs(
        &self,
        dofs: &mut DofRegistry,
        common: &CommonParams,
    ) -> Result<String, GraphError> {
        let dof = format!("{}U", common.prefix);
        dofs.add_dof(&dof, common.basis, common.integration, None)?;
        if self.needs_gradient() {
            dofs.add_gradient(&dof)?;
        }
        Ok(dof)
    }

    /// Registers this equation's residual terms for `dof`, without summing them.
    pub fn build_terms<T: Scalar>(
        &self,
        graph: &mut FieldGraph<T>,
        dof: &DofDescriptor,
    ) -> Result<TermTable, GraphError> {
        let projection = format!("RESIDUAL_{}_PROJECTION", dof.name);
        let projection_source = format!("RESIDUAL_{}_PROJECTION_SOURCE", dof.name);
        // Supplied by the closure model.
        let source = format!("{}_SOURCE", dof.name);

        mass_term(graph, &projection, &dof.name, &dof.basis, &dof.integration, 1.0)?;
        mass_term(
            graph,
            &projection_source,
            &source,
            &dof.basis,
            &dof.integration,
            -1.0,
        )?;
        let mut terms = vec![projection, projection_source];

        if self.needs_gradient() {
            let Some(flux) = dof.gradient.as_deref() else {
                panic!(
                    "{} equation requires a gradient for DOF \"{}\"; declare_dofs must add it",
                    self.name(),
                    dof.name
                );
            };
            let laplacian = format!("RESIDUAL_{}_LAPLACIAN", dof.name);
            gradient_dot_term(graph, &laplacian, flux, &dof.basis, &dof.integration, 1.0)?;
            terms.push(laplacian);
        }

        Ok(TermTable {
            dof: dof.name.clone(),
            gradient: dof.gradient.clone(),
            terms,
            sources: vec![source],
        })
    }
}
