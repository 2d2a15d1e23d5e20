//! Equation sets: DOF declarations plus the residual graph of one equation,
//! for one computation mode.
//!
//! Construction is a strict sequence:
//! `Validated -> DofsDeclared -> OperatorsBuilt -> Finalized`.
//! [`EquationSet::build`] runs the whole sequence; the individual steps are
//! public so collaborators can interleave their own registration.

pub mod freq_dom;
pub mod physics;

pub use freq_dom::{FreqDomOptions, HarmonicCoupling, MirrorModeZero};
pub use physics::TimeDomainEquation;

use crate::basis::{BasisDescriptor, IntegrationDescriptor};
use crate::closure::ClosureModels;
use crate::config::{ParameterList, ParameterSchema};
use crate::error::{ConfigError, EquationSetError, GraphError};
use crate::graph::operators::{dof_gather, dof_gradient};
use crate::graph::summation::sum;
use crate::graph::{FieldGraph, FinalizedGraph};
use crate::scalar::Scalar;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Lifecycle of an [`EquationSet`]. Ordering follows the construction sequence.
///
/// An unconfigured set is never observable: [`EquationSet::construct`] is the
/// transition into `Validated` and returns either a validated set or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EquationSetState {
    Validated,
    DofsDeclared,
    OperatorsBuilt,
    Finalized,
}

/// The equation set families the factory can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquationSetType {
    Projection,
    Helmholtz,
    FreqDom,
}

impl EquationSetType {
    pub fn name(&self) -> &'static str {
        match self {
            EquationSetType::Projection => "Projection",
            EquationSetType::Helmholtz => "Helmholtz",
            EquationSetType::FreqDom => freq_dom::FREQ_DOM_TYPE,
        }
    }

    /// Parameters accepted by this family, with their defaults.
    pub fn schema(&self) -> ParameterSchema {
        let schema = ParameterSchema::new(self.name())
            .required_string("Type", "Equation set type")
            .string("Model ID", "", "Closure model id associated with this equation set")
            .string(
                "Prefix",
                "",
                "Prefix for using multiple instantiations of the equation set",
            )
            .string("Basis Type", "HGrad", "Type of basis to use")
            .int("Basis Order", 1, "Order of the basis")
            .int(
                "Integration Order",
                IntegrationDescriptor::DERIVE_FROM_BASIS,
                "Order of the integration rule (-1 derives it from the basis)",
            );
        match self {
            EquationSetType::FreqDom => schema.sublist(
                freq_dom::OPTIONS_KEY,
                freq_dom::options_schema(),
                "Frequency domain options",
            ),
            _ => schema,
        }
    }
}

impl fmt::Display for EquationSetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters shared by every equation set, normalized from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonParams {
    pub model_id: String,
    pub prefix: String,
    pub basis: BasisDescriptor,
    pub integration: IntegrationDescriptor,
}

impl CommonParams {
    pub fn from_params(params: &ParameterList) -> Result<Self, ConfigError> {
        let basis = BasisDescriptor::new(
            params.get_str("Basis Type")?,
            params.get_int("Basis Order")?,
        )?;
        let integration =
            IntegrationDescriptor::new(params.get_int("Integration Order")?, &basis)?;
        Ok(Self {
            model_id: params.get_str("Model ID")?.to_string(),
            prefix: params.get_str("Prefix")?.to_string(),
            basis,
            integration,
        })
    }
}

/// A declared unknown. `harmonic` is `Some(h)` for frequency-domain replicas.
#[derive(Debug, Clone, PartialEq)]
pub struct DofDescriptor {
    pub name: String,
    pub gradient: Option<String>,
    pub basis: BasisDescriptor,
    pub integration: IntegrationDescriptor,
    pub harmonic: Option<usize>,
}

/// Collects DOF declarations in order, rejecting duplicate names.
#[derive(Debug, Default)]
pub struct DofRegistry {
    dofs: Vec<DofDescriptor>,
}

impl DofRegistry {
    pub fn add_dof(
        &mut self,
        name: &str,
        basis: BasisDescriptor,
        integration: IntegrationDescriptor,
        harmonic: Option<usize>,
    ) -> Result<(), GraphError> {
        if self.dofs.iter().any(|d| d.name == name || d.gradient.as_deref() == Some(name)) {
            return Err(GraphError::DuplicateField(name.to_string()));
        }
        debug!(dof = name, basis = %basis, ?harmonic, "declared DOF");
        self.dofs.push(DofDescriptor {
            name: name.to_string(),
            gradient: None,
            basis,
            integration,
            harmonic,
        });
        Ok(())
    }

    /// Adds `GRAD_<dof>`; declaring it twice is a no-op.
    pub fn add_gradient(&mut self, dof: &str) -> Result<(), GraphError> {
        let gradient = gradient_name(dof);
        if self.dofs.iter().any(|d| d.name == gradient) {
            return Err(GraphError::DuplicateField(gradient));
        }
        let Some(entry) = self.dofs.iter_mut().find(|d| d.name == dof) else {
            panic!("gradient requested for undeclared DOF \"{dof}\"");
        };
        entry.gradient = Some(gradient);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DofDescriptor> {
        self.dofs.iter().find(|d| d.name == name)
    }

    pub fn into_dofs(self) -> Vec<DofDescriptor> {
        self.dofs
    }
}

/// Field names emitted by a time-domain equation's operator construction.
///
/// Passed explicitly to wrapping equation sets instead of having them rebuild
/// names by convention.
#[derive(Debug, Clone, PartialEq)]
pub struct TermTable {
    pub dof: String,
    pub gradient: Option<String>,
    /// Residual contributions in summation order.
    pub terms: Vec<String>,
    /// External fields the terms consume.
    pub sources: Vec<String>,
}

/// A residual aggregate: the total residual of one DOF.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualAggregate {
    pub dof: String,
    pub name: String,
    pub operands: Vec<String>,
}

pub fn residual_name(dof: &str) -> String {
    format!("RESIDUAL_{dof}")
}

pub fn gradient_name(dof: &str) -> String {
    format!("GRAD_{dof}")
}

#[derive(Debug, Clone)]
enum Formulation {
    TimeDomain(TimeDomainEquation),
    FreqDom(FreqDomOptions),
}

/// One equation's DOFs and residual graph over the scalar type `T`.
#[derive(Debug)]
pub struct EquationSet<T: Scalar> {
    kind: EquationSetType,
    params: ParameterList,
    common: CommonParams,
    formulation: Formulation,
    state: EquationSetState,
    dofs: Vec<DofDescriptor>,
    terms: Option<TermTable>,
    residuals: Vec<ResidualAggregate>,
    graph: Option<FieldGraph<T>>,
    finalized: Option<FinalizedGraph<T>>,
}

impl<T: Scalar> EquationSet<T> {
    /// Validates `config` against the schema of `kind` and normalizes it.
    pub fn construct(
        kind: EquationSetType,
        config: &ParameterList,
        coupling: Arc<dyn HarmonicCoupling>,
    ) -> Result<Self, EquationSetError> {
        if kind == EquationSetType::FreqDom && !config.is_sublist(freq_dom::OPTIONS_KEY) {
            return Err(ConfigError::MissingSublist {
                type_name: kind.name().to_string(),
                sublist: freq_dom::OPTIONS_KEY.to_string(),
            }
            .into());
        }

        let mut params = config.clone();
        kind.schema().validate_and_set_defaults(&mut params)?;
        let common = CommonParams::from_params(&params)?;

        let formulation = match kind {
            EquationSetType::Projection => Formulation::TimeDomain(TimeDomainEquation::Projection),
            EquationSetType::Helmholtz => Formulation::TimeDomain(TimeDomainEquation::Helmholtz),
            EquationSetType::FreqDom => {
                Formulation::FreqDom(FreqDomOptions::from_params(&params, coupling)?)
            }
        };

        Ok(Self {
            kind,
            params,
            common,
            formulation,
            state: EquationSetState::Validated,
            dofs: Vec::new(),
            terms: None,
            residuals: Vec::new(),
            graph: None,
            finalized: None,
        })
    }

    /// Runs the full construction sequence, resolving external fields against
    /// the closure model named by `Model ID`.
    pub fn build(
        kind: EquationSetType,
        config: &ParameterList,
        coupling: Arc<dyn HarmonicCoupling>,
        closure_models: &ClosureModels,
    ) -> Result<Self, EquationSetError> {
        let mut set = Self::construct(kind, config, coupling)?;
        set.declare_dofs()?;
        set.build_operators()?;
        let external = closure_models.fields(&set.common.model_id)?.to_vec();
        set.finalize(&external)?;
        Ok(set)
    }

    /// Declares the DOFs of the formulation. Calling it again is a no-op.
    pub fn declare_dofs(&mut self) -> Result<(), EquationSetError> {
        if self.state >= EquationSetState::DofsDeclared {
            return Ok(());
        }
        let mut registry = DofRegistry::default();
        match &self.formulation {
            Formulation::TimeDomain(eq) => {
                eq.declare_dofs(&mut registry, &self.common)?;
            }
            Formulation::FreqDom(options) => options.declare_dofs(&mut registry, &self.common)?,
        }
        self.dofs = registry.into_dofs();
        self.state = EquationSetState::DofsDeclared;
        Ok(())
    }

    /// Registers DOF gather nodes, the physics terms and the residual aggregates.
    ///
    /// # Panics
    /// If the DOFs have not been declared, or operators were already built.
    pub fn build_operators(&mut self) -> Result<(), EquationSetError> {
        assert!(
            self.state == EquationSetState::DofsDeclared,
            "build_operators requires state DofsDeclared, but the equation set is {:?}",
            self.state
        );

        let mut graph = FieldGraph::new();
        for dof in &self.dofs {
            dof_gather(&mut graph, &dof.name, &dof.basis)?;
            if let Some(gradient) = &dof.gradient {
                dof_gradient(&mut graph, &dof.name, gradient, &dof.basis)?;
            }
        }

        let (terms, residuals) = match &self.formulation {
            Formulation::TimeDomain(eq) => {
                let primary = &self.dofs[0];
                let terms = eq.build_terms(&mut graph, primary)?;
                let name = residual_name(&primary.name);
                sum(&mut graph, &name, &terms.terms)?;
                let residual = ResidualAggregate {
                    dof: primary.name.clone(),
                    name,
                    operands: terms.terms.clone(),
                };
                (terms, vec![residual])
            }
            Formulation::FreqDom(options) => options.build_operators(&mut graph, &self.dofs)?,
        };

        self.graph = Some(graph);
        self.terms = Some(terms);
        self.residuals = residuals;
        self.state = EquationSetState::OperatorsBuilt;
        Ok(())
    }

    /// Checks the graph and freezes it. On failure the graph is discarded.
    ///
    /// # Panics
    /// If operators have not been built.
    pub fn finalize<S: AsRef<str>>(&mut self, external: &[S]) -> Result<(), EquationSetError> {
        assert!(
            self.state == EquationSetState::OperatorsBuilt,
            "finalize requires state OperatorsBuilt, but the equation set is {:?}",
            self.state
        );
        let Some(graph) = self.graph.take() else {
            panic!("operators were built but no graph is present");
        };
        let finalized = graph.finalize(external)?;
        debug!(
            equation_set = self.kind.name(),
            nodes = finalized.len(),
            "graph finalized"
        );
        self.finalized = Some(finalized);
        self.state = EquationSetState::Finalized;
        Ok(())
    }

    pub fn kind(&self) -> EquationSetType {
        self.kind
    }

    pub fn state(&self) -> EquationSetState {
        self.state
    }

    /// The validated configuration, defaults filled in.
    pub fn params(&self) -> &ParameterList {
        &self.params
    }

    pub fn common(&self) -> &CommonParams {
        &self.common
    }

    pub fn freq_dom_options(&self) -> Option<&FreqDomOptions> {
        match &self.formulation {
            Formulation::FreqDom(options) => Some(options),
            Formulation::TimeDomain(_) => None,
        }
    }

    pub fn dofs(&self) -> &[DofDescriptor] {
        &self.dofs
    }

    pub fn dof_names(&self) -> Vec<&str> {
        self.dofs.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn residual_aggregates(&self) -> &[ResidualAggregate] {
        &self.residuals
    }

    /// Terms emitted by the (wrapped) time-domain equation.
    pub fn terms(&self) -> Option<&TermTable> {
        self.terms.as_ref()
    }

    /// The finalized graph; `None` until [`EquationSet::finalize`] succeeds.
    pub fn graph(&self) -> Option<&FinalizedGraph<T>> {
        self.finalized.as_ref()
    }
}
