//! Harmonic-balance (frequency-domain) wrapper around a time-domain equation.
//!
//! The wrapped equation supplies the mode-0 DOF and its residual terms. Each
//! of the `M` additional harmonics gets a replica DOF `<dof>_freq<h>` with its
//! own gradient and residual aggregate. How the replica aggregates are
//! composed is delegated to a [`HarmonicCoupling`] policy.

use super::physics::TimeDomainEquation;
use super::{residual_name, CommonParams, DofRegistry, ResidualAggregate, TermTable};
use crate::config::{ParameterList, ParameterSchema};
use crate::error::{ConfigError, EquationSetError, GraphError};
use crate::graph::summation::sum;
use crate::graph::FieldGraph;
use crate::scalar::Scalar;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

pub const FREQ_DOM_TYPE: &str = "FreqDom";
pub const OPTIONS_KEY: &str = "FreqDom Options";
pub const TIME_DOMAIN_KEY: &str = "Time domain equation set";
pub const TRUNCATION_KEY: &str = "Truncation order";
pub const DEFAULT_TRUNCATION_ORDER: i64 = 3;
/// Largest accepted `Truncation order`. Each harmonic adds two fields per mode.
pub const MAX_TRUNCATION_ORDER: i64 = 256;

/// Schema of the `FreqDom Options` sublist.
pub fn options_schema() -> ParameterSchema {
    ParameterSchema::new(OPTIONS_KEY)
        .string(
            TIME_DOMAIN_KEY,
            TimeDomainEquation::Projection.name(),
            "Time domain equation set to model in the frequency domain",
        )
        .int_in_range(
            TRUNCATION_KEY,
            DEFAULT_TRUNCATION_ORDER,
            0,
            MAX_TRUNCATION_ORDER,
            "Number of harmonics beyond mode 0",
        )
}

/// Chooses the operand list of every residual aggregate.
pub trait HarmonicCoupling: fmt::Debug + Send + Sync {
    /// Operands of the mode-0 residual, given the wrapped equation's terms.
    fn mode_zero_operands(&self, terms: &TermTable) -> Vec<String>;

    /// Operands of the residual of replica `harmonic` (`0..M`).
    fn replica_operands(&self, harmonic: usize, terms: &TermTable) -> Vec<String>;
}

/// Every harmonic mirrors the mode-0 physics; no cross-mode coupling.
#[derive(Debug, Clone, Copy, Default)]
pub struct MirrorModeZero;

impl HarmonicCoupling for MirrorModeZero {
    fn mode_zero_operands(&self, terms: &TermTable) -> Vec<String> {
        terms.terms.clone()
    }

    fn replica_operands(&self, _harmonic: usize, terms: &TermTable) -> Vec<String> {
        terms.terms.clone()
    }
}

/// Validated `FreqDom Options` plus the coupling policy.
#[derive(Debug, Clone)]
pub struct FreqDomOptions {
    pub time_domain: TimeDomainEquation,
    pub truncation_order: usize,
    pub coupling: Arc<dyn HarmonicCoupling>,
}

impl FreqDomOptions {
    /// Reads the options sublist of an already-validated parameter list.
    pub fn from_params(
        params: &ParameterList,
        coupling: Arc<dyn HarmonicCoupling>,
    ) -> Result<Self, EquationSetError> {
        let options = params
            .sublist(OPTIONS_KEY)
            .ok_or_else(|| ConfigError::MissingSublist {
                type_name: FREQ_DOM_TYPE.to_string(),
                sublist: OPTIONS_KEY.to_string(),
            })?;

        let name = options.get_str(TIME_DOMAIN_KEY)?;
        let time_domain = TimeDomainEquation::from_name(name).ok_or_else(|| {
            EquationSetError::UnsupportedTimeDomainType {
                type_name: name.to_string(),
                supported: TimeDomainEquation::supported_names(),
            }
        })?;

        let order = options.get_int(TRUNCATION_KEY)?;
        let truncation_order = usize::try_from(order).map_err(|_| ConfigError::OutOfRange {
            key: format!("{OPTIONS_KEY}/{TRUNCATION_KEY}"),
            value: order.to_string(),
            bound: ">= 0".to_string(),
        })?;

        info!(
            time_domain = time_domain.name(),
            truncation_order, "frequency domain analysis specified"
        );
        Ok(Self {
            time_domain,
            truncation_order,
            coupling,
        })
    }

    /// Mode-0 DOF via the wrapped equation, then `M` replicas sharing its
    /// basis and integration rule. Every mode carries a gradient.
    pub fn declare_dofs(
        &self,
        dofs: &mut DofRegistry,
        common: &CommonParams,
    ) -> Result<(), GraphError> {
        let base = self.time_domain.declare_dofs(dofs, common)?;
        if dofs.get(&base).is_some_and(|d| d.gradient.is_none()) {
            dofs.add_gradient(&base)?;
        }
        for harmonic in 0..self.truncation_order {
            let replica = replica_name(&base, harmonic);
            dofs.add_dof(&replica, common.basis, common.integration, Some(harmonic))?;
            dofs.add_gradient(&replica)?;
        }
        Ok(())
    }

    /// Builds the wrapped equation's terms once and one aggregate per mode.
    ///
    /// `dofs[0]` is the mode-0 DOF; `dofs[1..]` are the replicas in harmonic order.
    ///
    /// # Panics
    /// If `dofs` does not hold exactly the mode-0 DOF and one replica per harmonic.
    pub fn build_operators<T: Scalar>(
        &self,
        graph: &mut FieldGraph<T>,
        dofs: &[super::DofDescriptor],
    ) -> Result<(TermTable, Vec<ResidualAggregate>), GraphError> {
        let Some((base, replicas)) = dofs.split_first() else {
            panic!("frequency domain operators built before any DOF was declared");
        };
        let terms = self.time_domain.build_terms(graph, base)?;

        let mut residuals = Vec::with_capacity(dofs.len());
        let operands = self.coupling.mode_zero_operands(&terms);
        residuals.push(aggregate(graph, &base.name, operands)?);

        assert!(
            replicas.len() == self.truncation_order,
            "expected {} frequency domain replicas, found {}",
            self.truncation_order,
            replicas.len()
        );
        for (harmonic, replica) in replicas.iter().enumerate() {
            assert_eq!(
                replica.harmonic,
                Some(harmonic),
                "DOF \"{}\" is out of harmonic order",
                replica.name
            );
            let operands = self.coupling.replica_operands(harmonic, &terms);
            residuals.push(aggregate(graph, &replica.name, operands)?);
        }
        debug!(
            wrapped = self.time_domain.name(),
            aggregates = residuals.len(),
            "frequency domain residuals composed"
        );
        Ok((terms, residuals))
    }
}

/// Name of the DOF for additional harmonic `harmonic`.
pub fn replica_name(base: &str, harmonic: usize) -> String {
    format!("{base}_freq{harmonic}")
}

fn aggregate<T: Scalar>(
    graph: &mut FieldGraph<T>,
    dof: &str,
    operands: Vec<String>,
) -> Result<ResidualAggregate, GraphError> {
    let name = residual_name(dof);
    sum(graph, &name, &operands)?;
    Ok(ResidualAggregate {
        dof: dof.to_string(),
        name,
        operands,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParameterList;

    fn params(options: ParameterList) -> ParameterList {
        ParameterList::new()
            .with("Type", FREQ_DOM_TYPE)
            .with(OPTIONS_KEY, options_schema().validated(&options).expect("valid options"))
    }

    #[test]
    fn options_default_to_projection_with_three_harmonics() {
        let opts = FreqDomOptions::from_params(&params(ParameterList::new()), Arc::new(MirrorModeZero))
            .expect("options");
        assert_eq!(opts.time_domain, TimeDomainEquation::Projection);
        assert_eq!(opts.truncation_order, 3);
    }

    #[test]
    fn unknown_time_domain_equation_is_unsupported() {
        let options = ParameterList::new().with(TIME_DOMAIN_KEY, "Maxwell");
        let err = FreqDomOptions::from_params(&params(options), Arc::new(MirrorModeZero))
            .expect_err("unsupported");
        match err {
            EquationSetError::UnsupportedTimeDomainType { type_name, supported } => {
                assert_eq!(type_name, "Maxwell");
                assert!(supported.contains("Helmholtz"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_options_is_a_config_error() {
        let params = ParameterList::new().with("Type", FREQ_DOM_TYPE);
        let err = FreqDomOptions::from_params(&params, Arc::new(MirrorModeZero))
            .expect_err("missing sublist");
        assert!(matches!(
            err,
            EquationSetError::Config(ConfigError::MissingSublist { .. })
        ));
    }

    #[test]
    fn truncation_order_is_bounded() {
        let options = ParameterList::new().with(TRUNCATION_KEY, MAX_TRUNCATION_ORDER + 1);
        let err = options_schema().validated(&options).expect_err("too many harmonics");
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
        assert_eq!(err.key(), TRUNCATION_KEY);

        let options = ParameterList::new().with(TRUNCATION_KEY, MAX_TRUNCATION_ORDER);
        let opts = FreqDomOptions::from_params(&params(options), Arc::new(MirrorModeZero))
            .expect("largest order");
        assert_eq!(opts.truncation_order, MAX_TRUNCATION_ORDER as usize);
    }

    #[test]
    #[should_panic(expected = "expected 2 frequency domain replicas, found 1")]
    fn missing_replica_is_not_skipped() {
        let common = CommonParams::from_params(
            &crate::equation_set::EquationSetType::Projection
                .schema()
                .validated(&ParameterList::new().with("Type", "Projection"))
                .expect("valid"),
        )
        .expect("common");
        let options = ParameterList::new().with(TRUNCATION_KEY, 2);
        let opts = FreqDomOptions::from_params(&params(options), Arc::new(MirrorModeZero))
            .expect("options");
        let mut registry = DofRegistry::default();
        opts.declare_dofs(&mut registry, &common).expect("dofs");
        let mut dofs = registry.into_dofs();
        dofs.pop();
        let mut graph = FieldGraph::<f64>::new();
        let _ = opts.build_operators(&mut graph, &dofs);
    }

    #[test]
    fn replica_names_are_suffixed() {
        assert_eq!(replica_name("U", 0), "U_freq0");
        assert_eq!(replica_name("ION_U", 12), "ION_U_freq12");
    }
}
