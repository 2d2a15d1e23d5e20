//! Maps a configuration's `Type` string to the equation set family that
//! builds it, and drives construction of every computation mode.

use crate::closure::ClosureModels;
use crate::config::ParameterList;
use crate::equation_set::freq_dom::OPTIONS_KEY;
use crate::equation_set::{EquationSet, EquationSetType, HarmonicCoupling, MirrorModeZero};
use crate::error::{ConfigError, EquationSetError};
use crate::scalar::Scalar;
use crate::template_manager::{EquationSetBuilder, TemplateManager};
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of equation set type strings.
///
/// Type strings are unique; lookup is an exact match.
#[derive(Debug, Clone)]
pub struct EquationSetFactory {
    registry: Vec<(String, EquationSetType)>,
    coupling: Arc<dyn HarmonicCoupling>,
}

impl Default for EquationSetFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EquationSetFactory {
    /// A factory with `Projection`, `Helmholtz` and `FreqDom` registered under
    /// their own names, using [`MirrorModeZero`] for harmonic coupling.
    pub fn new() -> Self {
        let registry = [
            EquationSetType::Projection,
            EquationSetType::Helmholtz,
            EquationSetType::FreqDom,
        ]
        .into_iter()
        .map(|kind| (kind.name().to_string(), kind))
        .collect();
        Self {
            registry,
            coupling: Arc::new(MirrorModeZero),
        }
    }

    /// A factory with nothing registered.
    pub fn empty() -> Self {
        Self {
            registry: Vec::new(),
            coupling: Arc::new(MirrorModeZero),
        }
    }

    pub fn with_coupling(mut self, coupling: Arc<dyn HarmonicCoupling>) -> Self {
        self.coupling = coupling;
        self
    }

    /// Registers `type_name` as an identifier for `kind`.
    pub fn register(
        &mut self,
        type_name: &str,
        kind: EquationSetType,
    ) -> Result<(), EquationSetError> {
        if self.registry.iter().any(|(name, _)| name == type_name) {
            return Err(EquationSetError::DuplicateRegistration(type_name.to_string()));
        }
        self.registry.push((type_name.to_string(), kind));
        Ok(())
    }

    pub fn registered_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.registry.iter().map(|(name, _)| name.as_str())
    }

    pub fn resolve(&self, type_name: &str) -> Result<EquationSetType, EquationSetError> {
        self.registry
            .iter()
            .find(|(name, _)| name == type_name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| EquationSetError::UnknownEquationType {
                type_name: type_name.to_string(),
                registered: self
                    .registered_names()
                    .map(|name| format!("\"{name}\""))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Builds a template manager holding one finalized equation set per
    /// computation mode.
    pub fn build(
        &self,
        config: &ParameterList,
        closure_models: &ClosureModels,
    ) -> Result<TemplateManager, EquationSetError> {
        let type_name = config.get_str("Type")?;
        let kind = self.resolve(type_name)?;

        if kind == EquationSetType::FreqDom {
            if !config.is_sublist(OPTIONS_KEY) {
                return Err(ConfigError::MissingSublist {
                    type_name: type_name.to_string(),
                    sublist: OPTIONS_KEY.to_string(),
                }
                .into());
            }
            info!(type_name, "building frequency domain equation set");
        } else {
            debug!(type_name, kind = %kind, "building equation set");
        }

        // Validated once here; each mode's construction sees the marker and
        // skips revalidation.
        let mut params = config.clone();
        kind.schema().validate_and_set_defaults(&mut params)?;

        let builder = ModeBuilder {
            kind,
            params: &params,
            coupling: &self.coupling,
            closure_models,
        };
        TemplateManager::build_objects(&builder)
    }
}

struct ModeBuilder<'a> {
    kind: EquationSetType,
    params: &'a ParameterList,
    coupling: &'a Arc<dyn HarmonicCoupling>,
    closure_models: &'a ClosureModels,
}

impl EquationSetBuilder for ModeBuilder<'_> {
    fn build<T: Scalar>(&self) -> Result<EquationSet<T>, EquationSetError> {
        EquationSet::build(
            self.kind,
            self.params,
            Arc::clone(self.coupling),
            self.closure_models,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation_set::freq_dom::{TIME_DOMAIN_KEY, TRUNCATION_KEY};
    use crate::equation_set::{EquationSetState, TermTable};
    use crate::template_manager::{EvaluationMode, ModeVisitor};
    use pretty_assertions::assert_eq;

    fn assert_err_contains<T: std::fmt::Debug>(
        result: Result<T, EquationSetError>,
        needle: &str,
    ) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn closure() -> ClosureModels {
        ClosureModels::new().with_model("", &["U_SOURCE"])
    }

    fn freq_dom(time_domain: &str, order: i64) -> ParameterList {
        ParameterList::new().with("Type", "FreqDom").with(
            OPTIONS_KEY,
            ParameterList::new()
                .with(TIME_DOMAIN_KEY, time_domain)
                .with(TRUNCATION_KEY, order),
        )
    }

    #[derive(Default)]
    struct States {
        seen: Vec<(EvaluationMode, EquationSetState)>,
    }

    impl ModeVisitor for States {
        fn visit<T: Scalar>(&mut self, mode: EvaluationMode, set: &EquationSet<T>) {
            self.seen.push((mode, set.state()));
        }
    }

    #[test]
    fn time_domain_types_finalize_every_mode() {
        let factory = EquationSetFactory::new();
        for type_name in ["Projection", "Helmholtz"] {
            let config = ParameterList::new().with("Type", type_name);
            let manager = factory.build(&config, &closure()).expect("build");
            let mut states = States::default();
            manager.for_each_mode(&mut states);
            assert_eq!(
                states.seen,
                vec![
                    (EvaluationMode::Residual, EquationSetState::Finalized),
                    (EvaluationMode::Jacobian, EquationSetState::Finalized),
                ]
            );
        }
    }

    #[test]
    fn projection_deck_builds_single_residual() {
        let config = ParameterList::new()
            .with("Type", "Projection")
            .with("Model ID", "m")
            .with("Prefix", "")
            .with("Basis Order", 1)
            .with("Integration Order", 2);
        let closure = ClosureModels::new().with_model("m", &["U_SOURCE"]);
        let manager = EquationSetFactory::new()
            .build(&config, &closure)
            .expect("build");
        let set = manager.residual();
        assert_eq!(set.dof_names(), vec!["U"]);
        assert_eq!(set.residual_aggregates().len(), 1);
        assert_eq!(set.residual_aggregates()[0].name, "RESIDUAL_U");
        assert_eq!(set.residual_aggregates()[0].operands.len(), 2);
    }

    #[test]
    fn freq_dom_helmholtz_with_two_harmonics() {
        let manager = EquationSetFactory::new()
            .build(&freq_dom("Helmholtz", 2), &closure())
            .expect("build");
        for names in [manager.residual().dof_names(), manager.jacobian().dof_names()] {
            assert_eq!(names, vec!["U", "U_freq0", "U_freq1"]);
        }

        let set = manager.residual();
        let expected_operands = vec![
            "RESIDUAL_U_PROJECTION".to_string(),
            "RESIDUAL_U_PROJECTION_SOURCE".to_string(),
            "RESIDUAL_U_LAPLACIAN".to_string(),
        ];
        let aggregates = set.residual_aggregates();
        assert_eq!(
            aggregates.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            vec!["RESIDUAL_U", "RESIDUAL_U_freq0", "RESIDUAL_U_freq1"]
        );
        for aggregate in aggregates {
            assert_eq!(aggregate.operands, expected_operands);
        }

        let graph = set.graph().expect("finalized");
        for field in ["GRAD_U", "GRAD_U_freq0", "GRAD_U_freq1"] {
            assert!(graph.exists(field), "missing {field}");
        }
    }

    #[test]
    fn every_truncation_order_yields_that_many_replicas() {
        let factory = EquationSetFactory::new();
        for order in 0..=4usize {
            let manager = factory
                .build(&freq_dom("Projection", order as i64), &closure())
                .expect("build");
            let set = manager.jacobian();
            let replicas: Vec<_> = set.dofs().iter().filter(|d| d.harmonic.is_some()).collect();
            assert_eq!(replicas.len(), order);
            for (h, replica) in replicas.iter().enumerate() {
                assert_eq!(replica.harmonic, Some(h));
                assert_eq!(replica.gradient, Some(format!("GRAD_U_freq{h}")));
            }
            assert_eq!(set.residual_aggregates().len(), order + 1);
        }
    }

    #[test]
    fn freq_dom_defaults_to_three_projection_harmonics() {
        let config = ParameterList::new()
            .with("Type", "FreqDom")
            .with(OPTIONS_KEY, ParameterList::new());
        let manager = EquationSetFactory::new()
            .build(&config, &closure())
            .expect("build");
        let options = manager.residual().freq_dom_options().expect("freq dom");
        assert_eq!(options.truncation_order, 3);
        assert_eq!(manager.residual().dofs().len(), 4);
    }

    #[test]
    fn negative_truncation_order_names_the_key() {
        let result = EquationSetFactory::new().build(&freq_dom("Helmholtz", -1), &closure());
        assert!(matches!(result, Err(EquationSetError::Config(_))));
        assert_err_contains(result, "Truncation order");
    }

    #[test]
    fn huge_basis_order_is_a_config_error() {
        let config = ParameterList::new()
            .with("Type", "Projection")
            .with("Basis Order", 2_147_483_648_i64);
        let result = EquationSetFactory::new().build(&config, &closure());
        assert!(matches!(result, Err(EquationSetError::Config(ref e)) if e.key() == "Basis Order"));
    }

    #[test]
    fn missing_freq_dom_options_is_a_config_error() {
        let config = ParameterList::new().with("Type", "FreqDom");
        let result = EquationSetFactory::new().build(&config, &closure());
        assert!(matches!(
            result,
            Err(EquationSetError::Config(ConfigError::MissingSublist { .. }))
        ));
        assert_err_contains(result, "FreqDom Options");
    }

    #[test]
    fn unknown_type_lists_registered_names() {
        let config = ParameterList::new().with("Type", "Maxwell");
        let result = EquationSetFactory::new().build(&config, &closure());
        assert!(matches!(
            result,
            Err(EquationSetError::UnknownEquationType { ref type_name, .. }) if type_name == "Maxwell"
        ));
        assert_err_contains(result, "\"Projection\", \"Helmholtz\", \"FreqDom\"");
    }

    #[test]
    fn missing_type_is_a_config_error() {
        let result = EquationSetFactory::new().build(&ParameterList::new(), &closure());
        assert!(matches!(result, Err(EquationSetError::Config(ref e)) if e.key() == "Type"));
    }

    #[test]
    fn freq_dom_cannot_wrap_itself() {
        let result = EquationSetFactory::new().build(&freq_dom("FreqDom", 1), &closure());
        assert!(matches!(
            result,
            Err(EquationSetError::UnsupportedTimeDomainType { .. })
        ));
    }

    #[test]
    fn registered_aliases_resolve_and_duplicates_are_rejected() {
        let mut factory = EquationSetFactory::new();
        factory
            .register("Screened Poisson", EquationSetType::Helmholtz)
            .expect("new alias");
        assert_eq!(
            factory.resolve("Screened Poisson").expect("alias"),
            EquationSetType::Helmholtz
        );
        assert_err_contains(
            factory.register("Projection", EquationSetType::Projection),
            "already registered",
        );

        let config = ParameterList::new().with("Type", "Screened Poisson");
        let manager = factory.build(&config, &closure()).expect("alias builds");
        assert_eq!(manager.residual().kind(), EquationSetType::Helmholtz);
    }

    #[test]
    fn empty_factory_knows_nothing() {
        let factory = EquationSetFactory::empty();
        assert_eq!(factory.registered_names().count(), 0);
        assert_err_contains(factory.resolve("Projection"), "not a valid equation set");
    }

    #[derive(Debug)]
    struct ProjectionOnly;

    impl HarmonicCoupling for ProjectionOnly {
        fn mode_zero_operands(&self, terms: &TermTable) -> Vec<String> {
            terms.terms.clone()
        }

        fn replica_operands(&self, _harmonic: usize, terms: &TermTable) -> Vec<String> {
            terms.terms[..1].to_vec()
        }
    }

    #[test]
    fn coupling_policy_controls_replica_operands() {
        let manager = EquationSetFactory::new()
            .with_coupling(Arc::new(ProjectionOnly))
            .build(&freq_dom("Helmholtz", 1), &closure())
            .expect("build");
        let aggregates = manager.residual().residual_aggregates();
        assert_eq!(aggregates[0].operands.len(), 3);
        assert_eq!(
            aggregates[1].operands,
            vec!["RESIDUAL_U_PROJECTION".to_string()]
        );
    }
}
