//! The `hb_core` crate builds the residual graphs of finite-element equation
//! sets, including harmonic-balance (frequency-domain) wrappers that replicate
//! a time-domain equation across a truncated set of Fourier modes.
//!
//! Key components:
//! - **Config**: `ParameterList` and declarative `ParameterSchema` validation with defaults.
//! - **Graph**: a named-field dependency graph, operator builders and summation,
//!   evaluated over a `Workset` once finalized.
//! - **Equation sets**: the `Projection` / `Helmholtz` physics and the `FreqDom` wrapper.
//! - **Template manager**: one equation set per computation mode (`f64` residual,
//!   `Dual` Jacobian), built by the `EquationSetFactory`.
pub mod basis;
pub mod closure;
pub mod config;
pub mod equation_set;
pub mod error;
pub mod factory;
pub mod graph;
pub mod scalar;
pub mod template_manager;

pub use closure::ClosureModels;
pub use config::{ParamValue, ParameterList, ParameterSchema};
pub use equation_set::{EquationSet, EquationSetState, EquationSetType};
pub use error::{ConfigError, EquationSetError, EvaluationError, GraphError};
pub use factory::EquationSetFactory;
pub use template_manager::{EvaluationMode, ModeVisitor, TemplateManager};
