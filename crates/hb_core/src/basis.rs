//! Basis and integration descriptors, and the per-cell workset supplied by the
//! discretization layer.
//!
//! The descriptors are opaque to the graph: operator builders record them and
//! pass them through. Shape-function values themselves arrive in a [`Workset`].

use crate::error::{ConfigError, EvaluationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasisKind {
    HGrad,
    HCurl,
    HDiv,
    Const,
}

impl BasisKind {
    pub const ALL: [BasisKind; 4] = [
        BasisKind::HGrad,
        BasisKind::HCurl,
        BasisKind::HDiv,
        BasisKind::Const,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BasisKind::HGrad => "HGrad",
            BasisKind::HCurl => "HCurl",
            BasisKind::HDiv => "HDiv",
            BasisKind::Const => "Const",
        }
    }

    /// Lowest polynomial order the basis family supports.
    fn min_order(&self) -> i64 {
        match self {
            BasisKind::Const => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for BasisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BasisKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BasisKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigError::NotInAllowedSet {
                key: "Basis Type".to_string(),
                value: s.to_string(),
                allowed: BasisKind::ALL
                    .iter()
                    .map(|k| format!("\"{k}\""))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Basis family and polynomial order of a DOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BasisDescriptor {
    pub kind: BasisKind,
    pub order: u32,
}

impl BasisDescriptor {
    pub fn new(kind: &str, order: i64) -> Result<Self, ConfigError> {
        let kind: BasisKind = kind.parse()?;
        if order < kind.min_order() {
            return Err(ConfigError::OutOfRange {
                key: "Basis Order".to_string(),
                value: order.to_string(),
                bound: format!(">= {} for a {kind} basis", kind.min_order()),
            });
        }
        let order = u32::try_from(order).map_err(|_| ConfigError::OutOfRange {
            key: "Basis Order".to_string(),
            value: order.to_string(),
            bound: format!("<= {}", u32::MAX),
        })?;
        Ok(Self { kind, order })
    }

    /// Name of the basis layout, e.g. `HGrad:1`.
    pub fn layout_name(&self) -> String {
        format!("{}:{}", self.kind, self.order)
    }
}

impl fmt::Display for BasisDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.layout_name())
    }
}

/// Quadrature order of the integration rule used for a DOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegrationDescriptor {
    pub order: u32,
}

impl IntegrationDescriptor {
    /// `-1` derives the order from the basis (exact for mass matrices).
    pub const DERIVE_FROM_BASIS: i64 = -1;

    pub fn new(order: i64, basis: &BasisDescriptor) -> Result<Self, ConfigError> {
        if order == Self::DERIVE_FROM_BASIS {
            let derived = basis
                .order
                .checked_mul(2)
                .ok_or_else(|| ConfigError::OutOfRange {
                    key: "Basis Order".to_string(),
                    value: basis.order.to_string(),
                    bound: format!("<= {} to derive the integration order", u32::MAX / 2),
                })?;
            return Ok(Self {
                order: derived.max(1),
            });
        }
        let order = u32::try_from(order).map_err(|_| ConfigError::OutOfRange {
            key: "Integration Order".to_string(),
            value: order.to_string(),
            bound: ">= 0, or -1 to derive from the basis".to_string(),
        })?;
        Ok(Self { order })
    }
}

impl fmt::Display for IntegrationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CubatureDegree={}", self.order)
    }
}

/// Basis values, basis gradients and quadrature weights for one cell.
///
/// Storage is row-major:
/// - `basis[i * num_points + q]`
/// - `grad_basis[(i * num_points + q) * dim + d]`
/// - `weights[q]` (already scaled by the cell measure)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workset {
    pub num_basis: usize,
    pub num_points: usize,
    pub dim: usize,
    pub basis: Vec<f64>,
    pub grad_basis: Vec<f64>,
    pub weights: Vec<f64>,
}

impl Workset {
    pub fn new(
        num_basis: usize,
        num_points: usize,
        dim: usize,
        basis: Vec<f64>,
        grad_basis: Vec<f64>,
        weights: Vec<f64>,
    ) -> Result<Self, EvaluationError> {
        let workset = Self {
            num_basis,
            num_points,
            dim,
            basis,
            grad_basis,
            weights,
        };
        workset.check()?;
        Ok(workset)
    }

    pub fn check(&self) -> Result<(), EvaluationError> {
        let expect = |name: &str, actual: usize, expected: usize| {
            if actual == expected {
                Ok(())
            } else {
                Err(EvaluationError::InvalidWorkset(format!(
                    "{name} has {actual} entries, expected {expected}"
                )))
            }
        };
        expect("basis", self.basis.len(), self.num_basis * self.num_points)?;
        expect(
            "grad_basis",
            self.grad_basis.len(),
            self.num_basis * self.num_points * self.dim,
        )?;
        expect("weights", self.weights.len(), self.num_points)
    }

    pub fn phi(&self, i: usize, q: usize) -> f64 {
        self.basis[i * self.num_points + q]
    }

    pub fn grad_phi(&self, i: usize, q: usize, d: usize) -> f64 {
        self.grad_basis[(i * self.num_points + q) * self.dim + d]
    }
}
