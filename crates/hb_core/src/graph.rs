//! Named-field dependency graphs.
//!
//! A [`FieldGraph`] maps field names to the operator node producing them. It is
//! mutable while an equation set registers its operators; [`FieldGraph::finalize`]
//! checks that every input resolves (to a node or to an externally supplied
//! field) and that no field depends on itself, then hands back a read-only
//! [`FinalizedGraph`] in topological order. A failed finalization consumes the
//! builder, so no partially-checked graph is ever observable.

pub mod evaluate;
pub mod operators;
pub mod summation;

pub use evaluate::FieldValues;

use crate::basis::{BasisDescriptor, IntegrationDescriptor};
use crate::error::{DanglingInput, GraphError};
use crate::scalar::Scalar;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Write as _};
use std::marker::PhantomData;
use tracing::debug;

/// What a node computes from its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Interpolates the gathered coefficients of `dof` to the quadrature points.
    DofGather { dof: String, basis: BasisDescriptor },
    /// Interpolates the gradient of `dof` to the quadrature points.
    DofGradient { dof: String, basis: BasisDescriptor },
    /// `R_i = m Σ_q w_q φ_i(q) s(q)`
    BasisTimesScalar {
        basis: BasisDescriptor,
        rule: IntegrationDescriptor,
    },
    /// `R_i = m Σ_q w_q ∇φ_i(q) · F(q)`
    GradBasisDotVector {
        basis: BasisDescriptor,
        rule: IntegrationDescriptor,
    },
    /// Ordered sum of residual contributions.
    Sum,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::DofGather { .. } => "DOF",
            NodeKind::DofGradient { .. } => "DOFGradient",
            NodeKind::BasisTimesScalar { .. } => "Integrator_BasisTimesScalar",
            NodeKind::GradBasisDotVector { .. } => "Integrator_GradBasisDotVector",
            NodeKind::Sum => "SumStatic",
        }
    }
}

/// A named producer: one output field computed from declared input fields.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorNode {
    pub output: String,
    pub inputs: Vec<String>,
    pub multiplier: f64,
    pub kind: NodeKind,
}

impl fmt::Display for OperatorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <- [{}] ({}",
            self.output,
            self.inputs.join(", "),
            self.kind.label()
        )?;
        match &self.kind {
            NodeKind::DofGather { basis, .. } | NodeKind::DofGradient { basis, .. } => {
                write!(f, ", {basis}")?
            }
            NodeKind::BasisTimesScalar { basis, rule }
            | NodeKind::GradBasisDotVector { basis, rule } => {
                write!(f, ", {basis}, {rule}, multiplier={}", self.multiplier)?
            }
            NodeKind::Sum => {}
        }
        write!(f, ")")
    }
}

/// Mutable registry of field producers for one computation mode.
#[derive(Debug)]
pub struct FieldGraph<T: Scalar> {
    nodes: Vec<OperatorNode>,
    producers: HashMap<String, usize>,
    _mode: PhantomData<fn() -> T>,
}

impl<T: Scalar> Default for FieldGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> FieldGraph<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            producers: HashMap::new(),
            _mode: PhantomData,
        }
    }

    /// Registers `node` as the producer of its output field.
    pub fn declare(&mut self, node: OperatorNode) -> Result<(), GraphError> {
        if self.producers.contains_key(&node.output) {
            return Err(GraphError::DuplicateField(node.output));
        }
        debug!(field = %node.output, kind = node.kind.label(), "declared field");
        self.producers.insert(node.output.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.producers.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&OperatorNode> {
        self.producers.get(name).map(|&idx| &self.nodes[idx])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolves every input against the declared producers and `external`, and
    /// orders the nodes so each is evaluated after its inputs.
    pub fn finalize<S: AsRef<str>>(self, external: &[S]) -> Result<FinalizedGraph<T>, GraphError> {
        let external: BTreeSet<String> = external
            .iter()
            .map(|s| s.as_ref().to_string())
            .filter(|name| !self.producers.contains_key(name))
            .collect();

        let dangling: Vec<DanglingInput> = self
            .nodes
            .iter()
            .flat_map(|node| {
                node.inputs
                    .iter()
                    .filter(|input| {
                        !self.producers.contains_key(*input) && !external.contains(*input)
                    })
                    .map(|input| DanglingInput {
                        field: input.clone(),
                        required_by: node.output.clone(),
                    })
            })
            .collect();
        if !dangling.is_empty() {
            return Err(GraphError::UnresolvedReference(dangling));
        }

        let order = self.topological_order()?;
        let external_used: BTreeSet<String> = external
            .into_iter()
            .filter(|name| self.nodes.iter().any(|n| n.inputs.contains(name)))
            .collect();

        Ok(FinalizedGraph {
            nodes: self.nodes,
            order,
            producers: self.producers,
            external: external_used,
            _mode: PhantomData,
        })
    }

    /// Kahn's algorithm over node indices; falls back to a DFS to name a cycle.
    fn topological_order(&self) -> Result<Vec<usize>, GraphError> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (idx, node) in self.nodes.iter().enumerate() {
            for input in &node.inputs {
                if let Some(&producer) = self.producers.get(input) {
                    indegree[idx] += 1;
                    dependents[producer].push(idx);
                }
            }
        }

        // Seed in declaration order so the listing is deterministic.
        let mut ready: std::collections::VecDeque<usize> =
            (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(idx) = ready.pop_front() {
            order.push(idx);
            for &next in &dependents[idx] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() == n {
            Ok(order)
        } else {
            let stuck: Vec<usize> = (0..n).filter(|&i| indegree[i] > 0).collect();
            Err(GraphError::CyclicDependency(self.find_cycle(&stuck)))
        }
    }

    fn find_cycle(&self, stuck: &[usize]) -> Vec<String> {
        // Every stuck node has at least one stuck producer among its inputs, so
        // walking producers from any stuck node must revisit a node.
        let Some(&start) = stuck.first() else {
            return Vec::new();
        };
        let mut path: Vec<usize> = vec![start];
        let mut current = start;
        loop {
            let next = self.nodes[current]
                .inputs
                .iter()
                .filter_map(|input| self.producers.get(input).copied())
                .find(|p| stuck.contains(p));
            let Some(next) = next else {
                break;
            };
            if let Some(pos) = path.iter().position(|&p| p == next) {
                let mut cycle: Vec<String> = path[pos..]
                    .iter()
                    .map(|&i| self.nodes[i].output.clone())
                    .collect();
                cycle.push(self.nodes[next].output.clone());
                return cycle;
            }
            path.push(next);
            current = next;
        }
        path.iter().map(|&i| self.nodes[i].output.clone()).collect()
    }
}

/// Read-only graph with a fixed evaluation order.
#[derive(Debug, Clone)]
pub struct FinalizedGraph<T: Scalar> {
    nodes: Vec<OperatorNode>,
    order: Vec<usize>,
    producers: HashMap<String, usize>,
    external: BTreeSet<String>,
    _mode: PhantomData<fn() -> T>,
}

impl<T: Scalar> FinalizedGraph<T> {
    pub fn exists(&self, name: &str) -> bool {
        self.producers.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&OperatorNode> {
        self.producers.get(name).map(|&idx| &self.nodes[idx])
    }

    /// Nodes in evaluation order.
    pub fn nodes(&self) -> impl Iterator<Item = &OperatorNode> + '_ {
        self.order.iter().map(|&idx| &self.nodes[idx])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fields consumed by the graph but supplied from outside it.
    pub fn external_fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.external.iter().map(String::as_str)
    }

    /// Human-readable `field <- [inputs]` listing, one node per line.
    pub fn dependency_listing(&self) -> String {
        let mut out = String::new();
        for node in self.nodes() {
            let _ = writeln!(out, "{node}");
        }
        for field in &self.external {
            let _ = writeln!(out, "{field} <- external");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sum(output: &str, inputs: &[&str]) -> OperatorNode {
        OperatorNode {
            output: output.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            multiplier: 1.0,
            kind: NodeKind::Sum,
        }
    }

    #[test]
    fn declare_rejects_duplicate_outputs() {
        let mut graph = FieldGraph::<f64>::new();
        graph.declare(sum("R", &["A"])).expect("first declaration");
        let err = graph.declare(sum("R", &["B"])).expect_err("duplicate");
        assert_eq!(err, GraphError::DuplicateField("R".to_string()));
        assert!(graph.exists("R"));
        assert!(!graph.exists("A"));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn finalize_lists_every_dangling_input() {
        let mut graph = FieldGraph::<f64>::new();
        graph.declare(sum("R", &["A", "B", "SRC"])).expect("declare");
        let err = graph.finalize(&["SRC"]).expect_err("A and B are dangling");
        match err {
            GraphError::UnresolvedReference(dangling) => {
                let fields: Vec<&str> = dangling.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, vec!["A", "B"]);
                assert!(dangling.iter().all(|d| d.required_by == "R"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn finalize_detects_cycles() {
        let mut graph = FieldGraph::<f64>::new();
        graph.declare(sum("A", &["C"])).expect("declare");
        graph.declare(sum("B", &["A"])).expect("declare");
        graph.declare(sum("C", &["B"])).expect("declare");
        graph.declare(sum("D", &["A"])).expect("declare");
        let err = graph.finalize::<&str>(&[]).expect_err("cycle");
        let GraphError::CyclicDependency(cycle) = err else {
            panic!("expected a cycle error");
        };
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
        assert!(!cycle.contains(&"D".to_string()));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut graph = FieldGraph::<f64>::new();
        graph.declare(sum("A", &["A"])).expect("declare");
        let err = graph.finalize::<&str>(&[]).expect_err("self cycle");
        assert!(err.to_string().contains("A -> A"));
    }

    #[test]
    fn finalized_graph_orders_producers_before_consumers() {
        let mut graph = FieldGraph::<f64>::new();
        graph.declare(sum("TOTAL", &["X", "Y"])).expect("declare");
        graph.declare(sum("Y", &["SRC"])).expect("declare");
        graph.declare(sum("X", &["SRC"])).expect("declare");
        let finalized = graph.finalize(&["SRC", "UNUSED"]).expect("finalize");

        let order: Vec<&str> = finalized.nodes().map(|n| n.output.as_str()).collect();
        assert_eq!(order, vec!["Y", "X", "TOTAL"]);
        let external: Vec<&str> = finalized.external_fields().collect();
        assert_eq!(external, vec!["SRC"]);

        let listing = finalized.dependency_listing();
        assert_eq!(
            listing,
            "Y <- [SRC] (SumStatic)\nX <- [SRC] (SumStatic)\nTOTAL <- [X, Y] (SumStatic)\nSRC <- external\n"
        );
    }
}
