use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use hb_core::scalar::Scalar;
use hb_core::{
    ClosureModels, EquationSet, EquationSetFactory, EvaluationMode, ModeVisitor, ParameterList,
    TemplateManager,
};
use serde::Deserialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hb")]
#[command(about = "Builds harmonic-balance equation sets and prints their field graphs", long_about = None)]
struct Cli {
    /// JSON input deck with "Equation Set" and "Closure Models" sections.
    deck: PathBuf,

    /// Computation mode(s) to report.
    #[arg(long, value_enum, default_value_t = ModeArg::All)]
    mode: ModeArg,

    /// Also print the validated equation set parameters, defaults filled in.
    #[arg(long)]
    show_params: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Residual,
    Jacobian,
    All,
}

impl ModeArg {
    fn includes(self, mode: EvaluationMode) -> bool {
        match self {
            ModeArg::All => true,
            ModeArg::Residual => mode == EvaluationMode::Residual,
            ModeArg::Jacobian => mode == EvaluationMode::Jacobian,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Deck {
    #[serde(rename = "Equation Set")]
    equation_set: ParameterList,
    #[serde(rename = "Closure Models", default)]
    closure_models: ClosureModels,
}

struct Report {
    mode: ModeArg,
    out: String,
}

impl ModeVisitor for Report {
    fn visit<T: Scalar>(&mut self, mode: EvaluationMode, set: &EquationSet<T>) {
        if !self.mode.includes(mode) {
            return;
        }
        let out = &mut self.out;
        let _ = writeln!(out, "== {mode} ({}) ==", set.kind());
        let _ = writeln!(out, "DOFs:");
        for dof in set.dofs() {
            let gradient = dof.gradient.as_deref().unwrap_or("-");
            let _ = writeln!(out, "  {} [{}] gradient: {gradient}", dof.name, dof.basis);
        }
        let _ = writeln!(out, "Residuals:");
        for aggregate in set.residual_aggregates() {
            let _ = writeln!(
                out,
                "  {} = {}",
                aggregate.name,
                aggregate.operands.join(" + ")
            );
        }
        match set.graph() {
            Some(graph) => {
                let _ = writeln!(out, "Graph ({} nodes):", graph.len());
                for line in graph.dependency_listing().lines() {
                    let _ = writeln!(out, "  {line}");
                }
            }
            None => {
                let _ = writeln!(out, "Graph: not finalized");
            }
        }
        let _ = writeln!(out);
    }
}

fn parse_deck(text: &str) -> Result<Deck> {
    serde_json::from_str(text).context("input deck is not a valid JSON deck")
}

fn render(manager: &TemplateManager, mode: ModeArg) -> String {
    let mut report = Report {
        mode,
        out: String::new(),
    };
    manager.for_each_mode(&mut report);
    report.out
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let text = std::fs::read_to_string(&cli.deck)
        .with_context(|| format!("failed to read input deck {}", cli.deck.display()))?;
    let deck = parse_deck(&text)
        .with_context(|| format!("failed to load input deck {}", cli.deck.display()))?;

    let manager = EquationSetFactory::new()
        .build(&deck.equation_set, &deck.closure_models)
        .context("failed to build equation set")?;
    info!(
        dofs = manager.residual().dofs().len(),
        residuals = manager.residual().residual_aggregates().len(),
        "equation set built"
    );

    if cli.show_params {
        let params = serde_json::to_string_pretty(manager.residual().params())
            .context("failed to serialize parameters")?;
        println!("{params}\n");
    }

    print!("{}", render(&manager, cli.mode));
    Ok(())
}
