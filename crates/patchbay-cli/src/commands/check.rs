//! Patch file validation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use patchbay_core::PatchGraph;
use patchbay_registry::ObjectRegistry;
use serde::Serialize;

use super::common::read_patch;

#[derive(Args)]
pub struct CheckArgs {
    /// Patch file (.pd)
    patch: PathBuf,

    /// Fail if anything was skipped or any object is unknown
    #[arg(long)]
    strict: bool,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct CheckSummary {
    nodes: usize,
    connections: usize,
    unknown_objects: Vec<String>,
    skipped_connections: Vec<String>,
    skipped_statements: Vec<String>,
}

impl CheckSummary {
    fn is_clean(&self) -> bool {
        self.unknown_objects.is_empty()
            && self.skipped_connections.is_empty()
            && self.skipped_statements.is_empty()
    }
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let text = read_patch(&args.patch)?;
    let mut graph = PatchGraph::new(Arc::new(ObjectRegistry::new()));
    let report = graph.deserialize(&text)?;

    let summary = CheckSummary {
        nodes: report.nodes,
        connections: report.connections,
        unknown_objects: graph
            .nodes()
            .filter(|n| !n.is_valid())
            .map(|n| n.text().to_string())
            .collect(),
        skipped_connections: report
            .skipped_connections
            .iter()
            .map(|s| format!("connect {} {} {} {}: {}", s.source, s.outlet, s.dest, s.inlet, s.fault))
            .collect(),
        skipped_statements: report.skipped_statements.clone(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", args.patch.display());
        println!("  {} node(s), {} connection(s)", summary.nodes, summary.connections);
        for name in &summary.unknown_objects {
            println!("  unknown object: {name}");
        }
        for line in &summary.skipped_connections {
            println!("  skipped {line}");
        }
        for keyword in &summary.skipped_statements {
            println!("  skipped statement: {keyword}");
        }
    }

    if args.strict && !summary.is_clean() {
        anyhow::bail!("{} did not load cleanly", args.patch.display());
    }
    Ok(())
}
