//! Validate a console configuration and summarize what it declares.

use anyhow::{Context, Result};
use facetkit_core::{BuiltFacet, ConsoleBuilder, ConsoleConfig};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct CheckSummary {
    entities: usize,
    facets: Vec<FacetSummary>,
}

#[derive(Serialize)]
struct FacetSummary {
    name: String,
    kind: &'static str,
    actions: usize,
    evaluators: usize,
    expire_timeout: i64,
}

/// Load, validate and build every facet of a configuration.
pub fn check_config(config_path: &Path, json: bool) -> Result<()> {
    let config = ConsoleConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let builder = ConsoleBuilder::new(config).context("Invalid configuration")?;

    let mut facets = Vec::new();
    for spec in &builder.config().facets {
        let built = builder
            .build_facet(spec, None)
            .with_context(|| format!("Failed to build facet '{}'", spec.qualified_name()))?;
        let core = built.lifecycle().core();
        facets.push(FacetSummary {
            name: spec.qualified_name(),
            kind: match &built {
                BuiltFacet::Plain(_) => "plain",
                BuiltFacet::Table(_) => "table",
            },
            actions: core.actions.len(),
            evaluators: core.action_state.evaluators().count(),
            expire_timeout: core.staleness().expire_timeout(),
        });
    }

    let summary = CheckSummary {
        entities: builder.entities().count(),
        facets,
    };
    tracing::debug!(entities = summary.entities, facets = summary.facets.len(), "configuration checked");

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Configuration OK: {} entities, {} facets",
            summary.entities,
            summary.facets.len()
        );
        for facet in &summary.facets {
            println!(
                "- {} ({}): {} actions, {} evaluators, expires after {}s",
                facet.name, facet.kind, facet.actions, facet.evaluators, facet.expire_timeout
            );
        }
    }

    Ok(())
}
