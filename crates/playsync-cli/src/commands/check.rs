use crate::output::{Output, OutputFormat};
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Table};
use playsync_config::{Config, PathManager};
use playsync_core::GroupPlan;
use playsync_sources::ServerFactoryRegistry;
use serde_json::json;

/// Names in `plan` that match no configured server.
fn unknown_servers(config: &Config, plan: &GroupPlan) -> Vec<String> {
    std::iter::once(&plan.source)
        .chain(plan.targets.iter())
        .filter(|name| !config.servers.contains_key(*name))
        .cloned()
        .collect()
}

/// Validate the configuration and print how each group resolves, without
/// contacting any server.
pub fn run_check(paths: &PathManager, output: &Output) -> Result<()> {
    let config = super::load_config(paths)?;
    ServerFactoryRegistry::new()
        .validate_all_configs(&config)
        .map_err(|e| color_eyre::eyre::eyre!("Configuration validation failed: {}", e))?;

    let plans = GroupPlan::all(&config);
    let trakt_ready = config.is_trakt_configured();

    match output.format() {
        OutputFormat::Human => {
            if output.is_quiet() {
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
            table.set_header(
                ["Group", "Source", "Targets", "Trakt", "Interval", "Identity"]
                    .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
            );
            for plan in &plans {
                table.add_row(vec![
                    plan.name.clone(),
                    plan.source.clone(),
                    plan.targets.join(", "),
                    if plan.remote_history { "yes" } else { "no" }.to_string(),
                    format!("{:?}", plan.interval),
                    format!("{:?}", plan.identity),
                ]);
            }
            println!("{}", table);
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let groups: Vec<_> = plans
                .iter()
                .map(|plan| {
                    json!({
                        "name": plan.name,
                        "source": plan.source,
                        "targets": plan.targets,
                        "trakt": plan.remote_history,
                        "interval_ms": plan.interval.as_millis() as u64,
                        "identity_key": plan.identity,
                        "unknown_servers": unknown_servers(&config, plan),
                    })
                })
                .collect();
            output.json(&json!({
                "config_file": paths.config_file().display().to_string(),
                "scrobbling_enabled": config.scrobbling_enabled(),
                "trakt_configured": trakt_ready,
                "groups": groups,
            }));
        }
    }

    for plan in &plans {
        let unknown = unknown_servers(&config, plan);
        if !unknown.is_empty() {
            output.warn(format!(
                "Group '{}' names unknown server(s) {} and will be skipped",
                plan.name,
                unknown.join(", ")
            ));
        }
        if plan.remote_history && !trakt_ready {
            output.warn(format!("Group '{}' lists trakt but [trakt] is not configured", plan.name));
        }
    }
    if !config.scrobbling_enabled() {
        output.warn("Scrobbling is disabled: the global interval is 0");
    }
    output.success("Configuration is valid");
    Ok(())
}
