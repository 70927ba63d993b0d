use serde::Serialize;

use crate::balancer::CommandOutcome;
use crate::commands::HELP;
use crate::engine::{ScalabilityReport, SimulationResult, TickRecord};
use crate::models::{AlgoConfig, SimConfig};
use crate::server::RegistrySnapshot;

pub trait Formatter {
    fn write(&self, result: &SimulationResult) -> String;
    fn write_scalability(&self, report: &ScalabilityReport) -> String;
}

pub struct HumanFormatter;
pub struct SummaryFormatter;
pub struct JsonFormatter;

impl Formatter for HumanFormatter {
    fn write(&self, result: &SimulationResult) -> String {
        let mut out = String::new();
        push_metadata(&mut out, result);
        out.push_str("Ticks:\n");
        for tick in &result.ticks {
            out.push_str(&tick_line(tick));
        }
        push_final_state(&mut out, &result.final_state, &result.final_algorithm, true);
        push_totals(&mut out, result);
        out
    }

    fn write_scalability(&self, report: &ScalabilityReport) -> String {
        let mut out = String::new();
        push_scalability_header(&mut out, report);
        for round in &report.rounds {
            out.push_str(&format!(
                "Round {}: {} servers, {}, load {}/{} ({:.2}%), variance {:.2}\n",
                round.round,
                round.servers,
                round.algorithm,
                round.total_load,
                round.total_capacity,
                round.utilization_pct,
                round.load_variance
            ));
        }
        push_final_state(&mut out, &report.final_state, &report.status.algorithm, true);
        out
    }
}

impl Formatter for SummaryFormatter {
    fn write(&self, result: &SimulationResult) -> String {
        let mut out = String::new();
        push_metadata(&mut out, result);
        push_final_state(&mut out, &result.final_state, &result.final_algorithm, false);
        push_totals(&mut out, result);
        out
    }

    fn write_scalability(&self, report: &ScalabilityReport) -> String {
        let mut out = String::new();
        push_scalability_header(&mut out, report);
        push_final_state(&mut out, &report.final_state, &report.status.algorithm, false);
        out
    }
}

impl Formatter for JsonFormatter {
    fn write(&self, result: &SimulationResult) -> String {
        to_json(result)
    }

    fn write_scalability(&self, report: &ScalabilityReport) -> String {
        to_json(report)
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(json) => format!("{}\n", json),
        Err(err) => format!("{{\"error\": \"{}\"}}\n", err),
    }
}

fn push_metadata(out: &mut String, result: &SimulationResult) {
    let metadata = &result.metadata;
    out.push_str("Metadata:\n");
    out.push_str(&format!("algo: {}\n", metadata.algo));
    out.push_str(&format!("weighting: {}\n", metadata.weighting));
    out.push_str(&format!("pattern: {}\n", metadata.pattern));
    out.push_str(&format!("ticks: {}\n", metadata.ticks));
    out.push_str(&format!("tick_seconds: {}\n", metadata.tick_seconds));
    out.push_str(&format!("seed: {}\n", metadata.seed));
}

fn tick_line(tick: &TickRecord) -> String {
    let mut line = format!(
        "Tick {} (t={}s): load {} -> distributed {}, undistributed {}",
        tick.tick, tick.time_secs, tick.load, tick.distributed, tick.undistributed
    );
    if !tick.health_events.is_empty() {
        let events: Vec<String> = tick
            .health_events
            .iter()
            .map(|event| format!("#{} {}", event.server_id, event.state))
            .collect();
        line.push_str(&format!(" [health: {}]", events.join(", ")));
    }
    if tick.rebalanced {
        line.push_str(" [rebalanced]");
    }
    line.push('\n');
    line
}

fn push_final_state(
    out: &mut String,
    snapshot: &RegistrySnapshot,
    algorithm: &str,
    per_server: bool,
) {
    out.push_str("Final state:\n");
    if per_server {
        for server in &snapshot.servers {
            out.push_str(&format!(
                "Server #{} [{}] {}/{} ({:.1}%)\n",
                server.id,
                server.status,
                server.current_load,
                server.capacity,
                server.load_percentage
            ));
        }
    }
    out.push_str(&format!(
        "System Load: {}/{} ({:.2}%)\n",
        snapshot.total_load, snapshot.total_capacity, snapshot.utilization_pct
    ));
    out.push_str(&format!("Load Variance: {:.2}\n", snapshot.load_variance));
    out.push_str(&format!("Algorithm: {}\n", algorithm));
}

fn push_totals(out: &mut String, result: &SimulationResult) {
    let totals = &result.totals;
    out.push_str("Summary:\n");
    out.push_str(&format!("requested: {}\n", totals.requested));
    out.push_str(&format!("distributed: {}\n", totals.distributed));
    out.push_str(&format!("undistributed: {}\n", totals.undistributed));
    out.push_str(&format!("health transitions: {}\n", totals.health_transitions));
    out.push_str(&format!("rebalances: {}\n", totals.rebalances));
}

fn push_scalability_header(out: &mut String, report: &ScalabilityReport) {
    out.push_str("Scalability:\n");
    out.push_str(&format!(
        "Initial load: {}/{}\n",
        report.initial_load, report.initial_capacity
    ));
}

pub fn format_config(config: &SimConfig) -> String {
    let pattern = &config.pattern;
    let mut out = String::new();
    out.push_str(&format!("Algorithm: {}\n", config.algo));
    out.push_str(&format!("Weighting: {}\n", config.weighting));
    out.push_str(&format!(
        "Pattern: {} (base {}, amplitude {}, frequency {})\n",
        pattern.kind, pattern.base, pattern.amplitude, pattern.frequency
    ));
    out.push_str(&format!(
        "Ticks: {} x {}s\n",
        config.ticks, config.tick_seconds
    ));
    match config.rebalance_every {
        Some(every) => out.push_str(&format!("Rebalance: every {} ticks\n", every)),
        None => out.push_str("Rebalance: never\n"),
    }
    if config.health.enabled {
        out.push_str(&format!(
            "Health: enabled (failure {}, recovery {}, dwell {}s)\n",
            config.health.failure_probability,
            config.health.recovery_probability,
            config.health.min_dwell_secs
        ));
    } else {
        out.push_str("Health: disabled\n");
    }
    out.push_str(&format!("Random load: {}\n", config.random_load));
    out.push_str(&format!("Seed: {}\n", config.seed.unwrap_or(0)));
    out.push_str("Servers:\n");
    for (idx, server) in config.servers.iter().enumerate() {
        out.push_str(&format!("- #{} capacity {}\n", idx + 1, server.capacity));
    }
    out
}

pub fn format_outcome(outcome: &CommandOutcome, algo: AlgoConfig) -> String {
    match outcome {
        CommandOutcome::Distributed(allocation) => format!(
            "Added {} load units using {}: {} distributed, {} undistributed\n",
            allocation.requested,
            algo.name(),
            allocation.distributed(),
            allocation.undistributed
        ),
        CommandOutcome::ServerAdded(server_id) => format!("Server #{} added\n", server_id),
        CommandOutcome::ServerRemoved(removal) => {
            let mut line = format!(
                "Server #{} removed, {} load units redistributed",
                removal.server_id,
                removal.redistributed.distributed()
            );
            if removal.redistributed.undistributed > 0 {
                line.push_str(&format!(
                    ", {} undistributed",
                    removal.redistributed.undistributed
                ));
            }
            line.push('\n');
            line
        }
        CommandOutcome::Rebalanced(allocation) => format!(
            "Load rebalanced using {}: {} distributed, {} undistributed\n",
            algo.name(),
            allocation.distributed(),
            allocation.undistributed
        ),
        CommandOutcome::AlgorithmChanged(next) => format!("Switched to {} algorithm\n", next.name()),
        CommandOutcome::RandomLoadChanged(amount) => {
            format!("Random load amount set to {}\n", amount)
        }
        CommandOutcome::ServerLoaded { server_id, added } => {
            format!("Added {} load units to Server #{}\n", added, server_id)
        }
        CommandOutcome::Help => HELP.to_string(),
        CommandOutcome::Quit => "Exiting simulation...\n".to_string(),
    }
}
