//! Scripted replacements for the EDA tools that would otherwise shell out
//! to an external binary (verilator, iverilog, docker, yosys, ...), for
//! integration tests that exercise the agent loop end to end without
//! those binaries installed.
//!
//! Pass/fail behavior is keyed off plain-text markers in the workspace
//! files the tool reads, so a test steers a scripted provider's tool
//! calls toward either branch just by writing different file content —
//! the same way a real linter/simulator would differ on buggy vs. fixed
//! RTL.

use std::sync::Arc;

use eda_domain::error::Error;
use eda_domain::tool::{ToolCategory, ToolDefinition};
use serde_json::json;

use crate::catalog::{
    arg_array, arg_f64, arg_f64_opt, arg_str, arg_str_opt, bad_args, parse_run_id,
    register_non_eda_tools, scan_vcd, to_yaml, ToolOutcome,
};
use crate::executor::{HandlerFut, Invocation, ToolContext};
use crate::job::{JobStatus, StubOutcome, SynthesisMetrics, SynthesisParams};
use crate::registry::ToolRegistry;
use crate::workspace::WriteMode;

const LINT_FAIL_MARKER: &str = "LINT_FAIL";
const BUGGY_RESET_MARKER: &str = "BUGGY_RESET";
const SYNTH_FAIL_MARKER: &str = "SYNTH_FAIL";

fn handler<F>(f: F) -> Arc<dyn Fn(Arc<ToolContext>, Invocation) -> HandlerFut + Send + Sync>
where
    F: Fn(Arc<ToolContext>, Invocation) -> HandlerFut + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A tool registry wired for tests: real handlers for spec/file/
/// reporting/session tools (no external dependency to begin with), and
/// scripted handlers for everything that would otherwise shell out to an
/// EDA binary or a docker-backed synthesis job.
pub fn build_stub_registry(ctx: Arc<ToolContext>) -> ToolRegistry {
    let _ = &ctx; // handlers receive their own Arc<ToolContext> per call
    let mut registry = ToolRegistry::new();
    register_non_eda_tools(&mut registry);
    register_stub_verification_tools(&mut registry);
    register_stub_synthesis_tools(&mut registry);
    registry
}

fn register_stub_verification_tools(registry: &mut ToolRegistry) {
    registry.register(
        ToolDefinition {
            name: "linter_tool".into(),
            description: "Run a Verilog syntax/lint checker over a file.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"file_path": {"type": "string"}},
                "required": ["file_path"],
            }),
            category: ToolCategory::Essential,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let file_path = arg_str("linter_tool", &inv.arguments, "file_path")?;
                let content = ctx.workspace_for(&inv.session_id).read_file_text(file_path).await?;
                let pass = !content.contains(LINT_FAIL_MARKER);
                Ok(to_yaml(&ToolOutcome {
                    pass,
                    exit_code: Some(if pass { 0 } else { 1 }),
                    messages: if pass {
                        "no lint errors".to_string()
                    } else {
                        format!("{LINT_FAIL_MARKER} marker present: syntax error near module body")
                    },
                }))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "simulation_tool".into(),
            description: "Compile design files and a testbench, then run the simulation.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "design_files": {"type": "array"},
                    "tb_file": {"type": "string"},
                    "mode": {"type": "string", "enum": ["rtl", "post-synth"]},
                },
                "required": ["design_files", "tb_file"],
            }),
            category: ToolCategory::Essential,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let design_files: Vec<String> = arg_array(&inv.arguments, "design_files")
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect();
                if design_files.is_empty() {
                    return Err(bad_args("simulation_tool", "design_files must not be empty"));
                }
                let workspace = ctx.workspace_for(&inv.session_id);
                let mut buggy = false;
                for f in &design_files {
                    if workspace
                        .read_file_text(f)
                        .await
                        .map(|c| c.contains(BUGGY_RESET_MARKER))
                        .unwrap_or(false)
                    {
                        buggy = true;
                    }
                }

                workspace
                    .write_file("wave.vcd", scripted_vcd(buggy).as_bytes(), WriteMode::CreateOrReplace)
                    .await?;

                Ok(to_yaml(&ToolOutcome {
                    pass: !buggy,
                    exit_code: Some(if buggy { 1 } else { 0 }),
                    messages: if buggy {
                        "mismatch: 'out' did not reset to 0 at time 0".to_string()
                    } else {
                        "all assertions passed".to_string()
                    },
                }))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "waveform_tool".into(),
            description: "Inspect signal transitions in a VCD file within a time window.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "vcd_path": {"type": "string"},
                    "signals": {"type": "array"},
                    "start": {"type": "number"},
                    "end": {"type": "number"},
                },
                "required": ["vcd_path", "signals"],
            }),
            category: ToolCategory::Verification,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let vcd_path = arg_str("waveform_tool", &inv.arguments, "vcd_path")?;
                let signals: Vec<String> = arg_array(&inv.arguments, "signals")
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect();
                let start = arg_f64_opt(&inv.arguments, "start").unwrap_or(0.0);
                let end = arg_f64_opt(&inv.arguments, "end").unwrap_or(f64::MAX);
                let text = ctx.workspace_for(&inv.session_id).read_file_text(vcd_path).await?;
                let transitions = scan_vcd(&text, &signals, start, end);
                Ok(to_yaml(&transitions))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "cocotb_tool".into(),
            description: "Run a cocotb testbench for a module.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"module": {"type": "string"}, "test": {"type": "string"}},
                "required": ["module", "test"],
            }),
            category: ToolCategory::Verification,
        },
        handler(|_ctx, _inv| {
            Box::pin(async move {
                Ok(to_yaml(&ToolOutcome {
                    pass: true,
                    exit_code: Some(0),
                    messages: "1 test, 1 passed".to_string(),
                }))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "sby_tool".into(),
            description: "Run the SymbiYosys formal checker against a .sby file.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"sby_file": {"type": "string"}},
                "required": ["sby_file"],
            }),
            category: ToolCategory::Verification,
        },
        handler(|_ctx, _inv| {
            Box::pin(async move {
                Ok(to_yaml(&ToolOutcome {
                    pass: true,
                    exit_code: Some(0),
                    messages: "PASS".to_string(),
                }))
            })
        }),
    );
}

/// A minimal two-signal VCD: `clk` toggling and `out`'s reset value
/// depending on whether the design under test is scripted as buggy, so
/// `waveform_tool` has something real to inspect around the reset edge.
fn scripted_vcd(buggy: bool) -> String {
    let reset_value = if buggy { "1" } else { "0" };
    format!(
        "$var wire 1 ! clk $end\n\
         $var wire 1 \" out $end\n\
         $enddefinitions $end\n\
         #0\n0!\n{reset_value}\"\n\
         #5\n1!\n0\"\n\
         #10\n0!\n1\"\n"
    )
}

fn register_stub_synthesis_tools(registry: &mut ToolRegistry) {
    registry.register(
        ToolDefinition {
            name: "start_synthesis".into(),
            description: "Begin an asynchronous synthesis job for the current spec.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "clock_period": {"type": "number"},
                    "utilization": {"type": "number"},
                    "margin": {"type": "number"},
                    "spec_path": {"type": "string"},
                    "restart_stuck": {"type": "boolean"},
                },
                "required": ["clock_period"],
            }),
            category: ToolCategory::Synthesis,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let clock_period = arg_f64("start_synthesis", &inv.arguments, "clock_period")?;
                let spec_path = arg_str_opt(&inv.arguments, "spec_path", "spec.yaml").to_owned();
                let restart_stuck = inv
                    .arguments
                    .get("restart_stuck")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let workspace = ctx.workspace_for(&inv.session_id);
                let synth_fails = workspace
                    .read_file_text(&spec_path)
                    .await
                    .map(|s| s.contains(SYNTH_FAIL_MARKER))
                    .unwrap_or(false);
                let params = SynthesisParams {
                    spec_path,
                    clock_period,
                    utilization: arg_f64_opt(&inv.arguments, "utilization"),
                    margin: arg_f64_opt(&inv.arguments, "margin"),
                    extra: inv.arguments.clone(),
                };
                let outcome = if synth_fails {
                    StubOutcome::Failed("synthesis recipe exited nonzero".to_string())
                } else {
                    StubOutcome::Succeeded(SynthesisMetrics {
                        wns: Some(0.12),
                        tns: Some(0.0),
                        area: Some(842.5),
                        power: Some(1.3),
                    })
                };
                let run_id = ctx.jobs.start_stub(&inv.session_id, params, restart_stuck, outcome)?;
                Ok(run_id.to_string())
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "get_synthesis_job".into(),
            description: "Poll a synthesis job's state, stage, and log tail.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"run_id": {"type": "string"}},
                "required": ["run_id"],
            }),
            category: ToolCategory::Synthesis,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let run_id = parse_run_id("get_synthesis_job", &inv.arguments)?;
                let state = ctx
                    .jobs
                    .status(&run_id)
                    .ok_or_else(|| Error::NotFound(run_id.to_string()))?;
                Ok(to_yaml(&state))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "wait_for_synthesis".into(),
            description: "Block up to max_wait_sec for a synthesis job to reach a terminal state.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"run_id": {"type": "string"}, "max_wait_sec": {"type": "number"}},
                "required": ["run_id"],
            }),
            category: ToolCategory::Synthesis,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let run_id = parse_run_id("wait_for_synthesis", &inv.arguments)?;
                let max_wait = arg_f64_opt(&inv.arguments, "max_wait_sec").unwrap_or(30.0);
                let state = ctx
                    .jobs
                    .wait(&run_id, std::time::Duration::from_secs_f64(max_wait.max(0.0)))
                    .await
                    .ok_or_else(|| Error::NotFound(run_id.to_string()))?;
                Ok(to_yaml(&state))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "get_synthesis_metrics".into(),
            description: "Parse PPA metrics (WNS, TNS, area, power) for a succeeded job.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"run_id": {"type": "string"}},
                "required": ["run_id"],
            }),
            category: ToolCategory::Synthesis,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let run_id = parse_run_id("get_synthesis_metrics", &inv.arguments)?;
                let state = ctx
                    .jobs
                    .status(&run_id)
                    .ok_or_else(|| Error::NotFound(run_id.to_string()))?;
                if state.record.status != JobStatus::Succeeded {
                    return Err(Error::JobFailed(format!(
                        "job {run_id} is {:?}, metrics only available once succeeded",
                        state.record.status
                    )));
                }
                let metrics = ctx.jobs.metrics(&run_id).unwrap_or_default();
                Ok(to_yaml(&metrics))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "search_logs_tool".into(),
            description: "Grep a synthesis job's captured log for a regex pattern.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"run_id": {"type": "string"}, "pattern": {"type": "string"}},
                "required": ["run_id", "pattern"],
            }),
            category: ToolCategory::Synthesis,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let run_id = parse_run_id("search_logs_tool", &inv.arguments)?;
                let pattern = arg_str("search_logs_tool", &inv.arguments, "pattern")?;
                let matches = ctx.jobs.search_logs(&run_id, pattern)?;
                Ok(to_yaml(&matches))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "schematic_tool".into(),
            description: "Render an SVG schematic netlist for a Verilog file.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"verilog_file": {"type": "string"}},
                "required": ["verilog_file"],
            }),
            category: ToolCategory::Synthesis,
        },
        handler(|_ctx, _inv| Box::pin(async move { Ok("schematic.svg".to_string()) })),
    );
}
