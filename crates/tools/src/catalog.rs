//! The EDA tool catalog — every tool the agent loop, REST transport, and
//! MCP server can invoke. No generic "run arbitrary command" tool is
//! registered here: every entry is a named, schema-typed operation whose
//! handler internally uses the subprocess [`crate::runner`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eda_domain::error::{Error, Result};
use eda_domain::tool::{ToolCategory, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::executor::{HandlerFut, Invocation, ToolContext};
use crate::job::SynthesisParams;
use crate::registry::{ToolFilter, ToolRegistry};
use crate::runner::{self, RunRequest};
use crate::workspace::{Edit, WorkspaceEntry, WriteMode};

const SPEC_FILENAME: &str = "spec.yaml";
const METRICS_FILENAME: &str = "metrics.json";
const REPORT_FILENAME: &str = "report.md";

/// Register every catalog tool into `registry`.
pub fn register_all(registry: &mut ToolRegistry, ctx: Arc<ToolContext>) {
    let _ = &ctx; // handlers receive their own Arc<ToolContext> per call
    register_spec_tools(registry);
    register_file_tools(registry);
    register_verification_tools(registry);
    register_synthesis_tools(registry);
    register_reporting_tools(registry);
    register_session_tools(registry);
}

fn handler<F>(f: F) -> Arc<dyn Fn(Arc<ToolContext>, Invocation) -> HandlerFut + Send + Sync>
where
    F: Fn(Arc<ToolContext>, Invocation) -> HandlerFut + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn bad_args(tool: &str, message: impl Into<String>) -> Error {
    Error::BadArgs {
        tool: tool.to_owned(),
        message: message.into(),
    }
}

pub(crate) fn arg_str<'a>(tool: &str, args: &'a serde_json::Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| bad_args(tool, format!("missing or non-string field '{key}'")))
}

pub(crate) fn arg_str_opt<'a>(args: &'a serde_json::Value, key: &str, default: &'a str) -> &'a str {
    args.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}

pub(crate) fn arg_f64(tool: &str, args: &serde_json::Value, key: &str) -> Result<f64> {
    args.get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| bad_args(tool, format!("missing or non-numeric field '{key}'")))
}

pub(crate) fn arg_f64_opt(args: &serde_json::Value, key: &str) -> Option<f64> {
    args.get(key).and_then(|v| v.as_f64())
}

pub(crate) fn arg_array<'a>(args: &'a serde_json::Value, key: &str) -> &'a [serde_json::Value] {
    args.get(key).and_then(|v| v.as_array()).map(|v| v.as_slice()).unwrap_or(&[])
}

pub(crate) fn to_yaml(value: &impl Serialize) -> String {
    serde_yaml::to_string(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Spec tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize, Deserialize)]
struct DesignSpec {
    module_name: String,
    description: String,
    #[serde(default)]
    ports: Vec<serde_json::Value>,
    #[serde(default)]
    params: serde_json::Value,
    clock_period: f64,
    #[serde(default)]
    tech_node: Option<String>,
}

fn register_spec_tools(registry: &mut ToolRegistry) {
    registry.register(
        ToolDefinition {
            name: "write_spec".into(),
            description: "Create the YAML design spec for this session's module.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "module_name": {"type": "string"},
                    "description": {"type": "string"},
                    "ports": {"type": "array"},
                    "params": {"type": "object"},
                    "clock_period": {"type": "number"},
                    "tech_node": {"type": "string"},
                },
                "required": ["module_name", "description", "clock_period"],
            }),
            category: ToolCategory::Essential,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let spec = DesignSpec {
                    module_name: arg_str("write_spec", &inv.arguments, "module_name")?.to_owned(),
                    description: arg_str("write_spec", &inv.arguments, "description")?.to_owned(),
                    ports: arg_array(&inv.arguments, "ports").to_vec(),
                    params: inv.arguments.get("params").cloned().unwrap_or(json!({})),
                    clock_period: arg_f64("write_spec", &inv.arguments, "clock_period")?,
                    tech_node: inv.arguments.get("tech_node").and_then(|v| v.as_str()).map(str::to_owned),
                };
                let yaml = serde_yaml::to_string(&spec).map_err(|e| Error::Other(e.to_string()))?;
                ctx.workspace_for(&inv.session_id)
                    .write_file(SPEC_FILENAME, yaml.as_bytes(), WriteMode::CreateOrReplace)
                    .await?;
                ctx.sessions.touch(&inv.session_id)?;
                Ok(SPEC_FILENAME.to_string())
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "read_spec".into(),
            description: "Return the current session's design spec.".into(),
            parameters: json!({"type": "object", "properties": {}}),
            category: ToolCategory::Essential,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                ctx.workspace_for(&inv.session_id).read_file_text(SPEC_FILENAME).await
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "load_yaml_spec_file".into(),
            description: "Import an external YAML spec file as this session's design spec.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"file_path": {"type": "string"}},
                "required": ["file_path"],
            }),
            category: ToolCategory::Editing,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let file_path = arg_str("load_yaml_spec_file", &inv.arguments, "file_path")?;
                let content = tokio::fs::read_to_string(file_path)
                    .await
                    .map_err(|e| bad_args("load_yaml_spec_file", format!("reading '{file_path}': {e}")))?;
                serde_yaml::from_str::<serde_yaml::Value>(&content)
                    .map_err(|e| bad_args("load_yaml_spec_file", format!("not valid YAML: {e}")))?;
                ctx.workspace_for(&inv.session_id)
                    .write_file(SPEC_FILENAME, content.as_bytes(), WriteMode::CreateOrReplace)
                    .await?;
                ctx.sessions.touch(&inv.session_id)?;
                Ok(SPEC_FILENAME.to_string())
            })
        }),
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn register_file_tools(registry: &mut ToolRegistry) {
    registry.register(
        ToolDefinition {
            name: "write_file".into(),
            description: "Create or overwrite a workspace file.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                },
                "required": ["path", "content"],
            }),
            category: ToolCategory::Essential,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let path = arg_str("write_file", &inv.arguments, "path")?;
                let content = arg_str("write_file", &inv.arguments, "content")?;
                ctx.workspace_for(&inv.session_id)
                    .write_file(path, content.as_bytes(), WriteMode::CreateOrReplace)
                    .await?;
                ctx.sessions.touch(&inv.session_id)?;
                Ok(format!("wrote {} bytes to '{path}'", content.len()))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "read_file".into(),
            description: "Return the content of a workspace file.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"],
            }),
            category: ToolCategory::Essential,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let path = arg_str("read_file", &inv.arguments, "path")?;
                ctx.workspace_for(&inv.session_id).read_file_text(path).await
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "edit_file_tool".into(),
            description: "Apply ordered anchor-substitution edits to a workspace file.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "edits": {"type": "array"},
                },
                "required": ["path", "edits"],
            }),
            category: ToolCategory::Editing,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let path = arg_str("edit_file_tool", &inv.arguments, "path")?;
                let edits: Vec<Edit> = serde_json::from_value(
                    inv.arguments.get("edits").cloned().unwrap_or(json!([])),
                )
                .map_err(|e| bad_args("edit_file_tool", format!("malformed edits: {e}")))?;
                let diff = ctx.workspace_for(&inv.session_id).edit_file(path, &edits).await?;
                if !edits.is_empty() {
                    ctx.sessions.touch(&inv.session_id)?;
                }
                Ok(diff)
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "list_files_tool".into(),
            description: "Enumerate files under the session workspace (or a subdirectory).".into(),
            parameters: json!({
                "type": "object",
                "properties": {"subdir": {"type": "string"}},
            }),
            category: ToolCategory::Essential,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let subdir = arg_str_opt(&inv.arguments, "subdir", "");
                let entries: Vec<WorkspaceEntry> =
                    ctx.workspace_for(&inv.session_id).list_files(subdir).await?;
                Ok(to_yaml(&entries))
            })
        }),
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Verification tools (linter, simulator, waveform, cocotb, formal)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
pub(crate) struct ToolOutcome {
    pub(crate) pass: bool,
    pub(crate) exit_code: Option<i32>,
    pub(crate) messages: String,
}

async fn run_in_session(
    ctx: &ToolContext,
    session_id: &str,
    program: &str,
    args: Vec<String>,
    cancel: tokio_util::sync::CancellationToken,
) -> Result<runner::RunResult> {
    let workdir = ctx.workspace_for(session_id).root().to_path_buf();
    let req = RunRequest::new(program)
        .args(args)
        .workdir(workdir)
        .timeouts(
            Duration::from_secs(ctx.exec.soft_timeout_sec),
            Duration::from_secs(ctx.exec.hard_timeout_sec),
        );
    runner::run(req, ctx.exec.output_buffer_bytes, cancel).await
}

fn register_verification_tools(registry: &mut ToolRegistry) {
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
                let file_path = arg_str("linter_tool", &inv.arguments, "file_path")?.to_owned();
                let result = run_in_session(
                    &ctx,
                    &inv.session_id,
                    "verilator",
                    vec!["--lint-only".into(), "-Wall".into(), file_path],
                    inv.cancel,
                )
                .await?;
                Ok(to_yaml(&ToolOutcome {
                    pass: result.success(),
                    exit_code: result.exit_code,
                    messages: format!("{}{}", result.stdout, result.stderr),
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
                let tb_file = arg_str("simulation_tool", &inv.arguments, "tb_file")?.to_owned();
                let design_files: Vec<String> = arg_array(&inv.arguments, "design_files")
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect();
                if design_files.is_empty() {
                    return Err(bad_args("simulation_tool", "design_files must not be empty"));
                }
                let mode = arg_str_opt(&inv.arguments, "mode", "rtl").to_owned();

                let mut compile_args = vec!["-g2012".to_string(), "-o".to_string(), "sim.out".to_string()];
                compile_args.extend(design_files);
                compile_args.push(tb_file);
                let compiled = run_in_session(
                    &ctx,
                    &inv.session_id,
                    "iverilog",
                    compile_args,
                    inv.cancel.clone(),
                )
                .await?;
                if !compiled.success() {
                    return Ok(to_yaml(&ToolOutcome {
                        pass: false,
                        exit_code: compiled.exit_code,
                        messages: format!("compilation failed ({mode}):\n{}{}", compiled.stdout, compiled.stderr),
                    }));
                }

                let ran = run_in_session(
                    &ctx,
                    &inv.session_id,
                    "vvp",
                    vec!["sim.out".to_string()],
                    inv.cancel,
                )
                .await?;
                Ok(to_yaml(&ToolOutcome {
                    pass: ran.success(),
                    exit_code: ran.exit_code,
                    messages: tail(&format!("{}{}", ran.stdout, ran.stderr), 4000),
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
                "properties": {
                    "module": {"type": "string"},
                    "test": {"type": "string"},
                },
                "required": ["module", "test"],
            }),
            category: ToolCategory::Verification,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let module = arg_str("cocotb_tool", &inv.arguments, "module")?.to_owned();
                let test = arg_str("cocotb_tool", &inv.arguments, "test")?.to_owned();
                let workdir = ctx.workspace_for(&inv.session_id).root().to_path_buf();
                let mut env = std::collections::HashMap::new();
                env.insert("MODULE".to_string(), module);
                env.insert("TESTCASE".to_string(), test);
                let req = RunRequest::new("make")
                    .workdir(workdir)
                    .timeouts(
                        Duration::from_secs(ctx.exec.soft_timeout_sec),
                        Duration::from_secs(ctx.exec.hard_timeout_sec),
                    );
                let req = RunRequest { env, ..req };
                let result = runner::run(req, ctx.exec.output_buffer_bytes, inv.cancel).await?;
                Ok(to_yaml(&ToolOutcome {
                    pass: result.success(),
                    exit_code: result.exit_code,
                    messages: tail(&format!("{}{}", result.stdout, result.stderr), 4000),
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
        handler(|ctx, inv| {
            Box::pin(async move {
                let sby_file = arg_str("sby_tool", &inv.arguments, "sby_file")?.to_owned();
                let result = run_in_session(
                    &ctx,
                    &inv.session_id,
                    "sby",
                    vec!["-f".to_string(), sby_file],
                    inv.cancel,
                )
                .await?;
                let combined = format!("{}{}", result.stdout, result.stderr);
                let pass = result.success() && combined.to_ascii_uppercase().contains("PASS");
                Ok(to_yaml(&ToolOutcome {
                    pass,
                    exit_code: result.exit_code,
                    messages: tail(&combined, 4000),
                }))
            })
        }),
    );
}

pub(crate) fn tail(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let start = s.len() - max_bytes;
    let boundary = (start..s.len()).find(|&i| s.is_char_boundary(i)).unwrap_or(s.len());
    format!("[... truncated ...]\n{}", &s[boundary..])
}

#[derive(Debug, Serialize)]
pub(crate) struct SignalTransition {
    pub(crate) signal: String,
    pub(crate) changes: Vec<(u64, String)>,
}

/// Minimal VCD scanner: maps `$var` declarations to identifier codes,
/// then records value changes for the requested signals within
/// `[start, end]`. Not a full VCD implementation — only what
/// `waveform_tool` needs (scalar and vector value changes on the
/// top-level scope).
pub(crate) fn scan_vcd(text: &str, signals: &[String], start: f64, end: f64) -> Vec<SignalTransition> {
    let mut id_to_name: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("$var") {
            let fields: Vec<&str> = rest.split_whitespace().collect();
            // $var <type> <width> <id> <name> [range] $end
            if fields.len() >= 4 {
                let id = fields[2];
                let name = fields[3];
                if signals.iter().any(|s| s == name) {
                    id_to_name.insert(id.to_string(), name.to_string());
                }
            }
        }
    }

    let mut changes: std::collections::HashMap<String, Vec<(u64, String)>> =
        signals.iter().map(|s| (s.clone(), Vec::new())).collect();
    let mut current_time: u64 = 0;
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix('#') {
            current_time = rest.trim().parse().unwrap_or(current_time);
            continue;
        }
        if (current_time as f64) < start || (current_time as f64) > end {
            continue;
        }
        // Scalar: <0|1|x|z><id>. Vector: b<bits> <id>.
        if let Some(rest) = trimmed.strip_prefix('b') {
            if let Some((value, id)) = rest.split_once(' ') {
                if let Some(name) = id_to_name.get(id) {
                    changes.get_mut(name).unwrap().push((current_time, value.to_string()));
                }
            }
        } else if !trimmed.is_empty() {
            let (value, id) = trimmed.split_at(1);
            if let Some(name) = id_to_name.get(id) {
                changes.get_mut(name).unwrap().push((current_time, value.to_string()));
            }
        }
    }

    signals
        .iter()
        .map(|s| SignalTransition {
            signal: s.clone(),
            changes: changes.remove(s).unwrap_or_default(),
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Synthesis tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn register_synthesis_tools(registry: &mut ToolRegistry) {
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
                let spec_path = arg_str_opt(&inv.arguments, "spec_path", SPEC_FILENAME).to_owned();
                let restart_stuck = inv
                    .arguments
                    .get("restart_stuck")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let params = SynthesisParams {
                    spec_path,
                    clock_period,
                    utilization: arg_f64_opt(&inv.arguments, "utilization"),
                    margin: arg_f64_opt(&inv.arguments, "margin"),
                    extra: inv.arguments.clone(),
                };
                let workdir: PathBuf = ctx.workspace_for(&inv.session_id).root().to_path_buf();
                let run_id = ctx.jobs.start(&inv.session_id, workdir, params, restart_stuck)?;
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
                "properties": {
                    "run_id": {"type": "string"},
                    "max_wait_sec": {"type": "number"},
                },
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
                    .wait(&run_id, Duration::from_secs_f64(max_wait.max(0.0)))
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
                if state.record.status != crate::job::JobStatus::Succeeded {
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
                "properties": {
                    "run_id": {"type": "string"},
                    "pattern": {"type": "string"},
                },
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
        handler(|ctx, inv| {
            Box::pin(async move {
                let verilog_file = arg_str("schematic_tool", &inv.arguments, "verilog_file")?.to_owned();
                let svg_path = "schematic.svg".to_string();
                let script = format!(
                    "read_verilog {verilog_file}; proc; opt; show -format svg -prefix schematic"
                );
                let result = run_in_session(
                    &ctx,
                    &inv.session_id,
                    "yosys",
                    vec!["-p".to_string(), script],
                    inv.cancel,
                )
                .await?;
                if !result.success() {
                    return Err(Error::Other(format!(
                        "yosys failed: {}{}",
                        result.stdout, result.stderr
                    )));
                }
                Ok(svg_path)
            })
        }),
    );
}

pub(crate) fn parse_run_id(tool: &str, args: &serde_json::Value) -> Result<uuid::Uuid> {
    let raw = arg_str(tool, args, "run_id")?;
    uuid::Uuid::parse_str(raw).map_err(|_| bad_args(tool, format!("'{raw}' is not a valid run id")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reporting tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn register_reporting_tools(registry: &mut ToolRegistry) {
    registry.register(
        ToolDefinition {
            name: "save_metrics_tool".into(),
            description: "Record manually-supplied key/value metrics alongside the session.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"metrics": {"type": "object"}},
                "required": ["metrics"],
            }),
            category: ToolCategory::Reporting,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let incoming = inv
                    .arguments
                    .get("metrics")
                    .and_then(|v| v.as_object())
                    .ok_or_else(|| bad_args("save_metrics_tool", "metrics must be an object"))?;

                let workspace = ctx.workspace_for(&inv.session_id);
                let mut merged: serde_json::Map<String, serde_json::Value> =
                    match workspace.read_file_text(METRICS_FILENAME).await {
                        Ok(existing) => serde_json::from_str(&existing).unwrap_or_default(),
                        Err(Error::NotFound(_)) => serde_json::Map::new(),
                        Err(e) => return Err(e),
                    };
                for (k, v) in incoming {
                    merged.insert(k.clone(), v.clone());
                }
                let body = serde_json::to_string_pretty(&merged).map_err(Error::Json)?;
                workspace
                    .write_file(METRICS_FILENAME, body.as_bytes(), WriteMode::CreateOrReplace)
                    .await?;
                ctx.sessions.touch(&inv.session_id)?;
                Ok(format!("recorded {} metric(s)", incoming.len()))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "generate_report_tool".into(),
            description: "Emit a Markdown report summarizing the spec, metrics, and latest synthesis run.".into(),
            parameters: json!({"type": "object", "properties": {}}),
            category: ToolCategory::Reporting,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let workspace = ctx.workspace_for(&inv.session_id);
                let spec = workspace.read_file_text(SPEC_FILENAME).await.unwrap_or_else(|_| {
                    "(no spec written yet)".to_string()
                });
                let metrics = workspace
                    .read_file_text(METRICS_FILENAME)
                    .await
                    .unwrap_or_else(|_| "{}".to_string());

                let mut report = String::new();
                report.push_str("# Design Report\n\n");
                report.push_str("## Spec\n\n```yaml\n");
                report.push_str(&spec);
                report.push_str("\n```\n\n## Recorded metrics\n\n```json\n");
                report.push_str(&metrics);
                report.push_str("\n```\n");

                workspace
                    .write_file(REPORT_FILENAME, report.as_bytes(), WriteMode::CreateOrReplace)
                    .await?;
                ctx.sessions.touch(&inv.session_id)?;
                Ok(REPORT_FILENAME.to_string())
            })
        }),
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session-management tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn register_session_tools(registry: &mut ToolRegistry) {
    registry.register(
        ToolDefinition {
            name: "configure_tool_filter".into(),
            description: "Change the set of tools visible to the model for this session.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "mode": {"type": "string", "enum": ["all", "essential", "custom"]},
                    "categories": {"type": "array"},
                },
                "required": ["mode"],
            }),
            category: ToolCategory::Session,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let mode = arg_str("configure_tool_filter", &inv.arguments, "mode")?;
                let filter = match mode {
                    "all" => ToolFilter::All,
                    "essential" => ToolFilter::Essential,
                    "custom" => {
                        let categories: Vec<ToolCategory> = arg_array(&inv.arguments, "categories")
                            .iter()
                            .filter_map(|v| v.as_str())
                            .filter_map(parse_category)
                            .collect();
                        ToolFilter::Custom { categories }
                    }
                    other => return Err(bad_args("configure_tool_filter", format!("unknown mode '{other}'"))),
                };
                ctx.set_filter(&inv.session_id, filter.clone());
                // Active tool count can't be read back from the registry here
                // (the catalog module doesn't hold a registry handle); the
                // executor recomputes and reports it via the caller.
                Ok(to_yaml(&filter))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "create_session".into(),
            description: "Create a new design-project session.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "name": {"type": "string"},
                    "model": {"type": "string"},
                },
                "required": ["id"],
            }),
            category: ToolCategory::Session,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let id = arg_str("create_session", &inv.arguments, "id")?;
                let name = arg_str_opt(&inv.arguments, "name", id);
                let model = arg_str_opt(&inv.arguments, "model", "default");
                let session = ctx.sessions.create(id, name, model)?;
                Ok(to_yaml(&session))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "list_sessions".into(),
            description: "List all known sessions.".into(),
            parameters: json!({"type": "object", "properties": {}}),
            category: ToolCategory::Session,
        },
        handler(|ctx, _inv| {
            Box::pin(async move {
                let sessions = ctx.sessions.list()?;
                Ok(to_yaml(&sessions))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "set_active_session".into(),
            description: "Mark a session as the current one for this transport.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"],
            }),
            category: ToolCategory::Session,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let id = arg_str("set_active_session", &inv.arguments, "id")?;
                ctx.sessions
                    .open(id)?
                    .ok_or_else(|| Error::SessionNotFound(id.to_owned()))?;
                ctx.set_active_session(&inv.transport, id);
                Ok(format!("active session for '{}' is now '{id}'", inv.transport))
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "get_current_session".into(),
            description: "Return the session currently active on this transport.".into(),
            parameters: json!({"type": "object", "properties": {}}),
            category: ToolCategory::Session,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                match ctx.active_session(&inv.transport) {
                    Some(id) => Ok(id),
                    None => Ok("(no active session)".to_string()),
                }
            })
        }),
    );

    registry.register(
        ToolDefinition {
            name: "delete_session".into(),
            description: "Delete a session and its workspace.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"],
            }),
            category: ToolCategory::Session,
        },
        handler(|ctx, inv| {
            Box::pin(async move {
                let id = arg_str("delete_session", &inv.arguments, "id")?.to_owned();
                if ctx.is_active_anywhere(&id) {
                    return Err(Error::SessionConflict(format!(
                        "session '{id}' is active on a transport and cannot be deleted"
                    )));
                }
                ctx.sessions.delete(&id)?;
                let workspace_dir = ctx.workspace_root.join(&id);
                let _ = tokio::fs::remove_dir_all(&workspace_dir).await;
                ctx.clear_active_session(&id);
                Ok(format!("deleted session '{id}'"))
            })
        }),
    );
}

fn parse_category(raw: &str) -> Option<ToolCategory> {
    match raw {
        "essential" => Some(ToolCategory::Essential),
        "verification" => Some(ToolCategory::Verification),
        "synthesis" => Some(ToolCategory::Synthesis),
        "editing" => Some(ToolCategory::Editing),
        "reporting" => Some(ToolCategory::Reporting),
        "session" => Some(ToolCategory::Session),
        "other" => Some(ToolCategory::Other),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Test-only registrations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Registers the catalog tools whose real handler needs no external EDA
/// binary — spec, file, reporting, and session management. Integration
/// tests combine these with [`crate::stub::build_stub_registry`]'s
/// scripted replacements for the tools that would otherwise shell out.
#[cfg(feature = "testing")]
pub fn register_non_eda_tools(registry: &mut ToolRegistry) {
    register_spec_tools(registry);
    register_file_tools(registry);
    register_reporting_tools(registry);
    register_session_tools(registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobSupervisor;
    use eda_sessions::store::SessionStore;
    use tokio_util::sync::CancellationToken;

    fn context(tmp: &std::path::Path) -> Arc<ToolContext> {
        Arc::new(ToolContext::new(
            tmp.to_path_buf(),
            16 * 1024 * 1024,
            Arc::new(SessionStore::open_in_memory().unwrap()),
            Arc::new(JobSupervisor::new_in_memory()),
            eda_domain::config::ExecConfig::default(),
            eda_domain::config::SynthesisConfig::default(),
            "test system prompt".to_string(),
            ToolFilter::All,
        ))
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        register_all(&mut r, Arc::new(ToolContext::new(
            PathBuf::new(),
            1,
            Arc::new(SessionStore::open_in_memory().unwrap()),
            Arc::new(JobSupervisor::new_in_memory()),
            eda_domain::config::ExecConfig::default(),
            eda_domain::config::SynthesisConfig::default(),
            "test system prompt".to_string(),
            ToolFilter::All,
        )));
        r
    }

    #[test]
    fn catalog_registers_every_spec_tool() {
        let r = registry();
        let names = [
            "write_spec", "read_spec", "load_yaml_spec_file", "write_file", "read_file",
            "edit_file_tool", "list_files_tool", "linter_tool", "simulation_tool",
            "waveform_tool", "cocotb_tool", "sby_tool", "start_synthesis",
            "get_synthesis_job", "wait_for_synthesis", "get_synthesis_metrics",
            "search_logs_tool", "schematic_tool", "save_metrics_tool",
            "generate_report_tool", "configure_tool_filter", "create_session",
            "list_sessions", "set_active_session", "get_current_session", "delete_session",
        ];
        for name in names {
            assert!(r.get(name).is_some(), "missing tool '{name}'");
        }
    }

    #[tokio::test]
    async fn write_then_read_spec_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        let r = registry();

        let write = r.get("write_spec").unwrap();
        let inv = Invocation {
            session_id: "s1".into(),
            transport: "chat".into(),
            arguments: json!({
                "module_name": "counter",
                "description": "an up counter",
                "clock_period": 10.0,
            }),
            cancel: CancellationToken::new(),
        };
        let filename = (write.handler)(ctx.clone(), inv).await.unwrap();
        assert_eq!(filename, SPEC_FILENAME);

        let read = r.get("read_spec").unwrap();
        let inv = Invocation {
            session_id: "s1".into(),
            transport: "chat".into(),
            arguments: json!({}),
            cancel: CancellationToken::new(),
        };
        let text = (read.handler)(ctx, inv).await.unwrap();
        assert!(text.contains("counter"));
    }

    #[tokio::test]
    async fn write_file_bumps_session_last_updated() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        ctx.sessions.create("s1", "s1", "default").unwrap();
        let before = ctx.sessions.open("s1").unwrap().unwrap().updated_at;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let r = registry();
        let write = r.get("write_file").unwrap();
        let inv = Invocation {
            session_id: "s1".into(),
            transport: "chat".into(),
            arguments: json!({"path": "a.v", "content": "module a;"}),
            cancel: CancellationToken::new(),
        };
        (write.handler)(ctx.clone(), inv).await.unwrap();

        let after = ctx.sessions.open("s1").unwrap().unwrap().updated_at;
        assert!(after > before, "write_file should bump the session's last-updated timestamp");
    }

    #[tokio::test]
    async fn configure_tool_filter_updates_session_state() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        let r = registry();
        let entry = r.get("configure_tool_filter").unwrap();
        let inv = Invocation {
            session_id: "s1".into(),
            transport: "chat".into(),
            arguments: json!({"mode": "essential"}),
            cancel: CancellationToken::new(),
        };
        (entry.handler)(ctx.clone(), inv).await.unwrap();
        assert!(matches!(ctx.current_filter("s1"), ToolFilter::Essential));
    }

    #[tokio::test]
    async fn delete_active_session_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        ctx.sessions.create("s1", "s1", "default").unwrap();
        ctx.set_active_session("chat", "s1");
        let r = registry();
        let entry = r.get("delete_session").unwrap();
        let inv = Invocation {
            session_id: "s1".into(),
            transport: "chat".into(),
            arguments: json!({"id": "s1"}),
            cancel: CancellationToken::new(),
        };
        let err = (entry.handler)(ctx, inv).await.unwrap_err();
        assert!(matches!(err, Error::SessionConflict(_)));
    }

    #[test]
    fn scan_vcd_finds_transitions_in_window() {
        let vcd = "\
$var wire 1 ! clk $end
$var wire 8 \" count $end
$enddefinitions $end
#0
0!
b00000000 \"
#5
1!
b00000001 \"
#10
0!
b00000010 \"
";
        let result = scan_vcd(vcd, &["count".to_string()], 0.0, 10.0);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].changes.len(), 3);
    }
}
