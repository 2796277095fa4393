//! End-to-end exercises of the agent loop against an in-process core: a
//! scripted [`StubProvider`] stands in for the LLM, and
//! [`eda_tools::stub::build_stub_registry`] stands in for the EDA
//! binaries a real deployment would shell out to.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eda_domain::config::{AgentLoopConfig, ExecConfig, SynthesisConfig};
use eda_domain::tool::Role;
use eda_gateway::runtime::bus::StreamingBus;
use eda_gateway::runtime::cancel::CancelMap;
use eda_gateway::runtime::runs::RunStore;
use eda_gateway::runtime::session_lock::SessionLockMap;
use eda_gateway::runtime::turn::{cancel_turn, run_turn, TurnInput, TurnState};
use eda_providers::registry::ProviderRegistry;
use eda_providers::stub::{ScriptedCall, ScriptedStep, StubProvider};
use eda_sessions::store::SessionStore;
use eda_tools::executor::{ToolContext, ToolExecutor};
use eda_tools::job::JobSupervisor;
use eda_tools::registry::ToolFilter;
use serde_json::json;

fn build_state(steps: Vec<ScriptedStep>, filter: ToolFilter) -> (tempfile::TempDir, Arc<TurnState>) {
    let tmp = tempfile::tempdir().unwrap();
    let sessions = Arc::new(SessionStore::open_in_memory().unwrap());
    let ctx = Arc::new(ToolContext::new(
        tmp.path().to_path_buf(),
        16 * 1024 * 1024,
        sessions.clone(),
        Arc::new(JobSupervisor::new_in_memory()),
        ExecConfig::default(),
        SynthesisConfig::default(),
        "test system prompt".to_string(),
        filter,
    ));
    let registry = Arc::new(eda_tools::stub::build_stub_registry(ctx.clone()));
    let executor = Arc::new(ToolExecutor::new(registry, ctx));
    let providers = Arc::new(ProviderRegistry::from_provider(Arc::new(StubProvider::scripted(
        "stub",
        steps,
    ))));

    let state = Arc::new(TurnState {
        sessions,
        executor,
        providers,
        bus: Arc::new(StreamingBus::new()),
        runs: Arc::new(RunStore::new(&std::env::temp_dir().join(format!(
            "eda-scenario-test-{}",
            uuid::Uuid::new_v4()
        )))),
        cancel_map: Arc::new(CancelMap::new()),
        locks: Arc::new(SessionLockMap::new()),
        agent_loop: AgentLoopConfig::default(),
    });
    (tmp, state)
}

fn workspace_root(tmp: &tempfile::TempDir, session_id: &str) -> PathBuf {
    tmp.path().join(session_id)
}

async fn run_and_wait(state: &Arc<TurnState>, session_id: &str, message: &str) -> eda_gateway::runtime::runs::Run {
    let input = TurnInput {
        session_id: session_id.to_string(),
        user_message: message.to_string(),
        model: None,
        transport: "chat".to_string(),
    };
    let run_id = run_turn(state.clone(), input);
    for _ in 0..200 {
        if let Some(run) = state.runs.get(&run_id) {
            if run.status.is_terminal() {
                return run;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("run {run_id} did not terminate in time");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 1 — counter: spec through synthesized metrics and a report
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn counter_end_to_end_produces_metrics_and_report() {
    let steps = vec![
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "write_spec",
            json!({"module_name": "counter", "description": "8-bit up counter", "clock_period": 10.0}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "write_file",
            json!({"path": "counter.v", "content": "module counter(input clk, output reg [7:0] out);\nalways @(posedge clk) out <= out + 1;\nendmodule"}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "write_file",
            json!({"path": "counter_tb.v", "content": "module counter_tb;\ninitial $finish;\nendmodule"}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "linter_tool",
            json!({"file_path": "counter.v"}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "simulation_tool",
            json!({"design_files": ["counter.v"], "tb_file": "counter_tb.v"}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "start_synthesis",
            json!({"clock_period": 10.0}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "generate_report_tool",
            json!({"summary": "counter synthesized cleanly"}),
        )]),
        ScriptedStep::Final("Counter module designed, verified, and synthesized.".to_string()),
    ];
    let (tmp, state) = build_state(steps, ToolFilter::All);
    state.sessions.create("counter", "counter", "stub-model").unwrap();

    let run = run_and_wait(&state, "counter", "Design an 8-bit counter").await;
    assert_eq!(run.status, eda_gateway::runtime::runs::RunStatus::Completed);

    let root = workspace_root(&tmp, "counter");
    assert!(root.join("spec.yaml").exists());
    assert!(root.join("counter.v").exists());
    assert!(root.join("counter_tb.v").exists());
    assert!(root.join("wave.vcd").exists());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 2 — simulation fails, the model inspects the waveform, edits
// the file, and the rerun passes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn simulation_failure_is_diagnosed_and_fixed() {
    let steps = vec![
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "write_file",
            json!({"path": "reg.v", "content": "module reg_bad(input clk, input rst, output reg out); // BUGGY_RESET\nendmodule"}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "simulation_tool",
            json!({"design_files": ["reg.v"], "tb_file": "reg_tb.v"}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "waveform_tool",
            json!({"vcd_path": "wave.vcd", "signals": ["out"], "start": 0, "end": 10}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "edit_file_tool",
            json!({"path": "reg.v", "edits": [{"anchor": " // BUGGY_RESET", "replacement": ""}]}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "simulation_tool",
            json!({"design_files": ["reg.v"], "tb_file": "reg_tb.v"}),
        )]),
        ScriptedStep::Final("Fixed the reset bug; simulation now passes.".to_string()),
    ];
    let (_tmp, state) = build_state(steps, ToolFilter::All);
    state.sessions.create("regfix", "regfix", "stub-model").unwrap();

    let run = run_and_wait(&state, "regfix", "Build a register with synchronous reset").await;
    assert_eq!(run.status, eda_gateway::runtime::runs::RunStatus::Completed);

    let tool_nodes: Vec<_> = run
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, eda_gateway::runtime::runs::NodeKind::ToolCall))
        .collect();
    let sim_nodes: Vec<_> = tool_nodes.iter().filter(|n| n.name == "simulation_tool").collect();
    assert_eq!(sim_nodes.len(), 2);
    assert!(sim_nodes[0].is_error, "first simulation should fail on the buggy reset");
    assert!(!sim_nodes[1].is_error, "second simulation should pass after the fix");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 3 — cancellation mid-synthesis persists a partial, marked
// assistant turn and no tool calls after it
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn cancellation_mid_synthesis_persists_partial_stopped_turn() {
    // The StubProvider streams one Token before the tool-calls step, so the
    // test has a window to cancel after text has started streaming but
    // before the loop would naturally complete.
    let steps = vec![ScriptedStep::Final(
        "Starting synthesis now, this will take a while...".to_string(),
    )];
    let (_tmp, state) = build_state(steps, ToolFilter::All);
    state.sessions.create("cancelme", "cancelme", "stub-model").unwrap();

    let input = TurnInput {
        session_id: "cancelme".to_string(),
        user_message: "Synthesize the design".to_string(),
        model: None,
        transport: "chat".to_string(),
    };
    let run_id = run_turn(state.clone(), input);
    // Give the loop a moment to start streaming, then cancel.
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel_turn(&state, "cancelme");

    let mut run = None;
    for _ in 0..200 {
        if let Some(r) = state.runs.get(&run_id) {
            if r.status.is_terminal() {
                run = Some(r);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    let run = run.expect("run should terminate after cancellation");
    assert_eq!(run.status, eda_gateway::runtime::runs::RunStatus::Stopped);

    let history = state.sessions.history("cancelme").unwrap();
    let last = history.last().expect("at least the user turn plus a stop marker");
    assert_eq!(last.message.role, Role::Assistant);
    assert!(last.message.content.extract_all_text().contains("[Stopped]"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 4 — two concurrent sessions don't cross-write or leak events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn two_concurrent_sessions_do_not_interfere() {
    let steps_a = vec![
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "write_file",
            json!({"path": "counter.v", "content": "module counter; endmodule"}),
        )]),
        ScriptedStep::Final("counter done".to_string()),
    ];
    let steps_b = vec![
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "write_file",
            json!({"path": "fifo.v", "content": "module fifo; endmodule"}),
        )]),
        ScriptedStep::Final("fifo done".to_string()),
    ];

    let tmp = tempfile::tempdir().unwrap();
    let sessions = Arc::new(SessionStore::open_in_memory().unwrap());
    let ctx = Arc::new(ToolContext::new(
        tmp.path().to_path_buf(),
        16 * 1024 * 1024,
        sessions.clone(),
        Arc::new(JobSupervisor::new_in_memory()),
        ExecConfig::default(),
        SynthesisConfig::default(),
        "test system prompt".to_string(),
        ToolFilter::All,
    ));
    let registry = Arc::new(eda_tools::stub::build_stub_registry(ctx.clone()));
    let executor = Arc::new(ToolExecutor::new(registry, ctx));

    // Two distinct provider registries, since a single StubProvider's
    // script is a single shared queue and the two sessions' turns run
    // concurrently — each session needs its own model "mind".
    let make_state = |providers: Arc<ProviderRegistry>| {
        Arc::new(TurnState {
            sessions: sessions.clone(),
            executor: executor.clone(),
            providers,
            bus: Arc::new(StreamingBus::new()),
            runs: Arc::new(RunStore::new(&std::env::temp_dir().join(format!(
                "eda-scenario-test-{}",
                uuid::Uuid::new_v4()
            )))),
            cancel_map: Arc::new(CancelMap::new()),
            locks: Arc::new(SessionLockMap::new()),
            agent_loop: AgentLoopConfig::default(),
        })
    };
    let state_a = make_state(Arc::new(ProviderRegistry::from_provider(Arc::new(
        StubProvider::scripted("stub-a", steps_a),
    ))));
    let state_b = make_state(Arc::new(ProviderRegistry::from_provider(Arc::new(
        StubProvider::scripted("stub-b", steps_b),
    ))));

    state_a.sessions.create("sess-a", "sess-a", "stub-model").unwrap();
    state_b.sessions.create("sess-b", "sess-b", "stub-model").unwrap();

    let bus_a = state_a.bus.clone();
    let bus_b = state_b.bus.clone();
    let mut rx_a = bus_a.subscribe("sess-a");
    let mut rx_b = bus_b.subscribe("sess-b");

    let (run_a, run_b) = tokio::join!(
        run_and_wait(&state_a, "sess-a", "Design a counter"),
        run_and_wait(&state_b, "sess-b", "Design a fifo"),
    );
    assert_eq!(run_a.status, eda_gateway::runtime::runs::RunStatus::Completed);
    assert_eq!(run_b.status, eda_gateway::runtime::runs::RunStatus::Completed);

    assert!(workspace_root(&tmp, "sess-a").join("counter.v").exists());
    assert!(!workspace_root(&tmp, "sess-a").join("fifo.v").exists());
    assert!(workspace_root(&tmp, "sess-b").join("fifo.v").exists());
    assert!(!workspace_root(&tmp, "sess-b").join("counter.v").exists());

    // Drain each session's bus and confirm no cross-session event leaked in:
    // session a's feed must never carry a write_file call for fifo.v, and
    // vice versa for session b and counter.v.
    while let Ok(event) = rx_a.try_recv() {
        if let eda_gateway::runtime::bus::BusEvent::ToolCall { args, .. } = event {
            assert_ne!(args.get("path").and_then(|v| v.as_str()), Some("fifo.v"));
        }
    }
    while let Ok(event) = rx_b.try_recv() {
        if let eda_gateway::runtime::bus::BusEvent::ToolCall { args, .. } = event {
            assert_ne!(args.get("path").and_then(|v| v.as_str()), Some("counter.v"));
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 5 — essential tool filter rejects synthesis tools until the
// filter is widened
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn essential_filter_blocks_synthesis_until_widened() {
    let steps = vec![
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "start_synthesis",
            json!({"clock_period": 10.0}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "configure_tool_filter",
            json!({"mode": "custom", "categories": ["essential", "synthesis"]}),
        )]),
        ScriptedStep::ToolCalls(vec![ScriptedCall::new(
            "start_synthesis",
            json!({"clock_period": 10.0}),
        )]),
        ScriptedStep::Final("Synthesis started once the filter allowed it.".to_string()),
    ];
    let (_tmp, state) = build_state(steps, ToolFilter::Essential);
    state.sessions.create("filtertest", "filtertest", "stub-model").unwrap();

    let run = run_and_wait(&state, "filtertest", "Start synthesis").await;
    assert_eq!(run.status, eda_gateway::runtime::runs::RunStatus::Completed);

    let tool_nodes: Vec<_> = run
        .nodes
        .iter()
        .filter(|n| n.kind == eda_gateway::runtime::runs::NodeKind::ToolCall && n.name == "start_synthesis")
        .collect();
    assert_eq!(tool_nodes.len(), 2);
    assert!(tool_nodes[0].is_error, "first start_synthesis should be rejected by the essential filter");
    assert!(!tool_nodes[1].is_error, "second start_synthesis should succeed once custom filter allows synthesis");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 6 — a stuck job blocks a plain restart but yields to
// restart_stuck
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn stuck_job_restart_requires_explicit_override() {
    let tmp = tempfile::tempdir().unwrap();
    let sessions = Arc::new(SessionStore::open_in_memory().unwrap());
    let jobs = Arc::new(JobSupervisor::new_in_memory());
    let ctx = Arc::new(ToolContext::new(
        tmp.path().to_path_buf(),
        16 * 1024 * 1024,
        sessions.clone(),
        jobs.clone(),
        ExecConfig::default(),
        SynthesisConfig::default(),
        "test system prompt".to_string(),
        ToolFilter::All,
    ));

    let params = eda_tools::job::SynthesisParams {
        spec_path: "spec.yaml".into(),
        clock_period: 10.0,
        ..Default::default()
    };
    let stuck_run = jobs
        .start_stub("stuck-session", params, false, eda_tools::job::StubOutcome::Pending)
        .unwrap();
    jobs.backdate_for_test(&stuck_run, 400);
    assert!(jobs.status(&stuck_run).unwrap().stuck);

    let conflict = jobs.start_stub(
        "stuck-session",
        eda_tools::job::SynthesisParams {
            spec_path: "spec.yaml".into(),
            clock_period: 10.0,
            ..Default::default()
        },
        false,
        eda_tools::job::StubOutcome::Succeeded(Default::default()),
    );
    assert!(matches!(conflict, Err(eda_domain::error::Error::JobConflict(_))));

    let restarted = jobs
        .start_stub(
            "stuck-session",
            eda_tools::job::SynthesisParams {
                spec_path: "spec.yaml".into(),
                clock_period: 10.0,
                ..Default::default()
            },
            true,
            eda_tools::job::StubOutcome::Succeeded(Default::default()),
        )
        .unwrap();
    assert_ne!(restarted, stuck_run);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let old_state = jobs.status(&stuck_run).unwrap();
    assert_eq!(old_state.record.status, eda_tools::job::JobStatus::Cancelled);
    let new_state = jobs.status(&restarted).unwrap();
    assert_eq!(new_state.record.status, eda_tools::job::JobStatus::Succeeded);

    let _ = ctx;
}
