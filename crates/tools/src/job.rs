//! Job Supervisor — async synthesis runs that must not block the agent loop.
//!
//! Mirrors the execution-trace ledger pattern used elsewhere in this
//! workspace (a bounded in-memory ring with an O(1) id→slot index, backed
//! by an append-only JSONL file, with a per-job broadcast channel for live
//! subscribers): start/status/wait/cancel/metrics, stuck detection, and
//! an at-most-one-non-terminal-job-per-session rule enforced by a
//! session-keyed map.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eda_domain::config::SynthesisConfig;
use eda_domain::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::runner::{self, RunRequest};

const MAX_JOBS_IN_MEMORY: usize = 2000;
const LOG_TAIL_LINES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Parameters for a synthesis run. `extra` carries any recipe-specific
/// fields this core does not interpret itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisParams {
    pub spec_path: String,
    pub clock_period: f64,
    #[serde(default)]
    pub utilization: Option<f64>,
    #[serde(default)]
    pub margin: Option<f64>,
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// Parsed PPA metrics. Any field the log/report tail doesn't contain is
/// `None` rather than a fabricated zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisMetrics {
    pub wns: Option<f64>,
    pub tns: Option<f64>,
    pub area: Option<f64>,
    pub power: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub run_id: Uuid,
    pub session_id: String,
    pub status: JobStatus,
    pub params: SynthesisParams,
    pub stage: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub last_progress_at: DateTime<Utc>,
    pub log_tail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<SynthesisMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `JobRecord` plus the derived `stuck` flag, which is never stored — it
/// is recomputed from `last_progress_at` at read time so a job does not
/// need a background ticker just to notice it has gone quiet.
#[derive(Debug, Clone, Serialize)]
pub struct JobState {
    #[serde(flatten)]
    pub record: JobRecord,
    pub stuck: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    #[serde(rename = "job.status")]
    Status { run_id: Uuid, status: JobStatus, stage: Option<String> },
    #[serde(rename = "job.log")]
    Log { run_id: Uuid, line: String },
}

struct JobStoreInner {
    jobs: VecDeque<JobRecord>,
    index: HashMap<Uuid, usize>,
    base_seq: usize,
}

impl JobStoreInner {
    fn new() -> Self {
        Self {
            jobs: VecDeque::new(),
            index: HashMap::new(),
            base_seq: 0,
        }
    }

    fn deque_idx(&self, seq: usize) -> usize {
        seq - self.base_seq
    }

    fn get(&self, run_id: &Uuid) -> Option<&JobRecord> {
        let seq = *self.index.get(run_id)?;
        self.jobs.get(self.deque_idx(seq))
    }

    fn get_mut(&mut self, run_id: &Uuid) -> Option<&mut JobRecord> {
        let seq = *self.index.get(run_id)?;
        let idx = self.deque_idx(seq);
        self.jobs.get_mut(idx)
    }

    fn push_back(&mut self, job: JobRecord) {
        let seq = self.base_seq + self.jobs.len();
        self.index.insert(job.run_id, seq);
        self.jobs.push_back(job);
    }

    fn pop_front(&mut self) -> Option<JobRecord> {
        let job = self.jobs.pop_front()?;
        self.index.remove(&job.run_id);
        self.base_seq += 1;
        Some(job)
    }
}

/// Supervises synthesis jobs: spawns the background worker, tracks
/// progress, and answers status/wait/cancel/metrics queries without
/// blocking the agent loop that started the job.
pub struct JobSupervisor {
    inner: RwLock<JobStoreInner>,
    log_path: Option<PathBuf>,
    event_channels: RwLock<HashMap<Uuid, broadcast::Sender<JobEvent>>>,
    /// At most one non-terminal job per session.
    active_by_session: Mutex<HashMap<String, Uuid>>,
    /// Cancellation tokens for jobs currently running.
    cancel_tokens: Mutex<HashMap<Uuid, CancellationToken>>,
    synthesis: SynthesisConfig,
}

impl JobSupervisor {
    pub fn new(log_path: PathBuf, synthesis: SynthesisConfig) -> Self {
        let (jobs, total_on_disk) = Self::load_recent(&log_path);
        if total_on_disk > jobs.len() {
            tracing::info!(
                kept = jobs.len(),
                pruned = total_on_disk - jobs.len(),
                "pruning jobs JSONL on disk"
            );
            Self::rewrite_jsonl(&log_path, &jobs);
        }
        let mut inner = JobStoreInner::new();
        for job in jobs {
            inner.push_back(job);
        }
        Self {
            inner: RwLock::new(inner),
            log_path: Some(log_path),
            event_channels: RwLock::new(HashMap::new()),
            active_by_session: Mutex::new(HashMap::new()),
            cancel_tokens: Mutex::new(HashMap::new()),
            synthesis,
        }
    }

    /// No disk persistence; for tests and embedded use without a data root.
    pub fn new_in_memory() -> Self {
        Self {
            inner: RwLock::new(JobStoreInner::new()),
            log_path: None,
            event_channels: RwLock::new(HashMap::new()),
            active_by_session: Mutex::new(HashMap::new()),
            cancel_tokens: Mutex::new(HashMap::new()),
            synthesis: SynthesisConfig::default(),
        }
    }

    fn load_recent(path: &Path) -> (VecDeque<JobRecord>, usize) {
        let mut jobs = VecDeque::new();
        let mut total = 0;
        if let Ok(content) = std::fs::read_to_string(path) {
            let lines: Vec<&str> = content.lines().collect();
            total = lines.len();
            for line in lines.iter().rev().take(MAX_JOBS_IN_MEMORY) {
                if let Ok(job) = serde_json::from_str::<JobRecord>(line) {
                    jobs.push_front(job);
                }
            }
        }
        (jobs, total)
    }

    fn rewrite_jsonl(path: &Path, jobs: &VecDeque<JobRecord>) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let tmp = path.with_extension("jsonl.tmp");
        let mut ok = false;
        if let Ok(mut f) = std::fs::File::create(&tmp) {
            ok = true;
            for job in jobs {
                if let Ok(json) = serde_json::to_string(job) {
                    if writeln!(f, "{json}").is_err() {
                        ok = false;
                        break;
                    }
                }
            }
        }
        if ok {
            let _ = std::fs::rename(&tmp, path);
        } else {
            let _ = std::fs::remove_file(&tmp);
        }
    }

    fn persist(&self, job: &JobRecord) {
        let Some(path) = &self.log_path else { return };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string(job) {
            if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
                let _ = writeln!(file, "{json}");
            }
        }
    }

    fn insert(&self, job: JobRecord) {
        let mut inner = self.inner.write();
        inner.push_back(job);
        if inner.jobs.len() > MAX_JOBS_IN_MEMORY {
            inner.pop_front();
        }
    }

    fn update<F: FnOnce(&mut JobRecord)>(&self, run_id: &Uuid, f: F) -> Option<JobRecord> {
        let mut inner = self.inner.write();
        let job = inner.get_mut(run_id)?;
        f(job);
        Some(job.clone())
    }

    fn subscribe(&self, run_id: &Uuid) -> broadcast::Receiver<JobEvent> {
        let mut channels = self.event_channels.write();
        channels
            .entry(*run_id)
            .or_insert_with(|| broadcast::channel(128).0)
            .subscribe()
    }

    fn emit(&self, run_id: &Uuid, event: JobEvent) {
        let channels = self.event_channels.read();
        if let Some(tx) = channels.get(run_id) {
            let _ = tx.send(event);
        }
    }

    /// Start a synthesis job for `session_id`. Fails with `JobConflict`
    /// unless no non-terminal job exists for the session, or the caller
    /// passes `restart_stuck = true` and the existing job is currently
    /// stuck (in which case it is cancelled first).
    pub fn start(
        self: &Arc<Self>,
        session_id: &str,
        workdir: PathBuf,
        params: SynthesisParams,
        restart_stuck: bool,
    ) -> Result<Uuid> {
        {
            let mut active = self.active_by_session.lock();
            if let Some(existing) = active.get(session_id).copied() {
                let existing_state = self.status(&existing);
                match existing_state {
                    Some(state) if !state.record.status.is_terminal() => {
                        if restart_stuck && state.stuck {
                            self.cancel(&existing);
                        } else {
                            return Err(Error::JobConflict(session_id.to_owned()));
                        }
                    }
                    _ => {}
                }
            }
            let run_id = Uuid::new_v4();
            active.insert(session_id.to_owned(), run_id);
            drop(active);

            let now = Utc::now();
            let job = JobRecord {
                run_id,
                session_id: session_id.to_owned(),
                status: JobStatus::Queued,
                params: params.clone(),
                stage: None,
                started_at: now,
                ended_at: None,
                last_progress_at: now,
                log_tail: String::new(),
                metrics: None,
                error: None,
            };
            self.insert(job.clone());
            self.persist(&job);

            let cancel = CancellationToken::new();
            self.cancel_tokens.lock().insert(run_id, cancel.clone());

            let this = self.clone();
            let session_id = session_id.to_owned();
            tokio::spawn(async move {
                this.run_worker(run_id, session_id, workdir, params, cancel).await;
            });

            Ok(run_id)
        }
    }

    async fn run_worker(
        self: Arc<Self>,
        run_id: Uuid,
        session_id: String,
        workdir: PathBuf,
        params: SynthesisParams,
        cancel: CancellationToken,
    ) {
        self.transition(run_id, JobStatus::Running, None);

        let recipe = self
            .synthesis
            .invocation_recipe
            .replace("{workdir}", "/work")
            .replace("{spec}", &params.spec_path)
            .replace("{clock_period}", &params.clock_period.to_string());

        let req = RunRequest::new("docker")
            .args([
                "run".to_string(),
                "--rm".to_string(),
                "-v".to_string(),
                format!("{}:/work", workdir.display()),
                "-w".to_string(),
                "/work".to_string(),
                self.synthesis.image.clone(),
                "sh".to_string(),
                "-c".to_string(),
                recipe,
            ])
            .timeouts(
                Duration::from_secs(self.synthesis.hard_timeout_sec),
                Duration::from_secs(self.synthesis.hard_timeout_sec),
            );

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let req = req.with_stdout_sink(tx);

        let supervisor = self.clone();
        let line_watch = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                supervisor.observe_line(run_id, &line);
            }
        });

        let outcome = runner::run(req, 2 * 1024 * 1024, cancel.clone()).await;
        line_watch.abort();
        self.cancel_tokens.lock().remove(&run_id);

        let (status, error, metrics) = match outcome {
            Ok(result) if result.success() => {
                let metrics = parse_metrics(&result.stdout);
                (JobStatus::Succeeded, None, Some(metrics))
            }
            Ok(result) => (
                JobStatus::Failed,
                Some(format!("exit code {:?}", result.exit_code)),
                None,
            ),
            Err(Error::Cancelled) => (JobStatus::Cancelled, Some("cancelled".into()), None),
            Err(e) => (JobStatus::Failed, Some(e.to_string()), None),
        };

        let final_record = self.update(&run_id, |job| {
            job.status = status;
            job.ended_at = Some(Utc::now());
            job.error = error;
            job.metrics = metrics;
        });
        if let Some(job) = final_record {
            self.persist(&job);
            self.emit(
                &run_id,
                JobEvent::Status {
                    run_id,
                    status: job.status,
                    stage: job.stage.clone(),
                },
            );
        }
        self.active_by_session.lock().remove(&session_id);
    }

    fn observe_line(&self, run_id: Uuid, line: &str) {
        let now = Utc::now();
        let stage = self
            .synthesis
            .stage_names
            .iter()
            .find(|name| line.to_ascii_lowercase().contains(name.as_str()))
            .cloned();
        self.update(&run_id, |job| {
            job.last_progress_at = now;
            if stage.is_some() {
                job.stage = stage.clone();
            }
            job.log_tail.push_str(line);
            job.log_tail.push('\n');
            let lines: Vec<&str> = job.log_tail.lines().rev().take(LOG_TAIL_LINES).collect();
            job.log_tail = lines.into_iter().rev().collect::<Vec<_>>().join("\n");
        });
        self.emit(&run_id, JobEvent::Log { run_id, line: line.to_owned() });
    }

    fn transition(&self, run_id: Uuid, status: JobStatus, stage: Option<String>) {
        let updated = self.update(&run_id, |job| {
            job.status = status;
            if stage.is_some() {
                job.stage = stage.clone();
            }
        });
        if updated.is_some() {
            self.emit(&run_id, JobEvent::Status { run_id, status, stage });
        }
    }

    /// Current state, with the derived `stuck` flag.
    pub fn status(&self, run_id: &Uuid) -> Option<JobState> {
        let record = self.inner.read().get(run_id)?.clone();
        let stuck = record.status == JobStatus::Running
            && (Utc::now() - record.last_progress_at).num_seconds()
                > self.synthesis.stuck_threshold_sec as i64;
        Some(JobState { record, stuck })
    }

    /// Block (cooperatively) up to `up_to`, returning whatever state is
    /// current once the wait ends — terminal or not.
    pub async fn wait(&self, run_id: &Uuid, up_to: Duration) -> Option<JobState> {
        let Some(state) = self.status(run_id) else {
            return None;
        };
        if state.record.status.is_terminal() {
            return Some(state);
        }
        let mut rx = self.subscribe(run_id);
        let deadline = tokio::time::Instant::now() + up_to;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return self.status(run_id);
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Ok(JobEvent::Status { .. })) => {
                    let current = self.status(run_id);
                    if current.as_ref().map(|s| s.record.status.is_terminal()) == Some(true) {
                        return current;
                    }
                }
                Ok(Ok(_)) => continue,
                Ok(Err(_)) | Err(_) => return self.status(run_id),
            }
        }
    }

    /// Signal cancellation; the worker terminates the subprocess tree and
    /// transitions the job to `Cancelled`.
    pub fn cancel(&self, run_id: &Uuid) -> bool {
        if let Some(token) = self.cancel_tokens.lock().get(run_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    /// PPA metrics, only meaningful once the job has succeeded.
    pub fn metrics(&self, run_id: &Uuid) -> Option<SynthesisMetrics> {
        self.inner.read().get(run_id)?.metrics.clone()
    }

    /// Grep the job's captured log tail for `pattern`, returning matching
    /// lines. Used by `search_logs_tool`.
    pub fn search_logs(&self, run_id: &Uuid, pattern: &str) -> Result<Vec<String>> {
        let record = self
            .inner
            .read()
            .get(run_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(run_id.to_string()))?;
        let re = regex::Regex::new(pattern)
            .map_err(|e| Error::BadArgs { tool: "search_logs_tool".into(), message: e.to_string() })?;
        Ok(record
            .log_tail
            .lines()
            .filter(|line| re.is_match(line))
            .map(|line| line.to_owned())
            .collect())
    }
}

/// Deterministic resolution for a [`JobSupervisor::start_stub`] job —
/// replaces the real docker-backed worker in integration tests.
#[cfg(feature = "testing")]
#[derive(Debug, Clone)]
pub enum StubOutcome {
    Succeeded(SynthesisMetrics),
    Failed(String),
    /// Never resolves on its own; stays `Running` until cancelled or
    /// restarted. Used to exercise the stuck-job-restart scenario.
    Pending,
}

#[cfg(feature = "testing")]
impl JobSupervisor {
    /// Same session-conflict/restart-stuck rules as [`Self::start`], but
    /// resolves to a scripted [`StubOutcome`] shortly after starting
    /// instead of shelling out to docker.
    pub fn start_stub(
        self: &Arc<Self>,
        session_id: &str,
        params: SynthesisParams,
        restart_stuck: bool,
        outcome: StubOutcome,
    ) -> Result<Uuid> {
        let mut restart_of: Option<Uuid> = None;
        let run_id;
        {
            let mut active = self.active_by_session.lock();
            if let Some(existing) = active.get(session_id).copied() {
                let existing_state = self.status(&existing);
                match existing_state {
                    Some(state) if !state.record.status.is_terminal() => {
                        if restart_stuck && state.stuck {
                            restart_of = Some(existing);
                        } else {
                            return Err(Error::JobConflict(session_id.to_owned()));
                        }
                    }
                    _ => {}
                }
            }
            run_id = Uuid::new_v4();
            active.insert(session_id.to_owned(), run_id);
        }

        if let Some(existing) = restart_of {
            self.cancel(&existing);
            self.finish_stub(existing, session_id, JobStatus::Cancelled, Some("restarted".into()), None);
        }

        let now = Utc::now();
        let job = JobRecord {
            run_id,
            session_id: session_id.to_owned(),
            status: JobStatus::Running,
            params,
            stage: Some("synthesis".to_string()),
            started_at: now,
            ended_at: None,
            last_progress_at: now,
            log_tail: String::new(),
            metrics: None,
            error: None,
        };
        self.insert(job.clone());

        let cancel = CancellationToken::new();
        self.cancel_tokens.lock().insert(run_id, cancel.clone());

        if matches!(outcome, StubOutcome::Pending) {
            return Ok(run_id);
        }

        let this = self.clone();
        let session_id_owned = session_id.to_owned();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    this.finish_stub(run_id, &session_id_owned, JobStatus::Cancelled, Some("cancelled".into()), None);
                }
                _ = tokio::time::sleep(Duration::from_millis(50)) => {
                    let (status, error, metrics) = match outcome {
                        StubOutcome::Succeeded(m) => (JobStatus::Succeeded, None, Some(m)),
                        StubOutcome::Failed(e) => (JobStatus::Failed, Some(e), None),
                        StubOutcome::Pending => unreachable!(),
                    };
                    this.finish_stub(run_id, &session_id_owned, status, error, metrics);
                }
            }
            this.cancel_tokens.lock().remove(&run_id);
        });

        Ok(run_id)
    }

    fn finish_stub(
        &self,
        run_id: Uuid,
        session_id: &str,
        status: JobStatus,
        error: Option<String>,
        metrics: Option<SynthesisMetrics>,
    ) {
        let final_record = self.update(&run_id, |job| {
            job.status = status;
            job.ended_at = Some(Utc::now());
            job.error = error;
            job.metrics = metrics;
        });
        if let Some(job) = final_record {
            self.emit(
                &run_id,
                JobEvent::Status {
                    run_id,
                    status: job.status,
                    stage: job.stage.clone(),
                },
            );
        }
        let mut active = self.active_by_session.lock();
        if active.get(session_id) == Some(&run_id) {
            active.remove(session_id);
        }
    }

    /// Push `last_progress_at` into the past, simulating a job that has
    /// gone quiet without any stage progress — for the stuck-job-restart
    /// scenario.
    pub fn backdate_for_test(&self, run_id: &Uuid, seconds_ago: i64) {
        self.update(run_id, |job| {
            job.last_progress_at = Utc::now() - chrono::Duration::seconds(seconds_ago);
        });
    }
}

/// Parse WNS/TNS/area/power out of a synthesis log tail. Any metric not
/// found is left `None` rather than defaulted to zero.
fn parse_metrics(log: &str) -> SynthesisMetrics {
    let extract = |label: &str| -> Option<f64> {
        let re = regex::Regex::new(&format!(r"(?i){label}\D*(-?\d+(?:\.\d+)?)")).ok()?;
        re.captures(log)?.get(1)?.as_str().parse().ok()
    };
    SynthesisMetrics {
        wns: extract("wns"),
        tns: extract("tns"),
        area: extract("area"),
        power: extract("power"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SynthesisParams {
        SynthesisParams {
            spec_path: "spec.yaml".into(),
            clock_period: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn parse_metrics_extracts_known_fields() {
        let log = "slack (VIOLATED)\nwns -0.42\narea 1234.5\n";
        let metrics = parse_metrics(log);
        assert_eq!(metrics.wns, Some(-0.42));
        assert_eq!(metrics.area, Some(1234.5));
        assert_eq!(metrics.tns, None);
    }

    #[test]
    fn job_status_is_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_of_unknown_job_is_none() {
        let sup = JobSupervisor::new_in_memory();
        assert!(sup.status(&Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn second_start_for_same_session_conflicts() {
        let sup = Arc::new(JobSupervisor::new_in_memory());
        let dir = tempfile::tempdir().unwrap();
        let run_id = sup
            .start("s1", dir.path().to_path_buf(), params(), false)
            .unwrap();
        assert!(sup.status(&run_id).is_some());
        let second = sup.start("s1", dir.path().to_path_buf(), params(), false);
        assert!(matches!(second, Err(Error::JobConflict(_))));
    }

    #[tokio::test]
    async fn different_sessions_can_run_concurrently() {
        let sup = Arc::new(JobSupervisor::new_in_memory());
        let dir = tempfile::tempdir().unwrap();
        let r1 = sup.start("s1", dir.path().to_path_buf(), params(), false).unwrap();
        let r2 = sup.start("s2", dir.path().to_path_buf(), params(), false).unwrap();
        assert_ne!(r1, r2);
    }

    #[test]
    fn observe_line_updates_stage_and_progress() {
        let sup = JobSupervisor::new_in_memory();
        let run_id = Uuid::new_v4();
        let now = Utc::now();
        sup.insert(JobRecord {
            run_id,
            session_id: "s1".into(),
            status: JobStatus::Running,
            params: params(),
            stage: None,
            started_at: now,
            ended_at: None,
            last_progress_at: now - chrono::Duration::seconds(600),
            log_tail: String::new(),
            metrics: None,
            error: None,
        });
        sup.observe_line(run_id, "entering placement stage");
        let state = sup.status(&run_id).unwrap();
        assert_eq!(state.record.stage.as_deref(), Some("placement"));
        assert!(!state.stuck);
    }

    #[test]
    fn stuck_detection_trips_after_threshold() {
        let sup = JobSupervisor::new_in_memory();
        let run_id = Uuid::new_v4();
        let now = Utc::now();
        sup.insert(JobRecord {
            run_id,
            session_id: "s1".into(),
            status: JobStatus::Running,
            params: params(),
            stage: Some("synthesis".into()),
            started_at: now,
            ended_at: None,
            last_progress_at: now - chrono::Duration::seconds(3600),
            log_tail: String::new(),
            metrics: None,
            error: None,
        });
        let state = sup.status(&run_id).unwrap();
        assert!(state.stuck);
    }

    #[test]
    fn cancel_unknown_job_returns_false() {
        let sup = JobSupervisor::new_in_memory();
        assert!(!sup.cancel(&Uuid::new_v4()));
    }
}
