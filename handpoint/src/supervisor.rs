//! Worker supervisor: keeps helper processes alive.
//!
//! Each worker is an external command (the pointer pipeline, a voice
//! command listener, ...).  A calloop timer polls every worker once per
//! interval and restarts the ones that exited, until their restart budget
//! is spent.  On SIGINT/SIGTERM every child is killed and reaped.

use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};

use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use tracing::{debug, error, info, warn};

use crate::pipeline::shutdown_requested;

// ── Specs ──────────────────────────────────────────────────

/// A command to keep running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
        }
    }

    /// Parse `NAME=PROGRAM ARG...` (arguments split on whitespace).
    pub fn parse(spec: &str) -> Result<Self, String> {
        let (name, command) = spec
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=COMMAND, got {spec:?}"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("worker name missing in {spec:?}"));
        }
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| format!("worker {name:?} has no command"))?;
        Ok(Self::new(name, program, parts.map(str::to_string).collect()))
    }

    pub fn command_line(&self) -> String {
        let mut s = self.program.clone();
        for arg in &self.args {
            s.push(' ');
            s.push_str(arg);
        }
        s
    }
}

/// When and how often exited workers are restarted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    pub poll_interval: Duration,
    /// `None` restarts forever.
    pub max_restarts: Option<u32>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_restarts: None,
        }
    }
}

// ── Workers ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    /// Exited or failed to spawn; restarted on the next poll.
    Down,
    /// Restart budget spent.
    GaveUp,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Down => "down",
            Self::GaveUp => "gave-up",
        }
    }
}

struct Worker {
    spec: WorkerSpec,
    child: Option<Child>,
    state: WorkerState,
    restarts: u32,
    started_at: Option<Instant>,
}

impl Worker {
    fn new(spec: WorkerSpec) -> Self {
        Self {
            spec,
            child: None,
            state: WorkerState::Down,
            restarts: 0,
            started_at: None,
        }
    }

    fn spawn(&mut self) {
        match Command::new(&self.spec.program).args(&self.spec.args).spawn() {
            Ok(child) => {
                info!(worker = %self.spec.name, pid = child.id(), "started {}", self.spec.command_line());
                self.child = Some(child);
                self.state = WorkerState::Running;
                self.started_at = Some(Instant::now());
            }
            Err(e) => {
                error!(worker = %self.spec.name, "failed to start {}: {}", self.spec.program, e);
                self.child = None;
                self.state = WorkerState::Down;
            }
        }
    }

    /// Exit status if the child has ended since the last check.
    fn reap_exited(&mut self) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                self.state = WorkerState::Down;
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(worker = %self.spec.name, "cannot query worker: {}", e);
                None
            }
        }
    }

    fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        debug!(worker = %self.spec.name, pid = child.id(), "stopping worker");
        if let Err(e) = child.kill() {
            debug!(worker = %self.spec.name, "kill failed (already exited?): {}", e);
        }
        let _ = child.wait();
        self.state = WorkerState::Down;
    }
}

// ── Supervisor ─────────────────────────────────────────────

pub struct Supervisor {
    workers: Vec<Worker>,
    policy: RestartPolicy,
    pub running: bool,
}

impl Supervisor {
    pub fn new(specs: Vec<WorkerSpec>, policy: RestartPolicy) -> Self {
        Self {
            workers: specs.into_iter().map(Worker::new).collect(),
            policy,
            running: true,
        }
    }

    pub fn start_all(&mut self) {
        for worker in &mut self.workers {
            worker.spawn();
        }
    }

    /// Check every worker once; restart the ones that are down.
    pub fn poll(&mut self) {
        for worker in &mut self.workers {
            if worker.state == WorkerState::GaveUp {
                continue;
            }
            if let Some(status) = worker.reap_exited() {
                let uptime = worker.started_at.map(|t| t.elapsed()).unwrap_or_default();
                warn!(
                    worker = %worker.spec.name,
                    "exited ({}) after {:.1}s", status, uptime.as_secs_f64()
                );
            }
            if worker.state != WorkerState::Down {
                continue;
            }

            if let Some(max) = self.policy.max_restarts {
                if worker.restarts >= max {
                    error!(
                        worker = %worker.spec.name,
                        "giving up after {} restart(s)", worker.restarts
                    );
                    worker.state = WorkerState::GaveUp;
                    continue;
                }
            }
            worker.restarts += 1;
            warn!(worker = %worker.spec.name, "restarting (restart #{})", worker.restarts);
            worker.spawn();
        }
    }

    pub fn all_gave_up(&self) -> bool {
        self.workers.iter().all(|w| w.state == WorkerState::GaveUp)
    }

    /// Kill and reap every child.
    pub fn shutdown(&mut self) {
        for worker in &mut self.workers {
            worker.stop();
        }
        self.running = false;
    }

    pub fn status_sexp(&self) -> String {
        let workers: Vec<String> = self
            .workers
            .iter()
            .map(|w| {
                format!(
                    "(:name \"{}\" :state :{} :restarts {})",
                    w.spec.name,
                    w.state.as_str(),
                    w.restarts
                )
            })
            .collect();
        format!("(:workers ({}))", workers.join(" "))
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            worker.stop();
        }
    }
}

/// Supervise `specs` until a shutdown signal arrives or every worker has
/// spent its restart budget.
pub fn run(specs: Vec<WorkerSpec>, policy: RestartPolicy) -> anyhow::Result<()> {
    if specs.is_empty() {
        anyhow::bail!("no workers to supervise");
    }

    let interval = policy.poll_interval;
    let mut event_loop = EventLoop::<Supervisor>::try_new()?;
    let mut supervisor = Supervisor::new(specs, policy);
    supervisor.start_all();

    event_loop
        .handle()
        .insert_source(Timer::from_duration(interval), move |_, _, supervisor| {
            supervisor.poll();
            TimeoutAction::ToDuration(interval)
        })
        .map_err(|e| anyhow::anyhow!("failed to insert poll timer: {:?}", e))?;

    info!("supervising {}", supervisor.status_sexp());

    let tick = interval.min(Duration::from_millis(100));
    while supervisor.running {
        if shutdown_requested() {
            info!("shutdown signal received, stopping workers");
            break;
        }
        if supervisor.all_gave_up() {
            warn!("every worker gave up");
            break;
        }
        event_loop.dispatch(Some(tick), &mut supervisor)?;
    }

    supervisor.shutdown();
    info!("supervisor stopped {}", supervisor.status_sexp());
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_restarts: Option<u32>) -> RestartPolicy {
        RestartPolicy {
            poll_interval: Duration::from_millis(10),
            max_restarts,
        }
    }

    fn wait_for_exit() {
        std::thread::sleep(Duration::from_millis(200));
    }

    fn worker<'a>(sup: &'a Supervisor, name: &str) -> Option<&'a Worker> {
        sup.workers.iter().find(|w| w.spec.name == name)
    }

    fn state(sup: &Supervisor, name: &str) -> Option<WorkerState> {
        worker(sup, name).map(|w| w.state)
    }

    fn restarts(sup: &Supervisor, name: &str) -> Option<u32> {
        worker(sup, name).map(|w| w.restarts)
    }

    #[test]
    fn test_parse_worker_spec() {
        let spec = WorkerSpec::parse("voice=python3 voice.py --model base").unwrap();
        assert_eq!(spec.name, "voice");
        assert_eq!(spec.program, "python3");
        assert_eq!(spec.args, vec!["voice.py", "--model", "base"]);
        assert_eq!(spec.command_line(), "python3 voice.py --model base");
    }

    #[test]
    fn test_parse_worker_spec_errors() {
        assert!(WorkerSpec::parse("python3 voice.py").is_err());
        assert!(WorkerSpec::parse("=python3").is_err());
        assert!(WorkerSpec::parse("voice=  ").is_err());
    }

    #[test]
    fn test_default_policy() {
        let policy = RestartPolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
        assert!(policy.max_restarts.is_none());
    }

    #[test]
    fn test_exited_worker_restarted() {
        let mut sup = Supervisor::new(vec![WorkerSpec::new("once", "true", vec![])], fast_policy(None));
        sup.start_all();
        assert_eq!(state(&sup, "once"), Some(WorkerState::Running));
        wait_for_exit();
        sup.poll();
        assert_eq!(restarts(&sup, "once"), Some(1));
        assert_eq!(state(&sup, "once"), Some(WorkerState::Running));
        sup.shutdown();
    }

    #[test]
    fn test_restart_budget() {
        let mut sup = Supervisor::new(vec![WorkerSpec::new("once", "true", vec![])], fast_policy(Some(1)));
        sup.start_all();
        wait_for_exit();
        sup.poll();
        wait_for_exit();
        sup.poll();
        assert_eq!(state(&sup, "once"), Some(WorkerState::GaveUp));
        assert_eq!(restarts(&sup, "once"), Some(1));
        assert!(sup.all_gave_up());
        assert!(sup.status_sexp().contains(":state :gave-up"));
    }

    #[test]
    fn test_running_worker_left_alone() {
        let mut sup = Supervisor::new(
            vec![WorkerSpec::new("sleeper", "sleep", vec!["30".to_string()])],
            fast_policy(None),
        );
        sup.start_all();
        sup.poll();
        assert_eq!(restarts(&sup, "sleeper"), Some(0));
        assert_eq!(state(&sup, "sleeper"), Some(WorkerState::Running));
        sup.shutdown();
        assert_eq!(state(&sup, "sleeper"), Some(WorkerState::Down));
        assert!(!sup.running);
    }

    #[test]
    fn test_spawn_failure_counts_as_down() {
        let mut sup = Supervisor::new(
            vec![WorkerSpec::new("ghost", "/nonexistent/worker", vec![])],
            fast_policy(Some(0)),
        );
        sup.start_all();
        assert_eq!(state(&sup, "ghost"), Some(WorkerState::Down));
        sup.poll();
        assert_eq!(state(&sup, "ghost"), Some(WorkerState::GaveUp));
    }

    #[test]
    fn test_run_returns_when_all_gave_up() {
        let started = Instant::now();
        run(vec![WorkerSpec::new("once", "true", vec![])], fast_policy(Some(2))).unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_run_rejects_empty() {
        assert!(run(Vec::new(), RestartPolicy::default()).is_err());
    }
}
