use chrono::Utc;
use paia_core::Exchange;
use paia_core::PersistenceError;
use paia_core::RunPhase;
use paia_core::SessionRepository;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::contracts::AdapterError;
use crate::contracts::AssistantAdapter;
use crate::prompt::preview;

/// A failed run, tagged with the phase it was in when it failed.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("{source} (while {phase})")]
    Adapter {
        phase: RunPhase,
        source: AdapterError,
    },

    #[error("{source} (while {phase})")]
    Persistence {
        phase: RunPhase,
        source: PersistenceError,
    },
}

impl RunError {
    pub fn phase(&self) -> RunPhase {
        match self {
            RunError::Adapter { phase, .. } | RunError::Persistence { phase, .. } => *phase,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub output: String,
    pub session_id: String,
    /// Exchanges in the session after this run's exchange was appended.
    pub exchange_count: usize,
}

/// Runs one automation: load the session, invoke the adapter, append the
/// exchange and persist.
///
/// The exchange is appended only after the adapter succeeds, so a failed
/// call leaves the stored session untouched.
pub struct AutomationDriver<A, S> {
    adapter: A,
    store: S,
    phase: RunPhase,
}

impl<A: AssistantAdapter, S: SessionRepository> AutomationDriver<A, S> {
    pub fn new(adapter: A, store: S) -> Self {
        Self {
            adapter,
            store,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn run(&mut self, instruction: &str) -> Result<RunOutcome, RunError> {
        self.phase = RunPhase::Idle;
        info!(
            "Starting {} automation: {}",
            self.adapter.name(),
            preview(instruction, 50)
        );

        match self.execute(instruction) {
            Ok(outcome) => {
                self.advance(RunPhase::Done);
                info!("Automation completed successfully");
                Ok(outcome)
            }
            Err(err) => {
                error!("Automation failed during {}: {err}", err.phase());
                self.advance(RunPhase::Failed);
                Err(err)
            }
        }
    }

    fn execute(&mut self, instruction: &str) -> Result<RunOutcome, RunError> {
        self.advance(RunPhase::Loading);
        let mut session = self.store.load();

        self.advance(RunPhase::Invoking);
        let output = self
            .adapter
            .invoke(instruction, session.exchanges())
            .map_err(|source| RunError::Adapter {
                phase: RunPhase::Invoking,
                source,
            })?;

        self.advance(RunPhase::Persisting);
        session.append(Exchange::new(instruction, output.clone()).recorded_at(Utc::now()));
        self.store
            .save(&session)
            .map_err(|source| RunError::Persistence {
                phase: RunPhase::Persisting,
                source,
            })?;

        Ok(RunOutcome {
            output,
            session_id: session.session_id().to_string(),
            exchange_count: session.len(),
        })
    }

    fn advance(&mut self, next: RunPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal run transition {} -> {}",
            self.phase,
            next
        );
        debug!(from = self.phase.label(), to = next.label(), "run phase");
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use paia_core::InMemorySessionStore;
    use paia_core::Session;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Returns `reply` (or a timeout failure when `None`) and records how
    /// many prior exchanges it was handed.
    struct CannedAdapter {
        reply: Option<&'static str>,
        seen_prior: Mutex<Vec<usize>>,
    }

    impl CannedAdapter {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Some(reply),
                seen_prior: Mutex::new(Vec::new()),
            }
        }

        fn timing_out() -> Self {
            Self {
                reply: None,
                seen_prior: Mutex::new(Vec::new()),
            }
        }
    }

    impl AssistantAdapter for CannedAdapter {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn invoke(&self, _outbound: &str, prior: &[Exchange]) -> Result<String, AdapterError> {
            self.seen_prior.lock().expect("lock").push(prior.len());
            match self.reply {
                Some(reply) => Ok(reply.to_string()),
                None => Err(AdapterError::SubprocessFailure {
                    program: "claude".to_string(),
                    message: "timed out after 120s".to_string(),
                }),
            }
        }
    }

    struct ReadOnlyStore;

    impl SessionRepository for ReadOnlyStore {
        fn load(&self) -> Session {
            Session::started_now()
        }

        fn save(&self, _session: &Session) -> Result<(), PersistenceError> {
            Err(PersistenceError::Write {
                path: "/read-only/context.json".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    #[test]
    fn successful_run_appends_exactly_one_exchange() {
        let mut driver = AutomationDriver::new(
            CannedAdapter::replying("updated 1 note"),
            InMemorySessionStore::new(),
        );

        let outcome = driver.run("process @paia").expect("run");
        assert_eq!(outcome.output, "updated 1 note");
        assert_eq!(outcome.exchange_count, 1);
        assert_eq!(driver.phase(), RunPhase::Done);

        let stored = driver.store().stored().expect("saved");
        assert_eq!(stored.session_id(), outcome.session_id);
        assert_eq!(stored.exchanges()[0].input, "process @paia");
        assert_eq!(stored.exchanges()[0].output, "updated 1 note");
        assert!(stored.exchanges()[0].timestamp.is_some());
    }

    #[test]
    fn consecutive_runs_see_growing_history() {
        let mut driver = AutomationDriver::new(
            CannedAdapter::replying("ok"),
            InMemorySessionStore::new(),
        );
        for _ in 0..3 {
            driver.run("again").expect("run");
        }

        assert_eq!(
            *driver.adapter.seen_prior.lock().expect("lock"),
            vec![0, 1, 2]
        );
        assert_eq!(driver.store().stored().expect("saved").len(), 3);
        assert_eq!(driver.store().save_count(), 3);
    }

    #[test]
    fn failed_call_is_not_persisted() {
        let mut seed = Session::started_now();
        seed.append(Exchange::new("earlier", "fine"));
        let mut driver = AutomationDriver::new(
            CannedAdapter::timing_out(),
            InMemorySessionStore::with_session(seed.clone()),
        );

        let err = driver.run("process @paia").expect_err("timeout");
        assert!(matches!(
            err,
            RunError::Adapter {
                source: AdapterError::SubprocessFailure { .. },
                ..
            }
        ));
        assert_eq!(err.phase(), RunPhase::Invoking);
        assert_eq!(driver.phase(), RunPhase::Failed);
        assert_eq!(driver.store().save_count(), 0);
        assert_eq!(driver.store().stored(), Some(seed));
    }

    #[test]
    fn write_failure_propagates() {
        let mut driver = AutomationDriver::new(CannedAdapter::replying("ok"), ReadOnlyStore);
        let err = driver.run("process @paia").expect_err("write fails");
        assert!(matches!(err, RunError::Persistence { .. }));
        assert_eq!(err.phase(), RunPhase::Persisting);
        assert!(err.to_string().ends_with("(while persisting)"), "{err}");
        assert_eq!(driver.phase(), RunPhase::Failed);
    }

    #[test]
    fn driver_can_run_again_after_failure() {
        let mut driver =
            AutomationDriver::new(CannedAdapter::timing_out(), InMemorySessionStore::new());
        driver.run("one").expect_err("first");
        driver.run("two").expect_err("second");
        assert_eq!(driver.phase(), RunPhase::Failed);
    }

    #[cfg(unix)]
    #[test]
    fn timed_out_cli_call_leaves_context_file_untouched() {
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use std::time::Duration;

        use paia_core::ExchangeShape;
        use paia_core::JsonSessionStore;

        use crate::runner::ProcessRunner;
        use crate::subprocess::CliInvocation;
        use crate::subprocess::SubprocessAdapter;

        let dir = tempfile::tempdir().expect("tmpdir");
        let script = dir.path().join("slow-assistant");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        let cli = CliInvocation {
            program: script,
            cwd: dir.path().to_path_buf(),
            print_flag: "--print".to_string(),
            continue_flag: "--continue".to_string(),
        };
        let adapter = SubprocessAdapter::new(cli, ProcessRunner, Duration::from_millis(200), 3);
        let context: PathBuf = dir.path().join("context.json");
        let mut driver =
            AutomationDriver::new(adapter, JsonSessionStore::new(&context, ExchangeShape::Pairs));

        let err = driver.run("process @paia").expect_err("timeout");
        match err {
            RunError::Adapter {
                phase,
                source: AdapterError::SubprocessFailure { message, .. },
            } => {
                assert_eq!(phase, RunPhase::Invoking);
                assert!(message.contains("timed out"), "{message}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!context.exists());
    }
}
