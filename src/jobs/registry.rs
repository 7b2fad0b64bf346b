//! Job registry: a fixed lookup table from tag to factory, built once at
//! startup — the same "assemble a static table, look up by key" idiom the
//! teacher uses for its route table (`api::create_router`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::control::JobControl;
use crate::error::{Error, JobError, Result};
use crate::store::Store;
use crate::types::{Event, JobState};

/// Per-run context handed to a job's `run`/`resume`/`recover` body.
#[derive(Clone)]
pub struct JobContext {
    pub uuid: String,
    pub store: Arc<Store>,
    pub control: JobControl,
    /// Opaque checkpoint data from the record, present on `resume`/`recover`.
    pub session_data: Option<String>,
}

impl JobContext {
    /// Flushes progress counters to the record without changing state.
    pub async fn report_progress(&self, current: i64, denominator: i64) -> Result<()> {
        self.store
            .update_job_state(&self.uuid, JobState::Running, current, denominator, None)
            .await
    }

    /// Persists a pause checkpoint: progress plus opaque resume data.
    pub async fn checkpoint_pause(&self, current: i64, denominator: i64, session_data: &str) -> Result<()> {
        self.store
            .update_job_state(&self.uuid, JobState::Paused, current, denominator, Some(session_data))
            .await
    }
}

/// A registrable background job. Only `run` is required; `resume`/`recover`
/// default to raising the matching capability error. Capabilities
/// (`pauseable`/`recoverable`) are declared explicitly at [`JobRegistry::register`]
/// rather than inferred from which defaults are overridden — Rust has no
/// reflective "was this the default impl" check, unlike the original's
/// `hasattr(cls, 'resume')` registration.
#[async_trait]
pub trait Job: Send + Sync {
    fn tag(&self) -> &'static str;

    async fn run(&self, ctx: JobContext) -> Result<()>;

    async fn resume(&self, ctx: JobContext) -> Result<()> {
        Err(Error::Job(JobError::NotPauseable { uuid: ctx.uuid }))
    }

    async fn recover(&self, ctx: JobContext) -> Result<()> {
        Err(Error::Job(JobError::NotRecoverable { uuid: ctx.uuid }))
    }
}

type JobFactory = Arc<dyn Fn() -> Arc<dyn Job> + Send + Sync>;

struct Registration {
    pauseable: bool,
    recoverable: bool,
    factory: JobFactory,
}

struct LiveHandle {
    tag: &'static str,
    control: JobControl,
    task: tokio::task::JoinHandle<()>,
}

enum JobEntryPoint {
    Run,
    Resume,
    Recover,
}

/// The small process-local scheduler for durable, interruptible tasks
/// (spec.md §4.E). Owns one in-memory handle per live job so pause/stop
/// requests can reach the running worker; the persisted record in
/// `background_jobs` is the durable source of truth for state.
pub struct JobRegistry {
    pub(crate) store: Arc<Store>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
    registrations: HashMap<&'static str, Registration>,
    live: Arc<Mutex<HashMap<String, LiveHandle>>>,
}

/// Tags treated as mutually exclusive indexer jobs (spec.md §4.F cross-job
/// invariant): at most one may be Running/Paused at a time.
const INDEXER_TAGS: &[&str] = &["full_indexer", "quick_indexer"];

impl JobRegistry {
    pub fn new(store: Arc<Store>, event_tx: tokio::sync::broadcast::Sender<Event>) -> Self {
        Self {
            store,
            event_tx,
            registrations: HashMap::new(),
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a job type under `tag`. `factory` builds a fresh instance
    /// of the job's logic (stateless; all mutable state lives in the record
    /// and in the `JobContext` passed to each call).
    pub fn register<F>(&mut self, tag: &'static str, pauseable: bool, recoverable: bool, factory: F) -> Result<()>
    where
        F: Fn() -> Arc<dyn Job> + Send + Sync + 'static,
    {
        if self.registrations.contains_key(tag) {
            return Err(Error::Job(JobError::DuplicateTag { tag: tag.to_string() }));
        }
        self.registrations.insert(
            tag,
            Registration {
                pauseable,
                recoverable,
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    async fn emit(&self, job_uuid: &str, state: JobState) {
        self.event_tx
            .send(Event::JobStateChanged {
                job_uuid: job_uuid.to_string(),
                state,
            })
            .ok();
    }

    /// Starts a fresh instance of `tag`'s job: creates a new record (uuid,
    /// `NotStarted`) and spawns its worker.
    pub async fn start(&self, tag: &str) -> Result<String> {
        let registration = self
            .registrations
            .get(tag)
            .ok_or_else(|| Error::Job(JobError::UnknownTag { tag: tag.to_string() }))?;

        if INDEXER_TAGS.contains(&tag) {
            self.reject_if_indexer_active().await?;
        }

        let uuid = Uuid::new_v4().to_string();
        self.store
            .create_job_record(&uuid, tag, tag, registration.pauseable, registration.recoverable)
            .await?;
        self.store
            .update_job_state(&uuid, JobState::Running, 0, 0, None)
            .await?;

        let job = (registration.factory)();
        self.spawn(uuid.clone(), tag, job, JobContext {
            uuid: uuid.clone(),
            store: self.store.clone(),
            control: JobControl::new(),
            session_data: None,
        })
        .await;

        Ok(uuid)
    }

    async fn reject_if_indexer_active(&self) -> Result<()> {
        for record in self.store.list_jobs().await? {
            if INDEXER_TAGS.contains(&record.tag.as_str())
                && matches!(record.state(), JobState::Running | JobState::Paused)
            {
                return Err(Error::Job(JobError::IndexerAlreadyRunning));
            }
        }
        Ok(())
    }

    async fn spawn(&self, uuid: String, tag: &'static str, job: Arc<dyn Job>, ctx: JobContext) {
        self.spawn_entry(uuid, tag, job, ctx, JobEntryPoint::Run).await;
    }

    /// Spawns `job`'s `entry` method, self-removing from `live` once the
    /// worker task finishes so `live` never accumulates finished handles.
    async fn spawn_entry(&self, uuid: String, tag: &'static str, job: Arc<dyn Job>, ctx: JobContext, entry: JobEntryPoint) {
        let store = self.store.clone();
        let event_tx = self.event_tx.clone();
        let live = self.live.clone();
        let uuid_for_task = uuid.clone();
        let control = ctx.control.clone();

        let task = tokio::spawn(async move {
            let outcome = match entry {
                JobEntryPoint::Run => job.run(ctx).await,
                JobEntryPoint::Resume => job.resume(ctx).await,
                JobEntryPoint::Recover => job.recover(ctx).await,
            };
            finish_job(&store, &event_tx, &uuid_for_task, outcome).await;
            live.lock().await.remove(&uuid_for_task);
        });

        let mut live = self.live.lock().await;
        live.insert(uuid, LiveHandle { tag, control, task });
    }

    /// Requests a cooperative pause. Errors if the job isn't `pauseable` or
    /// isn't currently `Running`.
    pub async fn pause(&self, uuid: &str) -> Result<()> {
        let record = self.require_live_record(uuid).await?;
        if !record.pauseable {
            return Err(Error::Job(JobError::NotPauseable { uuid: uuid.to_string() }));
        }
        if record.state() != JobState::Running {
            return Err(Error::Job(JobError::IllegalTransition {
                uuid: uuid.to_string(),
                action: "pause".to_string(),
                current_state: format!("{:?}", record.state()),
            }));
        }

        let live = self.live.lock().await;
        let handle = live
            .get(uuid)
            .ok_or_else(|| Error::Job(JobError::UnknownTag { tag: uuid.to_string() }))?;
        if handle.control.should_pause() {
            return Err(Error::Job(JobError::IllegalTransition {
                uuid: uuid.to_string(),
                action: "pause".to_string(),
                current_state: "pause already requested".to_string(),
            }));
        }
        handle.control.request_pause();
        Ok(())
    }

    /// Resumes a paused job: rehydrates its checkpoint and spawns `resume`.
    pub async fn resume_job(&self, uuid: &str) -> Result<()> {
        let record = self.require_live_record(uuid).await?;
        if record.state() != JobState::Paused {
            return Err(Error::Job(JobError::IllegalTransition {
                uuid: uuid.to_string(),
                action: "resume".to_string(),
                current_state: format!("{:?}", record.state()),
            }));
        }

        let registration = self
            .registrations
            .get(record.tag.as_str())
            .ok_or_else(|| Error::Job(JobError::UnknownTag { tag: record.tag.clone() }))?;

        self.store
            .update_job_state(uuid, JobState::Running, record.progress_current, record.progress_denominator, None)
            .await?;

        let job = (registration.factory)();
        let ctx = JobContext {
            uuid: uuid.to_string(),
            store: self.store.clone(),
            control: JobControl::fresh(),
            session_data: record.session_data.clone(),
        };
        let tag: &'static str = registration_tag(&self.registrations, record.tag.as_str());
        self.spawn_entry(uuid.to_string(), tag, job, ctx, JobEntryPoint::Resume).await;
        Ok(())
    }

    /// Requests a cooperative stop. Supersedes a pending pause.
    pub async fn stop(&self, uuid: &str) -> Result<()> {
        let record = self.require_live_record(uuid).await?;
        if !matches!(record.state(), JobState::Running | JobState::Paused) {
            return Err(Error::Job(JobError::IllegalTransition {
                uuid: uuid.to_string(),
                action: "stop".to_string(),
                current_state: format!("{:?}", record.state()),
            }));
        }

        let live = self.live.lock().await;
        if let Some(handle) = live.get(uuid) {
            if handle.control.should_stop() {
                return Err(Error::Job(JobError::IllegalTransition {
                    uuid: uuid.to_string(),
                    action: "stop".to_string(),
                    current_state: "stop already requested".to_string(),
                }));
            }
            handle.control.request_stop();
        } else {
            // Paused jobs have no live worker; stop it directly.
            drop(live);
            self.store
                .update_job_state(uuid, JobState::Stopped, record.progress_current, record.progress_denominator, None)
                .await?;
            self.emit(uuid, JobState::Stopped).await;
        }
        Ok(())
    }

    /// Requests a stop on every live job and waits for their workers to
    /// finish, for use during shutdown.
    pub async fn stop_all(&self) -> Result<()> {
        let uuids: Vec<String> = {
            let live = self.live.lock().await;
            live.keys().cloned().collect()
        };
        for uuid in &uuids {
            self.stop(uuid).await.ok();
        }
        let handles: Vec<(String, tokio::task::JoinHandle<()>)> = {
            let mut live = self.live.lock().await;
            uuids
                .into_iter()
                .filter_map(|uuid| live.remove(&uuid).map(|h| (uuid, h.task)))
                .collect()
        };
        for (_, task) in handles {
            task.await.ok();
        }
        Ok(())
    }

    /// Startup recovery (spec.md §4.E): every live record is either failed
    /// out (non-recoverable) or handed to `recover()` (recoverable).
    pub async fn recover_on_startup(&self) -> Result<()> {
        for record in self.store.list_jobs().await? {
            if !matches!(record.state(), JobState::Running | JobState::Paused) {
                continue;
            }
            if !record.recoverable {
                self.store
                    .update_job_state(&record.uuid, JobState::Failed, record.progress_current, record.progress_denominator, None)
                    .await?;
                self.emit(&record.uuid, JobState::Failed).await;
                continue;
            }

            let Some(registration) = self.registrations.get(record.tag.as_str()) else {
                self.store
                    .update_job_state(&record.uuid, JobState::Failed, record.progress_current, record.progress_denominator, None)
                    .await?;
                continue;
            };

            let job = (registration.factory)();
            let tag: &'static str = registration_tag(&self.registrations, record.tag.as_str());
            let ctx = JobContext {
                uuid: record.uuid.clone(),
                store: self.store.clone(),
                control: JobControl::new(),
                session_data: record.session_data.clone(),
            };
            self.spawn_entry(record.uuid.clone(), tag, job, ctx, JobEntryPoint::Recover).await;
        }
        Ok(())
    }

    async fn require_live_record(&self, uuid: &str) -> Result<crate::store::BackgroundJobRecord> {
        self.store
            .get_job(uuid)
            .await?
            .ok_or_else(|| Error::Job(JobError::UnknownTag { tag: uuid.to_string() }))
    }

    /// Tags of every job with a worker currently running (Running or a
    /// just-resumed/recovered instance; Paused jobs have no live worker).
    pub async fn live_tags(&self) -> Vec<(String, &'static str)> {
        let live = self.live.lock().await;
        live.iter().map(|(uuid, handle)| (uuid.clone(), handle.tag)).collect()
    }
}

fn registration_tag(registrations: &HashMap<&'static str, Registration>, tag: &str) -> &'static str {
    registrations.keys().find(|&&k| k == tag).copied().unwrap_or("unknown")
}

async fn finish_job(
    store: &Arc<Store>,
    event_tx: &tokio::sync::broadcast::Sender<Event>,
    uuid: &str,
    outcome: Result<()>,
) {
    let record = match store.get_job(uuid).await {
        Ok(Some(record)) => record,
        _ => return,
    };

    // A job that honored a pause request persists `Paused` itself via
    // `JobContext::checkpoint_pause` before returning `Ok(())`; only treat
    // a still-`Running` record as having finished naturally.
    if record.state() == JobState::Paused {
        event_tx
            .send(Event::JobStateChanged {
                job_uuid: uuid.to_string(),
                state: JobState::Paused,
            })
            .ok();
        return;
    }

    let final_state = match outcome {
        Ok(()) => JobState::Complete,
        Err(_) => JobState::Failed,
    };

    store
        .update_job_state(uuid, final_state, record.progress_current, record.progress_denominator, None)
        .await
        .ok();
    event_tx
        .send(Event::JobStateChanged {
            job_uuid: uuid.to_string(),
            state: final_state,
        })
        .ok();
}
