//! Background-job framework (spec.md §4.E): a small process-local
//! scheduler for durable, interruptible tasks, built the way the teacher
//! builds its other long-running workers — `tokio::spawn` per unit of
//! work, cooperative cancellation via `tokio_util::sync::CancellationToken`.

mod control;
mod registry;

pub use control::JobControl;
pub use registry::{Job, JobContext, JobRegistry};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, JobError};
    use crate::messenger::Messenger;
    use crate::store::Store;
    use crate::types::JobState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn test_registry() -> (JobRegistry, tokio::sync::broadcast::Receiver<crate::types::Event>) {
        let (tx, rx) = tokio::sync::broadcast::channel(16);
        let store = Arc::new(
            Store::new(&std::path::PathBuf::from(":memory:"), Arc::new(Messenger::new()), tx.clone())
                .await
                .unwrap(),
        );
        (JobRegistry::new(store, tx), rx)
    }

    struct CountingJob {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn tag(&self) -> &'static str {
            "counting_job"
        }

        async fn run(&self, ctx: JobContext) -> crate::error::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ctx.report_progress(1, 1).await
        }
    }

    #[tokio::test]
    async fn run_to_completion_archives_the_job() {
        let (mut registry, _rx) = test_registry().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_factory = calls.clone();
        registry
            .register("counting_job", false, false, move || {
                Arc::new(CountingJob { calls: calls_for_factory.clone() }) as Arc<dyn Job>
            })
            .unwrap();

        let uuid = registry.start("counting_job").await.unwrap();

        for _ in 0..50 {
            if registry.store.get_job(&uuid).await.unwrap().is_none() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let archived = registry.store.list_job_archive(10, 0).await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].state, JobState::Complete.to_i32());
    }

    #[tokio::test]
    async fn unknown_tag_rejected() {
        let (registry, _rx) = test_registry().await;
        assert!(registry.start("does_not_exist").await.is_err());
    }

    struct SlowJob;

    #[async_trait]
    impl Job for SlowJob {
        fn tag(&self) -> &'static str {
            "slow_job"
        }

        async fn run(&self, _ctx: JobContext) -> crate::error::Result<()> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn repeated_pause_request_is_rejected() {
        let (mut registry, _rx) = test_registry().await;
        registry.register("slow_job", true, true, || Arc::new(SlowJob) as Arc<dyn Job>).unwrap();
        let uuid = registry.start("slow_job").await.unwrap();

        registry.pause(&uuid).await.unwrap();
        let err = registry.pause(&uuid).await.unwrap_err();
        assert!(matches!(err, Error::Job(JobError::IllegalTransition { .. })));
    }

    #[tokio::test]
    async fn repeated_stop_request_is_rejected() {
        let (mut registry, _rx) = test_registry().await;
        registry.register("slow_job", true, true, || Arc::new(SlowJob) as Arc<dyn Job>).unwrap();
        let uuid = registry.start("slow_job").await.unwrap();

        registry.stop(&uuid).await.unwrap();
        let err = registry.stop(&uuid).await.unwrap_err();
        assert!(matches!(err, Error::Job(JobError::IllegalTransition { .. })));
    }
}
