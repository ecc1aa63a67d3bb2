// ── Discovery runner ──
//
// Runs type-specific probes concurrently, one per (parent, type) job, and
// merges what they report. Probes are synchronous and may block, so each
// runs on the tokio blocking pool; a semaphore bounds how many run at once.
// A probe that errors or panics only fails its own pairing.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::{AgentSettings, RemovalPolicy};
use crate::error::BoxError;
use crate::model::{DiscoveredResource, ProbeOutcome, Resource, ResourceId, TypeKey};
use crate::store::{DiscoveryBatch, MergeOutcome, ResourceTree};
use crate::type_graph::TypeGraph;

/// What a probe gets to see while discovering under one parent.
#[derive(Debug, Clone)]
pub struct DiscoveryContext {
    /// Snapshot of the parent resource at the time the job started.
    pub parent: Resource,
    pub resource_type: TypeKey,
}

impl DiscoveryContext {
    /// Start a record for `resource_type` under this context's parent.
    pub fn discovered(
        &self,
        resource_key: impl Into<String>,
        name: impl Into<String>,
    ) -> DiscoveredResource {
        DiscoveredResource::new(self.parent.id, &self.resource_type, resource_key, name)
    }
}

/// Discovers instances of one resource type under a given parent.
pub trait DiscoveryProbe: Send + Sync {
    fn resource_type(&self) -> TypeKey;

    fn discover(&self, context: &DiscoveryContext) -> Result<Vec<DiscoveredResource>, BoxError>;
}

/// Run `probe` under `parent`.
#[derive(Clone)]
pub struct DiscoveryJob {
    pub parent: ResourceId,
    pub probe: Arc<dyn DiscoveryProbe>,
}

impl DiscoveryJob {
    pub fn new(parent: ResourceId, probe: Arc<dyn DiscoveryProbe>) -> Self {
        Self { parent, probe }
    }
}

pub struct DiscoveryRunner {
    graph: Arc<TypeGraph>,
    tree: Arc<ResourceTree>,
    limit: Arc<Semaphore>,
    policy: RemovalPolicy,
}

impl DiscoveryRunner {
    pub fn new(graph: Arc<TypeGraph>, tree: Arc<ResourceTree>, settings: &AgentSettings) -> Self {
        Self {
            graph,
            tree,
            limit: Arc::new(Semaphore::new(settings.max_parallel_probes.max(1))),
            policy: settings.removal,
        }
    }

    /// Run every job and merge the combined results.
    pub async fn run(&self, jobs: Vec<DiscoveryJob>) -> MergeOutcome {
        let batch = self.collect(jobs).await;
        self.tree.apply_discovery(&self.graph, batch, self.policy)
    }

    /// Run every job concurrently and gather their outcomes without
    /// touching the tree.
    pub async fn collect(&self, jobs: Vec<DiscoveryJob>) -> DiscoveryBatch {
        let mut batch = DiscoveryBatch::new();
        let mut running = JoinSet::new();

        for job in jobs {
            let resource_type = job.probe.resource_type();
            let Some(parent) = self.tree.get(job.parent) else {
                batch.fail(job.parent, resource_type, "parent resource is no longer in the tree");
                continue;
            };
            let context = DiscoveryContext {
                parent,
                resource_type: resource_type.clone(),
            };
            let limit = Arc::clone(&self.limit);

            running.spawn(async move {
                let outcome = match limit.acquire_owned().await {
                    Ok(permit) => {
                        let outcome = run_probe(job.probe, context).await;
                        drop(permit);
                        outcome
                    }
                    Err(_) => ProbeOutcome::Failed {
                        message: "discovery runner closed".into(),
                    },
                };
                (job.parent, resource_type, outcome)
            });
        }

        while let Some(joined) = running.join_next().await {
            match joined {
                Ok((parent, resource_type, ProbeOutcome::Reported(records))) => {
                    debug!(parent = %parent, resource_type = %resource_type, count = records.len(), "probe reported");
                    batch.report(parent, resource_type, records);
                }
                Ok((parent, resource_type, ProbeOutcome::Failed { message })) => {
                    batch.fail(parent, resource_type, message);
                }
                Err(err) => warn!(error = %err, "discovery task aborted"),
            }
        }
        batch
    }
}

async fn run_probe(probe: Arc<dyn DiscoveryProbe>, context: DiscoveryContext) -> ProbeOutcome {
    match tokio::task::spawn_blocking(move || probe.discover(&context)).await {
        Ok(Ok(records)) => ProbeOutcome::Reported(records),
        Ok(Err(err)) => ProbeOutcome::Failed {
            message: err.to_string(),
        },
        Err(join) if join.is_panic() => ProbeOutcome::Failed {
            message: "probe panicked".into(),
        },
        Err(join) => ProbeOutcome::Failed {
            message: join.to_string(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::CoreError;
    use crate::test_support::{self, Fixture, SERVER, SERVICE};

    struct StaticProbe {
        resource_type: TypeKey,
        keys: Vec<&'static str>,
    }

    impl DiscoveryProbe for StaticProbe {
        fn resource_type(&self) -> TypeKey {
            self.resource_type.clone()
        }

        fn discover(&self, context: &DiscoveryContext) -> Result<Vec<DiscoveredResource>, BoxError> {
            Ok(self
                .keys
                .iter()
                .map(|k| context.discovered(*k, k.to_uppercase()))
                .collect())
        }
    }

    struct FailingProbe(TypeKey);

    impl DiscoveryProbe for FailingProbe {
        fn resource_type(&self) -> TypeKey {
            self.0.clone()
        }

        fn discover(&self, _: &DiscoveryContext) -> Result<Vec<DiscoveredResource>, BoxError> {
            Err("jmx connection refused".into())
        }
    }

    struct PanickingProbe(TypeKey);

    impl DiscoveryProbe for PanickingProbe {
        fn resource_type(&self) -> TypeKey {
            self.0.clone()
        }

        fn discover(&self, _: &DiscoveryContext) -> Result<Vec<DiscoveredResource>, BoxError> {
            panic!("probe bug");
        }
    }

    /// Records the highest number of concurrent `discover` calls.
    struct SlowProbe {
        resource_type: TypeKey,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl DiscoveryProbe for SlowProbe {
        fn resource_type(&self) -> TypeKey {
            self.resource_type.clone()
        }

        fn discover(&self, _: &DiscoveryContext) -> Result<Vec<DiscoveredResource>, BoxError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn runner(fx: &Fixture, max_parallel_probes: usize) -> DiscoveryRunner {
        let settings = AgentSettings {
            max_parallel_probes,
            ..AgentSettings::default()
        };
        DiscoveryRunner::new(Arc::clone(&fx.graph), Arc::clone(&fx.tree), &settings)
    }

    #[tokio::test]
    async fn probes_results_are_merged() {
        let fx = Fixture::new();
        let probe = Arc::new(StaticProbe {
            resource_type: test_support::key(SERVER),
            keys: vec!["a", "b"],
        });

        let outcome = runner(&fx, 4).run(vec![DiscoveryJob::new(fx.root, probe)]).await;
        assert_eq!(outcome.added.len(), 2);
        let a = fx.tree.find_child(fx.root, &test_support::key(SERVER), "a").unwrap();
        assert_eq!(fx.tree.get(a).unwrap().name, "A");
    }

    #[tokio::test]
    async fn failing_and_panicking_probes_are_isolated() {
        let fx = Fixture::new();
        let existing = fx.tree.attach(fx.resource(SERVER, "kept"), fx.root).unwrap();
        let jobs = vec![
            DiscoveryJob::new(fx.root, Arc::new(FailingProbe(test_support::key(SERVER)))),
            DiscoveryJob::new(fx.root, Arc::new(PanickingProbe(test_support::key(SERVICE)))),
            DiscoveryJob::new(
                existing,
                Arc::new(StaticProbe {
                    resource_type: test_support::key(SERVICE),
                    keys: vec!["http"],
                }),
            ),
        ];

        let outcome = runner(&fx, 4).run(jobs).await;
        assert_eq!(outcome.probe_failures.len(), 2);
        assert!(
            outcome
                .probe_failures
                .iter()
                .all(|e| matches!(e, CoreError::ProbeFailed { .. }))
        );
        assert!(fx.tree.contains(existing));
        assert_eq!(fx.tree.children(existing).len(), 1);
    }

    #[tokio::test]
    async fn parallelism_is_bounded() {
        let fx = Fixture::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs = (0..8)
            .map(|n| {
                let probe = Arc::new(SlowProbe {
                    resource_type: TypeKey::new(format!("Type {n}"), "tomcat"),
                    active: Arc::clone(&active),
                    peak: Arc::clone(&peak),
                });
                DiscoveryJob::new(fx.root, probe)
            })
            .collect();

        let batch = runner(&fx, 2).collect(jobs).await;
        assert_eq!(batch.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn missing_parent_fails_the_pairing() {
        let fx = Fixture::new();
        let probe = Arc::new(StaticProbe {
            resource_type: test_support::key(SERVICE),
            keys: vec!["x"],
        });
        let outcome = runner(&fx, 1)
            .run(vec![DiscoveryJob::new(ResourceId::new(), probe)])
            .await;
        assert!(outcome.added.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
    }
}
