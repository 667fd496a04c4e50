//! Search controller driving the select / expand / execute / score loop
//!
//! One controller owns one tree and one clusterer. Iterations run strictly in
//! sequence; independent controllers share nothing and can run concurrently.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::cluster::{ClusteringConfig, DiversityClusterer};
use crate::config::ForageConfig;
use crate::encoding::{EncoderError, TraceEncoder, build_encoder};
use crate::error::{ClusterStateError, ExecutionError, ForageError, Result};
use crate::extraction::{ProgramCatalog, TraceExtractor, build_extractor};
use crate::trace::{Rollout, Trace};
use crate::types::{FeatureVector, ProgramId, RunId};

use super::executor::Executor;
use super::space::ActionSpace;
use super::tree::{NodeId, SearchTree, Selection, SelectionPolicy};
use super::types::{RolloutReport, SearchOutcome, SearchStats, StepReport, StopReason};

/// Default iteration budget
pub const DEFAULT_MAX_ITERATIONS: u64 = 1000;

/// Default value backpropagated for a failed branch
pub const DEFAULT_FAILURE_PENALTY: f64 = -10.0;

/// Configuration for a search run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Stop after this many iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: Option<u64>,
    /// Stop after this much wall-clock time, in milliseconds
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    /// Weight of the UCB exploration term
    #[serde(default = "default_exploration_constant")]
    pub exploration_constant: f64,
    /// Weight of diversity in the backpropagated combined value
    #[serde(default = "default_diversity_weight")]
    pub diversity_weight: f64,
    /// Weight of a child's last diversity score during selection
    #[serde(default = "default_diversity_bonus")]
    pub diversity_bonus: f64,
    /// Children created per expansion
    #[serde(default = "default_expansion_width")]
    pub expansion_width: usize,
    /// Value backpropagated for a failed branch
    #[serde(default = "default_failure_penalty")]
    pub failure_penalty: f64,
    /// Per-execution timeout, in milliseconds
    #[serde(default)]
    pub execution_timeout_ms: Option<u64>,
}

fn default_max_iterations() -> Option<u64> {
    Some(DEFAULT_MAX_ITERATIONS)
}

fn default_exploration_constant() -> f64 {
    std::f64::consts::SQRT_2
}

fn default_diversity_weight() -> f64 {
    0.5
}

fn default_diversity_bonus() -> f64 {
    0.1
}

fn default_expansion_width() -> usize {
    1
}

fn default_failure_penalty() -> f64 {
    DEFAULT_FAILURE_PENALTY
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            time_limit_ms: None,
            exploration_constant: default_exploration_constant(),
            diversity_weight: default_diversity_weight(),
            diversity_bonus: default_diversity_bonus(),
            expansion_width: default_expansion_width(),
            failure_penalty: default_failure_penalty(),
            execution_timeout_ms: None,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations.is_none() && self.time_limit_ms.is_none() {
            return Err(ForageError::Config(
                "search needs max_iterations or time_limit_ms".to_string(),
            ));
        }
        if self.max_iterations == Some(0) || self.time_limit_ms == Some(0) {
            return Err(ForageError::Config(
                "search budgets must be positive".to_string(),
            ));
        }
        if self.execution_timeout_ms == Some(0) {
            return Err(ForageError::Config(
                "search.execution_timeout_ms must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("exploration_constant", self.exploration_constant),
            ("diversity_weight", self.diversity_weight),
            ("diversity_bonus", self.diversity_bonus),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ForageError::Config(format!(
                    "search.{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !self.failure_penalty.is_finite() {
            return Err(ForageError::Config(
                "search.failure_penalty must be finite".to_string(),
            ));
        }
        if self.expansion_width == 0 {
            return Err(ForageError::Config(
                "search.expansion_width must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_ms.map(Duration::from_millis)
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            exploration_constant: self.exploration_constant,
            diversity_bonus: self.diversity_bonus,
        }
    }
}

/// Drives one search run over a tree and clusterer it owns
pub struct SearchController {
    run_id: RunId,
    config: SearchConfig,
    executor: Arc<dyn Executor>,
    extractor: Arc<dyn TraceExtractor>,
    encoder: Arc<dyn TraceEncoder>,
    space: Arc<dyn ActionSpace>,
    tree: SearchTree,
    clusterer: DiversityClusterer,
    stats: SearchStats,
    iterations: u64,
    deadline: Option<Instant>,
}

impl SearchController {
    pub fn new(
        config: SearchConfig,
        clustering: ClusteringConfig,
        executor: Arc<dyn Executor>,
        extractor: Arc<dyn TraceExtractor>,
        encoder: Arc<dyn TraceEncoder>,
        space: Arc<dyn ActionSpace>,
    ) -> Result<Self> {
        config.validate()?;
        clustering.validate()?;

        let tree = SearchTree::from_space(space.as_ref(), config.selection_policy());
        Ok(Self {
            run_id: Uuid::now_v7(),
            config,
            executor,
            extractor,
            encoder,
            space,
            tree,
            clusterer: DiversityClusterer::new(clustering),
            stats: SearchStats::default(),
            iterations: 0,
            deadline: None,
        })
    }

    /// Build the configured extractor and encoder and wire them to `executor`
    pub fn from_config(
        config: &ForageConfig,
        executor: Arc<dyn Executor>,
        catalog: Arc<dyn ProgramCatalog>,
        space: Arc<dyn ActionSpace>,
    ) -> Result<Self> {
        config.validate()?;
        let extractor = build_extractor(&config.extractor, catalog);
        let encoder =
            build_encoder(&config.encoder).map_err(|e| ForageError::Config(e.to_string()))?;
        Self::new(
            config.search.clone(),
            config.clustering.clone(),
            executor,
            extractor,
            encoder,
            space,
        )
    }

    /// Warm-start from an existing clusterer, e.g. one restored from a snapshot
    pub fn with_clusterer(mut self, clusterer: DiversityClusterer) -> Result<Self> {
        let expected = self.encoder.dimensions();
        if let Some(received) = clusterer.dimensions()
            && received != expected
        {
            return Err(ClusterStateError::DimensionMismatch { expected, received }.into());
        }
        clusterer.config().validate()?;
        self.clusterer = clusterer;
        Ok(self)
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn tree(&self) -> &SearchTree {
        &self.tree
    }

    pub fn clusterer(&self) -> &DiversityClusterer {
        &self.clusterer
    }

    /// Iterations completed so far, across every `run` and `step` call
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn stats(&self) -> SearchStats {
        SearchStats {
            clusters: self.clusterer.cluster_count(),
            nodes: self.tree.len(),
            ..self.stats.clone()
        }
    }

    /// Run until a budget is spent, the tree is exhausted or `cancel` fires.
    ///
    /// Cancellation is observed between iterations only. The time budget also
    /// races each execution: a rollout still in flight at the deadline is
    /// dropped and its node stays pending for a later run. Branch failures
    /// are penalized and the run continues; a clusterer invariant violation
    /// aborts it.
    #[instrument(skip(self, cancel), fields(run_id = %self.run_id))]
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<SearchOutcome> {
        let started_at = Utc::now();
        self.deadline = self.config.time_limit().map(|limit| Instant::now() + limit);

        info!(
            max_iterations = ?self.config.max_iterations,
            time_limit_ms = ?self.config.time_limit_ms,
            "Starting search run"
        );

        let stop_reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if let Some(max) = self.config.max_iterations
                && self.iterations >= max
            {
                break StopReason::IterationBudget;
            }
            if let Some(deadline) = self.deadline
                && Instant::now() >= deadline
            {
                break StopReason::TimeBudget;
            }

            match self.advance(cancel).await {
                Ok((StepReport::Exhausted, _)) => break StopReason::Exhausted,
                Ok((_, Some(reason))) => break reason,
                Ok((_, None)) => {}
                Err(e) => {
                    self.deadline = None;
                    error!(error = %e, iterations = self.iterations, "Search run aborted");
                    return Err(e);
                }
            }
        };
        self.deadline = None;

        let best = self.tree.best_path();
        let outcome = SearchOutcome {
            run_id: self.run_id,
            best_programs: best.programs,
            best_mean_value: best.mean_value,
            iterations: self.iterations,
            stop_reason,
            stats: self.stats(),
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            stop_reason = ?outcome.stop_reason,
            iterations = outcome.iterations,
            clusters = outcome.stats.clusters,
            best_mean_value = ?outcome.best_mean_value,
            "Search run finished"
        );
        Ok(outcome)
    }

    /// Move the controller onto a task and run it there
    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<Result<SearchOutcome>> {
        tokio::spawn(async move { self.run(&cancel).await })
    }

    /// One select / expand / evaluate cycle.
    ///
    /// Every created child is evaluated and backpropagated, so a step may
    /// consume up to `expansion_width` iterations.
    pub async fn step(&mut self) -> Result<StepReport> {
        let (report, _) = self.advance(&CancellationToken::new()).await?;
        Ok(report)
    }

    /// Step that stops before the next evaluation once `cancel` fires or the
    /// deadline passes. Children left unevaluated stay pending.
    #[instrument(skip(self, cancel), fields(run_id = %self.run_id, iteration = self.iterations))]
    async fn advance(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<(StepReport, Option<StopReason>)> {
        let (at, pending) = match self.tree.select() {
            Selection::Expand(at) => {
                let children = self
                    .tree
                    .expand(at, self.width_for_step(), self.space.as_ref());
                debug!(at = at.0, created = children.len(), "Expanded node");
                (at, children)
            }
            Selection::Evaluate(node) => {
                debug!(node = node.0, "Resuming pending node");
                let at = self.tree.node(node).parent().unwrap_or(node);
                (at, vec![node])
            }
            Selection::Exhausted => {
                debug!("Tree exhausted");
                return Ok((StepReport::Exhausted, None));
            }
        };

        let mut rollouts = Vec::with_capacity(pending.len());
        for child in pending {
            if let Some(reason) = self.interruption(cancel) {
                return Ok((StepReport::Expanded { at, rollouts }, Some(reason)));
            }
            match self.evaluate(child).await? {
                Some(report) => {
                    rollouts.push(report);
                    self.iterations += 1;
                }
                None => {
                    return Ok((
                        StepReport::Expanded { at, rollouts },
                        Some(StopReason::TimeBudget),
                    ));
                }
            }
        }
        Ok((StepReport::Expanded { at, rollouts }, None))
    }

    /// Stop condition reached in the middle of a step
    fn interruption(&self, cancel: &CancellationToken) -> Option<StopReason> {
        if cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(StopReason::TimeBudget),
            _ => None,
        }
    }

    /// Expansion width, capped by what is left of the iteration budget
    fn width_for_step(&self) -> usize {
        let width = self.config.expansion_width;
        match self.config.max_iterations {
            Some(max) => {
                let remaining = max.saturating_sub(self.iterations);
                width.min(usize::try_from(remaining).unwrap_or(usize::MAX)).max(1)
            }
            None => width,
        }
    }

    /// Evaluate and backpropagate one node. `None` when the deadline expired
    /// while the executor was still running; the node is left untouched.
    async fn evaluate(&mut self, node: NodeId) -> Result<Option<RolloutReport>> {
        let programs = self.tree.node(node).prefix().to_vec();

        let executed = match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                executed = self.execute(&programs) => executed,
                _ = tokio::time::sleep_until(deadline) => {
                    debug!(node = node.0, "Time budget expired mid-execution, rollout dropped");
                    return Ok(None);
                }
            },
            None => self.execute(&programs).await,
        };
        self.stats.executions += 1;

        let trace = match executed {
            Ok(rollout) => match Trace::from_rollout(rollout, self.extractor.as_ref()) {
                Ok(trace) => trace,
                Err(e) => return Ok(Some(self.fail(node, programs, e))),
            },
            Err(e) => return Ok(Some(self.fail(node, programs, e.into()))),
        };

        let vector = match self.encode(&trace).await {
            Ok(vector) => vector,
            Err(e) => return Ok(Some(self.fail(node, programs, e.into()))),
        };

        let expected = self.encoder.dimensions();
        if vector.len() != expected {
            let err = ClusterStateError::DimensionMismatch {
                expected,
                received: vector.len(),
            };
            error!(error = %err, "Encoder broke its dimensionality contract");
            return Err(err.into());
        }

        let assignment = match self.clusterer.observe(&vector) {
            Ok(assignment) => assignment,
            Err(e) => {
                error!(error = %e, "Clusterer invariant violated");
                return Err(e.into());
            }
        };

        let reward = trace.value();
        let combined = reward + self.config.diversity_weight * assignment.diversity;
        self.tree
            .record_assignment(node, assignment.cluster_id, assignment.diversity);
        self.tree.backpropagate(node, combined);

        debug!(
            node = node.0,
            cluster = %assignment.cluster_id,
            new_cluster = assignment.is_new,
            reward,
            diversity = assignment.diversity,
            combined,
            "Scored rollout"
        );

        Ok(Some(RolloutReport::Scored {
            node,
            programs,
            reward,
            diversity: assignment.diversity,
            combined,
            cluster: assignment.cluster_id,
        }))
    }

    /// Call the executor and enforce its contract
    async fn execute(
        &self,
        programs: &[ProgramId],
    ) -> std::result::Result<Rollout, ExecutionError> {
        let rollout = match self.config.execution_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.executor.execute(programs))
                .await
                .map_err(|_| ExecutionError::Timeout(limit))??,
            None => self.executor.execute(programs).await?,
        };

        if rollout.programs != programs {
            return Err(ExecutionError::ProgramMismatch {
                expected: programs.to_vec(),
                received: rollout.programs,
            });
        }
        if !rollout.value.is_finite() {
            return Err(ExecutionError::NonFiniteValue(rollout.value));
        }
        Ok(rollout)
    }

    async fn encode(&self, trace: &Trace) -> std::result::Result<FeatureVector, EncoderError> {
        let mut vectors = self.encoder.encode(std::slice::from_ref(trace)).await?;
        if vectors.len() != 1 {
            return Err(EncoderError::BatchSize {
                expected: 1,
                received: vectors.len(),
            });
        }
        Ok(vectors.swap_remove(0))
    }

    fn fail(&mut self, node: NodeId, programs: Vec<ProgramId>, error: ForageError) -> RolloutReport {
        match &error {
            ForageError::Execution(_) => self.stats.failures += 1,
            _ => self.stats.encoding_failures += 1,
        }
        warn!(
            node = node.0,
            programs = ?programs,
            error = %error,
            penalty = self.config.failure_penalty,
            "Branch failed, applying penalty"
        );
        self.tree.mark_failed(node);
        self.tree.backpropagate(node, self.config.failure_penalty);
        RolloutReport::Failed {
            node,
            programs,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::HashedNgramEncoder;
    use crate::extraction::{NameJoinExtractor, StaticCatalog};
    use crate::search::FixedActionSpace;
    use crate::types::programs;
    use async_trait::async_trait;
    use std::collections::HashSet;

    // ========================================================================
    // Test doubles
    // ========================================================================

    /// Reward equals the last program ID; listed programs fail
    struct ScriptedExecutor {
        failing: HashSet<ProgramId>,
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        async fn execute(
            &self,
            programs: &[ProgramId],
        ) -> std::result::Result<Rollout, ExecutionError> {
            let last = *programs.last().expect("non-empty");
            if self.failing.contains(&last) {
                return Err(ExecutionError::Crashed(format!("program {last} crashed")));
            }
            Ok(Rollout::new(programs.to_vec(), f64::from(last.0)))
        }
    }

    struct LyingExecutor;

    #[async_trait]
    impl Executor for LyingExecutor {
        async fn execute(
            &self,
            _programs: &[ProgramId],
        ) -> std::result::Result<Rollout, ExecutionError> {
            Ok(Rollout::new(programs(&[99]), 1.0))
        }
    }

    struct NanExecutor;

    #[async_trait]
    impl Executor for NanExecutor {
        async fn execute(
            &self,
            programs: &[ProgramId],
        ) -> std::result::Result<Rollout, ExecutionError> {
            Ok(Rollout::new(programs.to_vec(), f64::NAN))
        }
    }

    struct SlowExecutor;

    #[async_trait]
    impl Executor for SlowExecutor {
        async fn execute(
            &self,
            programs: &[ProgramId],
        ) -> std::result::Result<Rollout, ExecutionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Rollout::new(programs.to_vec(), 0.0))
        }
    }

    struct DelayedExecutor {
        delay: Duration,
        reward: f64,
    }

    #[async_trait]
    impl Executor for DelayedExecutor {
        async fn execute(
            &self,
            programs: &[ProgramId],
        ) -> std::result::Result<Rollout, ExecutionError> {
            tokio::time::sleep(self.delay).await;
            Ok(Rollout::new(programs.to_vec(), self.reward))
        }
    }

    /// Cancels `token` during its first call
    struct CancellingExecutor {
        token: CancellationToken,
    }

    #[async_trait]
    impl Executor for CancellingExecutor {
        async fn execute(
            &self,
            programs: &[ProgramId],
        ) -> std::result::Result<Rollout, ExecutionError> {
            self.token.cancel();
            Ok(Rollout::new(programs.to_vec(), 0.5))
        }
    }

    /// Reports one dimensionality but emits another
    struct WrongWidthEncoder;

    #[async_trait]
    impl TraceEncoder for WrongWidthEncoder {
        async fn encode_text(&self, _text: &str) -> std::result::Result<FeatureVector, EncoderError> {
            Ok(vec![0.0; 3])
        }

        fn dimensions(&self) -> usize {
            8
        }
    }

    fn controller_with(
        config: SearchConfig,
        executor: Arc<dyn Executor>,
        encoder: Arc<dyn TraceEncoder>,
        ids: &[u32],
        depth: usize,
    ) -> SearchController {
        let catalog: Arc<dyn ProgramCatalog> = Arc::new(StaticCatalog::from_names(
            (0..10).map(|i| format!("p{i}")),
        ));
        SearchController::new(
            config,
            ClusteringConfig::default(),
            executor,
            Arc::new(NameJoinExtractor::new(catalog)),
            encoder,
            Arc::new(FixedActionSpace::new(programs(ids), depth)),
        )
        .unwrap()
    }

    fn controller(config: SearchConfig, executor: Arc<dyn Executor>) -> SearchController {
        controller_with(
            config,
            executor,
            Arc::new(HashedNgramEncoder::new(32, 2).unwrap()),
            &[1, 2, 3],
            3,
        )
    }

    fn scripted(failing: &[u32]) -> Arc<dyn Executor> {
        Arc::new(ScriptedExecutor {
            failing: programs(failing).into_iter().collect(),
        })
    }

    fn iterations(n: u64) -> SearchConfig {
        SearchConfig {
            max_iterations: Some(n),
            ..Default::default()
        }
    }

    // ========================================================================
    // Config
    // ========================================================================

    #[test]
    fn test_config_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.max_iterations, Some(DEFAULT_MAX_ITERATIONS));
        assert_eq!(config.exploration_constant, std::f64::consts::SQRT_2);
        assert_eq!(config.diversity_weight, 0.5);
        assert_eq!(config.diversity_bonus, 0.1);
        assert_eq!(config.expansion_width, 1);
        assert_eq!(config.failure_penalty, DEFAULT_FAILURE_PENALTY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_requires_a_budget() {
        let config = SearchConfig {
            max_iterations: None,
            time_limit_ms: None,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ForageError::Config(_))));
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let bad = [
            SearchConfig {
                exploration_constant: -1.0,
                ..Default::default()
            },
            SearchConfig {
                diversity_weight: f64::NAN,
                ..Default::default()
            },
            SearchConfig {
                expansion_width: 0,
                ..Default::default()
            },
            SearchConfig {
                failure_penalty: f64::NEG_INFINITY,
                ..Default::default()
            },
            SearchConfig {
                execution_timeout_ms: Some(0),
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
        }
    }

    #[test]
    fn test_config_deserializes_partial() {
        let config: SearchConfig = serde_json::from_str(r#"{"time_limit_ms": 250}"#).unwrap();
        assert_eq!(config.time_limit(), Some(Duration::from_millis(250)));
        assert_eq!(config.max_iterations, Some(DEFAULT_MAX_ITERATIONS));
        assert_eq!(config.expansion_width, 1);
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    #[tokio::test]
    async fn test_step_expands_and_scores() {
        let mut controller = controller(iterations(10), scripted(&[]));
        let report = controller.step().await.unwrap();

        let StepReport::Expanded { at, rollouts } = report else {
            panic!("expected expansion");
        };
        assert_eq!(at, controller.tree().root());
        assert_eq!(rollouts.len(), 1);
        match &rollouts[0] {
            RolloutReport::Scored {
                programs: p,
                reward,
                diversity,
                combined,
                cluster,
                ..
            } => {
                assert_eq!(p, &programs(&[1]));
                assert_eq!(*reward, 1.0);
                assert_eq!(*diversity, 1.0);
                assert_eq!(*combined, 1.5);
                assert_eq!(cluster.0, 0);
            }
            other => panic!("unexpected report {other:?}"),
        }
        assert_eq!(controller.iterations(), 1);
        assert_eq!(controller.stats().executions, 1);
        assert_eq!(controller.stats().clusters, 1);
    }

    #[tokio::test]
    async fn test_wide_expansion_evaluates_every_child() {
        let config = SearchConfig {
            expansion_width: 3,
            ..iterations(10)
        };
        let mut controller = controller(config, scripted(&[]));
        let StepReport::Expanded { rollouts, .. } = controller.step().await.unwrap() else {
            panic!("expected expansion");
        };
        assert_eq!(rollouts.len(), 3);
        assert_eq!(controller.iterations(), 3);
        assert_eq!(controller.tree().node(controller.tree().root()).visit_count(), 3);
    }

    #[tokio::test]
    async fn test_expansion_width_respects_remaining_budget() {
        let config = SearchConfig {
            expansion_width: 3,
            ..iterations(2)
        };
        let mut controller = controller(config, scripted(&[]));
        let outcome = controller.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.stop_reason, StopReason::IterationBudget);
    }

    // ========================================================================
    // Branch failures
    // ========================================================================

    #[tokio::test]
    async fn test_execution_error_penalizes_branch() {
        let mut controller = controller(iterations(1), scripted(&[1]));
        let StepReport::Expanded { rollouts, .. } = controller.step().await.unwrap() else {
            panic!("expected expansion");
        };
        let RolloutReport::Failed { node, error, .. } = &rollouts[0] else {
            panic!("expected failure");
        };
        assert!(matches!(error, ForageError::Execution(ExecutionError::Crashed(_))));

        let failed = controller.tree().node(*node);
        assert!(failed.is_failed());
        assert_eq!(failed.visit_count(), 1);
        assert_eq!(failed.mean_value(), Some(DEFAULT_FAILURE_PENALTY));
        assert_eq!(controller.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_program_mismatch_is_branch_failure() {
        let mut controller = controller(iterations(1), Arc::new(LyingExecutor));
        let StepReport::Expanded { rollouts, .. } = controller.step().await.unwrap() else {
            panic!("expected expansion");
        };
        assert!(matches!(
            &rollouts[0],
            RolloutReport::Failed {
                error: ForageError::Execution(ExecutionError::ProgramMismatch { .. }),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_non_finite_reward_is_branch_failure() {
        let mut controller = controller(iterations(1), Arc::new(NanExecutor));
        let StepReport::Expanded { rollouts, .. } = controller.step().await.unwrap() else {
            panic!("expected expansion");
        };
        assert!(matches!(
            &rollouts[0],
            RolloutReport::Failed {
                error: ForageError::Execution(ExecutionError::NonFiniteValue(_)),
                ..
            }
        ));
        assert_eq!(controller.clusterer().cluster_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_executor_times_out() {
        let config = SearchConfig {
            execution_timeout_ms: Some(50),
            ..iterations(1)
        };
        let mut controller = controller(config, Arc::new(SlowExecutor));
        let StepReport::Expanded { rollouts, .. } = controller.step().await.unwrap() else {
            panic!("expected expansion");
        };
        assert!(matches!(
            &rollouts[0],
            RolloutReport::Failed {
                error: ForageError::Execution(ExecutionError::Timeout(d)),
                ..
            } if *d == Duration::from_millis(50)
        ));
    }

    #[tokio::test]
    async fn test_unknown_program_counts_as_encoding_failure() {
        let catalog: Arc<dyn ProgramCatalog> =
            Arc::new(StaticCatalog::from_names(["only_zero"]));
        let mut controller = SearchController::new(
            iterations(5),
            ClusteringConfig::default(),
            scripted(&[]),
            Arc::new(NameJoinExtractor::new(catalog)),
            Arc::new(HashedNgramEncoder::new(16, 1).unwrap()),
            Arc::new(FixedActionSpace::new(programs(&[7]), 1)),
        )
        .unwrap();

        let outcome = controller.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.stats.encoding_failures, 1);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
    }

    // ========================================================================
    // Fatal errors and budgets
    // ========================================================================

    #[tokio::test]
    async fn test_encoder_width_violation_aborts_run() {
        let mut controller = controller_with(
            iterations(5),
            scripted(&[]),
            Arc::new(WrongWidthEncoder),
            &[1, 2],
            2,
        );
        let err = controller.run(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            ForageError::ClusterState(ClusterStateError::DimensionMismatch {
                expected: 8,
                received: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_warm_start_rejects_other_dimensions() {
        let mut clusterer = DiversityClusterer::new(ClusteringConfig::default());
        clusterer.observe(&[0.0, 1.0]).unwrap();

        let result = controller(iterations(5), scripted(&[])).with_clusterer(clusterer);
        assert!(matches!(
            result,
            Err(ForageError::ClusterState(ClusterStateError::DimensionMismatch {
                expected: 32,
                received: 2
            }))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut controller = controller(iterations(50), scripted(&[]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = controller.run(&cancel).await.unwrap();
        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.best_programs.is_empty());
        assert_eq!(outcome.best_mean_value, None);
    }

    #[tokio::test]
    async fn test_small_tree_exhausts() {
        let mut controller = controller_with(
            iterations(100),
            scripted(&[]),
            Arc::new(HashedNgramEncoder::new(16, 1).unwrap()),
            &[1, 2],
            2,
        );
        let outcome = controller.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        // two depth-1 nodes and four depth-2 nodes
        assert_eq!(outcome.iterations, 6);
        assert_eq!(outcome.stats.nodes, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_budget_stops_run() {
        let config = SearchConfig {
            max_iterations: None,
            time_limit_ms: Some(1_000),
            ..Default::default()
        };
        let mut controller = controller(config, Arc::new(SlowExecutor));
        let outcome = controller.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.stop_reason, StopReason::TimeBudget);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.stats.failures, 0);

        let tree = controller.tree();
        let child = tree.find(&programs(&[1])).unwrap();
        assert!(tree.node(child).is_pending());
        assert!(!tree.node(child).is_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_drops_in_flight_rollout_without_penalty() {
        let config = SearchConfig {
            max_iterations: None,
            time_limit_ms: Some(1_000),
            ..Default::default()
        };
        let executor = Arc::new(DelayedExecutor {
            delay: Duration::from_millis(600),
            reward: 1.0,
        });
        let mut controller = controller_with(
            config,
            executor,
            Arc::new(HashedNgramEncoder::new(32, 2).unwrap()),
            &[1, 2],
            3,
        );
        let cancel = CancellationToken::new();

        let first = controller.run(&cancel).await.unwrap();
        assert_eq!(first.stop_reason, StopReason::TimeBudget);
        assert_eq!(first.iterations, 1);
        assert_eq!(first.stats.failures, 0);
        assert_eq!(first.stats.executions, 1);

        let tree = controller.tree();
        let dropped = tree.find(&programs(&[2])).unwrap();
        assert!(tree.node(dropped).is_pending());
        assert!(tree.node(tree.root()).mean_value().unwrap() > 0.0);

        // the next run picks the dropped node up again
        let second = controller.run(&cancel).await.unwrap();
        assert_eq!(second.iterations, 2);
        let tree = controller.tree();
        let resumed = tree.node(tree.find(&programs(&[2])).unwrap());
        assert_eq!(resumed.visit_count(), 1);
        assert!(!resumed.is_failed());
        assert!(tree.nodes().all(|(_, node)| !node.is_failed()));
    }

    #[tokio::test]
    async fn test_cancellation_stops_wide_expansion_between_children() {
        let cancel = CancellationToken::new();
        let executor = Arc::new(CancellingExecutor {
            token: cancel.clone(),
        });
        let config = SearchConfig {
            expansion_width: 3,
            ..iterations(10)
        };
        let mut controller = controller(config, executor);

        let outcome = controller.run(&cancel).await.unwrap();
        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.stats.executions, 1);

        let tree = controller.tree();
        assert_eq!(tree.node(tree.root()).children().len(), 3);
        let pending = tree.nodes().filter(|(_, node)| node.is_pending()).count();
        assert_eq!(pending, 2);
    }
}
