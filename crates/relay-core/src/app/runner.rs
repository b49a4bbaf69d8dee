//! ExtensionRunner - バス上の request/response ハンドシェイク
//!
//! # フロー
//! 1. publish 用・subscribe 用の 2 接続を開く
//! 2. ready チャンネルに空メッセージを 1 回だけ publish
//! 3. input チャンネルを購読
//! 4. タスクを 1 件待つ（single-shot では timeout と競争）
//! 5. Handler を 1 回だけ実行 → `completed` / `failed` envelope
//! 6. output チャンネルに publish
//! 7. どの経路でも unsubscribe して両接続を閉じる
//!
//! Handler のエラーは `failed` envelope になり、`run` は `Ok` を返す。
//! `Err` になるのはインフラ側（バス・壊れた task message）だけ。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::domain::{
    Channels, CompletionEnvelope, ErrorPayload, HandlerError, RunId, RunOutcome, RunReport,
    RunnerError, RunnerState, TaskMessage, WorkflowIds,
};
use crate::ports::{BusConnector, Clock, IdGenerator, Publisher, Subscriber, SystemClock, UlidGenerator};
use crate::typed::DynHandler;

/// Wait bound for the first task in single-shot mode.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// One task per process, then exit.
    #[default]
    SingleShot,
    /// Keep serving tasks until shutdown. Readiness is announced once.
    LongLived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// `None` waits forever. Only applies to [`RunMode::SingleShot`].
    pub task_timeout: Option<Duration>,
    pub mode: RunMode,
    /// Emit `{message, kind, stack}` instead of a bare message in `failed` envelopes.
    pub detailed_errors: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            task_timeout: Some(DEFAULT_TASK_TIMEOUT),
            mode: RunMode::SingleShot,
            detailed_errors: false,
        }
    }
}

enum Delivery {
    Message(String),
    TimedOut(Duration),
    /// The bus ended the subscription stream.
    Closed,
    Shutdown,
}

pub struct ExtensionRunner {
    connector: Arc<dyn BusConnector>,
    channels: Channels,
    workflow: WorkflowIds,
    handler: Arc<dyn DynHandler>,
    options: RunnerOptions,
    clock: Arc<dyn Clock>,
    id_generator: Arc<dyn IdGenerator>,
    state: watch::Sender<RunnerState>,
}

impl ExtensionRunner {
    pub fn new(
        connector: Arc<dyn BusConnector>,
        channels: Channels,
        workflow: WorkflowIds,
        handler: Arc<dyn DynHandler>,
    ) -> Self {
        let (state, _) = watch::channel(RunnerState::Starting);
        Self {
            connector,
            channels,
            workflow,
            handler,
            options: RunnerOptions::default(),
            clock: Arc::new(SystemClock),
            id_generator: Arc::new(UlidGenerator::new(SystemClock)),
            state,
        }
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the clock used for the run report and run id.
    pub fn with_clock<C: Clock + Clone + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock.clone());
        self.id_generator = Arc::new(UlidGenerator::new(clock));
        self
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Observe state transitions. Subscribe before calling `run`.
    pub fn state(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    /// Run until the task is handled (single-shot) or forever (long-lived).
    pub async fn run(self) -> Result<RunReport, RunnerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run, stopping early when `shutdown` resolves while no task is in flight.
    ///
    /// An in-flight handler call is never cancelled: shutdown is only observed
    /// while waiting for the next task.
    pub async fn run_until<F>(self, shutdown: F) -> Result<RunReport, RunnerError>
    where
        F: Future<Output = ()> + Send,
    {
        let run_id = self.id_generator.generate_run_id();
        let span = info_span!(
            "extension",
            %run_id,
            handler = self.handler.task_type(),
            instance = %self.workflow.instance_id,
            extension = %self.workflow.extension_id,
        );
        self.run_inner(run_id, shutdown).instrument(span).await
    }

    async fn run_inner<F>(&self, run_id: RunId, shutdown: F) -> Result<RunReport, RunnerError>
    where
        F: Future<Output = ()> + Send,
    {
        let mut report = RunReport::new(run_id, self.clock.now());
        self.transition(RunnerState::AwaitingConnection);

        let publisher = match self.connector.publisher().await {
            Ok(publisher) => publisher,
            Err(e) => {
                error!(error = %e, "publisher connection failed");
                self.transition(RunnerState::Terminated);
                return Err(e.into());
            }
        };
        let mut subscriber = match self.connector.subscriber().await {
            Ok(subscriber) => subscriber,
            Err(e) => {
                error!(error = %e, "subscriber connection failed");
                self.release(publisher, None).await;
                self.transition(RunnerState::Terminated);
                return Err(e.into());
            }
        };
        info!("connected to bus");

        let result = self
            .serve(publisher.as_ref(), subscriber.as_mut(), &mut report, shutdown)
            .await;

        self.release(publisher, Some(subscriber)).await;
        self.transition(RunnerState::Terminated);
        report.finish(self.clock.now());

        match result {
            Ok(()) => {
                info!(envelopes = report.envelopes_published(), "extension finished");
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "extension failed");
                Err(e)
            }
        }
    }

    async fn serve<F>(
        &self,
        publisher: &dyn Publisher,
        subscriber: &mut dyn Subscriber,
        report: &mut RunReport,
        shutdown: F,
    ) -> Result<(), RunnerError>
    where
        F: Future<Output = ()> + Send,
    {
        self.transition(RunnerState::Ready);
        publisher.publish(&self.channels.ready, "").await?;
        info!(channel = %self.channels.ready, "readiness signal published");

        subscriber.subscribe(&self.channels.input).await?;
        self.transition(RunnerState::AwaitingTask);
        info!(channel = %self.channels.input, "awaiting task");

        tokio::pin!(shutdown);
        loop {
            let delivery = tokio::select! {
                biased;
                _ = &mut shutdown => Delivery::Shutdown,
                delivery = self.await_task(&mut *subscriber) => delivery?,
            };

            let (envelope, outcome) = match delivery {
                Delivery::Shutdown => {
                    info!("shutdown requested while awaiting task");
                    return Ok(());
                }
                Delivery::Closed => {
                    return match self.options.mode {
                        RunMode::SingleShot => Err(RunnerError::SubscriptionClosed {
                            channel: self.channels.input.to_string(),
                        }),
                        RunMode::LongLived => {
                            info!("subscription closed by bus");
                            Ok(())
                        }
                    };
                }
                Delivery::TimedOut(after) => {
                    self.transition(RunnerState::TimedOut);
                    warn!(?after, "no task message received");
                    let err =
                        HandlerError::timeout(format!("no task message received within {after:?}"));
                    let payload = ErrorPayload::from_error(&err, self.options.detailed_errors);
                    (
                        CompletionEnvelope::failed(&self.workflow, payload),
                        RunOutcome::TimedOut,
                    )
                }
                Delivery::Message(raw) => {
                    self.transition(RunnerState::Processing);
                    self.process(raw).await?
                }
            };

            self.transition(RunnerState::Publishing);
            let body = envelope.to_json().map_err(RunnerError::Envelope)?;
            publisher.publish(&self.channels.output, &body).await?;
            report.record(outcome);
            info!(channel = %self.channels.output, ?outcome, "completion envelope published");

            if self.options.mode == RunMode::SingleShot || outcome == RunOutcome::TimedOut {
                return Ok(());
            }
            self.transition(RunnerState::AwaitingTask);
        }
    }

    async fn await_task(&self, subscriber: &mut dyn Subscriber) -> Result<Delivery, RunnerError> {
        let bound = match self.options.mode {
            RunMode::SingleShot => self.options.task_timeout,
            RunMode::LongLived => None,
        };

        let next = match bound {
            Some(limit) => match tokio::time::timeout(limit, subscriber.next_message()).await {
                Ok(next) => next?,
                Err(_elapsed) => return Ok(Delivery::TimedOut(limit)),
            },
            None => subscriber.next_message().await?,
        };

        Ok(match next {
            Some(raw) => Delivery::Message(raw),
            None => Delivery::Closed,
        })
    }

    async fn process(&self, raw: String) -> Result<(CompletionEnvelope, RunOutcome), RunnerError> {
        let task = TaskMessage::parse(raw)?;
        debug!(bytes = task.raw().len(), "task message received");

        match self.handler.handle_dyn(&task).await {
            Ok(output) => {
                info!("task completed");
                Ok((
                    CompletionEnvelope::completed(&self.workflow, output),
                    RunOutcome::Completed,
                ))
            }
            Err(err) => {
                warn!(kind = ?err.kind(), error = %err, "task failed");
                let payload = ErrorPayload::from_error(&err, self.options.detailed_errors);
                Ok((
                    CompletionEnvelope::failed(&self.workflow, payload),
                    RunOutcome::Failed,
                ))
            }
        }
    }

    /// Unsubscribe and close both connections. Failures are logged, not returned,
    /// so they never mask the error that ended the run.
    async fn release(
        &self,
        publisher: Box<dyn Publisher>,
        subscriber: Option<Box<dyn Subscriber>>,
    ) {
        if let Some(mut subscriber) = subscriber {
            if let Err(e) = subscriber.unsubscribe(&self.channels.input).await {
                warn!(error = %e, "unsubscribe failed");
            }
            if let Err(e) = subscriber.close().await {
                warn!(error = %e, "subscriber close failed");
            }
        }
        if let Err(e) = publisher.close().await {
            warn!(error = %e, "publisher close failed");
        }
        debug!("bus connections released");
    }

    fn transition(&self, next: RunnerState) {
        let current = *self.state.borrow();
        if !current.can_transition_to(next) {
            warn!(from = ?current, to = ?next, "unexpected state transition");
        }
        debug!(from = ?current, to = ?next, "state");
        self.state.send_replace(next);
    }
}
