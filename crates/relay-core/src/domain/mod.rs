//! Domain model (IDs, channels, task messages, envelopes, errors, state).
//!
//! バスや外部 API を知らない純粋な型だけを置く。

pub mod channel;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod report;
pub mod state;
pub mod task;

pub use channel::{Channel, Channels};
pub use envelope::{CompletionEnvelope, ErrorPayload};
pub use errors::{ErrorKind, HandlerError, RunnerError};
pub use ids::{RunId, WorkflowExtensionId, WorkflowIds, WorkflowInstanceId};
pub use report::{RunOutcome, RunReport};
pub use state::RunnerState;
pub use task::{MalformedTask, TaskMessage};
