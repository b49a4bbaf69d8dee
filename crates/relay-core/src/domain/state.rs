//! State - Runner の状態
//!
//! # 状態遷移
//! ```text
//! Starting -> AwaitingConnection -> Ready -> AwaitingTask -> Processing -> Publishing -> Terminated
//!                                                 |                            |
//!                                                 +-> TimedOut -> Publishing   +-> AwaitingTask (long-lived)
//!                                                 +-> Terminated (shutdown / infra error)
//! ```
//! Any non-terminal state may also jump to `Terminated` when the infrastructure fails.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    Starting,
    AwaitingConnection,
    Ready,
    AwaitingTask,
    Processing,
    Publishing,
    /// The wait bound elapsed with no task delivered.
    TimedOut,
    Terminated,
}

impl RunnerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunnerState::Terminated)
    }

    /// Is `self -> next` a legal transition?
    pub fn can_transition_to(self, next: RunnerState) -> bool {
        use RunnerState::*;

        if next == Terminated {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Starting, AwaitingConnection)
                | (AwaitingConnection, Ready)
                | (Ready, AwaitingTask)
                | (AwaitingTask, Processing)
                | (AwaitingTask, TimedOut)
                | (TimedOut, Publishing)
                | (Processing, Publishing)
                | (Publishing, AwaitingTask)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use RunnerState::*;

    #[rstest]
    #[case::connect(Starting, AwaitingConnection)]
    #[case::ready(AwaitingConnection, Ready)]
    #[case::subscribe(Ready, AwaitingTask)]
    #[case::deliver(AwaitingTask, Processing)]
    #[case::timeout(AwaitingTask, TimedOut)]
    #[case::publish(Processing, Publishing)]
    #[case::publish_timeout(TimedOut, Publishing)]
    #[case::loop_back(Publishing, AwaitingTask)]
    #[case::finish(Publishing, Terminated)]
    #[case::shutdown(AwaitingTask, Terminated)]
    fn legal_transitions(#[case] from: RunnerState, #[case] to: RunnerState) {
        assert!(from.can_transition_to(to));
    }

    #[rstest]
    #[case::skip_ready(AwaitingConnection, AwaitingTask)]
    #[case::reannounce(Publishing, Ready)]
    #[case::process_twice(Processing, Processing)]
    #[case::revive(Terminated, AwaitingTask)]
    #[case::terminate_twice(Terminated, Terminated)]
    fn illegal_transitions(#[case] from: RunnerState, #[case] to: RunnerState) {
        assert!(!from.can_transition_to(to));
    }
}
