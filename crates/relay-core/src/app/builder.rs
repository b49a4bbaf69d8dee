//! AppBuilder - Handler の登録と Runner のワイヤリング
//!
//! # 学習ポイント
//! - Builder パターン（consuming self でチェーン）
//! - 起動時検証: 期待する handler 名が揃っていなければ build() で落とす
//! - 名前で Handler を選び、ExtensionRunner を組み立てる

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::app::runner::ExtensionRunner;
use crate::domain::{Channels, WorkflowIds};
use crate::ports::BusConnector;
use crate::typed::{DynHandler, Handler, RegistryError, Task, TypedRegistry};

/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .register::<AddSubscriber, _>(AddSubscriberHandler::new(http))?
///     .expect_tasks(&["mailchimp.add_subscriber"])
///     .build()?;
/// let runner = app.runner("mailchimp.add_subscriber", connector, channels, ids)?;
/// ```
#[derive(Default)]
pub struct AppBuilder {
    registry: TypedRegistry,
    expected: BTreeSet<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("expected handlers are not registered: {0:?}")]
    MissingTaskTypes(Vec<String>),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    /// Handler names that must be registered by the time `build` runs.
    pub fn expect_tasks(mut self, names: &[&str]) -> Self {
        self.expected.extend(names.iter().map(|name| name.to_string()));
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        let missing: Vec<String> = self
            .expected
            .into_iter()
            .filter(|name| self.registry.get(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingTaskTypes(missing));
        }
        Ok(App {
            registry: self.registry,
        })
    }
}

/// App は検証済みの Handler 集合
pub struct App {
    registry: TypedRegistry,
}

impl App {
    pub fn task_types(&self) -> Vec<String> {
        self.registry.registered_types()
    }

    pub fn handler(&self, name: &str) -> Result<Arc<dyn DynHandler>, RegistryError> {
        self.registry.require(name)
    }

    /// Wire the named handler into a runner with default options.
    pub fn runner(
        &self,
        name: &str,
        connector: Arc<dyn BusConnector>,
        channels: Channels,
        workflow: WorkflowIds,
    ) -> Result<ExtensionRunner, RegistryError> {
        let handler = self.handler(name)?;
        Ok(ExtensionRunner::new(connector, channels, workflow, handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryBus;
    use crate::typed::handler::fixtures::{EchoHandler, GreetHandler};
    use crate::typed::task::fixtures::{EchoTask, GreetTask};

    #[test]
    fn expected_handlers_present() {
        let app = AppBuilder::new()
            .register::<EchoTask, _>(EchoHandler)
            .unwrap()
            .expect_tasks(&["test.echo"])
            .build()
            .unwrap();
        assert_eq!(app.task_types(), vec!["test.echo"]);
    }

    #[test]
    fn missing_expected_handler_fails_fast() {
        let result = AppBuilder::new()
            .register::<EchoTask, _>(EchoHandler)
            .unwrap()
            .expect_tasks(&["test.echo", "test.greet"])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingTaskTypes(missing)) if missing == vec!["test.greet".to_string()]
        ));
    }

    #[test]
    fn nothing_expected_accepts_any_registry() {
        let app = AppBuilder::new()
            .register::<EchoTask, _>(EchoHandler)
            .unwrap()
            .register::<GreetTask, _>(GreetHandler)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(app.task_types().len(), 2);
        assert!(app.handler("test.greet").is_ok());
    }

    #[test]
    fn runner_for_unknown_handler_is_an_error() {
        let app = AppBuilder::new().build().unwrap();
        let result = app.runner(
            "nope",
            Arc::new(InMemoryBus::new()),
            Channels::new("ready", "in", "out"),
            WorkflowIds::new("wi", "we"),
        );
        assert!(matches!(result, Err(RegistryError::NotRegistered(_))));
    }
}
