//! Built-in task handlers
//!
//! 1 バイナリに全部登録しておき、起動時に名前で 1 つ選ぶ。

pub mod github;
pub mod mailchimp;
pub mod webhook;

use relay_core::App;
use relay_core::app::BuildError;
use relay_core::typed::RegistryError;
use reqwest::Client;

use self::github::{AddIssueComment, AddIssueCommentHandler};
use self::mailchimp::{AddSubscriber, AddSubscriberHandler};
use self::webhook::{AcknowledgeHandler, WebhookEvent};

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Build(#[from] BuildError),
}

pub fn app(http: Client) -> Result<App, SetupError> {
    let app = relay_core::AppBuilder::new()
        .register::<AddSubscriber, _>(AddSubscriberHandler::from_env(http.clone()))?
        .register::<AddIssueComment, _>(AddIssueCommentHandler::new(http))?
        .register::<WebhookEvent, _>(AcknowledgeHandler)?
        .expect_tasks(&[
            "mailchimp.add_subscriber",
            "github.add_issue_comment",
            "webhook.acknowledge",
        ])
        .build()?;
    Ok(app)
}
