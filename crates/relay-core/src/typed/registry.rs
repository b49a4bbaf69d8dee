//! TypedRegistry - handler 名 → DynHandler
//!
//! バイナリは全 integration をここに登録し、起動時に 1 つだけ名前で引く。
//! BTreeMap なので `registered_types` は常に名前順。

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::Task;

/// # 使用例
/// ```ignore
/// let mut registry = TypedRegistry::new();
/// registry.register::<AddSubscriber, _>(AddSubscriberHandler::new(http))?;
/// let handler = registry.require("mailchimp.add_subscriber")?;
/// ```
#[derive(Default)]
pub struct TypedRegistry {
    by_name: BTreeMap<&'static str, Arc<dyn DynHandler>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("unknown handler '{0}'")]
    NotRegistered(String),
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names come from `T::TYPE`, so two handlers for one task type collide.
    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        match self.by_name.entry(T::TYPE) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(T::TYPE.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(TypedHandler::<T, H>::new(handler)));
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynHandler>> {
        self.by_name.get(name).cloned()
    }

    pub fn require(&self, name: &str) -> Result<Arc<dyn DynHandler>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.by_name.keys().map(|name| name.to_string()).collect()
    }
}
