// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::StageFailure;

/// Opaque payload. The engine never looks inside.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Shared, immutable handle to an item. Stages pass items through by cloning this.
pub type ItemRef = Arc<Item>;

/// Lifecycle state of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Real payload present.
    Valid,
    /// Placeholder keeping sibling vectors aligned; no payload was produced.
    Invalid,
    /// Dropped by an earlier stage but kept in position for bookkeeping.
    Filtered,
}

/// Atomic data unit flowing through the workflow graph.
///
/// Items are immutable once created. A stage that wants to change the state of
/// an item builds a new one with [`Item::with_state`], which shares the payload.
#[derive(Clone)]
pub struct Item {
    type_tag: String,
    name: Option<String>,
    state: ItemState,
    error: Option<StageFailure>,
    payload: Option<Payload>,
}

impl Item {
    /// A valid item carrying `value`.
    pub fn valid<T: Any + Send + Sync>(type_tag: impl Into<String>, value: T) -> Self {
        Self {
            type_tag: type_tag.into(),
            name: None,
            state: ItemState::Valid,
            error: None,
            payload: Some(Arc::new(value)),
        }
    }

    /// A payload-less placeholder.
    pub fn invalid(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            name: None,
            state: ItemState::Invalid,
            error: None,
            payload: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_error(mut self, error: StageFailure) -> Self {
        self.error = Some(error);
        self
    }

    /// Copy of this item with another state. The payload is shared, not copied.
    pub fn with_state(&self, state: ItemState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn is_valid(&self) -> bool {
        self.state == ItemState::Valid
    }

    pub fn error(&self) -> Option<&StageFailure> {
        self.error.as_ref()
    }

    /// Typed view of the payload, if present and of type `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn into_ref(self) -> ItemRef {
        Arc::new(self)
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("type_tag", &self.type_tag)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("error", &self.error)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}
