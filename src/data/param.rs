// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::ParamError;

/// Opaque per-stage configuration value.
///
/// The engine only stores and hands out parameters; each stage owns its own
/// schema and decodes with [`Parameter::decode`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameter(serde_json::Value);

impl Parameter {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn null() -> Self {
        Self(serde_json::Value::Null)
    }

    pub fn encode<T: Serialize>(value: &T) -> Result<Self, ParamError> {
        Ok(Self(serde_json::to_value(value)?))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ParamError> {
        Ok(serde_json::from_value(self.0.clone())?)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Parameter {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
