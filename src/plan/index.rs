//! Node identifier to handle mapping used while compiling a plan.

use super::operation::NodeHandle;
use crate::topology::{NodeRole, ValidationError};
use std::collections::HashMap;

/// Reference index, filled category by category as node creation is emitted
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    handles: HashMap<String, NodeHandle>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node and return its handle
    pub fn register(&mut self, name: &str, role: NodeRole) -> Result<NodeHandle, ValidationError> {
        if let Some(existing) = self.handles.get(name) {
            return Err(ValidationError::DuplicateNode {
                id: name.to_string(),
                first: existing.role,
                second: role,
            });
        }
        let handle = NodeHandle {
            name: name.to_string(),
            role,
            ordinal: self.handles.len(),
        };
        self.handles.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn lookup(&self, name: &str) -> Result<&NodeHandle, ValidationError> {
        self.handles
            .get(name)
            .ok_or_else(|| ValidationError::UnregisteredNode { id: name.to_string() })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
