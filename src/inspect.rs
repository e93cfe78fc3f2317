// SPDX-License-Identifier: PMPL-1.0-or-later
//! Inspection bridge
//!
//! On user request, resolves a violation node's primary selector against
//! the inspected document and asks the host to select the element for
//! further inspection.
//!
//! The selector is engine-supplied text and is treated strictly as a
//! data value: it is JSON-quoted before being embedded into the
//! evaluation expression, never concatenated raw. Multi-entry selector
//! paths address shadow/iframe contexts; only the first, top-level entry
//! is resolved (documented limitation).

use crate::violation::ViolationNode;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Host capability to select a document element.
///
/// `select` evaluates the given expression against the inspected
/// document and reports whether an element was selected (`Ok(false)`
/// when the selector matched nothing).
#[async_trait]
pub trait ElementHost: Send + Sync {
    async fn select(&self, expression: &str) -> Result<bool>;
}

/// Build the host evaluation expression for a selector, with the
/// selector JSON-quoted so it can never escape into executable syntax.
pub fn selection_expression(selector: &str) -> Result<String> {
    let quoted = serde_json::to_string(selector)?;
    Ok(format!("inspect(document.querySelector({}))", quoted))
}

/// Dispatches element-inspection requests to the host
#[derive(Clone)]
pub struct InspectionBridge {
    host: Arc<dyn ElementHost>,
}

impl InspectionBridge {
    pub fn new(host: Arc<dyn ElementHost>) -> Self {
        Self { host }
    }

    /// Ask the host to select the node's primary-selector match.
    ///
    /// Tolerant by design: a node without a selector, a selector that
    /// matches nothing, or a host evaluation error are all silent no-ops
    /// (logged, never surfaced as a fault).
    pub async fn inspect(&self, node: &ViolationNode) -> Result<()> {
        let Some(primary) = node.primary_selector() else {
            debug!("node has no selector, nothing to inspect");
            return Ok(());
        };
        let expression = selection_expression(primary)?;

        match self.host.select(&expression).await {
            Ok(true) => debug!(selector = primary, "element selected"),
            Ok(false) => debug!(selector = primary, "selector matched no element"),
            Err(err) => warn!(selector = primary, %err, "host failed to select element"),
        }
        Ok(())
    }
}
