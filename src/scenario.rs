//! Scenario files for `barebone replay`.
//!
//! A scenario describes an initial document and a list of steps:
//!
//! ```json
//! {
//!   "viewport": { "width": 1280, "height": 720 },
//!   "elements": [
//!     { "key": "a", "product_id": "p1", "rect": { "x": 0, "y": 0, "width": 300, "height": 200 } }
//!   ],
//!   "steps": [
//!     { "action": "click", "key": "a" },
//!     { "action": "scroll", "x": 0, "y": 900 }
//!   ]
//! }
//! ```
//!
//! Pending notifications are flushed after every step.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use barebone_core::Tracker;
use barebone_host::{HeadlessDocument, HostError, Rect};
use barebone_protocols::ElementId;

#[derive(Debug, Error)]
pub(crate) enum ScenarioError {
    #[error("Failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown element key: {0}")]
    UnknownKey(String),

    #[error("Duplicate element key: {0}")]
    DuplicateKey(String),

    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ElementSpec {
    /// Name used by later steps to refer to this element.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Value of the marker attribute. Unmarked when absent.
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

fn default_tag() -> String {
    "div".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum Step {
    /// Build an element subtree and append it under `parent` (the root when
    /// absent).
    Insert {
        #[serde(default)]
        parent: Option<String>,
        element: ElementSpec,
    },
    Remove {
        key: String,
    },
    Scroll {
        x: f64,
        y: f64,
    },
    Resize {
        width: f64,
        height: f64,
    },
    Click {
        key: String,
    },
    Flush,
    Teardown,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Scenario {
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Drives a headless document through a scenario.
pub(crate) struct ScenarioRunner {
    doc: Arc<HeadlessDocument>,
    marker_attribute: String,
    keys: HashMap<String, ElementId>,
}

impl ScenarioRunner {
    /// Build the initial document. Nothing is flushed yet.
    pub fn build(scenario: &Scenario, marker_attribute: &str) -> Result<Self, ScenarioError> {
        let doc = Arc::new(HeadlessDocument::new(
            scenario.viewport.width,
            scenario.viewport.height,
        ));
        let mut runner = Self {
            doc,
            marker_attribute: marker_attribute.to_string(),
            keys: HashMap::new(),
        };

        let root = runner.doc.root();
        for spec in &scenario.elements {
            let element = runner.build_element(spec)?;
            runner.doc.append_child(root, element)?;
        }
        Ok(runner)
    }

    pub fn document(&self) -> &Arc<HeadlessDocument> {
        &self.doc
    }

    pub fn element(&self, key: &str) -> Result<ElementId, ScenarioError> {
        self.keys
            .get(key)
            .copied()
            .ok_or_else(|| ScenarioError::UnknownKey(key.to_string()))
    }

    /// Apply one step, then flush pending notifications.
    pub fn apply(&mut self, step: &Step, tracker: &Tracker) -> Result<(), ScenarioError> {
        debug!("Applying step {:?}", step);
        match step {
            Step::Insert { parent, element } => {
                let parent = match parent {
                    Some(key) => self.element(key)?,
                    None => self.doc.root(),
                };
                let element = self.build_element(element)?;
                self.doc.append_child(parent, element)?;
            }
            Step::Remove { key } => {
                let element = self.element(key)?;
                self.doc.remove(element)?;
            }
            Step::Scroll { x, y } => self.doc.scroll_to(*x, *y),
            Step::Resize { width, height } => self.doc.resize_viewport(*width, *height),
            Step::Click { key } => {
                let element = self.element(key)?;
                self.doc.click(element)?;
            }
            Step::Flush => {}
            Step::Teardown => tracker.teardown(),
        }
        self.doc.flush();
        Ok(())
    }

    /// Create a detached element subtree from its spec.
    fn build_element(&mut self, spec: &ElementSpec) -> Result<ElementId, ScenarioError> {
        let element = self.doc.create_element(&spec.tag);
        if let Some(product_id) = &spec.product_id {
            self.doc
                .set_attribute(element, &self.marker_attribute, product_id)?;
        }
        self.doc.set_rect(element, spec.rect)?;

        if let Some(key) = &spec.key {
            if self.keys.insert(key.clone(), element).is_some() {
                return Err(ScenarioError::DuplicateKey(key.clone()));
            }
        }

        for child in &spec.children {
            let child = self.build_element(child)?;
            self.doc.append_child(element, child)?;
        }
        Ok(element)
    }
}
