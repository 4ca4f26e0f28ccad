//! Host document errors.

use thiserror::Error;

use barebone_protocols::ElementId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("Node not found: {0}")]
    NodeNotFound(ElementId),

    #[error("Node {0} is not an element")]
    NotAnElement(ElementId),

    #[error("Node {child} is not a child of {parent}")]
    NotAChild { parent: ElementId, child: ElementId },

    #[error("Inserting {child} under {parent} would create a cycle")]
    HierarchyRequest { parent: ElementId, child: ElementId },
}
