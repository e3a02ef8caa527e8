//! Graph Errors
//!
//! Every error is raised synchronously by the call that caused it, before any
//! graph mutation happens. A caller that catches one can keep using the graph.

use crate::graph::NodeId;

/// Errors raised by atom construction, writes and termination.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The atom was created by a different graph (or is otherwise unknown).
    #[error("{op} expected an atom of this graph, received {id}")]
    ForeignAtom { op: &'static str, id: NodeId },

    /// A derived atom cannot be built on top of an ended one.
    #[error("{op} cannot derive from ended atom {id}")]
    EndedSource { op: &'static str, id: NodeId },

    #[error("{op} expected at least one source atom")]
    EmptySources { op: &'static str },

    #[error("cannot manually set readonly atom {id}")]
    ReadonlyWrite { id: NodeId },

    #[error("cannot manually set ended atom {id}")]
    EndedWrite { id: NodeId },

    #[error("cannot manually set HALT")]
    HaltWrite,

    /// A mutation was attempted while another one (usually a propagation
    /// wave) was still running, e.g. a write from inside a compute function.
    #[error("{op} attempted while a propagation wave is in progress")]
    Reentrant { op: &'static str },
}

impl GraphError {
    /// True for errors caused by handing a combinator a bad atom or atom list.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::ForeignAtom { .. } | Self::EndedSource { .. } | Self::EmptySources { .. }
        )
    }

    /// True for errors caused by writing to something that cannot be written.
    pub fn is_illegal_write(&self) -> bool {
        matches!(
            self,
            Self::ReadonlyWrite { .. } | Self::EndedWrite { .. } | Self::HaltWrite
        )
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
