use std::fmt;

use super::BranchId;

/// Rejected graph operation. The graph is left unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    UnknownBranch(BranchId),
    UnknownName(String),
    /// The root branch cannot be deleted.
    RootDeletion,
    DuplicateName(String),
    EmptyName,
    /// The operation would leave two parentless branches.
    SecondRoot,
    /// A child edge must start at its parent's end node.
    EdgeMismatch {
        expected: usize,
        got: usize,
    },
    IndexOutOfRange {
        index: usize,
        len: usize,
    },
    /// Centerline, contour and radius arrays differ in length.
    LengthMismatch {
        centerline: usize,
        contours: usize,
        radii: usize,
    },
    NotALeaf(String),
    InvalidExport(String),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBranch(id) => write!(f, "no branch with id {}", id),
            Self::UnknownName(name) => write!(f, "no branch named {:?}", name),
            Self::RootDeletion => write!(f, "the root branch cannot be deleted"),
            Self::DuplicateName(name) => write!(f, "branch name {:?} is already used", name),
            Self::EmptyName => write!(f, "branch name must not be empty"),
            Self::SecondRoot => write!(f, "the graph already has a root branch"),
            Self::EdgeMismatch { expected, got } => write!(
                f,
                "edge must start at node {} (parent end), got {}",
                expected, got
            ),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {} out of range (len {})", index, len)
            }
            Self::LengthMismatch {
                centerline,
                contours,
                radii,
            } => write!(
                f,
                "branch arrays differ in length: {} points, {} contours, {} radii",
                centerline, contours, radii
            ),
            Self::NotALeaf(name) => write!(f, "branch {:?} has children", name),
            Self::InvalidExport(msg) => write!(f, "invalid graph export: {}", msg),
        }
    }
}

impl std::error::Error for GraphError {}
