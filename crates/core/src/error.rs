use alloc::string::String;
use core::fmt::{Display, Formatter, Result};

use crate::history::types::{OpId, Value};

/// Fatal errors raised while feeding events to the monitor.
///
/// These indicate a malformed event stream or an object whose recorded data
/// is inconsistent with its scheme. A linearizability violation is never an
/// error; it is reported through the checker's verdict.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No operation with this id exists in the history.
    UnknownOperation(OpId),
    /// The operation already returned.
    AlreadyCompleted(OpId),
    /// A call reused a driver id that is still in flight.
    DuplicateCall(u64),
    /// A return refers to a driver id with no call in flight.
    UnknownCall(u64),
    /// The object scheme does not declare this method.
    UnknownMethod { object: String, method: String },
    /// The registry has no scheme with this name.
    UnknownObject(String),
    /// A remove returned a value that no add ever inserted.
    UnmatchedRemove { id: OpId, value: Value },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            Self::UnknownOperation(id) => write!(f, "unknown operation {id}"),
            Self::AlreadyCompleted(id) => write!(f, "operation {id} already completed"),
            Self::DuplicateCall(id) => write!(f, "call id {id} is already in flight"),
            Self::UnknownCall(id) => write!(f, "no call in flight with id {id}"),
            Self::UnknownMethod { object, method } => {
                write!(f, "object {object} has no method {method}")
            }
            Self::UnknownObject(object) => write!(f, "unknown object {object}"),
            Self::UnmatchedRemove { id, value } => {
                write!(f, "operation {id} removed {value}, which was never added")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
