use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{Debug, Display, Formatter, Result};

use derive_more::From;

/// Unique identifier of an operation within a [`History`](crate::history::History).
///
/// Identifiers are handed out by `History::start` in strictly increasing
/// order, so comparing two ids compares their call order.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From)]
pub struct OpId(pub u64);

impl Debug for OpId {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "#{}", self.0)
    }
}

impl Display for OpId {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "#{}", self.0)
    }
}

/// An argument or return value of a method call.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Int(i64),
    Bool(bool),
    /// Sentinel for "nothing": a remove that found the collection empty, or
    /// the initial value of a register.
    Empty,
}

impl Value {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> Result {
        Debug::fmt(self, f)
    }
}

/// A single method call recorded in a history.
///
/// `rets` is `None` while the call is pending.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    pub id: OpId,
    pub method: String,
    pub args: Vec<Value>,
    pub rets: Option<Vec<Value>>,
}

impl Operation {
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.rets.is_none()
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.rets.is_some()
    }
}

impl Debug for Operation {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{:?}:{}{:?}", self.id, self.method, self.args)?;
        match &self.rets {
            Some(rets) => write!(f, "=>{rets:?}"),
            None => write!(f, "=>?"),
        }
    }
}

/// An entry of the call/return stream produced by a test driver.
///
/// `id` is the driver's call identifier; it must be unique among calls that
/// are in flight and may be reused once the call has returned.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Call {
        id: u64,
        method: String,
        args: Vec<Value>,
    },
    Return {
        id: u64,
        rets: Vec<Value>,
    },
}

impl Event {
    pub fn call(id: u64, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Call {
            id,
            method: method.into(),
            args,
        }
    }

    #[must_use]
    pub const fn ret(id: u64, rets: Vec<Value>) -> Self {
        Self::Return { id, rets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_debug() {
        let mut op = Operation {
            id: OpId(3),
            method: "push".into(),
            args: vec![Value::Int(1)],
            rets: None,
        };
        assert_eq!(format!("{op:?}"), "#3:push[1]=>?");
        op.rets = Some(vec![]);
        assert_eq!(format!("{op:?}"), "#3:push[1]=>[]");
        op.rets = Some(vec![Value::Empty]);
        assert_eq!(format!("{op:?}"), "#3:push[1]=>[empty]");
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(4), Value::Int(4));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert!(Value::Empty.is_empty());
        assert!(!Value::Int(0).is_empty());
    }
}
