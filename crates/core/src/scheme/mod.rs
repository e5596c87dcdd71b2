//! Abstract data type schemes.
//!
//! A [`Scheme`] names one kind of concurrent object and maps each of its
//! method names to a semantic [`Role`]. Checkers never look at method names
//! directly; they ask the scheme which role an operation plays and where its
//! value lives. Schemes are looked up once, at configuration time, from an
//! explicit [`SchemeRegistry`].

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::error::Error;
use crate::history::types::{Operation, Value};

pub mod model;

/// Axiomatization family of an object.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// First-in first-out collection.
    Queue,
    /// Last-in first-out collection.
    Stack,
    /// Unordered collection; removes may return any present element.
    Bag,
    /// Mutual-exclusion lock, acquired and released per owner.
    Lock,
    /// Atomic read/write register starting at [`Value::Empty`].
    Register,
    /// Counting semaphore: at most `permits` owners hold it at once.
    Semaphore { permits: usize },
    /// Set of values; every method reports success or membership as a
    /// [`Value::Bool`].
    Set,
}

impl Kind {
    /// Whether a value can be claimed by at most one remove.
    #[must_use]
    pub const fn is_injective(self) -> bool {
        !matches!(self, Self::Register)
    }

    /// Whether the kind is a collection with add/remove elements.
    #[must_use]
    pub const fn is_collection(self) -> bool {
        matches!(self, Self::Queue | Self::Stack | Self::Bag)
    }

    /// Whether removes are paired with adds by value. Set operations carry
    /// their value as an argument and can fail, so nothing pairs them.
    #[must_use]
    pub const fn is_matched(self) -> bool {
        !matches!(self, Self::Set)
    }
}

/// Semantic role of a method within its scheme.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Inserts a value (push, enqueue, lock, acquire, set add).
    Add,
    /// Consumes a value previously inserted (pop, dequeue, unlock, release,
    /// set remove).
    Remove,
    /// Overwrites the current value (register write).
    Write,
    /// Observes the current value without consuming it (register read, set
    /// contains).
    Read,
}

impl Role {
    /// Whether operations of this role produce matches on the add side.
    #[must_use]
    pub const fn is_producer(self) -> bool {
        matches!(self, Self::Add | Self::Write)
    }

    /// Whether operations of this role claim a producer's value.
    #[must_use]
    pub const fn is_consumer(self) -> bool {
        matches!(self, Self::Remove | Self::Read)
    }
}

/// Where the value relevant for matching is found.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSource {
    /// The n-th argument, known as soon as the call starts.
    Arg(usize),
    /// The n-th return value, known once the call completes.
    Ret(usize),
}

/// Role and value location of one method.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSchema {
    pub role: Role,
    pub value: ValueSource,
}

impl MethodSchema {
    #[must_use]
    pub const fn new(role: Role, value: ValueSource) -> Self {
        Self { role, value }
    }

    /// Extracts the matching value of `op`, if already known.
    ///
    /// A missing argument or return is read as [`Value::Empty`].
    #[must_use]
    pub fn value_of(&self, op: &Operation) -> Option<Value> {
        match self.value {
            ValueSource::Arg(i) => Some(op.args.get(i).cloned().unwrap_or(Value::Empty)),
            ValueSource::Ret(i) => op
                .rets
                .as_ref()
                .map(|rets| rets.get(i).cloned().unwrap_or(Value::Empty)),
        }
    }
}

/// One kind of concurrent object: its axiomatization and method roles.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    pub name: String,
    pub kind: Kind,
    pub methods: HashMap<String, MethodSchema>,
}

impl Scheme {
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
            methods: HashMap::new(),
        }
    }

    /// Declares a method, builder style.
    #[must_use]
    pub fn with_method(mut self, method: &str, role: Role, value: ValueSource) -> Self {
        self.methods
            .insert(method.to_string(), MethodSchema::new(role, value));
        self
    }

    #[must_use]
    pub fn method(&self, method: &str) -> Option<&MethodSchema> {
        self.methods.get(method)
    }

    /// Like [`method`](Self::method), but an undeclared method is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMethod`] if the scheme does not declare `method`.
    pub fn resolve(&self, method: &str) -> Result<&MethodSchema, Error> {
        self.method(method).ok_or_else(|| Error::UnknownMethod {
            object: self.name.clone(),
            method: method.to_string(),
        })
    }

    /// Role of an operation, if its method is declared.
    #[must_use]
    pub fn role_of(&self, op: &Operation) -> Option<Role> {
        self.method(&op.method).map(|m| m.role)
    }

    /// Matching value of an operation, if declared and already known.
    #[must_use]
    pub fn value_of(&self, op: &Operation) -> Option<Value> {
        self.method(&op.method).and_then(|m| m.value_of(op))
    }

    /// Whether `op` is a consumer that observed nothing.
    #[must_use]
    pub fn is_empty_witness(&self, op: &Operation) -> bool {
        self.method(&op.method).is_some_and(|m| {
            m.role.is_consumer() && m.value_of(op).is_some_and(|v| v.is_empty())
        })
    }

    /// First declared method with the given role, in name order.
    #[must_use]
    pub fn method_with_role(&self, role: Role) -> Option<&str> {
        let mut names: Vec<&String> = self
            .methods
            .iter()
            .filter(|(_, m)| m.role == role)
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names.first().map(|name| name.as_str())
    }

    /// Queue with `enqueue(v)`/`offer(v)` and `dequeue() => v`/`poll() => v`.
    #[must_use]
    pub fn queue() -> Self {
        Self::new("queue", Kind::Queue)
            .with_method("enqueue", Role::Add, ValueSource::Arg(0))
            .with_method("offer", Role::Add, ValueSource::Arg(0))
            .with_method("dequeue", Role::Remove, ValueSource::Ret(0))
            .with_method("poll", Role::Remove, ValueSource::Ret(0))
    }

    /// Stack with `push(v)` and `pop() => v`.
    #[must_use]
    pub fn stack() -> Self {
        Self::new("stack", Kind::Stack)
            .with_method("push", Role::Add, ValueSource::Arg(0))
            .with_method("pop", Role::Remove, ValueSource::Ret(0))
    }

    /// Bag with `add(v)` and `remove() => v`.
    #[must_use]
    pub fn bag() -> Self {
        Self::new("bag", Kind::Bag)
            .with_method("add", Role::Add, ValueSource::Arg(0))
            .with_method("remove", Role::Remove, ValueSource::Ret(0))
    }

    /// Lock with `lock(owner)` and `unlock(owner)`.
    #[must_use]
    pub fn lock() -> Self {
        Self::new("lock", Kind::Lock)
            .with_method("lock", Role::Add, ValueSource::Arg(0))
            .with_method("unlock", Role::Remove, ValueSource::Arg(0))
    }

    /// Register with `write(v)` and `read() => v`.
    #[must_use]
    pub fn register() -> Self {
        Self::new("register", Kind::Register)
            .with_method("write", Role::Write, ValueSource::Arg(0))
            .with_method("read", Role::Read, ValueSource::Ret(0))
    }

    /// Semaphore with `acquire(owner)` and `release(owner)`, held by at most
    /// `permits` owners at a time.
    #[must_use]
    pub fn semaphore(permits: usize) -> Self {
        Self::new("semaphore", Kind::Semaphore { permits })
            .with_method("acquire", Role::Add, ValueSource::Arg(0))
            .with_method("release", Role::Remove, ValueSource::Arg(0))
    }

    /// Set with `add(v) => bool`, `remove(v) => bool` and
    /// `contains(v) => bool`.
    #[must_use]
    pub fn set() -> Self {
        Self::new("set", Kind::Set)
            .with_method("add", Role::Add, ValueSource::Arg(0))
            .with_method("remove", Role::Remove, ValueSource::Arg(0))
            .with_method("contains", Role::Read, ValueSource::Arg(0))
    }
}

/// Permits of the semaphore in [`SchemeRegistry::standard`].
pub const DEFAULT_PERMITS: usize = 2;

/// Named collection of schemes, built once at startup and passed around by
/// reference.
#[derive(Debug, Clone, Default)]
pub struct SchemeRegistry {
    schemes: HashMap<String, Scheme>,
}

impl SchemeRegistry {
    /// Registry with the queue, stack, bag, lock, register, semaphore and
    /// set schemes.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::default();
        for scheme in [
            Scheme::queue(),
            Scheme::stack(),
            Scheme::bag(),
            Scheme::lock(),
            Scheme::register(),
            Scheme::semaphore(DEFAULT_PERMITS),
            Scheme::set(),
        ] {
            registry.register(scheme);
        }
        registry
    }

    /// Adds or replaces a scheme under its own name.
    pub fn register(&mut self, scheme: Scheme) {
        self.schemes.insert(scheme.name.clone(), scheme);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Scheme> {
        self.schemes.get(name)
    }

    /// # Errors
    ///
    /// Returns [`Error::UnknownObject`] if no scheme is registered as `name`.
    pub fn resolve(&self, name: &str) -> Result<&Scheme, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnknownObject(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemes.keys().map(String::as_str)
    }
}
