//! Closures, closure environments and function templates

use std::mem;

use crate::value::{GcRef, Value};

/// Entry in a function template's constant pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    /// Ordinary constant value
    Value(Value),
    /// Template of a nested function, instantiated by a closure opcode
    Template(GcRef),
}

/// Compiled function template, shared by every closure created from it
#[derive(Debug, Clone, Default)]
pub struct FuncDef {
    bytecode: Vec<u32>,
    constants: Vec<Constant>,
    /// Layout descriptors for captured environments; one per closure env slot
    environments: Vec<i32>,
}

impl FuncDef {
    /// Create a template from bytecode and constants
    pub fn new(bytecode: Vec<u32>, constants: Vec<Constant>) -> Self {
        Self {
            bytecode,
            constants,
            ..Self::default()
        }
    }

    /// Set the environment layout descriptors
    pub fn with_environments(mut self, environments: Vec<i32>) -> Self {
        self.environments = environments;
        self
    }

    /// Bytecode
    pub fn bytecode(&self) -> &[u32] {
        &self.bytecode
    }

    /// Constant pool
    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    /// Environment layout descriptors
    pub fn environments(&self) -> &[i32] {
        &self.environments
    }

    pub(crate) fn owned_bytes(&self) -> usize {
        self.bytecode.capacity() * mem::size_of::<u32>()
            + self.constants.capacity() * mem::size_of::<Constant>()
            + self.environments.capacity() * mem::size_of::<i32>()
    }
}

/// A closure: template plus captured environments
#[derive(Debug, Clone)]
pub struct Function {
    def: GcRef,
    envs: Box<[Option<GcRef>]>,
}

impl Function {
    /// Create a closure over `def` with the given environment slots
    pub fn new(def: GcRef, envs: Vec<Option<GcRef>>) -> Self {
        Self {
            def,
            envs: envs.into_boxed_slice(),
        }
    }

    /// Shared template (not owned by the closure)
    #[inline]
    pub fn def(&self) -> GcRef {
        self.def
    }

    /// Environment slots; empty slots have not been captured
    #[inline]
    pub fn envs(&self) -> &[Option<GcRef>] {
        &self.envs
    }

    /// Fill an environment slot. Returns false past the end.
    pub fn set_env(&mut self, index: usize, env: GcRef) -> bool {
        match self.envs.get_mut(index) {
            Some(slot) => {
                *slot = Some(env);
                true
            }
            None => false,
        }
    }
}

/// Where a closure environment's values live
#[derive(Debug, Clone)]
pub enum EnvStorage {
    /// Still backed by a live frame of `fiber`, starting at stack slot `offset`
    Open {
        /// Fiber whose stack holds the values
        fiber: GcRef,
        /// First stack slot of the captured values
        offset: usize,
    },
    /// Detached copy of the values after the frame returned
    Closed(Box<[Value]>),
}

/// Captured variables of a closure
#[derive(Debug, Clone)]
pub struct FuncEnv {
    storage: EnvStorage,
    length: usize,
}

impl FuncEnv {
    /// Environment over `length` live stack slots of `fiber`
    pub fn open(fiber: GcRef, offset: usize, length: usize) -> Self {
        Self {
            storage: EnvStorage::Open { fiber, offset },
            length,
        }
    }

    /// Environment owning its values
    pub fn closed(values: Vec<Value>) -> Self {
        Self {
            length: values.len(),
            storage: EnvStorage::Closed(values.into_boxed_slice()),
        }
    }

    /// Storage state
    #[inline]
    pub fn storage(&self) -> &EnvStorage {
        &self.storage
    }

    /// Check if the environment is still stack backed
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(self.storage, EnvStorage::Open { .. })
    }

    /// Number of captured values
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Check if nothing was captured
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Detached values, or `None` while open
    pub fn values(&self) -> Option<&[Value]> {
        match &self.storage {
            EnvStorage::Closed(values) => Some(values),
            EnvStorage::Open { .. } => None,
        }
    }

    pub(crate) fn detach(&mut self, values: Vec<Value>) {
        self.length = values.len();
        self.storage = EnvStorage::Closed(values.into_boxed_slice());
    }

    pub(crate) fn owned_bytes(&self) -> usize {
        match &self.storage {
            EnvStorage::Closed(values) => values.len() * mem::size_of::<Value>(),
            EnvStorage::Open { .. } => 0,
        }
    }
}
