//! Host-defined userdata payload

use std::fmt;
use std::rc::Rc;

/// Finalizer invoked on a userdata payload right before its block is released
pub type Finalizer = Box<dyn Fn(&mut [u8])>;

/// Type descriptor shared by every userdata of one host type
pub struct UserdataType {
    name: String,
    finalize: Option<Finalizer>,
}

impl UserdataType {
    /// Descriptor without a finalizer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            finalize: None,
        }
    }

    /// Descriptor whose payloads are passed to `finalize` when reclaimed
    pub fn with_finalizer(name: impl Into<String>, finalize: impl Fn(&mut [u8]) + 'static) -> Self {
        Self {
            name: name.into(),
            finalize: Some(Box::new(finalize)),
        }
    }

    /// Host type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if payloads of this type need finalization
    pub fn has_finalizer(&self) -> bool {
        self.finalize.is_some()
    }
}

impl fmt::Debug for UserdataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserdataType")
            .field("name", &self.name)
            .field("finalize", &self.finalize.is_some())
            .finish()
    }
}

/// Opaque host payload
#[derive(Debug)]
pub struct Userdata {
    ty: Rc<UserdataType>,
    data: Box<[u8]>,
}

impl Userdata {
    /// Zeroed payload of `size` bytes
    pub fn new(ty: Rc<UserdataType>, size: usize) -> Self {
        Self {
            ty,
            data: vec![0; size].into_boxed_slice(),
        }
    }

    /// Payload initialized from `bytes`
    pub fn from_bytes(ty: Rc<UserdataType>, bytes: &[u8]) -> Self {
        Self {
            ty,
            data: bytes.into(),
        }
    }

    /// Type descriptor
    pub fn ty(&self) -> &Rc<UserdataType> {
        &self.ty
    }

    /// Payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable payload bytes
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Run the type's finalizer, if it has one
    pub(crate) fn finalize(&mut self) {
        if let Some(finalize) = &self.ty.finalize {
            finalize(&mut self.data);
        }
    }
}
