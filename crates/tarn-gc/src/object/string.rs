//! String and symbol payload

/// Immutable byte string. Symbols and strings with the same content share one
/// block; the value tag decides which one a reference is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapString {
    bytes: Box<[u8]>,
}

impl HeapString {
    /// Copy `bytes` into a new string
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Raw content
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Content as UTF-8, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the string is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<&str> for HeapString {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}
