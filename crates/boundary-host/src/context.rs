//! Guest memory access for host imports.
//!
//! [`HostContext`] wraps the Wasmtime caller handed to a host import and
//! reads from the calling guest's exported `memory`.

use wasmtime::Caller;

use crate::error::{HostError, HostResult};

/// Context available to host import implementations.
pub struct HostContext<'a, T> {
    caller: Caller<'a, T>,
}

impl<'a, T> HostContext<'a, T> {
    /// Create a new host context.
    pub fn new(caller: Caller<'a, T>) -> Self {
        Self { caller }
    }

    /// Access the store data.
    pub fn data(&self) -> &T {
        self.caller.data()
    }

    /// Access the store data mutably.
    pub fn data_mut(&mut self) -> &mut T {
        self.caller.data_mut()
    }

    /// Resolve the guest's `memory` export.
    pub fn memory(&mut self) -> HostResult<wasmtime::Memory> {
        self.caller
            .get_export("memory")
            .and_then(|e| e.into_memory())
            .ok_or(HostError::MemoryNotFound)
    }

    /// Copy `len` bytes at `offset` out of guest memory.
    pub fn read_memory(&mut self, offset: usize, len: usize) -> HostResult<Vec<u8>> {
        let memory = self.memory()?;
        let data = memory.data(&self.caller);

        let end = offset
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or(HostError::MemoryAccessOutOfBounds {
                offset,
                len,
                memory_size: data.len(),
            })?;

        Ok(data[offset..end].to_vec())
    }

    /// Read a UTF-8 string given as a guest `(ptr, len)` pair.
    ///
    /// Both values are reinterpreted as unsigned 32-bit, as in the wasm32
    /// address space.
    pub fn read_str(&mut self, ptr: i32, len: i32) -> HostResult<String> {
        let (offset, len) = guest_span(ptr, len);
        let bytes = self.read_memory(offset, len)?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl<T> std::fmt::Debug for HostContext<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext").finish_non_exhaustive()
    }
}

/// Extension trait for creating host contexts from callers.
pub trait IntoHostContext<'a, T> {
    /// Convert into a host context.
    fn into_context(self) -> HostContext<'a, T>;
}

impl<'a, T> IntoHostContext<'a, T> for Caller<'a, T> {
    fn into_context(self) -> HostContext<'a, T> {
        HostContext::new(self)
    }
}

fn guest_span(ptr: i32, len: i32) -> (usize, usize) {
    (ptr as u32 as usize, len as u32 as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_span_is_unsigned() {
        assert_eq!(guest_span(16, 4), (16, 4));
        assert_eq!(guest_span(-1, 0), (u32::MAX as usize, 0));
    }
}
