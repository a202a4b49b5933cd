//! Executable memory.
//!
//! A frozen code buffer becomes an `ExecMemory`: an anonymous mapping that
//! is filled while writable and then flipped to read-execute in a single
//! protection change, so the region is never writable and executable at
//! the same time. Dropping the region unmaps it.

use memmap2::{Mmap, MmapOptions};
use std::io;

/// Entry point of compiled code.
///
/// The emitted prologue follows the Windows x64 convention: the heap
/// buffer pointer arrives in Rcx and the encoded result is returned in
/// Rax. `extern "win64"` selects that convention on every x86-64 host.
#[cfg(target_arch = "x86_64")]
pub type Entry = unsafe extern "win64" fn(*mut u64) -> i64;

/// An immutable, executable code region.
pub struct ExecMemory {
    map: Mmap,
}

impl ExecMemory {
    /// Map a fresh region, copy `bytes` in, and make it executable.
    pub fn new(bytes: &[u8]) -> io::Result<ExecMemory> {
        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot create an executable region from empty code",
            ));
        }
        let mut map = MmapOptions::new().len(bytes.len()).map_anon()?;
        map.copy_from_slice(bytes);
        let map = map.make_exec()?;
        Ok(ExecMemory { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Reinterpret the region's base as the compiled entry point.
    #[cfg(target_arch = "x86_64")]
    pub fn entry(&self) -> Entry {
        unsafe { std::mem::transmute::<*const u8, Entry>(self.map.as_ptr()) }
    }

    /// Invoke the compiled code with `heap` as its allocation buffer.
    ///
    /// # Safety
    ///
    /// The region must hold a complete compiled function produced by
    /// `compile_function`, and `heap` must be large enough for every
    /// allocation the code performs; the code writes pairs into it without
    /// bounds checks.
    #[cfg(target_arch = "x86_64")]
    pub unsafe fn run(&self, heap: &mut [u64]) -> i64 {
        (self.entry())(heap.as_mut_ptr())
    }
}
