//! Executable memory for generated code.
//!
//! A block is mapped writable, filled, and then switched to read+execute
//! before anyone can call into it. The region is never writable and
//! executable at the same time.

use std::io;
use std::ptr::{self, NonNull};

use crate::core::error::{JitError, JitResult};

/// Native signature of every generated expression function.
pub type EntryFn = unsafe extern "C" fn(f64, f64) -> f64;

/// Page-aligned read+execute mapping holding one generated function.
#[derive(Debug)]
pub struct ExecutableBlock {
    ptr: NonNull<u8>,
    /// Mapped length, a multiple of the page size.
    mapped_len: usize,
    /// Length of the code copied into the mapping.
    code_len: usize,
}

// The mapping is immutable after construction and owned exclusively.
unsafe impl Send for ExecutableBlock {}
unsafe impl Sync for ExecutableBlock {}

fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

impl ExecutableBlock {
    /// Copy `code` into a fresh read+execute mapping.
    pub fn new(code: &[u8]) -> JitResult<Self> {
        if code.is_empty() {
            return Err(JitError::Allocation {
                op: "mmap",
                source: io::Error::new(io::ErrorKind::InvalidInput, "no code to map"),
            });
        }
        let page = page_size();
        let mapped_len = code.len().div_ceil(page) * page;

        // SAFETY: anonymous private mapping; the arguments describe no existing memory.
        let raw = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapped_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(JitError::Allocation {
                op: "mmap",
                source: io::Error::last_os_error(),
            });
        }
        let ptr = NonNull::new(raw.cast::<u8>()).ok_or_else(|| JitError::Allocation {
            op: "mmap",
            source: io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping"),
        })?;
        let block = Self {
            ptr,
            mapped_len,
            code_len: code.len(),
        };

        // SAFETY: the mapping is writable and at least code.len() bytes long.
        unsafe { ptr::copy_nonoverlapping(code.as_ptr(), block.ptr.as_ptr(), code.len()) };

        // SAFETY: ptr/mapped_len describe exactly the mapping created above.
        let rc = unsafe {
            libc::mprotect(
                block.ptr.as_ptr().cast(),
                block.mapped_len,
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };
        if rc != 0 {
            // dropping the block unmaps it
            return Err(JitError::Allocation {
                op: "mprotect",
                source: io::Error::last_os_error(),
            });
        }

        log::debug!(
            "mapped {} bytes of code at {:p} ({} bytes reserved)",
            block.code_len,
            block.ptr,
            block.mapped_len
        );
        Ok(block)
    }

    /// Call the mapped code as `extern "C" fn(f64, f64) -> f64`.
    ///
    /// # Safety
    ///
    /// The block must hold a complete function with exactly that signature
    /// under the System V calling convention.
    pub unsafe fn invoke(&self, x: f64, y: f64) -> f64 {
        let entry: EntryFn = std::mem::transmute::<*mut u8, EntryFn>(self.ptr.as_ptr());
        entry(x, y)
    }
}

impl Drop for ExecutableBlock {
    fn drop(&mut self) {
        // SAFETY: ptr/mapped_len describe a mapping owned by this block.
        let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.mapped_len) };
        if rc != 0 {
            log::warn!(
                "munmap of code at {:p} failed: {}",
                self.ptr,
                io::Error::last_os_error()
            );
        }
    }
}
