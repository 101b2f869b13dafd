//! Native memory ledger
//!
//! All native-visible allocations made on behalf of the boundary (object
//! stubs, encoded strings) go through this module so they can be freed with
//! their original layout and audited in tests. Freeing a pointer the ledger
//! does not know is a native-glue bug and is fatal.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::os::raw::c_char;

use crate::exc::{self, PyException, PyResult};
use crate::logging::trace;

/// Alignment for every boundary allocation, wide enough for any struct the
/// field registry describes.
const BOUNDARY_ALIGN: usize = 16;

static LEDGER: Lazy<DashMap<usize, usize>> = Lazy::new(DashMap::new);

/// Allocate `size` zeroed bytes of native memory and record it.
pub fn allocate(size: usize) -> PyResult<usize> {
    let size = size.max(1);
    let layout = Layout::from_size_align(size, BOUNDARY_ALIGN)
        .map_err(|_| PyException::memory("invalid allocation size"))?;

    // Safety: layout is non-zero and validly aligned.
    let ptr = unsafe { alloc_zeroed(layout) };
    if ptr.is_null() {
        return Err(PyException::memory(format!(
            "native allocation of {size} bytes failed"
        )));
    }

    let addr = ptr as usize;
    LEDGER.insert(addr, size);
    trace!(event = "native_alloc", addr, size, "Allocated boundary memory");
    Ok(addr)
}

/// Free a boundary allocation.
pub fn free(addr: usize) {
    let Some((_, size)) = LEDGER.remove(&addr) else {
        exc::fatal("free of pointer not owned by the boundary ledger");
    };
    let layout = Layout::from_size_align(size.max(1), BOUNDARY_ALIGN)
        .unwrap_or_else(|_| exc::fatal("corrupt ledger entry"));
    // Safety: addr came from allocate() with this exact layout.
    unsafe { dealloc(addr as *mut u8, layout) };
    trace!(event = "native_free", addr, size, "Freed boundary memory");
}

/// Recorded size of a live allocation.
pub fn allocation_size(addr: usize) -> Option<usize> {
    LEDGER.get(&addr).map(|e| *e.value())
}

/// Number of live boundary allocations (leak checks).
pub fn live_allocations() -> usize {
    LEDGER.len()
}

/// Copy raw bytes into a live allocation.
pub fn write_bytes(addr: usize, offset: usize, bytes: &[u8]) {
    let size = allocation_size(addr)
        .unwrap_or_else(|| exc::fatal("write into pointer not owned by the ledger"));
    if offset + bytes.len() > size {
        exc::fatal("write past end of boundary allocation");
    }
    // Safety: bounds checked against the recorded size.
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), (addr + offset) as *mut u8, bytes.len());
    }
}

/// Allocate a NUL-terminated C string from UTF-8 text.
pub fn alloc_cstring(text: &str) -> PyResult<usize> {
    if text.as_bytes().contains(&0) {
        return Err(PyException::value_error("embedded null byte in string"));
    }
    let addr = allocate(text.len() + 1)?;
    write_bytes(addr, 0, text.as_bytes());
    Ok(addr)
}

/// Read a NUL-terminated C string as UTF-8.
///
/// # Safety
/// `addr` must point at a valid NUL-terminated buffer.
pub unsafe fn read_cstring(addr: usize) -> PyResult<String> {
    let cstr = std::ffi::CStr::from_ptr(addr as *const c_char);
    cstr.to_str()
        .map(str::to_owned)
        .map_err(|e| PyException::decode_error(format!("invalid UTF-8 at byte {}", e.valid_up_to())))
}

/// Factory seam for native closure trampolines.
///
/// A native-code embedding supplies real executable thunks here; the
/// pure-managed embedding has none and every lookup misses.
pub trait ClosureFactory: Send + Sync {
    /// Native entry address for a table function, if one can be made.
    fn thunk_for(&self, id: u32) -> Option<usize>;
}

/// No-op factory used by the pure-managed embedding mode.
pub struct NoClosures;

impl ClosureFactory for NoClosures {
    fn thunk_for(&self, _id: u32) -> Option<usize> {
        None
    }
}
