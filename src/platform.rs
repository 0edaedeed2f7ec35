//! Platform-specific virtual memory interface.
//!
//! This module provides an abstraction over the operating system's virtual
//! memory APIs, split into `reserve` (address space, no backing pages) and
//! `commit` (make a prefix of a reservation read/write), because `Arena`
//! needs the two sized independently:
//! - **Linux**: `mmap` + `mprotect` via `rustix`
//! - **macOS**: `mach_vm_allocate` + `mach_vm_protect` via `mach2`
//! - **Windows**: `VirtualAlloc` with `MEM_RESERVE`/`MEM_COMMIT` via `windows-sys`
//! - **Other Unix**: `mmap` + `mprotect` via `libc`

use std::fmt;

/// Error type for system memory mapping failures.
#[derive(Debug, Clone, Copy)]
pub struct MapError;

impl std::error::Error for MapError {}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system virtual memory operation failed")
    }
}

/// Platform-specific virtual memory functions.
///
/// Every function operates on whole pages; callers round `size` up to the
/// page granularity before calling. Regions returned by `reserve` carry no
/// read/write access until `commit`ed; pages beyond the committed prefix
/// are never mapped writable, so an arena overflow running off the end of
/// `committed` reliably faults rather than silently corrupting memory.
pub mod sys {
    use super::MapError;
    use std::ptr::NonNull;

    /// Reserve `size` bytes of address space with no access.
    #[cfg(target_os = "linux")]
    #[inline]
    pub fn reserve(size: usize) -> Result<NonNull<u8>, MapError> {
        use rustix::mm::{mmap_anonymous, MapFlags, ProtFlags};
        use std::ptr;

        debug_assert!(size > 0);

        unsafe {
            match mmap_anonymous(
                ptr::null_mut(),
                size,
                ProtFlags::empty(),
                MapFlags::PRIVATE | MapFlags::NORESERVE,
            ) {
                Ok(ptr) => NonNull::new(ptr.cast()).ok_or(MapError),
                Err(_) => Err(MapError),
            }
        }
    }

    #[cfg(target_os = "linux")]
    #[inline]
    pub fn commit(ptr: NonNull<u8>, size: usize) -> Result<(), MapError> {
        use rustix::mm::{mprotect, MprotectFlags};

        unsafe {
            mprotect(
                ptr.as_ptr().cast(),
                size,
                MprotectFlags::READ | MprotectFlags::WRITE,
            )
            .map_err(|_| MapError)
        }
    }

    #[cfg(target_os = "linux")]
    #[inline]
    pub fn release(ptr: NonNull<u8>, size: usize) {
        use rustix::mm::munmap;

        unsafe {
            let _ = munmap(ptr.as_ptr().cast(), size);
        }
    }

    #[cfg(target_vendor = "apple")]
    #[inline]
    pub fn reserve(size: usize) -> Result<NonNull<u8>, MapError> {
        use mach2::kern_return::KERN_SUCCESS;
        use mach2::traps::mach_task_self;
        use mach2::vm::mach_vm_allocate;
        use mach2::vm_statistics::VM_FLAGS_ANYWHERE;
        use mach2::vm_types::{mach_vm_address_t, mach_vm_size_t};

        debug_assert!(size > 0);

        let task = unsafe { mach_task_self() };
        let mut address: mach_vm_address_t = 0;
        let vm_size: mach_vm_size_t = size as mach_vm_size_t;

        let retval = unsafe { mach_vm_allocate(task, &mut address, vm_size, VM_FLAGS_ANYWHERE) };

        if retval == KERN_SUCCESS {
            NonNull::new(address as *mut u8).ok_or(MapError)
        } else {
            Err(MapError)
        }
    }

    #[cfg(target_vendor = "apple")]
    #[inline]
    pub fn commit(ptr: NonNull<u8>, size: usize) -> Result<(), MapError> {
        use mach2::kern_return::KERN_SUCCESS;
        use mach2::traps::mach_task_self;
        use mach2::vm::mach_vm_protect;
        use mach2::vm_prot::{VM_PROT_READ, VM_PROT_WRITE};

        let task = unsafe { mach_task_self() };
        let retval = unsafe {
            mach_vm_protect(
                task,
                ptr.as_ptr() as u64,
                size as u64,
                0,
                VM_PROT_READ | VM_PROT_WRITE,
            )
        };

        if retval == KERN_SUCCESS {
            Ok(())
        } else {
            Err(MapError)
        }
    }

    #[cfg(target_vendor = "apple")]
    #[inline]
    pub fn release(ptr: NonNull<u8>, size: usize) {
        use mach2::traps::mach_task_self;
        use mach2::vm::mach_vm_deallocate;

        let task = unsafe { mach_task_self() };
        unsafe {
            let _ = mach_vm_deallocate(task, ptr.as_ptr() as u64, size as u64);
        }
    }

    #[cfg(windows)]
    #[inline]
    pub fn reserve(size: usize) -> Result<NonNull<u8>, MapError> {
        use windows_sys::Win32::System::Memory::{VirtualAlloc, MEM_RESERVE, PAGE_NOACCESS};

        let ptr = unsafe { VirtualAlloc(std::ptr::null(), size, MEM_RESERVE, PAGE_NOACCESS) };
        NonNull::new(ptr.cast()).ok_or(MapError)
    }

    #[cfg(windows)]
    #[inline]
    pub fn commit(ptr: NonNull<u8>, size: usize) -> Result<(), MapError> {
        use windows_sys::Win32::System::Memory::{VirtualAlloc, MEM_COMMIT, PAGE_READWRITE};

        let out = unsafe { VirtualAlloc(ptr.as_ptr().cast(), size, MEM_COMMIT, PAGE_READWRITE) };
        if out.is_null() {
            Err(MapError)
        } else {
            Ok(())
        }
    }

    #[cfg(windows)]
    #[inline]
    pub fn release(ptr: NonNull<u8>, _size: usize) {
        use windows_sys::Win32::System::Memory::{VirtualFree, MEM_RELEASE};

        unsafe {
            let _ = VirtualFree(ptr.as_ptr().cast(), 0, MEM_RELEASE);
        }
    }

    /// Fallback for other Unix-like systems.
    #[cfg(all(
        not(target_os = "linux"),
        not(target_vendor = "apple"),
        not(windows),
        unix
    ))]
    #[inline]
    pub fn reserve(size: usize) -> Result<NonNull<u8>, MapError> {
        use libc::{mmap, MAP_ANON, MAP_FAILED, MAP_PRIVATE, PROT_NONE};
        use std::ptr;

        debug_assert!(size > 0);

        let ptr = unsafe {
            mmap(
                ptr::null_mut(),
                size,
                PROT_NONE,
                MAP_PRIVATE | MAP_ANON,
                -1,
                0,
            )
        };

        if ptr == MAP_FAILED {
            Err(MapError)
        } else {
            NonNull::new(ptr.cast()).ok_or(MapError)
        }
    }

    #[cfg(all(
        not(target_os = "linux"),
        not(target_vendor = "apple"),
        not(windows),
        unix
    ))]
    #[inline]
    pub fn commit(ptr: NonNull<u8>, size: usize) -> Result<(), MapError> {
        use libc::{mprotect, PROT_READ, PROT_WRITE};

        let rc = unsafe { mprotect(ptr.as_ptr().cast(), size, PROT_READ | PROT_WRITE) };
        if rc == 0 {
            Ok(())
        } else {
            Err(MapError)
        }
    }

    #[cfg(all(
        not(target_os = "linux"),
        not(target_vendor = "apple"),
        not(windows),
        unix
    ))]
    #[inline]
    pub fn release(ptr: NonNull<u8>, size: usize) {
        use libc::munmap;

        unsafe {
            let _ = munmap(ptr.as_ptr().cast(), size);
        }
    }
}
