//! Reserve a contiguous virtual address region sized to the module's
//! `PT_LOAD` span, place each segment at its correct offset with the
//! correct protection, and zero-fill any BSS remainder.

use std::os::fd::AsRawFd;
use std::path::Path;

use elflinker_shared::Error;
use log::debug;

use crate::raw::{self, Phdr};

/// An anonymous reservation backing a loaded module's address space.
///
/// Owns the whole `[base, base + size)` span; dropping it unmaps the entire
/// region in one call, which is sound because every sub-mapping placed
/// inside it (file-backed or anonymous BSS) was made with `MAP_FIXED` into
/// already-reserved pages, not an independent allocation.
pub struct Mapping {
    pub base: usize,
    pub size: usize,
}

impl Mapping {
    /// View the whole reservation as bytes. Regions never placed by a
    /// `PT_LOAD` segment (gaps between segments, the initial `PROT_NONE`
    /// reservation where no segment was ever mapped) are not safely
    /// readable; callers only use this to index into table pointers that
    /// are known to fall within a placed, readable segment.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.base as *const u8, self.size) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if self.size == 0 {
            return;
        }
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.size);
        }
    }
}

/// Scans `PT_LOAD` headers for `[min_vaddr, max_vaddr)`, page-aligned.
/// Returns `None` when there are no loadable segments.
pub fn calculate_load_span(phdrs: &[Phdr]) -> Option<(u64, u64)> {
    let mut min_vaddr = u64::MAX;
    let mut max_vaddr = 0u64;
    for p in phdrs {
        if p.p_type != raw::PT_LOAD {
            continue;
        }
        min_vaddr = min_vaddr.min(p.p_vaddr);
        max_vaddr = max_vaddr.max(p.p_vaddr + p.p_memsz);
    }
    if min_vaddr > max_vaddr {
        return None;
    }
    Some((
        raw::page_start(min_vaddr as usize) as u64,
        raw::page_end(max_vaddr as usize) as u64,
    ))
}

/// Reserves the address space and places every `PT_LOAD` segment, returning
/// the owning [`Mapping`] and the load bias to add to every file-virtual
/// address.
pub fn reserve_and_place(
    path: &Path,
    fd: &std::fs::File,
    phdrs: &[Phdr],
) -> Result<(Mapping, i64), Error> {
    let (min_vaddr, max_vaddr) = calculate_load_span(phdrs).ok_or_else(|| Error::UnsupportedSegment {
        path: path.to_path_buf(),
    })?;
    let load_size = (max_vaddr - min_vaddr) as usize;

    let reserved = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            load_size,
            libc::PROT_NONE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if reserved == libc::MAP_FAILED {
        return Err(Error::MmapFailed {
            path: path.to_path_buf(),
            reason: std::io::Error::last_os_error().to_string(),
        });
    }
    let mapping = Mapping {
        base: reserved as usize,
        size: load_size,
    };
    let load_bias = mapping.base as i64 - min_vaddr as i64;

    for p in phdrs {
        if p.p_type != raw::PT_LOAD {
            continue;
        }
        place_segment(path, fd, p, load_bias)?;
        debug!(
            "loaded segment: vaddr=0x{:x} memsz=0x{:x} flags={}{}{}",
            p.p_vaddr,
            p.p_memsz,
            if p.p_flags & raw::PF_R != 0 { "r" } else { "-" },
            if p.p_flags & raw::PF_W != 0 { "w" } else { "-" },
            if p.p_flags & raw::PF_X != 0 { "x" } else { "-" },
        );
    }

    Ok((mapping, load_bias))
}

fn place_segment(
    path: &Path,
    fd: &std::fs::File,
    phdr: &Phdr,
    load_bias: i64,
) -> Result<(), Error> {
    let seg_start = (load_bias + phdr.p_vaddr as i64) as usize;
    let seg_end = seg_start + phdr.p_memsz as usize;
    let seg_page_start = raw::page_start(seg_start);
    let seg_page_end = raw::page_end(seg_end);
    let seg_file_end = seg_start + phdr.p_filesz as usize;

    let file_page_start = raw::page_start(phdr.p_offset as usize);
    let map_len = seg_file_end - seg_page_start;
    let prot = raw::elf_to_mmap_prot(phdr.p_flags);

    if map_len > 0 {
        let addr = unsafe {
            libc::mmap(
                seg_page_start as *mut libc::c_void,
                map_len,
                prot,
                libc::MAP_PRIVATE | libc::MAP_FIXED,
                fd.as_raw_fd(),
                file_page_start as libc::off_t,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(Error::MmapFailed {
                path: path.to_path_buf(),
                reason: std::io::Error::last_os_error().to_string(),
            });
        }
    }

    if phdr.p_memsz > phdr.p_filesz {
        let bss_start = seg_file_end;
        let bss_page_start = raw::page_end(bss_start);

        if bss_start < bss_page_start {
            let zero_len = bss_page_start - bss_start;
            unsafe {
                std::ptr::write_bytes(bss_start as *mut u8, 0, zero_len);
            }
        }

        if seg_page_end > bss_page_start {
            let addr = unsafe {
                libc::mmap(
                    bss_page_start as *mut libc::c_void,
                    seg_page_end - bss_page_start,
                    prot,
                    libc::MAP_PRIVATE | libc::MAP_FIXED | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            if addr == libc::MAP_FAILED {
                return Err(Error::MmapFailed {
                    path: path.to_path_buf(),
                    reason: std::io::Error::last_os_error().to_string(),
                });
            }
        }
    }

    Ok(())
}
