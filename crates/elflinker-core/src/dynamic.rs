//! Walk the `PT_DYNAMIC` array and bind its tagged entries to the
//! in-memory pointers the rest of the core needs.

use std::path::Path;

use elflinker_shared::Error;

use crate::raw::{self, Dyn};

/// Bound pointers and scalars extracted from a module's dynamic section.
/// Every pointer here is already translated by the module's load bias.
#[derive(Debug, Default)]
pub struct DynamicInfo {
    pub symtab: usize,
    pub strtab: usize,
    pub strtab_size: usize,
    pub hash: Option<usize>,
    pub gnu_hash: Option<usize>,
    pub rela: Option<usize>,
    pub rela_count: usize,
    pub plt_rela: Option<usize>,
    pub plt_rela_count: usize,
    pub init_func: Option<usize>,
    pub fini_func: Option<usize>,
    pub init_array: Option<usize>,
    pub init_array_count: usize,
    pub fini_array: Option<usize>,
    pub fini_array_count: usize,
}

const RELA_ENTSIZE: u64 = std::mem::size_of::<crate::raw::Rela>() as u64;
const PTR_SIZE: u64 = std::mem::size_of::<usize>() as u64;

/// Walks the dynamic array starting at `dynamic_addr` (already load-bias
/// adjusted) until the `DT_NULL` terminator.
///
/// # Safety
/// `dynamic_addr` must point at a valid, readable `Elf64_Dyn` array inside
/// the module's mapping.
pub unsafe fn parse(
    path: &Path,
    dynamic_addr: usize,
    load_bias: i64,
) -> Result<DynamicInfo, Error> {
    let mut info = DynamicInfo::default();
    let mut cursor = dynamic_addr;

    loop {
        let entry = unsafe { (cursor as *const Dyn).read_unaligned() };
        if entry.d_tag == raw::DT_NULL as i64 {
            break;
        }
        let ptr = (load_bias + entry.d_val as i64) as usize;
        match entry.d_tag as u32 {
            raw::DT_SYMTAB => info.symtab = ptr,
            raw::DT_STRTAB => info.strtab = ptr,
            raw::DT_STRSZ => info.strtab_size = entry.d_val as usize,
            raw::DT_HASH => info.hash = Some(ptr),
            raw::DT_GNU_HASH => info.gnu_hash = Some(ptr),
            raw::DT_RELA => info.rela = Some(ptr),
            raw::DT_RELASZ => info.rela_count = (entry.d_val / RELA_ENTSIZE) as usize,
            raw::DT_JMPREL => info.plt_rela = Some(ptr),
            raw::DT_PLTRELSZ => info.plt_rela_count = (entry.d_val / RELA_ENTSIZE) as usize,
            raw::DT_INIT => info.init_func = Some(ptr),
            raw::DT_FINI => info.fini_func = Some(ptr),
            raw::DT_INIT_ARRAY => info.init_array = Some(ptr),
            raw::DT_INIT_ARRAYSZ => info.init_array_count = (entry.d_val / PTR_SIZE) as usize,
            raw::DT_FINI_ARRAY => info.fini_array = Some(ptr),
            raw::DT_FINI_ARRAYSZ => info.fini_array_count = (entry.d_val / PTR_SIZE) as usize,
            _ => {}
        }
        cursor += std::mem::size_of::<Dyn>();
    }

    if info.symtab == 0 {
        return Err(Error::MissingSymbolTable {
            path: path.to_path_buf(),
            table: "DT_SYMTAB",
        });
    }
    if info.strtab == 0 {
        return Err(Error::MissingSymbolTable {
            path: path.to_path_buf(),
            table: "DT_STRTAB",
        });
    }

    Ok(info)
}
