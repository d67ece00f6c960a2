//! The per-library module record: what a single loaded shared object owns
//! and how its addresses are translated.

use std::path::PathBuf;

use crate::dynamic::DynamicInfo;
use crate::raw::Phdr;
use crate::segment::Mapping;

/// A single loaded shared object.
///
/// Owns its anonymous reservation (`mapping`) and every segment placed
/// inside it; pointers into its symbol/string/relocation tables are
/// non-owning references into that same mapping.
pub struct Module {
    pub name: PathBuf,
    pub mapping: Mapping,
    pub load_bias: i64,
    pub phdrs: Vec<Phdr>,
    pub dynamic: DynamicInfo,
    pub global: bool,
    pub reference_count: u32,
    /// `.dynsym`'s entry count from the section header table, when one was
    /// available at load time. Used as the linear-scan fallback bound when
    /// neither hash table is present.
    pub dynsym_count: Option<usize>,
}

impl Module {
    pub fn base_address(&self) -> usize {
        self.mapping.base
    }

    pub fn total_mapped_size(&self) -> usize {
        self.mapping.size
    }

    /// Translate a file-virtual address to its in-memory address.
    pub fn translate(&self, vaddr: u64) -> usize {
        (self.load_bias + vaddr as i64) as usize
    }
}
