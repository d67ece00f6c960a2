//! Core ELF64 linker engine: file reading, segment mapping, dynamic-section
//! parsing, symbol resolution, relocation, and init/fini dispatch.
//!
//! This crate has no notion of a registry or a `dlopen`-style façade — it
//! builds and relocates one [`Module`] at a time. The façade (in the
//! `elflinker` crate) owns the set of loaded modules and supplies the
//! cross-module symbol resolution relocation needs via [`reloc::GlobalResolver`].

pub mod dynamic;
pub mod elf_reader;
pub mod initfini;
pub mod module;
pub mod raw;
pub mod reloc;
pub mod segment;
pub mod symbol;

use std::path::Path;

use elflinker_shared::Error;
use log::info;

pub use module::Module;
pub use reloc::GlobalResolver;

use elf_reader::ElfFile;

/// Open, map, parse the dynamic section, and relocate a single shared
/// object. Does not run constructors — that's left to the caller so it can
/// register the module (making it visible to its own constructors'
/// reentrant lookups) before invoking them, matching the source's
/// `linker_load` / `mini_dlopen` split.
pub fn load(path: impl AsRef<Path>, resolver: &dyn GlobalResolver, global: bool) -> Result<Module, Error> {
    let path = path.as_ref();
    let elf = ElfFile::open(path)?;
    let phdrs = elf.program_headers()?;

    let file = std::fs::File::open(path).map_err(|source| Error::InvalidPath {
        path: path.to_path_buf(),
        source,
    })?;
    let (mapping, load_bias) = segment::reserve_and_place(path, &file, &phdrs)?;

    let dynamic_phdr = phdrs.iter().find(|p| p.p_type == raw::PT_DYNAMIC);
    let dynamic_addr = match dynamic_phdr {
        Some(p) => (load_bias + p.p_vaddr as i64) as usize,
        None => {
            return Err(Error::MissingSymbolTable {
                path: path.to_path_buf(),
                table: "PT_DYNAMIC",
            });
        }
    };
    let dynamic = unsafe { dynamic::parse(path, dynamic_addr, load_bias)? };

    let dynsym_count = elf
        .find_section(".dynsym")?
        .map(|sh| (sh.sh_size / sh.sh_entsize.max(1)) as usize);

    let mut module = Module {
        name: path.to_path_buf(),
        mapping,
        load_bias,
        phdrs,
        dynamic,
        global,
        reference_count: 1,
        dynsym_count,
    };

    reloc::relocate(&mut module, resolver);

    info!(
        "loaded {} at base 0x{:x}",
        module.name.display(),
        module.base_address()
    );
    Ok(module)
}
