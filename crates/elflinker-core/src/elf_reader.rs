//! Open a file, validate its ELF64/x86_64/little-endian header, and
//! expose the program-header table, section-header table, and section-name
//! string table as memory views over a read-only mapping.

use std::path::{Path, PathBuf};

use elflinker_shared::Error;
use memmap2::Mmap;

use crate::raw::{self, Ehdr, Phdr, Shdr};

/// A read-only mapping of an ELF file plus the views segment placement and
/// dynamic-section parsing build on.
///
/// Dropping an `ElfFile` unmaps the file and closes its descriptor; the
/// mapping only needs to live for the duration of `load`, never past it.
pub struct ElfFile {
    mmap: Mmap,
    path: PathBuf,
}

impl ElfFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path).map_err(|source| Error::InvalidPath {
            path: path.clone(),
            source,
        })?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|source| Error::InvalidPath {
            path: path.clone(),
            source,
        })?;
        let elf = ElfFile { mmap, path };
        elf.validate_header()?;
        Ok(elf)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidFormat {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn validate_header(&self) -> Result<(), Error> {
        let ehdr = self.ehdr()?;
        let ident = ehdr.e_ident;
        if ident[0] != raw::ELFMAG0
            || ident[1] != raw::ELFMAG1
            || ident[2] != raw::ELFMAG2
            || ident[3] != raw::ELFMAG3
        {
            return Err(self.invalid("not an ELF file"));
        }
        if ident[raw::EI_CLASS as usize] != raw::ELFCLASS64 {
            return Err(self.invalid("not a 64-bit ELF"));
        }
        if ident[raw::EI_DATA as usize] != raw::ELFDATA2LSB {
            return Err(self.invalid("not little-endian"));
        }
        if ehdr.e_type != raw::ET_DYN && ehdr.e_type != raw::ET_EXEC {
            return Err(self.invalid("not a shared object or executable"));
        }
        if ehdr.e_machine != raw::EM_X86_64 {
            return Err(self.invalid("not x86_64"));
        }
        Ok(())
    }

    pub fn ehdr(&self) -> Result<Ehdr, Error> {
        unsafe { raw::read_at::<Ehdr>(self.bytes(), 0) }
            .ok_or_else(|| self.invalid("file too small for an ELF header"))
    }

    pub fn program_headers(&self) -> Result<Vec<Phdr>, Error> {
        let ehdr = self.ehdr()?;
        if ehdr.e_phoff == 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(ehdr.e_phnum as usize);
        for i in 0..ehdr.e_phnum as usize {
            let offset = ehdr.e_phoff as usize + i * std::mem::size_of::<Phdr>();
            let phdr = unsafe { raw::read_at::<Phdr>(self.bytes(), offset) }
                .ok_or_else(|| self.invalid("truncated program header table"))?;
            out.push(phdr);
        }
        Ok(out)
    }

    pub fn section_headers(&self) -> Result<Vec<Shdr>, Error> {
        let ehdr = self.ehdr()?;
        if ehdr.e_shoff == 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(ehdr.e_shnum as usize);
        for i in 0..ehdr.e_shnum as usize {
            let offset = ehdr.e_shoff as usize + i * std::mem::size_of::<Shdr>();
            let shdr = unsafe { raw::read_at::<Shdr>(self.bytes(), offset) }
                .ok_or_else(|| self.invalid("truncated section header table"))?;
            out.push(shdr);
        }
        Ok(out)
    }

    /// Looks up a section by name via the `e_shstrndx` string table, if one
    /// is present. Used at load time to get a trustworthy `.dynsym` entry
    /// count for the linear-scan fallback bound (see `symbol::symbol_count`).
    pub fn find_section(&self, name: &str) -> Result<Option<Shdr>, Error> {
        let ehdr = self.ehdr()?;
        if ehdr.e_shstrndx == raw::SHN_UNDEF {
            return Ok(None);
        }
        let sections = self.section_headers()?;
        let shstrtab = match sections.get(ehdr.e_shstrndx as usize) {
            Some(s) => s,
            None => return Ok(None),
        };
        for sh in &sections {
            let Some(sec_name) = self.read_cstr(shstrtab.sh_offset as usize + sh.sh_name as usize)
            else {
                continue;
            };
            if sec_name == name {
                return Ok(Some(*sh));
            }
        }
        Ok(None)
    }

    fn read_cstr(&self, offset: usize) -> Option<&str> {
        let bytes = self.bytes();
        if offset >= bytes.len() {
            return None;
        }
        let end = bytes[offset..].iter().position(|&b| b == 0)? + offset;
        std::str::from_utf8(&bytes[offset..end]).ok()
    }
}
