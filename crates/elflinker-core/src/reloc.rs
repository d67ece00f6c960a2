//! Iterate the module's RELA and PLT-RELA tables and patch each target
//! word according to x86_64 relocation semantics.

use log::warn;

use crate::module::Module;
use crate::raw::{self, Rela};

/// Resolves a name against every other loaded module (and ultimately the
/// platform loader), in registration order. Implemented by the façade,
/// which is the only layer that knows about the whole registry.
pub trait GlobalResolver {
    fn resolve_global(&self, name: &str) -> Option<usize>;
}

fn rela_at(base: usize, index: usize) -> Rela {
    let addr = base + index * std::mem::size_of::<Rela>();
    unsafe { (addr as *const Rela).read_unaligned() }
}

fn sym_name_and_bind(module: &Module, sym_idx: u32) -> (String, u8) {
    let sym_addr = module.dynamic.symtab + sym_idx as usize * std::mem::size_of::<crate::raw::Sym>();
    let sym = unsafe { (sym_addr as *const crate::raw::Sym).read_unaligned() };
    let bytes = module.mapping.as_slice();
    let strtab_off = module.dynamic.strtab - module.mapping.base;
    let name = (|| {
        let start = strtab_off.checked_add(sym.st_name as usize)?;
        if start >= bytes.len() {
            return None;
        }
        let end = bytes[start..].iter().position(|&b| b == 0)? + start;
        std::str::from_utf8(&bytes[start..end]).ok()
    })()
    .unwrap_or("")
    .to_string();
    (name, sym.bind())
}

fn resolve_symbol(module: &Module, sym_idx: u32, resolver: &dyn GlobalResolver) -> (Option<usize>, String) {
    let sym_addr = module.dynamic.symtab + sym_idx as usize * std::mem::size_of::<crate::raw::Sym>();
    let sym = unsafe { (sym_addr as *const crate::raw::Sym).read_unaligned() };
    let (name, bind) = sym_name_and_bind(module, sym_idx);

    if sym.st_shndx != raw::SHN_UNDEF {
        return (Some(module.translate(sym.st_value)), name);
    }

    let addr = resolver.resolve_global(&name);
    if addr.is_none() && bind != raw::STB_WEAK {
        warn!("cannot resolve symbol {name} for {}", module.name.display());
    }
    (addr, name)
}

fn apply_one(module: &mut Module, rela: &Rela, resolver: &dyn GlobalResolver) {
    let ty = rela.r_type();
    let sym_idx = rela.r_sym();
    let target = module.translate(rela.r_offset);

    let mut sym_addr = None;
    let mut sym_size = 0u64;
    if sym_idx != 0 {
        let (addr, _name) = resolve_symbol(module, sym_idx, resolver);
        sym_addr = addr;
        if ty == raw::R_X86_64_COPY {
            let addr = module.dynamic.symtab + sym_idx as usize * std::mem::size_of::<crate::raw::Sym>();
            let sym = unsafe { (addr as *const crate::raw::Sym).read_unaligned() };
            sym_size = sym.st_size;
        }
    }

    match ty {
        raw::R_X86_64_NONE => {}
        raw::R_X86_64_64 => {
            let value = sym_addr.unwrap_or(0) as u64 as i64 + rela.r_addend;
            unsafe { (target as *mut u64).write_unaligned(value as u64) };
        }
        raw::R_X86_64_GLOB_DAT | raw::R_X86_64_JUMP_SLOT => {
            unsafe { (target as *mut u64).write_unaligned(sym_addr.unwrap_or(0) as u64) };
        }
        raw::R_X86_64_RELATIVE => {
            let value = module.load_bias + rela.r_addend;
            unsafe { (target as *mut u64).write_unaligned(value as u64) };
        }
        raw::R_X86_64_COPY => {
            if let Some(src) = sym_addr {
                unsafe {
                    std::ptr::copy(src as *const u8, target as *mut u8, sym_size as usize);
                }
            }
        }
        other => {
            warn!("unsupported relocation type {other} in {}", module.name.display());
        }
    }
}

/// Apply every RELA entry, then every PLT-RELA entry, in table order.
pub fn relocate(module: &mut Module, resolver: &dyn GlobalResolver) {
    if let Some(base) = module.dynamic.rela {
        for i in 0..module.dynamic.rela_count {
            let rela = rela_at(base, i);
            apply_one(module, &rela, resolver);
        }
    }
    if let Some(base) = module.dynamic.plt_rela {
        for i in 0..module.dynamic.plt_rela_count {
            let rela = rela_at(base, i);
            apply_one(module, &rela, resolver);
        }
    }
}
