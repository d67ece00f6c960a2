//! The module registry and one-shot error slot, both guarded by a single
//! mutex so that concurrent callers from multiple threads stay memory-safe
//! even though callers are expected to treat `load`/`lookup`/`unload` as a
//! single-threaded API.

use std::sync::{Mutex, OnceLock};

use elflinker_core::reloc::GlobalResolver;
use elflinker_core::{self as core, Module};
use elflinker_shared::{Error, ModuleHandle};
use log::error;

struct Slot {
    module: Option<Module>,
    generation: u64,
}

#[derive(Default)]
struct Registry {
    slots: Vec<Slot>,
    last_error: Option<String>,
}

impl Registry {
    fn push(&mut self, module: Module) -> ModuleHandle {
        let generation = 1;
        self.slots.push(Slot {
            module: Some(module),
            generation,
        });
        ModuleHandle {
            slot: self.slots.len() - 1,
            generation,
        }
    }

    fn get(&self, handle: ModuleHandle) -> Option<&Module> {
        let slot = self.slots.get(handle.slot)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.module.as_ref()
    }

    fn get_mut(&mut self, handle: ModuleHandle) -> Option<&mut Module> {
        let slot = self.slots.get_mut(handle.slot)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.module.as_mut()
    }

    fn take(&mut self, handle: ModuleHandle) -> Option<Module> {
        let slot = self.slots.get_mut(handle.slot)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.module.take()
    }

    fn set_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.last_error = Some(message);
    }

    fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }
}

impl GlobalResolver for Registry {
    fn resolve_global(&self, name: &str) -> Option<usize> {
        for slot in &self.slots {
            let Some(module) = &slot.module else { continue };
            if let Some(addr) = core::symbol::find_in_module(module, name) {
                return Some(addr);
            }
        }
        let c_name = std::ffi::CString::new(name).ok()?;
        let addr = unsafe { libc::dlsym(libc::RTLD_DEFAULT, c_name.as_ptr()) };
        if addr.is_null() {
            None
        } else {
            Some(addr as usize)
        }
    }
}

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn registry() -> &'static Mutex<Registry> {
    REGISTRY.get_or_init(|| Mutex::new(Registry::default()))
}

/// Load a shared object, running its constructors before returning.
///
/// `global` controls whether the module participates in
/// [`lookup_default`]'s cross-module search.
pub fn load(path: &std::path::Path, global: bool) -> Result<ModuleHandle, Error> {
    let mut reg = registry().lock().expect("linker registry mutex poisoned");

    let module = match core::load(path, &*reg, global) {
        Ok(m) => m,
        Err(err) => {
            reg.set_error(err.to_string());
            return Err(err);
        }
    };

    let handle = reg.push(module);
    // Constructors run with the registry lock still held: a constructor
    // that reenters `load`/`lookup` on the same thread deadlocks rather
    // than racing the registry's `Vec`, which would otherwise be unsound
    // to reference here across a lock release if a concurrent `push`
    // reallocated it.
    let module = reg.get(handle).expect("just inserted");
    unsafe { elflinker_core::initfini::call_constructors(module) };

    Ok(handle)
}

/// Look up a symbol inside a specific module.
pub fn lookup_in(handle: ModuleHandle, name: &str) -> Result<usize, Error> {
    let mut reg = registry().lock().expect("linker registry mutex poisoned");
    let module = reg.get(handle);
    let module = match module {
        Some(m) => m,
        None => {
            reg.set_error("lookup: invalid handle".to_string());
            return Err(Error::NullHandle);
        }
    };
    match core::symbol::find_in_module(module, name) {
        Some(addr) => Ok(addr),
        None => {
            let module_name = module.name.display().to_string();
            reg.set_error(format!("symbol not found in {module_name}: {name}"));
            Err(Error::SymbolNotFound {
                module: module_name,
                symbol: name.to_string(),
            })
        }
    }
}

/// Look up a symbol across every [`GLOBAL`](elflinker_shared::DlOpenFlags::GLOBAL)
/// module and, failing that, the platform loader's default scope.
pub fn lookup_default(name: &str) -> Result<usize, Error> {
    let mut reg = registry().lock().expect("linker registry mutex poisoned");
    for slot in &reg.slots {
        let Some(module) = &slot.module else { continue };
        if !module.global {
            continue;
        }
        if let Some(addr) = core::symbol::find_in_module(module, name) {
            return Ok(addr);
        }
    }
    let c_name = std::ffi::CString::new(name).map_err(|_| Error::SymbolNotFound {
        module: "<default>".to_string(),
        symbol: name.to_string(),
    })?;
    let addr = unsafe { libc::dlsym(libc::RTLD_DEFAULT, c_name.as_ptr()) };
    if addr.is_null() {
        reg.set_error(format!("symbol not found: {name}"));
        Err(Error::SymbolNotFound {
            module: "<default>".to_string(),
            symbol: name.to_string(),
        })
    } else {
        Ok(addr as usize)
    }
}

/// Decrement the module's reference count; at zero, run destructors and
/// release its mapping.
pub fn unload(handle: ModuleHandle) -> Result<(), Error> {
    let mut reg = registry().lock().expect("linker registry mutex poisoned");
    let Some(module) = reg.get_mut(handle) else {
        reg.set_error("dlclose: invalid handle".to_string());
        return Err(Error::NullHandle);
    };
    module.reference_count -= 1;
    if module.reference_count > 0 {
        return Ok(());
    }

    let module = reg.get(handle).expect("checked above");
    unsafe { elflinker_core::initfini::call_destructors(module) };

    reg.take(handle);
    Ok(())
}

/// Read and clear the last error, matching the one-shot `dlerror` contract.
pub fn last_error() -> Option<String> {
    registry().lock().expect("linker registry mutex poisoned").take_error()
}
