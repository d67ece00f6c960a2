//! Invoke `DT_INIT`/`DT_INIT_ARRAY` at load, `DT_FINI_ARRAY`/`DT_FINI` at
//! unload, in the ABI's prescribed order.

use log::debug;

use crate::module::Module;

type CtorFn = unsafe extern "C" fn();

/// Certain toolchains emit sentinel entries (null, or `-1`) at array
/// boundaries; those must be skipped rather than called.
fn is_valid_func_ptr(addr: usize) -> bool {
    addr != 0 && addr != usize::MAX
}

fn read_ptr(addr: usize) -> usize {
    unsafe { (addr as *const usize).read_unaligned() }
}

/// # Safety
/// Every function pointer invoked here must genuinely be a valid,
/// ABI-conforming nullary `extern "C" fn()` — true for init/fini entries
/// produced by a standard toolchain, which is the only input this linker
/// accepts.
pub unsafe fn call_constructors(module: &Module) {
    if let Some(init) = module.dynamic.init_func {
        if is_valid_func_ptr(init) {
            debug!("calling DT_INIT for {}", module.name.display());
            let f: CtorFn = unsafe { std::mem::transmute(init) };
            unsafe { f() };
        }
    }

    if let Some(array) = module.dynamic.init_array {
        for i in 0..module.dynamic.init_array_count {
            let entry = read_ptr(array + i * std::mem::size_of::<usize>());
            if is_valid_func_ptr(entry) {
                debug!("calling init_array[{i}] at 0x{entry:x}");
                let f: CtorFn = unsafe { std::mem::transmute(entry) };
                unsafe { f() };
            }
        }
    }
}

/// # Safety
/// See [`call_constructors`].
pub unsafe fn call_destructors(module: &Module) {
    if let Some(array) = module.dynamic.fini_array {
        for i in (0..module.dynamic.fini_array_count).rev() {
            let entry = read_ptr(array + i * std::mem::size_of::<usize>());
            if is_valid_func_ptr(entry) {
                debug!("calling fini_array[{i}] at 0x{entry:x}");
                let f: CtorFn = unsafe { std::mem::transmute(entry) };
                unsafe { f() };
            }
        }
    }

    if let Some(fini) = module.dynamic.fini_func {
        if is_valid_func_ptr(fini) {
            debug!("calling DT_FINI for {}", module.name.display());
            let f: CtorFn = unsafe { std::mem::transmute(fini) };
            unsafe { f() };
        }
    }
}
