mod common;

use elflinker::{flags, last_error, load, lookup, unload, Handle};

#[test_log::test]
fn load_call_and_unload_a_simple_library() {
    let fixture = common::compile_fixture();

    let handle = load(&fixture.path, flags::NOW).expect("load fixture_lib.so");

    let add_addr = lookup(Handle::Module(handle), "add").expect("find add");
    let add: unsafe extern "C" fn(i32, i32) -> i32 = unsafe { std::mem::transmute(add_addr) };
    assert_eq!(unsafe { add(10, 20) }, 30);

    let mul_addr = lookup(Handle::Module(handle), "multiply").expect("find multiply");
    let multiply: unsafe extern "C" fn(i32, i32) -> i32 = unsafe { std::mem::transmute(mul_addr) };
    assert_eq!(unsafe { multiply(6, 7) }, 42);

    let counter_addr = lookup(Handle::Module(handle), "global_counter").expect("find global_counter");
    let counter_ptr = counter_addr as *mut i32;
    assert_eq!(unsafe { *counter_ptr }, 42);
    unsafe { *counter_ptr = 100 };
    assert_eq!(unsafe { *counter_ptr }, 100);

    unload(handle).expect("unload fixture_lib.so");
}

#[test_log::test]
fn constructor_runs_before_load_returns_and_destructor_before_unload_returns() {
    let fixture = common::compile_fixture();
    let handle = load(&fixture.path, flags::NOW).expect("load fixture_lib.so");

    let ctor_ran_addr = lookup(Handle::Module(handle), "ctor_ran").expect("find ctor_ran");
    let ctor_ran = unsafe { *(ctor_ran_addr as *const i32) };
    assert_eq!(ctor_ran, 1, "constructor must have run before load() returned");

    let register_addr =
        lookup(Handle::Module(handle), "register_dtor_probe").expect("find register_dtor_probe");
    let register: unsafe extern "C" fn(*mut i32) = unsafe { std::mem::transmute(register_addr) };

    let mut dtor_ran: i32 = 0;
    unsafe { register(&mut dtor_ran as *mut i32) };

    unload(handle).expect("unload fixture_lib.so");

    assert_eq!(dtor_ran, 1, "destructor must have run before unload() returned");
}

#[test_log::test]
fn cross_library_symbol_resolution_via_the_platform_loader() {
    let fixture = common::compile_fixture();
    let handle = load(&fixture.path, flags::NOW).expect("load fixture_lib.so");

    let greet_addr = lookup(Handle::Module(handle), "greet").expect("find greet");
    let greet: unsafe extern "C" fn(*const std::os::raw::c_char) = unsafe { std::mem::transmute(greet_addr) };
    let name = std::ffi::CString::new("linker").unwrap();
    unsafe { greet(name.as_ptr()) };

    unload(handle).expect("unload fixture_lib.so");
}

#[test_log::test]
fn undefined_symbol_lookup_sets_and_clears_the_error_slot() {
    let fixture = common::compile_fixture();
    let handle = load(&fixture.path, flags::NOW).expect("load fixture_lib.so");

    let result = lookup(Handle::Module(handle), "this_does_not_exist");
    assert!(result.is_err());

    let err = last_error().expect("error slot populated after failed lookup");
    assert!(err.contains("this_does_not_exist"));
    assert!(last_error().is_none(), "error slot should be one-shot");

    unload(handle).expect("unload fixture_lib.so");
}

#[test_log::test]
fn reference_counting_tracks_independent_loads() {
    let fixture = common::compile_fixture();

    let first = load(&fixture.path, flags::NOW).expect("first load");
    let second = load(&fixture.path, flags::NOW).expect("second load");

    unload(first).expect("unload first handle");
    unload(second).expect("unload second handle");
}

#[test_log::test]
fn compiled_fixture_is_a_well_formed_elf64_shared_object() {
    let fixture = common::compile_fixture();
    let bytes = std::fs::read(&fixture.path).unwrap();
    let obj = object::File::parse(&*bytes).expect("parse compiled fixture as an object file");

    use object::Object;
    assert_eq!(obj.architecture(), object::Architecture::X86_64);
    assert!(
        obj.kind() == object::ObjectKind::Dynamic || obj.kind() == object::ObjectKind::Relocatable,
        "expected a shared object, got {:?}",
        obj.kind()
    );
}

#[test_log::test]
fn malformed_file_is_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("not_an_elf.so");
    std::fs::write(&path, b"\x7fELX garbage bytes").unwrap();

    let result = load(&path, flags::NOW);
    assert!(result.is_err());

    let err = last_error().expect("error slot populated after malformed load");
    assert!(err.to_lowercase().contains("elf"));
}
