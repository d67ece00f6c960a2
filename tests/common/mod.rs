//! Shared test support: compiles `testdata/fixture_lib.c` into a real ELF64
//! shared object at test-run time via the system `cc`, mirroring the
//! original project's own `gcc -shared -fPIC` build recipe.

use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

pub struct CompiledFixture {
    _dir: TempDir,
    pub path: PathBuf,
}

pub fn compile_fixture() -> CompiledFixture {
    let dir = TempDir::new().expect("create temp dir for compiled fixture");
    let path = dir.path().join("fixture_lib.so");
    let src = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/fixture_lib.c");

    let status = Command::new("cc")
        .args(["-shared", "-fPIC", "-o"])
        .arg(&path)
        .arg(&src)
        .status()
        .expect("spawn cc to compile test fixture");
    assert!(status.success(), "cc failed to compile {}", src.display());

    CompiledFixture { _dir: dir, path }
}
