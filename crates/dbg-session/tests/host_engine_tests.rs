//! Integration tests for the built-in host engine.
//!
//! These run the default engine end to end against executables written to
//! the temp directory.

use std::path::PathBuf;

use dbg_session::{Debugger, ObjectFormat};

/// A scratch directory under the temp directory, removed on drop.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "dbg-session-host-{}-{name}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.0.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn put(image: &mut [u8], at: usize, bytes: &[u8]) {
    image[at..at + bytes.len()].copy_from_slice(bytes);
}

/// A 64-bit little-endian x86_64 ELF that needs `needed`.
///
/// One `PT_LOAD` covers the file; one `PT_DYNAMIC` at 0x100 holds
/// `DT_NEEDED` and `DT_STRTAB`, with the string table at 0x180.
fn elf_needing(needed: &str) -> Vec<u8> {
    let mut image = vec![0u8; 0x200];
    put(&mut image, 0, b"\x7fELF");
    image[4] = 2;
    image[5] = 1;
    image[6] = 1;
    put(&mut image, 18, &0x3e_u16.to_le_bytes());
    put(&mut image, 0x20, &64u64.to_le_bytes());
    put(&mut image, 0x36, &56u16.to_le_bytes());
    put(&mut image, 0x38, &2u16.to_le_bytes());

    let load = 64;
    put(&mut image, load, &1u32.to_le_bytes());
    put(&mut image, load + 16, &0x1000u64.to_le_bytes());
    put(&mut image, load + 32, &0x200u64.to_le_bytes());

    let dynamic = 64 + 56;
    put(&mut image, dynamic, &2u32.to_le_bytes());
    put(&mut image, dynamic + 8, &0x100u64.to_le_bytes());
    put(&mut image, dynamic + 32, &48u64.to_le_bytes());

    for (i, (tag, value)) in [(1u64, 1u64), (5, 0x1180), (0, 0)].iter().enumerate() {
        let at = 0x100 + i * 16;
        put(&mut image, at, &tag.to_le_bytes());
        put(&mut image, at + 8, &value.to_le_bytes());
    }
    put(&mut image, 0x181, needed.as_bytes());
    image
}

/// Creating a target on a real executable selects it and resolves its
/// dependents next to it.
#[test]
fn create_target_from_file() {
    let dir = ScratchDir::new("create");
    let exe = dir.write("a.out", &elf_needing("libdemo.so"));
    let lib = dir.write("libdemo.so", b"");

    let mut debugger = Debugger::create(false, None);
    let target = debugger.create_target(&exe, None, None, true).unwrap();

    assert_eq!(debugger.num_targets(), 1);
    assert_eq!(debugger.selected_target(), Some(target.clone()));
    assert_eq!(target.triple(), "x86_64-unknown-linux");
    assert_eq!(target.platform(), "linux");
    assert_eq!(target.module().format, ObjectFormat::Elf);
    assert_eq!(target.module().dependents, vec![lib]);
    debugger.destroy();
}

/// A triple the file does not contain fails and leaves the set unchanged.
#[test]
fn mismatched_triple_is_rejected() {
    let dir = ScratchDir::new("mismatch");
    let exe = dir.write("a.out", &elf_needing("libc.so.6"));

    let mut debugger = Debugger::create(false, None);
    let first = debugger.create_target(&exe, Some("x86_64"), None, false).unwrap();

    let err = debugger
        .create_target(&exe, Some("aarch64-unknown-linux"), None, false)
        .unwrap_err();
    assert!(err.is_module_error(), "{err}");
    assert_eq!(debugger.num_targets(), 1);
    assert_eq!(debugger.selected_target(), Some(first));

    assert!(debugger.create_target(&exe, None, Some("amiga"), false).is_err());
    assert!(debugger.create_target(dir.0.join("missing"), None, None, false).is_err());
    assert_eq!(debugger.num_targets(), 1);
    debugger.destroy();
}

/// Header offsets that overflow are treated as absent dependents.
#[test]
fn hostile_header_does_not_abort() {
    let dir = ScratchDir::new("hostile");
    let mut image = elf_needing("libc.so.6");
    put(&mut image, 0x20, &(u64::MAX - 2).to_le_bytes());
    put(&mut image, 0x38, &1u16.to_le_bytes());
    let exe = dir.write("a.out", &image);

    let mut debugger = Debugger::create(false, None);
    let target = debugger.create_target(&exe, None, None, true).unwrap();
    assert!(target.module().dependents.is_empty());

    let garbage = dir.write("garbage", b"not an executable");
    assert!(debugger.create_target(&garbage, None, None, true).is_err());
    assert_eq!(debugger.num_targets(), 1);
    debugger.destroy();
}
