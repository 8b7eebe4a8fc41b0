//! The built-in engine.
//!
//! `HostEngine` recognizes ELF, Mach-O and PE executables from their headers
//! and validates triples and platforms. It has no process control, so its
//! command set is limited to `help`, `version` and `quit`.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::{
    CommandRequest, CommandReturn, Engine, EngineError, EventSink, ModuleInfo, ModuleRequest,
    ObjectFormat, ReturnStatus,
};
use crate::target::normalize_arch;

/// Bytes read to identify an executable.
const HEADER_LEN: usize = 4096;

/// Platforms the host engine accepts.
pub const KNOWN_PLATFORMS: &[&str] = &[
    "host", "linux", "macosx", "ios", "windows", "freebsd", "android",
];

/// Architectures the host engine accepts in a triple.
pub const KNOWN_ARCHES: &[&str] = &[
    "i386", "x86_64", "arm", "armv7", "aarch64", "mips", "mips64", "powerpc", "powerpc64",
    "riscv32", "riscv64", "s390x",
];

#[derive(Debug)]
struct HostState {
    platform: String,
    sdk_root: Option<PathBuf>,
    sink: Option<EventSink>,
}

/// Engine that inspects executables on the host file system.
#[derive(Debug)]
pub struct HostEngine {
    state: Mutex<HostState>,
}

impl Default for HostEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEngine {
    /// Create an engine with the `host` platform selected.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HostState {
                platform: "host".to_string(),
                sdk_root: None,
                sink: None,
            }),
        }
    }

    /// The SDK root of the current platform.
    #[must_use]
    pub fn sdk_root(&self) -> Option<PathBuf> {
        self.lock().sdk_root.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Check if a triple names a known architecture.
#[must_use]
pub fn is_known_arch(triple: &str) -> bool {
    let arch = normalize_arch(triple);
    KNOWN_ARCHES.contains(&arch.as_str())
}

fn unloadable(path: &Path, reason: impl Into<String>) -> EngineError {
    EngineError::Unloadable {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// A module image as found in a file: one or more architecture slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Image {
    pub(crate) format: ObjectFormat,
    pub(crate) slices: Vec<String>,
    pub(crate) vendor_os: &'static str,
}

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

/// `len` bytes at `offset`, or `None` when the range leaves `bytes`.
fn field(bytes: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    bytes.get(offset..offset.checked_add(len)?)
}

fn u16_at(bytes: &[u8], offset: usize, endian: Endian) -> Option<u16> {
    let raw: [u8; 2] = field(bytes, offset, 2)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u16::from_le_bytes(raw),
        Endian::Big => u16::from_be_bytes(raw),
    })
}

fn u32_at(bytes: &[u8], offset: usize, endian: Endian) -> Option<u32> {
    let raw: [u8; 4] = field(bytes, offset, 4)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u32::from_le_bytes(raw),
        Endian::Big => u32::from_be_bytes(raw),
    })
}

fn u64_at(bytes: &[u8], offset: usize, endian: Endian) -> Option<u64> {
    let raw: [u8; 8] = field(bytes, offset, 8)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u64::from_le_bytes(raw),
        Endian::Big => u64::from_be_bytes(raw),
    })
}

/// Convert a file-supplied offset, rejecting values past `usize`.
fn to_offset(value: u64) -> Option<usize> {
    usize::try_from(value).ok()
}

fn elf_arch(machine: u16, is_64: bool) -> Option<&'static str> {
    Some(match machine {
        0x03 => "i386",
        0x3e => "x86_64",
        0x28 => "arm",
        0xb7 => "aarch64",
        0x08 if is_64 => "mips64",
        0x08 => "mips",
        0x14 => "powerpc",
        0x15 => "powerpc64",
        0xf3 if is_64 => "riscv64",
        0xf3 => "riscv32",
        0x16 => "s390x",
        _ => return None,
    })
}

fn macho_arch(cpu_type: u32) -> Option<&'static str> {
    Some(match cpu_type {
        7 => "i386",
        0x0100_0007 => "x86_64",
        12 => "arm",
        0x0100_000c => "aarch64",
        18 => "powerpc",
        0x0100_0012 => "powerpc64",
        _ => return None,
    })
}

fn pe_arch(machine: u16) -> Option<&'static str> {
    Some(match machine {
        0x014c => "i386",
        0x8664 => "x86_64",
        0x01c0 | 0x01c4 => "arm",
        0xaa64 => "aarch64",
        _ => return None,
    })
}

/// Identify an executable from its leading bytes.
pub(crate) fn identify(header: &[u8]) -> Option<Image> {
    if header.starts_with(b"\x7fELF") {
        let is_64 = *header.get(4)? == 2;
        let endian = if *header.get(5)? == 2 {
            Endian::Big
        } else {
            Endian::Little
        };
        let arch = elf_arch(u16_at(header, 18, endian)?, is_64)?;
        return Some(Image {
            format: ObjectFormat::Elf,
            slices: vec![arch.to_string()],
            vendor_os: "unknown-linux",
        });
    }

    let magic_be = u32_at(header, 0, Endian::Big)?;
    match magic_be {
        // Thin Mach-O, either byte order.
        0xfeed_face | 0xfeed_facf | 0xcefa_edfe | 0xcffa_edfe => {
            let endian = if magic_be >> 24 == 0xfe {
                Endian::Big
            } else {
                Endian::Little
            };
            let arch = macho_arch(u32_at(header, 4, endian)?)?;
            return Some(Image {
                format: ObjectFormat::MachO,
                slices: vec![arch.to_string()],
                vendor_os: "apple-macosx",
            });
        }
        // Universal binary. Java class files share the magic but carry a
        // version number far above any plausible slice count.
        0xcafe_babe => {
            let count = u32_at(header, 4, Endian::Big)? as usize;
            if count == 0 || count > 20 {
                return None;
            }
            let slices: Vec<String> = (0..count)
                .filter_map(|i| u32_at(header, 8 + i * 20, Endian::Big))
                .filter_map(macho_arch)
                .map(str::to_string)
                .collect();
            if slices.is_empty() {
                return None;
            }
            return Some(Image {
                format: ObjectFormat::MachO,
                slices,
                vendor_os: "apple-macosx",
            });
        }
        _ => {}
    }

    if header.starts_with(b"MZ") {
        let pe_offset = u32_at(header, 0x3c, Endian::Little)? as usize;
        if field(header, pe_offset, 4)? != b"PE\0\0" {
            return None;
        }
        let arch = pe_arch(u16_at(header, pe_offset.checked_add(4)?, Endian::Little)?)?;
        return Some(Image {
            format: ObjectFormat::Pe,
            slices: vec![arch.to_string()],
            vendor_os: "pc-windows-msvc",
        });
    }
    None
}

/// Names of the shared libraries an ELF image depends on (`DT_NEEDED`).
pub(crate) fn elf_needed(image: &[u8]) -> Vec<String> {
    elf_needed_inner(image).unwrap_or_default()
}

fn elf_needed_inner(image: &[u8]) -> Option<Vec<String>> {
    const PT_LOAD: u32 = 1;
    const PT_DYNAMIC: u32 = 2;
    const DT_NULL: u64 = 0;
    const DT_NEEDED: u64 = 1;
    const DT_STRTAB: u64 = 5;

    let is_64 = *image.get(4)? == 2;
    let endian = if *image.get(5)? == 2 {
        Endian::Big
    } else {
        Endian::Little
    };
    let word = |offset: usize| -> Option<u64> {
        if is_64 {
            u64_at(image, offset, endian)
        } else {
            u32_at(image, offset, endian).map(u64::from)
        }
    };

    let (ph_off, ph_size, ph_num) = if is_64 {
        (
            to_offset(word(0x20)?)?,
            usize::from(u16_at(image, 0x36, endian)?),
            usize::from(u16_at(image, 0x38, endian)?),
        )
    } else {
        (
            to_offset(word(0x1c)?)?,
            usize::from(u16_at(image, 0x2a, endian)?),
            usize::from(u16_at(image, 0x2c, endian)?),
        )
    };

    // (vaddr, offset, filesz) of each loadable segment, plus the dynamic one.
    let mut loads = Vec::new();
    let mut dynamic = None;
    for i in 0..ph_num {
        let ph = ph_off.checked_add(i.checked_mul(ph_size)?)?;
        let kind = u32_at(image, ph, endian)?;
        let at = |delta: usize| word(ph.checked_add(delta)?);
        let (offset, vaddr, filesz) = if is_64 {
            (at(8)?, at(16)?, at(32)?)
        } else {
            (at(4)?, at(8)?, at(16)?)
        };
        match kind {
            PT_LOAD => loads.push((vaddr, offset, filesz)),
            PT_DYNAMIC => dynamic = Some((to_offset(offset)?, to_offset(filesz)?)),
            _ => {}
        }
    }
    let (dyn_off, dyn_size) = dynamic?;
    let dyn_end = dyn_off.checked_add(dyn_size)?.min(image.len());

    let entry_size = if is_64 { 16 } else { 8 };
    let mut needed = Vec::new();
    let mut strtab_vaddr = None;
    for entry in (dyn_off..dyn_end).step_by(entry_size) {
        let tag = word(entry)?;
        let value = word(entry.checked_add(entry_size / 2)?)?;
        match tag {
            DT_NULL => break,
            DT_NEEDED => needed.push(to_offset(value)?),
            DT_STRTAB => strtab_vaddr = Some(value),
            _ => {}
        }
    }
    let strtab_vaddr = strtab_vaddr?;
    let strtab = loads.iter().find_map(|&(vaddr, offset, filesz)| {
        let end = vaddr.checked_add(filesz)?;
        if strtab_vaddr < vaddr || strtab_vaddr >= end {
            return None;
        }
        to_offset((strtab_vaddr - vaddr).checked_add(offset)?)
    })?;

    Some(
        needed
            .into_iter()
            .filter_map(|name_off| {
                let rest = image.get(strtab.checked_add(name_off)?..)?;
                let end = rest.iter().position(|&b| b == 0)?;
                Some(String::from_utf8_lossy(&rest[..end]).into_owned())
            })
            .collect(),
    )
}

fn read_header(path: &Path) -> Result<Vec<u8>, EngineError> {
    let file = File::open(path).map_err(|e| unloadable(path, e.to_string()))?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64)
        .read_to_end(&mut header)
        .map_err(|e| unloadable(path, e.to_string()))?;
    Ok(header)
}

fn default_platform(format: ObjectFormat) -> &'static str {
    match format {
        ObjectFormat::Elf => "linux",
        ObjectFormat::MachO => "macosx",
        ObjectFormat::Pe => "windows",
    }
}

fn resolve_dependents(path: &Path, names: Vec<String>) -> Vec<PathBuf> {
    const SEARCH: &[&str] = &["/lib", "/usr/lib", "/lib64", "/usr/lib64"];
    let sibling_dir = path.parent().map(Path::to_path_buf);
    names
        .into_iter()
        .map(|name| {
            sibling_dir
                .iter()
                .cloned()
                .chain(SEARCH.iter().map(PathBuf::from))
                .map(|dir| dir.join(&name))
                .find(|candidate| candidate.is_file())
                .unwrap_or_else(|| PathBuf::from(&name))
        })
        .collect()
}

impl Engine for HostEngine {
    fn name(&self) -> &str {
        "host"
    }

    fn attach(&self, sink: EventSink) {
        self.lock().sink = Some(sink);
    }

    fn load_module(&self, request: &ModuleRequest) -> Result<ModuleInfo, EngineError> {
        let path = request.path.as_path();
        if !path.is_file() {
            return Err(unloadable(path, "no such file"));
        }
        let header = read_header(path)?;
        let image =
            identify(&header).ok_or_else(|| unloadable(path, "not a recognized executable"))?;

        let requested = request.triple.as_deref().filter(|t| !t.is_empty());
        let arch = match requested {
            None => image.slices[0].clone(),
            Some(triple) => {
                if !is_known_arch(triple) {
                    return Err(EngineError::InvalidTriple(triple.to_string()));
                }
                let wanted = normalize_arch(triple);
                image
                    .slices
                    .iter()
                    .find(|slice| normalize_arch(slice) == wanted)
                    .cloned()
                    .ok_or_else(|| EngineError::Mismatch {
                        path: path.to_path_buf(),
                        found: image.slices.join(","),
                        requested: triple.to_string(),
                    })?
            }
        };
        let triple = match requested {
            Some(t) if t.contains('-') => t.to_string(),
            _ => format!("{arch}-{}", image.vendor_os),
        };

        let platform = match request.platform.as_deref().filter(|p| !p.is_empty()) {
            Some(name) if KNOWN_PLATFORMS.contains(&name) => name.to_string(),
            Some(name) => return Err(EngineError::UnknownPlatform(name.to_string())),
            None => default_platform(image.format).to_string(),
        };

        let dependents = if request.add_dependent_modules && image.format == ObjectFormat::Elf {
            let bytes = std::fs::read(path).map_err(|e| unloadable(path, e.to_string()))?;
            resolve_dependents(path, elf_needed(&bytes))
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), %triple, %platform, "loaded module");
        Ok(ModuleInfo {
            path: path.to_path_buf(),
            triple,
            format: image.format,
            platform,
            dependents,
        })
    }

    fn handle_command(&self, request: &CommandRequest) -> CommandReturn {
        let mut words = request.line.split_whitespace();
        match words.next() {
            None => CommandReturn::default(),
            Some("help") => CommandReturn::success(
                "Debugger commands:\n  help     -- Show this list.\n  version  -- Show the debugger version.\n  quit     -- Quit the debugger.\n",
            ),
            Some("version") => CommandReturn::success(format!("{}\n", crate::version_string())),
            Some("quit" | "q" | "exit") => CommandReturn {
                status: ReturnStatus::Quit,
                ..CommandReturn::default()
            },
            Some(other) => {
                CommandReturn::failure(format!("error: '{other}' is not a valid command.\n"))
            }
        }
    }

    fn select_platform(&self, name: &str) -> Result<(), EngineError> {
        if !KNOWN_PLATFORMS.contains(&name) {
            return Err(EngineError::UnknownPlatform(name.to_string()));
        }
        let mut state = self.lock();
        if state.platform != name {
            state.platform = name.to_string();
            state.sdk_root = None;
        }
        Ok(())
    }

    fn set_platform_sdk_root(&self, path: &Path) -> Result<(), EngineError> {
        if !path.is_dir() {
            return Err(EngineError::BadSdkRoot(path.to_path_buf()));
        }
        self.lock().sdk_root = Some(path.to_path_buf());
        Ok(())
    }

    fn shutdown(&self) {
        self.lock().sink = None;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal 64-bit little-endian ELF header for `machine`.
    pub(crate) fn elf_header(machine: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; 64];
        bytes[..4].copy_from_slice(b"\x7fELF");
        bytes[4] = 2;
        bytes[5] = 1;
        bytes[6] = 1;
        bytes[18..20].copy_from_slice(&machine.to_le_bytes());
        bytes
    }

    #[test]
    fn identifies_elf() {
        let image = identify(&elf_header(0x3e)).unwrap();
        assert_eq!(image.format, ObjectFormat::Elf);
        assert_eq!(image.slices, vec!["x86_64"]);
    }

    #[test]
    fn identifies_thin_macho() {
        let mut bytes = vec![0u8; 32];
        bytes[..4].copy_from_slice(&0xfeed_facf_u32.to_le_bytes());
        bytes[4..8].copy_from_slice(&0x0100_000c_u32.to_le_bytes());
        let image = identify(&bytes).unwrap();
        assert_eq!(image.format, ObjectFormat::MachO);
        assert_eq!(image.slices, vec!["aarch64"]);
    }

    #[test]
    fn identifies_universal_macho() {
        let mut bytes = vec![0u8; 64];
        bytes[..4].copy_from_slice(&0xcafe_babe_u32.to_be_bytes());
        bytes[4..8].copy_from_slice(&2u32.to_be_bytes());
        bytes[8..12].copy_from_slice(&0x0100_0007_u32.to_be_bytes());
        bytes[28..32].copy_from_slice(&0x0100_000c_u32.to_be_bytes());
        let image = identify(&bytes).unwrap();
        assert_eq!(image.slices, vec!["x86_64", "aarch64"]);
    }

    #[test]
    fn identifies_pe() {
        let mut bytes = vec![0u8; 0x90];
        bytes[..2].copy_from_slice(b"MZ");
        bytes[0x3c..0x40].copy_from_slice(&0x80u32.to_le_bytes());
        bytes[0x80..0x84].copy_from_slice(b"PE\0\0");
        bytes[0x84..0x86].copy_from_slice(&0x8664u16.to_le_bytes());
        let image = identify(&bytes).unwrap();
        assert_eq!(image.format, ObjectFormat::Pe);
        assert_eq!(image.slices, vec!["x86_64"]);
    }

    #[test]
    fn rejects_unknown_bytes() {
        assert!(identify(b"#!/bin/sh\necho hi\n").is_none());
        assert!(identify(&[]).is_none());
    }

    #[test]
    fn reads_dt_needed() {
        // One PT_LOAD covering the file, one PT_DYNAMIC with NEEDED/STRTAB.
        let mut image = elf_header(0x3e);
        image.resize(0x200, 0);
        image[0x20..0x28].copy_from_slice(&64u64.to_le_bytes());
        image[0x36..0x38].copy_from_slice(&56u16.to_le_bytes());
        image[0x38..0x3a].copy_from_slice(&2u16.to_le_bytes());

        let load = 64;
        image[load..load + 4].copy_from_slice(&1u32.to_le_bytes());
        image[load + 8..load + 16].copy_from_slice(&0u64.to_le_bytes());
        image[load + 16..load + 24].copy_from_slice(&0x1000u64.to_le_bytes());
        image[load + 32..load + 40].copy_from_slice(&0x200u64.to_le_bytes());

        let dynamic = 64 + 56;
        image[dynamic..dynamic + 4].copy_from_slice(&2u32.to_le_bytes());
        image[dynamic + 8..dynamic + 16].copy_from_slice(&0x100u64.to_le_bytes());
        image[dynamic + 32..dynamic + 40].copy_from_slice(&48u64.to_le_bytes());

        let entries: [(u64, u64); 3] = [(1, 1), (5, 0x1180), (0, 0)];
        for (i, (tag, value)) in entries.iter().enumerate() {
            let at = 0x100 + i * 16;
            image[at..at + 8].copy_from_slice(&tag.to_le_bytes());
            image[at + 8..at + 16].copy_from_slice(&value.to_le_bytes());
        }
        image[0x181..0x18a].copy_from_slice(b"libc.so.6");

        assert_eq!(elf_needed(&image), vec!["libc.so.6"]);
    }

    #[test]
    fn hostile_offsets_yield_no_dependents() {
        let mut image = elf_header(0x3e);
        image[0x20..0x28].copy_from_slice(&(u64::MAX - 2).to_le_bytes());
        image[0x36..0x38].copy_from_slice(&56u16.to_le_bytes());
        image[0x38..0x3a].copy_from_slice(&1u16.to_le_bytes());
        assert!(elf_needed(&image).is_empty());

        // Program header in range, but its segment offsets wrap.
        image.resize(64 + 56, 0);
        image[0x20..0x28].copy_from_slice(&64u64.to_le_bytes());
        image[64..68].copy_from_slice(&2u32.to_le_bytes());
        image[72..80].copy_from_slice(&u64::MAX.to_le_bytes());
        image[96..104].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(elf_needed(&image).is_empty());

        image[64..68].copy_from_slice(&1u32.to_le_bytes());
        image[80..88].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(elf_needed(&image).is_empty());
    }

    #[test]
    fn hostile_pe_offset_is_rejected() {
        let mut bytes = vec![0u8; 0x40];
        bytes[..2].copy_from_slice(b"MZ");
        bytes[0x3c..0x40].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(identify(&bytes).is_none());
    }

    #[test]
    fn known_arch_check() {
        assert!(is_known_arch("x86_64-unknown-linux-gnu"));
        assert!(is_known_arch("arm64"));
        assert!(!is_known_arch("bogus-none"));
    }

    #[test]
    fn builtin_commands() {
        let engine = HostEngine::new();
        let run = |line: &str| {
            engine.handle_command(&CommandRequest {
                line: line.to_string(),
                selected_target: None,
                async_mode: false,
            })
        };
        assert_eq!(run("quit").status, ReturnStatus::Quit);
        assert!(run("version").output.contains(env!("CARGO_PKG_VERSION")));
        assert_eq!(run("frobnicate").status, ReturnStatus::Failed);
        assert_eq!(run("   ").status, ReturnStatus::Success);
    }

    #[test]
    fn platform_validation() {
        let engine = HostEngine::new();
        assert!(engine.select_platform("linux").is_ok());
        assert!(engine.select_platform("amiga").is_err());
        assert!(engine.set_platform_sdk_root(Path::new("/definitely/not/here")).is_err());
        assert!(engine.set_platform_sdk_root(&std::env::temp_dir()).is_ok());
        assert_eq!(engine.sdk_root(), Some(std::env::temp_dir()));
    }
}
