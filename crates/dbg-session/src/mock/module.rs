//! Registered mock modules.

use std::path::{Path, PathBuf};

use crate::engine::{EngineError, ModuleInfo, ModuleRequest, ObjectFormat};
use crate::engine::host::{KNOWN_PLATFORMS, is_known_arch};
use crate::target::normalize_arch;

/// What the mock engine reports for a registered path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockModule {
    /// Architecture triples contained in the file. The first is the default.
    pub triples: Vec<String>,
    /// Container format.
    pub format: ObjectFormat,
    /// Platform reported when none is requested.
    pub platform: String,
    /// Dependent modules reported when requested.
    pub dependents: Vec<PathBuf>,
}

impl MockModule {
    /// A Linux ELF module with one architecture.
    #[must_use]
    pub fn new(triple: impl Into<String>) -> Self {
        Self {
            triples: vec![triple.into()],
            format: ObjectFormat::Elf,
            platform: "linux".to_string(),
            dependents: Vec::new(),
        }
    }

    /// Add another architecture slice.
    #[must_use]
    pub fn slice(mut self, triple: impl Into<String>) -> Self {
        self.triples.push(triple.into());
        self
    }

    /// Set the container format.
    #[must_use]
    pub const fn format(mut self, format: ObjectFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the default platform.
    #[must_use]
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Add a dependent module.
    #[must_use]
    pub fn dependent(mut self, path: impl Into<PathBuf>) -> Self {
        self.dependents.push(path.into());
        self
    }

    /// Resolve a load request against this module.
    pub(crate) fn load(&self, path: &Path, request: &ModuleRequest) -> Result<ModuleInfo, EngineError> {
        let triple = match request.triple.as_deref().filter(|t| !t.is_empty()) {
            None => self
                .triples
                .first()
                .cloned()
                .ok_or_else(|| EngineError::Unloadable {
                    path: path.to_path_buf(),
                    reason: "module has no architectures".to_string(),
                })?,
            Some(requested) => {
                if !is_known_arch(requested) {
                    return Err(EngineError::InvalidTriple(requested.to_string()));
                }
                let wanted = normalize_arch(requested);
                self.triples
                    .iter()
                    .find(|t| normalize_arch(t) == wanted)
                    .cloned()
                    .ok_or_else(|| EngineError::Mismatch {
                        path: path.to_path_buf(),
                        found: self.triples.join(","),
                        requested: requested.to_string(),
                    })?
            }
        };
        let platform = match request.platform.as_deref().filter(|p| !p.is_empty()) {
            Some(name) if KNOWN_PLATFORMS.contains(&name) => name.to_string(),
            Some(name) => return Err(EngineError::UnknownPlatform(name.to_string())),
            None => self.platform.clone(),
        };
        Ok(ModuleInfo {
            path: path.to_path_buf(),
            triple,
            format: self.format,
            platform,
            dependents: if request.add_dependent_modules {
                self.dependents.clone()
            } else {
                Vec::new()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(triple: Option<&str>, platform: Option<&str>) -> ModuleRequest {
        ModuleRequest {
            path: PathBuf::from("/bin/app"),
            triple: triple.map(String::from),
            platform: platform.map(String::from),
            add_dependent_modules: true,
        }
    }

    #[test]
    fn picks_matching_slice() {
        let module = MockModule::new("x86_64-apple-macosx")
            .slice("arm64-apple-macosx")
            .format(ObjectFormat::MachO)
            .platform("macosx");
        let info = module
            .load(Path::new("/bin/app"), &request(Some("aarch64"), None))
            .unwrap();
        assert_eq!(info.triple, "arm64-apple-macosx");
        assert_eq!(info.platform, "macosx");
    }

    #[test]
    fn rejects_missing_slice_and_bad_platform() {
        let module = MockModule::new("x86_64-unknown-linux");
        assert!(matches!(
            module.load(Path::new("/bin/app"), &request(Some("aarch64"), None)),
            Err(EngineError::Mismatch { .. })
        ));
        assert!(matches!(
            module.load(Path::new("/bin/app"), &request(Some("vax"), None)),
            Err(EngineError::InvalidTriple(_))
        ));
        assert!(matches!(
            module.load(Path::new("/bin/app"), &request(None, Some("amiga"))),
            Err(EngineError::UnknownPlatform(_))
        ));
    }

    #[test]
    fn dependents_only_when_requested() {
        let module = MockModule::new("x86_64-unknown-linux").dependent("/lib/libc.so.6");
        let mut req = request(None, None);
        assert_eq!(module.load(Path::new("/bin/app"), &req).unwrap().dependents.len(), 1);
        req.add_dependent_modules = false;
        assert!(module.load(Path::new("/bin/app"), &req).unwrap().dependents.is_empty());
    }
}
