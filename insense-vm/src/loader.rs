//! Program lookup: component name → bytecode image.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::consts::{COMPONENT_FILE_PREFIX, COMPONENT_FILE_SUFFIX};
use crate::error::VmError;

/// Resolves component names to bytecode images.
///
/// The interpreter never touches the filesystem directly; `CALL` goes
/// through this seam, so tests run whole programs from memory.
pub trait ProgramSource: Send + Sync {
    /// Loads the bytecode image of the named component.
    fn load(&self, component: &str) -> Result<Arc<[u8]>, VmError>;
}

impl std::fmt::Debug for dyn ProgramSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProgramSource")
    }
}

/// The on-disk file name of a component: `Insense_<name>.isc`.
pub fn component_file_name(component: &str) -> String {
    format!("{COMPONENT_FILE_PREFIX}{component}{COMPONENT_FILE_SUFFIX}")
}

/// A program directory holding one `Insense_<name>.isc` file per component.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    /// Creates a source over a program directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory this source reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ProgramSource for DirectorySource {
    fn load(&self, component: &str) -> Result<Arc<[u8]>, VmError> {
        let path = self.dir.join(component_file_name(component));
        info!(component, path = %path.display(), "loading component");
        let bytes = fs::read(&path).map_err(|source| VmError::ComponentNotFound {
            name: component.to_string(),
            source,
        })?;
        Ok(Arc::from(bytes.into_boxed_slice()))
    }
}

/// An in-memory program set keyed by component name.
#[derive(Debug, Default)]
pub struct MemorySource {
    programs: HashMap<String, Arc<[u8]>>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component program.
    pub fn insert(&mut self, component: impl Into<String>, bytes: Vec<u8>) {
        self.programs
            .insert(component.into(), Arc::from(bytes.into_boxed_slice()));
    }

    /// Builder-style [`MemorySource::insert`].
    pub fn with(mut self, component: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(component, bytes);
        self
    }
}

impl ProgramSource for MemorySource {
    fn load(&self, component: &str) -> Result<Arc<[u8]>, VmError> {
        self.programs
            .get(component)
            .cloned()
            .ok_or_else(|| VmError::ComponentNotFound {
                name: component.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    component_file_name(component),
                ),
            })
    }
}
