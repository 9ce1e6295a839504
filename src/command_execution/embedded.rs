// Embedded file materialization.
//
// Command templates may reference out-of-band script payloads with
// `${file::<key>}` tokens. Each referenced payload is written to a uniquely
// named temporary file so the dispatched command can point at a real path.
// The `MaterializedFiles` collection owns the backing files and removes
// them when dropped, so no exit path of an execution can leak them.

use regex::Regex;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use uuid::Uuid;

use crate::command_execution::config::SudoPolicy;
use crate::command_execution::error::{CommandError, CommandResult};
use crate::command_execution::sudo::replace_sudo;
use crate::command_execution::types::EmbeddedFile;

/// Name prefix of every temporary file created for an embedded payload
pub const EMBEDDED_TEMP_PREFIX: &str = "mihari_embedded_";

/// Injectable temporary file factory: maps an extension suffix (e.g.
/// `".bat"`, possibly empty) to a fresh unique path
pub type TempFileFactory = dyn Fn(&str) -> io::Result<PathBuf> + Send + Sync;

fn file_reference_pattern() -> Regex {
    Regex::new(r"(?i)\$\{file::(.*?)\}").expect("file reference pattern is valid")
}

/// Collaborator resolving the `${file::...}` references of a command line
/// into embedded file payloads
pub trait EmbeddedFileLookup: Send + Sync {
    /// Map every reference token present in `command_line` to its payload.
    /// Fails with a not-found IO error when a referenced file is unknown.
    fn find(&self, command_line: &str) -> CommandResult<HashMap<String, EmbeddedFile>>;
}

/// In-memory embedded file store populated from the connector definition,
/// keyed by the reference inside the token (`${file::1}` is keyed `"1"`)
#[derive(Debug, Clone, Default)]
pub struct ConnectorFileStore {
    files: HashMap<String, EmbeddedFile>,
}

impl ConnectorFileStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a payload, keyed by its reference
    pub fn insert(&mut self, file: EmbeddedFile) {
        self.files.insert(file.reference.clone(), file);
    }
}

impl FromIterator<EmbeddedFile> for ConnectorFileStore {
    fn from_iter<I: IntoIterator<Item = EmbeddedFile>>(iter: I) -> Self {
        let mut store = Self::new();
        for file in iter {
            store.insert(file);
        }
        store
    }
}

impl EmbeddedFileLookup for ConnectorFileStore {
    fn find(&self, command_line: &str) -> CommandResult<HashMap<String, EmbeddedFile>> {
        let mut found = HashMap::new();
        for caps in file_reference_pattern().captures_iter(command_line) {
            let token = &caps[0];
            let key = &caps[1];
            match self.files.get(key) {
                Some(file) => {
                    found.insert(token.to_string(), file.clone());
                }
                None => {
                    return Err(CommandError::Io(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("embedded file {key} referenced by the command is not defined"),
                    )));
                }
            }
        }
        Ok(found)
    }
}

/// A temporary file created for one embedded file reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedFile {
    /// Full reference token, e.g. `${file::1}`
    pub reference: String,
    /// Absolute path of the backing temporary file
    pub path: PathBuf,
}

/// The temporary files created for one execution. Owns the backing files:
/// dropping the collection removes them from disk.
#[derive(Debug, Default)]
pub struct MaterializedFiles {
    files: Vec<MaterializedFile>,
}

impl MaterializedFiles {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterializedFile> {
        self.files.iter()
    }

    /// Paths of every materialized file, in materialization order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Take ownership of the files without removing them from disk. After
    /// this, deleting them is the caller's responsibility.
    pub fn release(mut self) -> Vec<MaterializedFile> {
        std::mem::take(&mut self.files)
    }
}

impl Drop for MaterializedFiles {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(error) = std::fs::remove_file(&file.path) {
                if error.kind() != io::ErrorKind::NotFound {
                    log::warn!(
                        "Could not remove temporary file {}: {error}",
                        file.path.display()
                    );
                }
            }
        }
    }
}

/// Default temporary file factory: a unique name with the embedded prefix
/// under the system temp directory
pub fn default_temp_file(extension: &str) -> io::Result<PathBuf> {
    Ok(std::env::temp_dir().join(format!(
        "{EMBEDDED_TEMP_PREFIX}{}{extension}",
        Uuid::new_v4().simple()
    )))
}

/// Write every embedded file referenced by `command_line` to its own
/// temporary file, once per distinct reference. Payload content passes
/// through the sudo policy rewrite before being written, since embedded
/// shell scripts carry their own `%{SUDO:...}` tokens. On any failure the
/// files already created for this call are removed before the error
/// propagates.
pub async fn materialize_embedded_files(
    command_line: &str,
    sudo_policy: Option<&SudoPolicy>,
    files: &HashMap<String, EmbeddedFile>,
    temp_file_factory: &TempFileFactory,
) -> CommandResult<MaterializedFiles> {
    let mut materialized = MaterializedFiles::default();

    for caps in file_reference_pattern().captures_iter(command_line) {
        let reference = &caps[0];
        if materialized.files.iter().any(|f| f.reference == reference) {
            continue;
        }

        let embedded = files.get(reference).ok_or_else(|| {
            CommandError::embedded_file(format!(
                "cannot find the embedded file for reference {reference}"
            ))
        })?;
        if embedded.content.trim().is_empty() {
            return Err(CommandError::embedded_file(format!(
                "embedded file {reference} has no content"
            )));
        }

        let suffix = embedded
            .extension
            .as_deref()
            .map(|extension| format!(".{extension}"))
            .unwrap_or_default();
        let path = temp_file_factory(&suffix)?;

        // Track before writing so a failed write is cleaned up too.
        materialized.files.push(MaterializedFile {
            reference: reference.to_string(),
            path: path.clone(),
        });

        let content = replace_sudo(&embedded.content, sudo_policy);
        tokio::fs::write(&path, content.as_bytes()).await?;
    }

    Ok(materialized)
}
