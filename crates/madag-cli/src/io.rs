//! File reading/writing with size enforcement, and the extension-based
//! dispatch to the right `madag_core::formats` adapter.
//!
//! This module is the single entry point for all filesystem I/O in the
//! `madag` binary; `madag-core` never touches the filesystem.
use std::path::{Path, PathBuf};

use madag_core::Dag;
use madag_core::formats::{dagbin, fasta, json, protobuf};
use madag_core::reference::Reference;

use crate::error::CliError;

fn read_file(path: &Path, max_size: u64) -> Result<Vec<u8>, CliError> {
    let file_size = std::fs::metadata(path).map_err(|e| io_error_to_cli(&e, path))?.len();
    if file_size > max_size {
        return Err(CliError::IoError {
            source: path.display().to_string(),
            detail: format!("file is {file_size} bytes, limit is {max_size} bytes"),
        });
    }
    std::fs::read(path).map_err(|e| io_error_to_cli(&e, path))
}

fn io_error_to_cli(e: &std::io::Error, path: &Path) -> CliError {
    match e.kind() {
        std::io::ErrorKind::NotFound => CliError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => CliError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => CliError::IoError {
            source: path.display().to_string(),
            detail: e.to_string(),
        },
    }
}

/// The DAG file formats this CLI understands by extension.
///
/// Legacy protobuf tree (Newick plus dfs-ordered mutations) is not
/// wired into this dispatcher: the core adapter's `parse`/`write` operate on
/// already-decomposed `(newick, mutations_dfs)` components rather than a
/// single self-contained blob, so there is no one file to seek by extension
/// here. Callers that need it go through `madag_core::formats::protobuf::tree`
/// directly; see `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DagFormat {
    /// `.dagbin` / `.bin` — the self-describing binary container.
    Dagbin,
    /// `.json` — the JSON DAG document.
    Json,
    /// `.pb` — the legacy flat-record protobuf DAG.
    ProtobufDag,
}

/// Infers a [`DagFormat`] from a path's extension.
pub fn format_for_path(path: &Path) -> Result<DagFormat, CliError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "dagbin" | "bin" => Ok(DagFormat::Dagbin),
        "json" => Ok(DagFormat::Json),
        "pb" => Ok(DagFormat::ProtobufDag),
        _ => Err(CliError::UnknownExtension {
            path: path.to_path_buf(),
        }),
    }
}

/// Loads a DAG from `path`, dispatching on its extension.
pub fn load_dag(path: &Path, max_size: u64) -> Result<Dag, CliError> {
    let format = format_for_path(path)?;
    let bytes = read_file(path, max_size)?;
    match format {
        DagFormat::Dagbin => dagbin::read(&bytes).map_err(CliError::from),
        DagFormat::ProtobufDag => protobuf::dag::read(&bytes).map_err(CliError::from),
        DagFormat::Json => {
            let text = bytes_to_string(&bytes, &path.display().to_string())?;
            json::load(&text).map_err(CliError::from)
        }
    }
}

/// Saves `dag` to `path`, dispatching on its extension.
pub fn save_dag(dag: &Dag, path: &Path) -> Result<(), CliError> {
    let format = format_for_path(path)?;
    let bytes = match format {
        DagFormat::Dagbin => dagbin::write(dag).map_err(CliError::from)?,
        DagFormat::ProtobufDag => protobuf::dag::write(dag).map_err(CliError::from)?,
        DagFormat::Json => json::save(dag).map_err(CliError::from)?.into_bytes(),
    };
    std::fs::write(path, bytes).map_err(|e| io_error_to_cli(&e, path))
}

/// Loads a reference sequence from a FASTA file.
pub fn load_reference(path: &Path, max_size: u64) -> Result<Reference, CliError> {
    let bytes = read_file(path, max_size)?;
    let text = bytes_to_string(&bytes, &path.display().to_string())?;
    fasta::parse(&text).map_err(CliError::from)
}

fn bytes_to_string(bytes: &[u8], source_label: &str) -> Result<String, CliError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| CliError::InputFormat {
        source: source_label.to_owned(),
        detail: format!("invalid UTF-8 at byte offset {}", e.utf8_error().valid_up_to()),
    })
}

/// Reads an entire text file, enforcing `max_size` and UTF-8 validity.
pub fn read_text_file(path: &Path, max_size: u64) -> Result<String, CliError> {
    let bytes = read_file(path, max_size)?;
    bytes_to_string(&bytes, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use std::io::Write as _;

    use super::*;

    fn temp_file_with(suffix: &str, contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(format!("fixture.{suffix}"));
        let mut f = std::fs::File::create(&path).expect("create temp file");
        f.write_all(contents).expect("write temp file");
        (dir, path)
    }

    #[test]
    fn format_for_path_recognizes_known_extensions() {
        assert_eq!(format_for_path(Path::new("x.json")).expect("known"), DagFormat::Json);
        assert_eq!(format_for_path(Path::new("x.dagbin")).expect("known"), DagFormat::Dagbin);
        assert_eq!(format_for_path(Path::new("x.bin")).expect("known"), DagFormat::Dagbin);
        assert_eq!(format_for_path(Path::new("x.pb")).expect("known"), DagFormat::ProtobufDag);
    }

    #[test]
    fn format_for_path_rejects_unknown_extension() {
        assert!(format_for_path(Path::new("x.xyz")).is_err());
    }

    #[test]
    fn load_dag_roundtrips_through_dagbin() {
        let dag = madag_core::formats::json::tiny_fixture_dag();
        let bytes = dagbin::write(&dag).expect("serializes");
        let (_dir, path) = temp_file_with("dagbin", &bytes);
        let loaded = load_dag(&path, 1 << 20).expect("round-trips");
        assert_eq!(loaded.node_count(), dag.node_count());
    }

    #[test]
    fn load_dag_roundtrips_through_json() {
        let dag = madag_core::formats::json::tiny_fixture_dag();
        let text = json::save(&dag).expect("serializes");
        let (_dir, path) = temp_file_with("json", text.as_bytes());
        let loaded = load_dag(&path, 1 << 20).expect("round-trips");
        assert_eq!(loaded.node_count(), dag.node_count());
    }

    #[test]
    fn save_dag_then_load_dag_roundtrips() {
        let dag = madag_core::formats::json::tiny_fixture_dag();
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("out.json");
        save_dag(&dag, &path).expect("saves");
        let loaded = load_dag(&path, 1 << 20).expect("loads");
        assert_eq!(loaded.edge_count(), dag.edge_count());
    }

    #[test]
    fn read_file_over_limit_is_an_io_error() {
        let (_dir, path) = temp_file_with("json", b"0123456789");
        let err = read_file(&path, 4).expect_err("should fail");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn read_nonexistent_file_is_file_not_found() {
        let err = read_file(Path::new("/no/such/file/ever.json"), 1024).expect_err("should fail");
        assert!(matches!(err, CliError::FileNotFound { .. }));
    }
}
