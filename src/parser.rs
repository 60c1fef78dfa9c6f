//! Schema file loader
//!
//! Entity types are defined one per file, the type name taken from the
//! file stem: `Bank.json` defines type `Bank`. [`parse_directory`] walks a
//! tree of such files and [`load_registry`] turns the lot into a
//! [`TypeRegistry`] ready for validation.

use std::fs;
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};
use crate::models::RawEntityDef;
use crate::registry::TypeRegistry;

/// Extension recognised as a schema definition
const SCHEMA_EXTENSION: &str = "json";

/// Parse a single schema file into its type name and raw definition
pub fn parse_file(path: &Path) -> SchemaResult<(String, RawEntityDef)> {
    let content = fs::read_to_string(path)?;
    let raw: RawEntityDef =
        serde_json::from_str(&content).map_err(|e| SchemaError::InvalidSchema {
            file: path.to_path_buf(),
            message: format_schema_error(&e),
        })?;

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok((name, raw))
}

/// Parse every schema file in a directory recursively
///
/// Results are sorted by type name so downstream registration and
/// reporting are deterministic regardless of filesystem order.
pub fn parse_directory(dir: &Path) -> SchemaResult<Vec<(String, RawEntityDef)>> {
    if !dir.is_dir() {
        return Err(SchemaError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut defs = Vec::new();
    parse_directory_recursive(dir, &mut defs)?;
    defs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(defs)
}

fn parse_directory_recursive(
    current: &Path,
    defs: &mut Vec<(String, RawEntityDef)>,
) -> SchemaResult<()> {
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            // Skip hidden directories
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(false);
            if !hidden {
                parse_directory_recursive(&path, defs)?;
            }
        } else if path.extension().map(|e| e == SCHEMA_EXTENSION).unwrap_or(false) {
            defs.push(parse_file(&path)?);
        }
    }

    Ok(())
}

/// Parse a directory and register everything into a fresh registry.
/// The registry is returned unvalidated; callers run
/// [`TypeRegistry::validate`] (or build a database) next.
pub fn load_registry(dir: &Path) -> SchemaResult<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    for (name, raw) in parse_directory(dir)? {
        registry.register_raw(&name, raw)?;
    }
    Ok(registry)
}

fn format_schema_error(err: &serde_json::Error) -> String {
    if err.line() > 0 {
        format!("line {}, column {}: {err}", err.line(), err.column())
    } else {
        err.to_string()
    }
}
