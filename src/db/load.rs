//! Load the root data file and merge the data directory into it.

use super::store;
use crate::{ctx::Ctx, error::DbError};
use anyhow::{Context, Result};
use serde_json::{Map, Number, Value};
use std::{
    fs,
    path::{Component, Path},
};
use walkdir::WalkDir;

/// Build the merged database for `ctx.input_dir`.
pub fn load(ctx: &Ctx) -> Result<Map<String, Value>> {
    let mut db = match parse_file(&ctx.db_file)? {
        Value::Object(m) => m,
        _ => {
            return Err(DbError::NotAMapping {
                path: ctx.db_file.clone(),
            }
            .into());
        }
    };

    if !ctx.db_dir.is_dir() {
        log::debug!("no data directory at {}", ctx.db_dir.display());
        return Ok(db);
    }

    for entry in WalkDir::new(&ctx.db_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", ctx.db_dir.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let y = parse_file(path)?;
        let xs = fragment_address(&ctx.db_dir, path)?;
        store(&mut db, &xs, y).with_context(|| format!("store {}", path.display()))?;
    }

    Ok(db)
}

/// Address of a fragment: its path below `db_dir`, extension stripped.
fn fragment_address(db_dir: &Path, path: &Path) -> Result<Vec<String>> {
    let rel = path.strip_prefix(db_dir)?.with_extension("");
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s),
            _ => None,
        })
        .map(|s| {
            s.to_str()
                .map(str::to_owned)
                .with_context(|| format!("non UTF-8 file name: {}", path.display()))
        })
        .collect()
}

/// Read and parse one data file, dispatching on its extension.
pub fn parse_file(path: &Path) -> Result<Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !matches!(ext, "json" | "toml") {
        return Err(DbError::UnsupportedFormat {
            ext: format!(".{ext}"),
            path: path.to_path_buf(),
        }
        .into());
    }

    let src = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;

    match ext {
        "toml" => {
            let table: toml::Value =
                toml::from_str(&src).with_context(|| format!("parse {}", path.display()))?;
            Ok(toml_to_json(table))
        }
        _ => serde_json::from_str(&src).with_context(|| format!("parse {}", path.display())),
    }
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(Number::from(i)),
        toml::Value::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(xs) => Value::Array(xs.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::Options;
    use serde_json::json;

    fn ctx(root: &Path) -> Ctx {
        Ctx::new(root, Path::new("/unused"), &Options::default())
    }

    #[test]
    fn root_file_and_fragments() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("db/b")).unwrap();
        fs::write(root.join("db.json"), r#"{"a": 1}"#).unwrap();
        fs::write(root.join("db/b/c.json"), r#"{"x": 1, "y": 2}"#).unwrap();

        let db = load(&ctx(root)).unwrap();
        assert_eq!(Value::Object(db), json!({"a": 1, "b": {"c": {"x": 1, "y": 2}}}));
    }

    #[test]
    fn toml_fragments_merge_into_json_ones() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("db/site")).unwrap();
        fs::write(root.join("db.json"), r#"{"site": {"links": {"x": 1, "y": 2}}}"#).unwrap();
        fs::write(
            root.join("db/site/links.toml"),
            "y = 3\nz = 4\nwhen = 2024-01-02T03:04:05Z\n",
        )
        .unwrap();

        let db = load(&ctx(root)).unwrap();
        assert_eq!(
            db["site"]["links"],
            json!({"x": 1, "y": 3, "z": 4, "when": "2024-01-02T03:04:05Z"})
        );
    }

    #[test]
    fn missing_data_directory_is_fine() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("db.json"), r#"{"a": [1, 2]}"#).unwrap();

        let db = load(&ctx(tmp.path())).unwrap();
        assert_eq!(db["a"], json!([1, 2]));
    }

    #[test]
    fn missing_root_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load(&ctx(tmp.path())).is_err());
    }

    #[test]
    fn unsupported_extension_is_named() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("db")).unwrap();
        fs::write(root.join("db.json"), "{}").unwrap();
        fs::write(root.join("db/notes.yaml"), "a: 1").unwrap();

        let err = load(&ctx(root)).unwrap_err();
        let kind = err.downcast_ref::<DbError>().unwrap();
        assert!(matches!(kind, DbError::UnsupportedFormat { ext, .. } if ext == ".yaml"));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("db.json"), "{ nope").unwrap();

        let err = load(&ctx(root)).unwrap_err();
        assert!(format!("{err:#}").contains("db.json"));
    }

    #[test]
    fn root_must_be_a_mapping() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("db.json"), "[1]").unwrap();

        let err = load(&ctx(tmp.path())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::NotAMapping { .. })
        ));
    }
}
