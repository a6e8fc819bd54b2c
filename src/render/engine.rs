//! Recursive walk of the filename tree into the output directory.

use super::delims::translate;
use crate::{
    ctx::Ctx,
    db::Database,
    pool::Pool,
    tree::{Branch, Node},
    util,
};
use anyhow::{Context, Result};
use serde_json::json;
use std::{
    fs,
    path::{Component, Path},
};

pub struct Renderer<'a> {
    ctx: &'a Ctx,
    pool: &'a Pool,
    db: &'a Database,
}

impl<'a> Renderer<'a> {
    pub fn new(ctx: &'a Ctx, pool: &'a Pool, db: &'a Database) -> Self {
        Self { ctx, pool, db }
    }

    /// Create `out` entries for every node of `tree`.
    pub fn render(&self, out: &Path, tree: &Branch) -> Result<()> {
        for (name, node) in tree {
            let to = out.join(name);
            match node {
                Node::Branch(children) => {
                    fs::create_dir_all(&to)
                        .with_context(|| format!("create {}", to.display()))?;
                    self.render(&to, children)?;
                }
                Node::Leaf(from) => match name.strip_suffix(&self.ctx.template_ext) {
                    Some(stem) if !stem.is_empty() => {
                        log::info!("render {} -> {}", from.display(), out.join(stem).display());
                        self.render_file(from, &out.join(stem))?;
                    }
                    _ => {
                        log::info!("copy {} -> {}", from.display(), to.display());
                        copy_file(from, &to)?;
                    }
                },
            }
        }
        Ok(())
    }

    /// Compile `from` with the alternate delimiters on a fork of the pool and
    /// write the result to `to`.
    fn render_file(&self, from: &Path, to: &Path) -> Result<()> {
        let src =
            fs::read_to_string(from).with_context(|| format!("read template {}", from.display()))?;
        let (left, right) = &self.ctx.delims;
        let native = translate(&src, left, right)
            .with_context(|| format!("parse template {}", from.display()))?;

        // Keyed by absolute path so it can't shadow a fragment name.
        let name = from.to_string_lossy();
        let mut pool = self.pool.fork();
        pool.add_template(&name, &native)
            .with_context(|| format!("parse template {}", from.display()))?;

        self.set_current(from, to);
        let rendered = pool.render(&name, &json!({"db": self.db.snapshot()}))?;

        util::write_file(to, rendered)
    }

    /// Publish the per-file fields under `db.cur`.
    fn set_current(&self, from: &Path, to: &Path) {
        let rel = from.strip_prefix(&self.ctx.input_dir).unwrap_or(from);
        let rel = normal_segments(rel).join("/");
        let id = rel.strip_suffix(&self.ctx.template_ext).unwrap_or(&rel);

        let base = to
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.db.set(
            "cur",
            json!({
                "ext": all_extensions(&base),
                "id": id,
                "path": normal_segments(to),
                "base": base,
            }),
        );
    }
}

/// Byte-for-byte copy with the fixed output mode.
fn copy_file(from: &Path, to: &Path) -> Result<()> {
    let bytes = fs::read(from).with_context(|| format!("read {}", from.display()))?;
    util::write_file(to, bytes)
}

fn normal_segments(p: &Path) -> Vec<String> {
    p.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Every extension of a file name: `a.tar.gz` -> `.tar.gz`.
fn all_extensions(base: &str) -> &str {
    let dots = base.len() - base.trim_start_matches('.').len();
    base[dots..].find('.').map_or("", |i| &base[dots + i..])
}
