//! Filename tree: the input directory's shape, minus database sources.

use crate::{ctx::Ctx, error::TreeError};
use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

/// One level of the tree, keyed by path segment.
pub type Branch = BTreeMap<String, Node>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Branch(Branch),
    /// Absolute path of the source file.
    Leaf(PathBuf),
}

/// Walk `ctx.input_dir` and build the tree of everything that reaches the output.
pub fn build(ctx: &Ctx) -> Result<Branch> {
    let root = &ctx.input_dir;
    let mut tree = Branch::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !ctx.is_db_source(e.path()) && e.path() != ctx.output_dir);

    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        let rel = entry.path().strip_prefix(root)?;
        let segs = segments(rel)?;
        insert(&mut tree, &segs, entry.file_type().is_dir(), entry.path())?;
    }

    Ok(tree)
}

/// Split a relative path into UTF-8 segments.
fn segments(rel: &Path) -> Result<Vec<String>> {
    rel.components()
        .map(|c| match c {
            Component::Normal(s) => s
                .to_str()
                .map(str::to_owned)
                .with_context(|| format!("non UTF-8 file name: {}", rel.display())),
            _ => Err(TreeError::Invariant(format!(
                "unexpected path component in {}",
                rel.display()
            ))
            .into()),
        })
        .collect()
}

/// Insert one walked entry. Directories become (possibly empty) branches,
/// files become leaves.
fn insert(
    tree: &mut Branch,
    segs: &[String],
    is_dir: bool,
    abs: &Path,
) -> Result<(), TreeError> {
    let Some((last, parents)) = segs.split_last() else {
        return Err(TreeError::Invariant("empty relative path".into()));
    };

    let mut p = tree;
    for seg in parents {
        let node = p
            .entry(seg.clone())
            .or_insert_with(|| Node::Branch(Branch::new()));
        p = match node {
            Node::Branch(b) => b,
            Node::Leaf(_) => {
                return Err(TreeError::Invariant(format!(
                    "{} is both a file and a directory",
                    abs.display()
                )));
            }
        };
    }

    let existing_branch = p.get(last).map(|n| matches!(n, Node::Branch(_)));
    match (existing_branch, is_dir) {
        (None, true) => {
            p.insert(last.clone(), Node::Branch(Branch::new()));
        }
        (None, false) => {
            p.insert(last.clone(), Node::Leaf(abs.to_path_buf()));
        }
        (Some(true), true) => {}
        (Some(_), _) => {
            return Err(TreeError::Invariant(format!(
                "{} inserted twice",
                abs.display()
            )));
        }
    }

    Ok(())
}
