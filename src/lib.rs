//! `dirtmpl`: compile an input directory into an output directory.
//!
//! Files ending in the template suffix are rendered (suffix stripped) against
//! a database merged from `db.json` and the `db/` directory, with every
//! fragment of `templates/` callable as a function. Everything else is copied
//! as is; database sources are left out.

pub mod ctx;
pub mod db;
pub mod error;
pub mod pool;
pub mod render;
pub mod tree;
pub mod util;

use anyhow::{Context, Result};
use ctx::Ctx;
use db::Database;
use pool::Pool;

/// Run one compilation. The output directory must already exist.
pub fn compile(ctx: &Ctx) -> Result<()> {
    let db = Database::new(db::load::load(ctx).context("load database")?);
    let pool = Pool::build(ctx, &db).context("load templates")?;
    let tree = tree::build(ctx).context("list input files")?;

    if log::log_enabled!(log::Level::Debug) {
        log::debug!(
            "db = {}",
            serde_json::to_string_pretty(&db.snapshot()).unwrap_or_default()
        );
        log::debug!("tree = {tree:#?}");
        log::debug!("template functions: {:?}", pool.functions().collect::<Vec<_>>());
    }

    render::render_all(ctx, &tree, &pool, &db)
}
