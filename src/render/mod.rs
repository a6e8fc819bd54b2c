//! Output tree generation facade.

pub mod delims;
pub mod engine;

use crate::{ctx::Ctx, db::Database, pool::Pool, tree::Branch};
use anyhow::Result;

/// Mirror `tree` into `ctx.output_dir`, rendering template files on the way.
pub fn render_all(ctx: &Ctx, tree: &Branch, pool: &Pool, db: &Database) -> Result<()> {
    engine::Renderer::new(ctx, pool, db).render(&ctx.output_dir, tree)
}
