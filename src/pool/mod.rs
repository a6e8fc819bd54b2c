//! Template function pool.
//!
//! A handlebars registry holding the built-in helpers and every fragment
//! from the templates directory. Each fragment is also promoted to a helper
//! named after its file, suffix stripped: `templates/header.tmpl` can be
//! used as a partial or called as `{{header "fr"}}`, the latter
//! rendering it against `{"db": <db>, "args": ["fr"]}`.
//!
//! Helpers always run against the registry that invoked them, so a
//! [`Pool::fork`] with extra templates sees its own additions while the
//! canonical pool stays untouched.

mod helpers;
mod run;

use crate::{ctx::Ctx, db::Database};
use anyhow::{Context, Result};
use handlebars::{
    Context as HbsContext, Handlebars, Helper, HelperDef, RenderContext, RenderError, ScopedJson,
};
use serde_json::{Value, json};
use std::{collections::BTreeMap, path::Path};
use walkdir::WalkDir;

/// Helpers shipped by the engine itself; fragments may not shadow them.
const ENGINE_HELPERS: &[&str] = &[
    "if", "unless", "each", "with", "lookup", "raw", "log", "eq", "ne", "gt", "gte", "lt", "lte",
    "and", "or", "not", "len",
];

#[derive(Clone)]
pub struct Pool {
    registry: Handlebars<'static>,
    /// Promoted function name -> fragment template name.
    functions: BTreeMap<String, String>,
    db: Database,
}

impl Pool {
    /// Register built-ins, then load and promote every fragment.
    pub fn build(ctx: &Ctx, db: &Database) -> Result<Self> {
        let scope = helpers::Scope {
            root: ctx.input_dir.clone(),
            db: db.clone(),
            ids_key: ctx.ids_key.clone(),
            search_path: ctx.search_path.clone(),
        };

        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(ctx.strict);
        for &(name, body) in helpers::BUILTINS {
            registry.register_helper(name, Box::new(helpers::Builtin::new(name, body, scope.clone())));
        }

        let mut pool = Self {
            registry,
            functions: BTreeMap::new(),
            db: db.clone(),
        };
        pool.load_fragments(&ctx.templates_dir, &ctx.template_ext)?;
        Ok(pool)
    }

    fn load_fragments(&mut self, dir: &Path, ext: &str) -> Result<()> {
        if !dir.is_dir() {
            log::debug!("no templates directory at {}", dir.display());
            return Ok(());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name = entry
                .file_name()
                .to_str()
                .with_context(|| format!("non UTF-8 file name: {}", path.display()))?
                .to_owned();
            self.registry
                .register_template_file(&name, path)
                .with_context(|| format!("parse template {}", path.display()))?;
            names.push(name);
        }

        for name in names {
            let function = name.strip_suffix(ext).unwrap_or(&name).to_owned();
            if is_reserved(&function) {
                log::warn!("template {name}: '{function}' is a built-in, not promoted");
                continue;
            }
            self.registry.register_helper(
                &function,
                Box::new(Fragment {
                    template: name.clone(),
                    db: self.db.clone(),
                }),
            );
            self.functions.insert(function, name);
        }

        Ok(())
    }

    /// Independent copy: shares compiled fragments, but templates and helpers
    /// added to the copy never reach `self`.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Compile `src` (engine syntax) under `name`.
    pub fn add_template(&mut self, name: &str, src: &str) -> Result<()> {
        self.registry
            .register_template_string(name, src)
            .with_context(|| format!("parse template {name}"))
    }

    pub fn render(&self, name: &str, data: &Value) -> Result<String> {
        self.registry
            .render(name, data)
            .with_context(|| format!("render {name}"))
    }

    /// Invoke a promoted fragment function, as `{{name args…}}` would.
    pub fn call(&self, function: &str, args: &[Value]) -> Result<String> {
        let template = self
            .functions
            .get(function)
            .with_context(|| format!("no template function '{function}'"))?;
        self.render(template, &json!({"db": self.db.snapshot(), "args": args}))
    }

    /// Names of the promoted fragment functions.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

fn is_reserved(name: &str) -> bool {
    ENGINE_HELPERS.contains(&name) || helpers::BUILTINS.iter().any(|&(n, _)| n == name)
}

/// A fragment promoted to a value-returning helper.
struct Fragment {
    template: String,
    db: Database,
}

impl HelperDef for Fragment {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        r: &'reg Handlebars<'reg>,
        _: &'rc HbsContext,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        let args: Vec<&Value> = h.params().iter().map(|p| p.value()).collect();
        let data = json!({"db": self.db.snapshot(), "args": args});
        r.render(&self.template, &data)
            .map(|s| ScopedJson::Derived(Value::String(s)))
    }
}
