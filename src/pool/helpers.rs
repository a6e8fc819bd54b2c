//! Built-in helpers available to every template.

use super::run::run;
use crate::{db::Database, error::address};
use anyhow::{Context, Result, bail, ensure};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat};
use handlebars::{
    Context as HbsContext, Handlebars, Helper, HelperDef, RenderContext, RenderError, ScopedJson,
};
use serde_json::{Value, json};
use std::{
    ffi::OsString,
    fmt::{Display, Write as _},
    fs, io,
    path::PathBuf,
};
use url::Url;

/// What helpers may reach outside their arguments.
#[derive(Clone, Debug)]
pub(crate) struct Scope {
    /// Input directory; relative helper paths resolve against it.
    pub root: PathBuf,
    pub db: Database,
    pub ids_key: String,
    pub search_path: Option<OsString>,
}

pub(crate) type Body = fn(&Scope, &Handlebars<'_>, &[&Value]) -> Result<Value>;

pub(crate) const BUILTINS: &[(&str, Body)] = &[
    ("add", add),
    ("append", append),
    ("arr", arr),
    ("contains", contains),
    ("datefmt", datefmt),
    ("exists", exists),
    ("get", get),
    ("include", include),
    ("isURL", is_url),
    ("join", join),
    ("lit", lit),
    ("now", now),
    ("parse", parse),
    ("run", run),
    ("sarr", sarr),
    ("warn", warn),
    ("wrap", wrap),
];

/// Adapts a [`Body`] to the engine's helper interface.
pub(crate) struct Builtin {
    name: &'static str,
    body: Body,
    scope: Scope,
}

impl Builtin {
    pub fn new(name: &'static str, body: Body, scope: Scope) -> Self {
        Self { name, body, scope }
    }
}

impl HelperDef for Builtin {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        r: &'reg Handlebars<'reg>,
        _: &'rc HbsContext,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        let args: Vec<&Value> = h.params().iter().map(|p| p.value()).collect();
        (self.body)(&self.scope, r, &args)
            .map(ScopedJson::Derived)
            .map_err(|e| RenderError::new(format!("{}: {e:#}", self.name)))
    }
}

fn arity(args: &[&Value], n: usize) -> Result<()> {
    ensure!(
        args.len() == n,
        "expected {n} argument(s), got {}",
        args.len()
    );
    Ok(())
}

fn str_arg<'a>(args: &[&'a Value], i: usize) -> Result<&'a str> {
    let v: &'a Value = args
        .get(i)
        .copied()
        .with_context(|| format!("missing argument {}", i + 1))?;
    v.as_str()
        .with_context(|| format!("argument {}: '{v}' is not a string", i + 1))
}

/// Optional string argument; absent or empty means unset.
fn opt_str_arg<'a>(args: &[&'a Value], i: usize) -> Result<Option<&'a str>> {
    match args.get(i) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => str_arg(args, i).map(|s| Some(s).filter(|s| !s.is_empty())),
    }
}

/// Text form of a value: strings bare, everything else as JSON.
fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        v => v.to_string(),
    }
}

fn int(v: &Value) -> Result<i64> {
    match v {
        Value::Number(n) => n.as_i64().with_context(|| format!("'{v}' not an integer?")),
        Value::String(s) => s
            .parse()
            .with_context(|| format!("'{s}' not an integer?")),
        _ => bail!("'{v}' not an integer?"),
    }
}

fn add(_: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    arity(args, 2)?;
    let sum = int(args[0])?
        .checked_add(int(args[1])?)
        .context("integer overflow")?;
    Ok(json!(sum))
}

fn append(_: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    arity(args, 2)?;
    let (Value::Array(xs), Value::Array(ys)) = (args[0], args[1]) else {
        bail!("both arguments must be sequences");
    };
    Ok(Value::Array(xs.iter().chain(ys).cloned().collect()))
}

fn arr(_: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    Ok(Value::Array(args.iter().map(|&v| v.clone()).collect()))
}

fn sarr(_: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    (0..args.len())
        .map(|i| str_arg(args, i).map(Value::from))
        .collect::<Result<_>>()
        .map(Value::Array)
}

fn join(_: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    arity(args, 2)?;
    let xs = args[0].as_array().context("first argument must be a sequence")?;
    let sep = str_arg(args, 1)?;
    Ok(Value::String(
        xs.iter().map(text).collect::<Vec<_>>().join(sep),
    ))
}

fn contains(_: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    arity(args, 2)?;
    Ok(Value::Bool(str_arg(args, 0)?.contains(str_arg(args, 1)?)))
}

/// Absolute paths or absolute URLs.
fn is_url(_: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    arity(args, 1)?;
    let s = str_arg(args, 0)?;
    Ok(Value::Bool(s.starts_with('/') || Url::parse(s).is_ok()))
}

fn now(_: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    arity(args, 0)?;
    Ok(Value::String(
        chrono::Local::now().to_rfc3339_opts(SecondsFormat::AutoSi, true),
    ))
}

/// `datefmt date [in] [out]`, strftime formats. No input format means
/// RFC 3339; no output format means the input format.
fn datefmt(_: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    ensure!(
        (1..=3).contains(&args.len()),
        "expected 1 to 3 arguments, got {}",
        args.len()
    );
    let ds = str_arg(args, 0)?;
    let inf = opt_str_arg(args, 1)?;
    let outf = opt_str_arg(args, 2)?.or(inf);

    let s = match inf {
        None => {
            let d = DateTime::parse_from_rfc3339(ds)
                .with_context(|| format!("parse '{ds}' as RFC 3339"))?;
            match outf {
                None => d.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                Some(f) => format_with(d.format(f))?,
            }
        }
        Some(inf) => {
            let outf = outf.unwrap_or(inf);
            if let Ok(d) = DateTime::parse_from_str(ds, inf) {
                format_with(d.format(outf))?
            } else if let Ok(d) = NaiveDateTime::parse_from_str(ds, inf) {
                format_with(d.format(outf))?
            } else {
                let d = NaiveDate::parse_from_str(ds, inf)
                    .with_context(|| format!("parse '{ds}' as '{inf}'"))?;
                format_with(d.format(outf))?
            }
        }
    };
    Ok(Value::String(s))
}

/// Format without panicking on specifiers the value can't satisfy.
fn format_with(item: impl Display) -> Result<String> {
    let mut s = String::new();
    write!(s, "{item}").map_err(|_| anyhow::anyhow!("invalid output format"))?;
    Ok(s)
}

fn exists(scope: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    arity(args, 1)?;
    let path = scope.root.join(str_arg(args, 0)?);
    match fs::metadata(&path) {
        Ok(_) => Ok(Value::Bool(true)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Value::Bool(false)),
        Err(e) => Err(e).with_context(|| format!("stat {}", path.display())),
    }
}

fn include(scope: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    arity(args, 1)?;
    let path = scope.root.join(str_arg(args, 0)?);
    match fs::read_to_string(&path) {
        Ok(s) => Ok(Value::String(s)),
        Err(e) => {
            log::warn!("inclusion failed '{}', {e}", path.display());
            Err(e).with_context(|| format!("read {}", path.display()))
        }
    }
}

/// Render a template string, default delimiters, against the live database.
fn parse(scope: &Scope, r: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    arity(args, 1)?;
    let src = str_arg(args, 0)?;
    let out = r.render_template(src, &json!({"db": scope.db.snapshot()}))?;
    Ok(Value::String(out))
}

/// `get key…`: entry of the file being rendered, `db[ids_key][cur.id][key…]`.
fn get(scope: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    let id = scope
        .db
        .get(&["cur".to_owned(), "id".to_owned()])
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();

    let mut xs = vec![scope.ids_key.clone(), id];
    for i in 0..args.len() {
        xs.push(str_arg(args, i)?.to_owned());
    }

    scope.db.get(&xs).map_err(|e| {
        log::warn!("get({}): {e}", address(&xs));
        e.into()
    })
}

fn wrap(scope: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    Ok(json!({"db": scope.db.snapshot(), "args": args}))
}

/// Log `msg` as a warning; renders as nothing.
/// Verbatim text emitted by the delimiter translator.
fn lit(_: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    arity(args, 1)?;
    Ok(Value::String(str_arg(args, 0)?.to_owned()))
}

fn warn(_: &Scope, _: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    arity(args, 1)?;
    log::warn!("{}", text(args[0]));
    Ok(Value::String(String::new()))
}
