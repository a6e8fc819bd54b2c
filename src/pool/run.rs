//! `run cmd target args…`: pipe a rendered fragment through a command.
//!
//! With a non-empty `target`, the fragment of that name is rendered against
//! `{"db": <db>, "args": args}` into `<tmp>/<target>`, and that path is
//! appended to the command line. A file is used instead of a pipe so there
//! is no process synchronisation to manage. The command runs in the input
//! directory; its stdout and stderr share one pipe, so the returned text keeps
//! their interleaving.

use super::helpers::Scope;
use anyhow::{Context, Result, ensure};
use handlebars::Handlebars;
use serde_json::{Value, json};
use std::{
    env,
    ffi::OsString,
    fs,
    io::{self, Read},
    process::{Command, Stdio},
};

pub(crate) fn run(scope: &Scope, r: &Handlebars<'_>, args: &[&Value]) -> Result<Value> {
    let (cmd, rest) = args.split_first().context("No command?")?;
    let cmd = cmd
        .as_array()
        .context("command must be a sequence")?
        .iter()
        .map(|v| v.as_str().context("command items must be strings"))
        .collect::<Result<Vec<_>>>()?;
    let (prog, cmd_args) = cmd.split_first().context("No command?")?;

    let mut argv: Vec<OsString> = cmd_args.iter().map(OsString::from).collect();

    if let Some((target, targs)) = rest.split_first() {
        let target = target.as_str().context("render target must be a string")?;
        if !target.is_empty() {
            let t = r.clone();
            let rendered = t.render(target, &json!({"db": scope.db.snapshot(), "args": targs}))?;
            let path = env::temp_dir().join(target);
            fs::write(&path, rendered).with_context(|| format!("write {}", path.display()))?;
            argv.push(path.into_os_string());
        }
    }

    // One pipe for both streams keeps their output in write order.
    let (mut reader, writer) = io::pipe().context("create output pipe")?;
    let mut command = Command::new(prog);
    command
        .args(&argv)
        .current_dir(&scope.root)
        .stdin(Stdio::null())
        .stdout(writer.try_clone().context("clone output pipe")?)
        .stderr(writer);
    if let Some(path) = &scope.search_path {
        command.env("PATH", path);
    }

    log::debug!("running {prog} {argv:?}");
    let mut child = command.spawn().with_context(|| format!("spawn {prog}"))?;
    // The builder holds our copies of the write end; EOF needs them closed.
    drop(command);

    let mut out = Vec::new();
    let read = reader.read_to_end(&mut out);
    let status = child.wait().with_context(|| format!("wait for {prog}"))?;
    read.with_context(|| format!("read output of {prog}"))?;

    let text = String::from_utf8_lossy(&out).into_owned();
    ensure!(status.success(), "{prog} failed ({status}):\n{text}");

    Ok(Value::String(text))
}
