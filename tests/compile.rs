use dirtmpl::{
    compile,
    ctx::{Ctx, Options},
    db::{Database, load},
    pool::Pool,
};
use serde_json::json;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use walkdir::WalkDir;

const INDEX: &str = "<h1>{{<db.title>}}</h1>\n{{<greet \"you\">}}\n{{ untouched }}\n{{<db.b.c.y>}} {{<add db.a 41>}}";

fn write(root: &Path, rel: &str, contents: impl AsRef<[u8]>) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, contents).unwrap();
}

fn site() -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(
        root,
        "db.json",
        r#"{"a": 1, "title": "Home", "pages": {"blog/post.html": {"title": "Post"}}}"#,
    );
    write(root, "db/b/c.json", r#"{"x": 1, "y": 2}"#);
    write(root, "db/site.toml", "name = \"demo\"\n");
    write(root, "templates/greet.tmpl", "Hello {{args.[0]}} ({{db.title}})");
    write(root, "index.html.tmpl", INDEX);
    write(root, "style.css", "body { color: red }\n");
    write(root, "raw.txt", "{{< db.title >}} and {{< unclosed");
    write(
        root,
        "blog/post.html.tmpl",
        "{{<get \"title\">}} {{<db.cur.id>}} {{<db.cur.ext>}} {{<db.site.name>}}",
    );
    write(root, "image.bin", (0..=255u8).collect::<Vec<_>>());
    fs::create_dir_all(root.join("empty")).unwrap();
    tmp
}

fn ctx_for(input: &Path, output: &Path) -> Ctx {
    Ctx::new(input, output, &Options::default())
}

fn run(input: &Path) -> (TempDir, PathBuf) {
    let out = tempfile::tempdir().unwrap();
    let dir = out.path().join("out");
    fs::create_dir_all(&dir).unwrap();
    compile(&ctx_for(input, &dir)).unwrap();
    (out, dir)
}

/// Relative path -> contents (`None` for directories).
fn snapshot(dir: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .map(|e| {
            let e = e.unwrap();
            let rel = e.path().strip_prefix(dir).unwrap().to_string_lossy().into_owned();
            let contents = e.file_type().is_file().then(|| fs::read(e.path()).unwrap());
            (rel, contents)
        })
        .collect()
}

#[test]
fn renders_templates_and_copies_the_rest() {
    let input = site();
    let (_keep, out) = run(input.path());

    assert_eq!(
        fs::read_to_string(out.join("index.html")).unwrap(),
        "<h1>Home</h1>\nHello you (Home)\n{{ untouched }}\n2 42"
    );
    assert_eq!(
        fs::read_to_string(out.join("blog/post.html")).unwrap(),
        "Post blog/post.html .html demo"
    );
    assert_eq!(
        fs::read(out.join("style.css")).unwrap(),
        fs::read(input.path().join("style.css")).unwrap()
    );
    assert_eq!(
        fs::read(out.join("image.bin")).unwrap(),
        (0..=255u8).collect::<Vec<_>>()
    );
    assert!(out.join("empty").is_dir());
}

#[test]
fn output_mirrors_input_minus_database() {
    let input = site();
    let (_keep, out) = run(input.path());

    let paths: Vec<String> = snapshot(&out).into_keys().collect();
    assert_eq!(
        paths,
        [
            "blog",
            "blog/post.html",
            "empty",
            "image.bin",
            "index.html",
            "raw.txt",
            "style.css",
            "templates",
            "templates/greet",
        ]
    );
}

#[test]
fn unsuffixed_files_are_never_parsed() {
    let input = site();
    let (_keep, out) = run(input.path());

    assert_eq!(
        fs::read_to_string(out.join("raw.txt")).unwrap(),
        "{{< db.title >}} and {{< unclosed"
    );
}

#[test]
fn function_call_matches_direct_fragment_render() {
    let input = site();
    write(input.path(), "call.txt.tmpl", "{{<greet \"x\">}}");
    let (_keep, out) = run(input.path());

    let ctx = ctx_for(input.path(), &out);
    let db = Database::new(load::load(&ctx).unwrap());
    let pool = Pool::build(&ctx, &db).unwrap();

    assert_eq!(
        fs::read_to_string(out.join("call.txt")).unwrap(),
        pool.call("greet", &[json!("x")]).unwrap()
    );
}

#[test]
fn reruns_are_byte_identical() {
    let input = site();
    let (_a, first) = run(input.path());
    let (_b, second) = run(input.path());

    assert_eq!(snapshot(&first), snapshot(&second));
}

#[test]
fn database_merges_fragments_in_order() {
    let input = site();
    write(input.path(), "db.json", r#"{"a": 1, "b": {"c": {"x": 1, "y": 2}}}"#);
    write(input.path(), "db/b/c.json", r#"{"y": 3, "z": 4}"#);

    let ctx = ctx_for(input.path(), Path::new("/unused"));
    let db = load::load(&ctx).unwrap();

    assert_eq!(db["a"], json!(1));
    assert_eq!(db["b"]["c"], json!({"x": 1, "y": 3, "z": 4}));
}

#[test]
fn keep_db_copies_database_sources() {
    let input = site();
    let out = tempfile::tempdir().unwrap();
    let opts = Options {
        drop_db: false,
        ..Options::default()
    };
    compile(&Ctx::new(input.path(), out.path(), &opts)).unwrap();

    assert!(out.path().join("db.json").is_file());
    assert!(out.path().join("db/b/c.json").is_file());
}

#[test]
fn custom_suffix_and_delimiters() {
    let input = tempfile::tempdir().unwrap();
    write(input.path(), "db.json", r#"{"n": 7}"#);
    write(input.path(), "page.txt.t", "n=<% db.n %>");
    write(input.path(), "other.tmpl", "{{<db.n>}}");

    let out = tempfile::tempdir().unwrap();
    let opts = Options {
        template_ext: ".t".to_owned(),
        left_delim: "<%".to_owned(),
        right_delim: "%>".to_owned(),
        ..Options::default()
    };
    compile(&Ctx::new(input.path(), out.path(), &opts)).unwrap();

    assert_eq!(fs::read_to_string(out.path().join("page.txt")).unwrap(), "n=7");
    assert_eq!(
        fs::read_to_string(out.path().join("other.tmpl")).unwrap(),
        "{{<db.n>}}"
    );
}

#[test]
fn braces_next_to_actions_are_kept() {
    let input = tempfile::tempdir().unwrap();
    write(input.path(), "db.json", r#"{"name": "X", "n": 2}"#);
    write(
        input.path(),
        "doc.tex.tmpl",
        "\\textbf{{{<db.name>}}}\n\\section{ {{<- db.n ->}} }\n{{ x }}\\",
    );

    let out = tempfile::tempdir().unwrap();
    compile(&ctx_for(input.path(), out.path())).unwrap();
    assert_eq!(
        fs::read_to_string(out.path().join("doc.tex")).unwrap(),
        "\\textbf{X}\n\\section{2}\n{{ x }}\\"
    );
}

#[test]
fn template_errors_abort_with_the_path() {
    let input = site();
    write(input.path(), "broken.html.tmpl", "line one\n{{< db.title");

    let out = tempfile::tempdir().unwrap();
    let err = compile(&ctx_for(input.path(), out.path())).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("broken.html.tmpl"), "{msg}");
    assert!(msg.contains("line 2"), "{msg}");
}

#[test]
fn missing_data_is_an_error_not_a_crash() {
    let input = site();
    write(input.path(), "lost.html.tmpl", "{{<get \"nope\">}}");

    let out = tempfile::tempdir().unwrap();
    let err = compile(&ctx_for(input.path(), out.path())).unwrap_err();
    assert!(format!("{err:#}").contains("not found"));
}

#[test]
fn strict_mode_rejects_missing_fields() {
    let input = site();
    write(input.path(), "lax.txt.tmpl", "[{{<db.missing>}}]");

    let out = tempfile::tempdir().unwrap();
    compile(&ctx_for(input.path(), out.path())).unwrap();
    assert_eq!(fs::read_to_string(out.path().join("lax.txt")).unwrap(), "[]");

    let out = tempfile::tempdir().unwrap();
    let opts = Options {
        strict: true,
        ..Options::default()
    };
    assert!(compile(&Ctx::new(input.path(), out.path(), &opts)).is_err());
}

#[test]
fn unsupported_fragment_format_aborts() {
    let input = site();
    write(input.path(), "db/notes.yaml", "a: 1\n");

    let out = tempfile::tempdir().unwrap();
    let err = compile(&ctx_for(input.path(), out.path())).unwrap_err();
    assert!(format!("{err:#}").contains("unsupported data format '.yaml'"));
}

#[cfg(unix)]
#[test]
fn run_pipes_fragments_through_commands() {
    let input = site();
    write(input.path(), "templates/dirtmpl-it-shout.tmpl", "{{args.[0]}} {{db.title}}");
    write(
        input.path(),
        "shout.txt.tmpl",
        "{{<run (sarr \"echo\" \"one\") \"\" >}}|{{<run (sarr \"cat\") \"dirtmpl-it-shout.tmpl\" \"hi\">}}",
    );

    let (_keep, out) = run(input.path());
    assert_eq!(
        fs::read_to_string(out.join("shout.txt")).unwrap(),
        "one\n|hi Home"
    );
}

#[cfg(unix)]
#[test]
fn run_finds_commands_on_the_search_path() {
    use std::os::unix::fs::PermissionsExt;

    let input = site();
    let bin = input.path().join("bin");
    write(input.path(), "bin/dirtmpl-it-hello", "#!/bin/sh\necho hello \"$1\" >&2\n");
    fs::set_permissions(
        bin.join("dirtmpl-it-hello"),
        fs::Permissions::from_mode(0o755),
    )
    .unwrap();
    write(input.path(), "hello.txt.tmpl", "{{<run (sarr \"dirtmpl-it-hello\" \"x\")>}}");

    let path = std::env::join_paths([bin, PathBuf::from("/bin"), PathBuf::from("/usr/bin")])
        .unwrap();
    let out = tempfile::tempdir().unwrap();
    let ctx = ctx_for(input.path(), out.path()).with_search_path(Some(path));
    compile(&ctx).unwrap();

    assert_eq!(
        fs::read_to_string(out.path().join("hello.txt")).unwrap(),
        "hello x\n"
    );
}

#[cfg(unix)]
#[test]
fn output_files_have_fixed_mode() {
    use std::os::unix::fs::PermissionsExt;

    let input = site();
    fs::set_permissions(
        input.path().join("style.css"),
        fs::Permissions::from_mode(0o600),
    )
    .unwrap();
    let (_keep, out) = run(input.path());

    for f in ["style.css", "index.html"] {
        let mode = fs::metadata(out.join(f)).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644, "{f}");
    }
}
