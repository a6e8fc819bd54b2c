use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

pub const DEFAULT_DB_FILE: &str = "db.json";
pub const DEFAULT_DB_DIR: &str = "db";
pub const DEFAULT_TEMPLATE_EXT: &str = ".tmpl";
pub const DEFAULT_TEMPLATES_DIR: &str = "templates";
pub const DEFAULT_IDS_KEY: &str = "pages";
pub const DEFAULT_LEFT_DELIM: &str = "{{<";
pub const DEFAULT_RIGHT_DELIM: &str = ">}}";

/// User-facing knobs, mostly names relative to the input directory.
#[derive(Clone, Debug)]
pub struct Options {
    pub db_file: String,
    pub db_dir: String,
    pub template_ext: String,
    pub templates_dir: String,
    pub drop_db: bool,
    pub ids_key: String,
    pub left_delim: String,
    pub right_delim: String,
    pub strict: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            db_file: DEFAULT_DB_FILE.to_owned(),
            db_dir: DEFAULT_DB_DIR.to_owned(),
            template_ext: DEFAULT_TEMPLATE_EXT.to_owned(),
            templates_dir: DEFAULT_TEMPLATES_DIR.to_owned(),
            drop_db: true,
            ids_key: DEFAULT_IDS_KEY.to_owned(),
            left_delim: DEFAULT_LEFT_DELIM.to_owned(),
            right_delim: DEFAULT_RIGHT_DELIM.to_owned(),
            strict: false,
        }
    }
}

/// Immutable, cheaply-cloned bag of resolved paths and options for one run.
/// Constructed once at startup; never mutated after that.
#[derive(Clone, Debug)]
pub struct Ctx {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub db_file: PathBuf,
    pub db_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub template_ext: String,
    pub drop_db: bool,
    pub ids_key: String,
    pub delims: (String, String),
    pub strict: bool,
    /// `PATH` handed to commands spawned by the `run` helper, if extended.
    pub search_path: Option<OsString>,
}

impl Ctx {
    pub fn new(input_dir: &Path, output_dir: &Path, opts: &Options) -> Self {
        Self {
            db_file: input_dir.join(&opts.db_file),
            db_dir: input_dir.join(&opts.db_dir),
            templates_dir: input_dir.join(&opts.templates_dir),
            template_ext: opts.template_ext.clone(),
            drop_db: opts.drop_db,
            ids_key: opts.ids_key.clone(),
            delims: (opts.left_delim.clone(), opts.right_delim.clone()),
            strict: opts.strict,
            search_path: None,
            input_dir: input_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Hand commands spawned by the `run` helper this `PATH`.
    pub fn with_search_path(mut self, path: Option<OsString>) -> Self {
        self.search_path = path;
        self
    }

    /// Whether `path` is a database source that must not reach the output.
    pub fn is_db_source(&self, path: &Path) -> bool {
        self.drop_db && (path == self.db_file || path.starts_with(&self.db_dir))
    }
}
