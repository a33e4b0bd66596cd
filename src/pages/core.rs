use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::error::{RerunError, Result};
use crate::registry::PageInfo;
use crate::runtime::ScriptRunContext;

use super::naming::{page_icon_and_name, url_path_from_title, validate_icon};

/// Body of a callable page.
pub type PageFn = Arc<dyn Fn(&mut ScriptRunContext) -> Result<()> + Send + Sync>;

/// A page implemented as a function rather than a script file.
#[derive(Clone)]
pub struct PageCallable {
    name: Option<String>,
    run: PageFn,
}

impl PageCallable {
    /// Wrap `f`, inferring the page name from the function's name. Closures
    /// have no usable name; give those a title through [`PageOptions`] or use
    /// [`PageCallable::named`].
    ///
    /// The name comes from [`std::any::type_name`], whose output is not
    /// guaranteed to stay the same across compiler versions. The name feeds
    /// the default title, URL path and page hash, so a toolchain upgrade can
    /// move the page. Use [`PageCallable::named`] where the URL must stay put.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut ScriptRunContext) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: function_name::<F>(),
            run: Arc::new(f),
        }
    }

    /// Wrap `f` under an explicit name. The page's identity depends only on
    /// `name`.
    pub fn named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut ScriptRunContext) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: Some(name.into()),
            run: Arc::new(f),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

fn function_name<F>() -> Option<String> {
    let full = std::any::type_name::<F>();
    let last = full.rsplit("::").next()?;
    let is_ident = !last.is_empty()
        && last.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !last.starts_with(|c: char| c.is_ascii_digit());
    is_ident.then(|| last.to_string())
}

#[derive(Clone)]
pub enum PageSource {
    /// Absolute path of a page script.
    Script(PathBuf),
    Callable(PageCallable),
}

impl fmt::Debug for PageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSource::Script(path) => f.debug_tuple("Script").field(path).finish(),
            PageSource::Callable(callable) => f
                .debug_tuple("Callable")
                .field(&callable.name().unwrap_or("<anonymous>"))
                .finish(),
        }
    }
}

/// Explicit overrides for the inferred page metadata.
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub url_path: Option<String>,
    pub default: bool,
}

impl PageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn url_path(mut self, url_path: impl Into<String>) -> Self {
        self.url_path = Some(url_path.into());
        self
    }

    pub fn default_page(mut self, default: bool) -> Self {
        self.default = default;
        self
    }
}

/// One navigable unit of an app, rebuilt on every rerun.
#[derive(Clone)]
pub struct Page {
    source: PageSource,
    title: String,
    icon: String,
    url_path: String,
    default: bool,
    can_be_called: bool,
}

impl Page {
    /// Build a page from a script path. Relative paths resolve against
    /// `base_dir`, normally the directory of the app's main script.
    pub fn from_script(
        path: impl AsRef<Path>,
        base_dir: &Path,
        options: PageOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        };
        if !absolute.is_file() {
            return Err(RerunError::PageFileMissing(absolute));
        }

        let (icon, name) = page_icon_and_name(&absolute);
        Self::finish(PageSource::Script(absolute), name, icon, options)
    }

    pub fn from_callable(callable: PageCallable, options: PageOptions) -> Result<Self> {
        let name = match (callable.name(), options.title.as_ref()) {
            (Some(name), _) => name.to_string(),
            (None, Some(_)) => String::new(),
            (None, None) => return Err(RerunError::UntitledCallable),
        };
        Self::finish(PageSource::Callable(callable), name, String::new(), options)
    }

    fn finish(
        source: PageSource,
        inferred_name: String,
        inferred_icon: String,
        options: PageOptions,
    ) -> Result<Self> {
        let PageOptions {
            title,
            icon,
            url_path,
            default,
        } = options;

        let title = title.unwrap_or_else(|| inferred_name.replace('_', " "));
        let icon = icon.unwrap_or(inferred_icon);
        if !icon.is_empty() {
            validate_icon(&icon)?;
        }

        let url_path = match url_path {
            Some(explicit) => {
                if explicit.trim().is_empty() && !default {
                    return Err(RerunError::EmptyUrlPath);
                }
                explicit.trim_start_matches('/').to_string()
            }
            None => url_path_from_title(&title),
        };

        Ok(Self {
            source,
            title,
            icon,
            url_path,
            default,
            can_be_called: false,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    /// URL path the browser shows. The default page lives at the app root.
    pub fn url_path(&self) -> &str {
        if self.default { "" } else { &self.url_path }
    }

    /// Path the identity hash is derived from, independent of default status.
    pub fn route(&self) -> &str {
        &self.url_path
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    pub fn can_be_called(&self) -> bool {
        self.can_be_called
    }

    pub fn source(&self) -> &PageSource {
        &self.source
    }

    pub fn script_path(&self) -> Option<&Path> {
        match &self.source {
            PageSource::Script(path) => Some(path),
            PageSource::Callable(_) => None,
        }
    }

    /// Stable identity: a hash of the URL path and nothing else.
    pub fn script_hash(&self) -> String {
        blake3::hash(self.url_path.as_bytes()).to_hex().to_string()
    }

    pub fn page_info(&self) -> PageInfo {
        PageInfo {
            page_script_hash: self.script_hash(),
            page_name: self.title.clone(),
            icon: self.icon.clone(),
            script_path: self.script_path().map(Path::to_path_buf),
            url_pathname: self.url_path().to_string(),
        }
    }

    pub(crate) fn mark_default(&mut self) {
        self.default = true;
    }

    pub(crate) fn ordain(&mut self) {
        self.can_be_called = true;
    }

    /// Execute the page. Only the page handed out by navigation may run, and
    /// only once per rerun. Without a session context this is a no-op.
    pub fn run(&mut self, ctx: Option<&mut ScriptRunContext>) -> Result<()> {
        if !self.can_be_called {
            return Err(RerunError::PageNotCallable);
        }
        self.can_be_called = false;

        let Some(ctx) = ctx else {
            return Ok(());
        };

        let source = self.source.clone();
        ctx.run_with_active_hash(self.script_hash(), move |ctx| match &source {
            PageSource::Callable(callable) => (callable.run)(ctx),
            PageSource::Script(path) => ctx.exec_script(path),
        })
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("source", &self.source)
            .field("title", &self.title)
            .field("icon", &self.icon)
            .field("url_path", &self.url_path)
            .field("default", &self.default)
            .field("can_be_called", &self.can_be_called)
            .finish()
    }
}

/// Anything `navigation` accepts as a page.
#[derive(Clone, Debug)]
pub enum PageInput {
    Script(PathBuf),
    Callable(PageCallable),
    Page(Page),
}

impl fmt::Debug for PageCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageCallable")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PageInput {
    /// Turn the input into a page. Prebuilt pages pass through untouched.
    pub fn into_page(self, base_dir: &Path) -> Result<Page> {
        match self {
            PageInput::Script(path) => Page::from_script(path, base_dir, PageOptions::default()),
            PageInput::Callable(callable) => {
                Page::from_callable(callable, PageOptions::default())
            }
            PageInput::Page(page) => Ok(page),
        }
    }
}

impl From<&str> for PageInput {
    fn from(path: &str) -> Self {
        PageInput::Script(PathBuf::from(path))
    }
}

impl From<String> for PageInput {
    fn from(path: String) -> Self {
        PageInput::Script(PathBuf::from(path))
    }
}

impl From<PathBuf> for PageInput {
    fn from(path: PathBuf) -> Self {
        PageInput::Script(path)
    }
}

impl From<&Path> for PageInput {
    fn from(path: &Path) -> Self {
        PageInput::Script(path.to_path_buf())
    }
}

impl From<PageCallable> for PageInput {
    fn from(callable: PageCallable) -> Self {
        PageInput::Callable(callable)
    }
}

impl From<Page> for PageInput {
    fn from(page: Page) -> Self {
        PageInput::Page(page)
    }
}

/// Page lists can also arrive as JSON (e.g. from an app manifest). Only
/// strings name pages; every other JSON type is rejected.
impl TryFrom<Value> for PageInput {
    type Error = RerunError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(path) => Ok(PageInput::Script(PathBuf::from(path))),
            other => Err(RerunError::InvalidPageType(describe_json(&other))),
        }
    }
}

fn describe_json(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("{kind} `{value}`")
}
