use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub type PageHash = String;

/// Denormalized page metadata, enough to resolve intents without touching
/// the page itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page_script_hash: PageHash,
    pub page_name: String,
    pub icon: String,
    /// Empty for callable pages.
    pub script_path: Option<PathBuf>,
    pub url_pathname: String,
}

/// Which page the user asked for on their last navigation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NavigationIntent {
    #[default]
    Default,
    ScriptHash(PageHash),
    PageName(String),
}

impl NavigationIntent {
    /// Build an intent from the raw pair the browser sends. A non-empty hash
    /// wins over a name; two empty strings mean "use the default page".
    pub fn from_parts(script_hash: &str, page_name: &str) -> Self {
        if !script_hash.is_empty() {
            NavigationIntent::ScriptHash(script_hash.to_string())
        } else if !page_name.is_empty() {
            NavigationIntent::PageName(page_name.to_string())
        } else {
            NavigationIntent::Default
        }
    }
}

#[derive(Debug, Default)]
pub struct PagesManager {
    main_script_path: PathBuf,
    pages: HashMap<PageHash, PageInfo>,
    /// Hashes in declaration order. Titles need not be unique, so name
    /// lookups walk this rather than the map.
    order: Vec<PageHash>,
    intent: NavigationIntent,
    active_script_hash: Option<PageHash>,
}

impl PagesManager {
    pub fn new(main_script_path: impl Into<PathBuf>) -> Self {
        Self {
            main_script_path: main_script_path.into(),
            ..Self::default()
        }
    }

    pub fn main_script_path(&self) -> &Path {
        &self.main_script_path
    }

    /// Directory page script paths are resolved against.
    pub fn main_script_dir(&self) -> &Path {
        self.main_script_path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Replace the page table wholesale with the snapshot of the latest
    /// rerun, given in declaration order. A repeated hash keeps its first
    /// position and the latest info.
    pub fn set_pages<I>(&mut self, pages: I)
    where
        I: IntoIterator<Item = PageInfo>,
    {
        self.pages.clear();
        self.order.clear();
        for info in pages {
            let hash = info.page_script_hash.clone();
            if self.pages.insert(hash.clone(), info).is_none() {
                self.order.push(hash);
            }
        }
    }

    pub fn pages(&self) -> &HashMap<PageHash, PageInfo> {
        &self.pages
    }

    /// Pages in the order the latest rerun declared them.
    pub fn ordered_pages(&self) -> impl Iterator<Item = &PageInfo> {
        self.order.iter().filter_map(|hash| self.pages.get(hash))
    }

    pub fn page(&self, hash: &str) -> Option<&PageInfo> {
        self.pages.get(hash)
    }

    pub fn set_intent(&mut self, intent: NavigationIntent) {
        self.intent = intent;
    }

    pub fn intent(&self) -> &NavigationIntent {
        &self.intent
    }

    /// Look up the page the current intent selects. With no explicit intent
    /// the page registered under `fallback_hash` is returned.
    pub fn resolve(&self, fallback_hash: &str) -> Option<&PageInfo> {
        self.resolve_intent(&self.intent, fallback_hash)
    }

    pub fn resolve_intent(
        &self,
        intent: &NavigationIntent,
        fallback_hash: &str,
    ) -> Option<&PageInfo> {
        match intent {
            NavigationIntent::ScriptHash(hash) => self.pages.get(hash),
            NavigationIntent::PageName(name) => {
                self.ordered_pages().find(|info| info.page_name == *name)
            }
            NavigationIntent::Default => self.pages.get(fallback_hash),
        }
    }

    pub fn active_script_hash(&self) -> Option<&str> {
        self.active_script_hash.as_deref()
    }

    /// Returns the previously active hash.
    pub fn set_active_script_hash(&mut self, hash: Option<PageHash>) -> Option<PageHash> {
        std::mem::replace(&mut self.active_script_hash, hash)
    }
}
