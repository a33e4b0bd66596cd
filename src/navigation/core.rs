use std::collections::HashSet;
use std::path::Path;

use crate::error::{RerunError, Result};
use crate::logging::{LogLevel, json_kv, json_str};
use crate::pages::{Page, PageInput};
use crate::protocol::{AppPage, ForwardMsg, NavigationMsg, PageNotFound, Position};
use crate::registry::PageInfo;
use crate::runtime::{NAVIGATION_TARGET, ScriptRunContext};

/// Pages handed to [`navigation`], grouped into sections. A plain list is a
/// single section with the empty header.
#[derive(Debug, Clone, Default)]
pub struct NavigationPages {
    sections: Vec<(String, Vec<PageInput>)>,
}

impl NavigationPages {
    pub fn list<I, P>(pages: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PageInput>,
    {
        Self::sections().section("", pages)
    }

    /// Start an empty sectioned page set; add sections with [`section`](Self::section).
    pub fn sections() -> Self {
        Self::default()
    }

    /// Append a section. Headers are kept verbatim and in call order, so a
    /// repeated header yields two sections.
    pub fn section<I, P>(mut self, header: impl Into<String>, pages: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PageInput>,
    {
        self.sections
            .push((header.into(), pages.into_iter().map(Into::into).collect()));
        self
    }

    pub fn page_count(&self) -> usize {
        self.sections.iter().map(|(_, pages)| pages.len()).sum()
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(header, _)| header.as_str())
    }
}

impl<P> FromIterator<P> for NavigationPages
where
    P: Into<PageInput>,
{
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self::list(iter)
    }
}

/// How the page menu is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationOptions {
    pub position: Position,
    /// Whether the menu starts expanded.
    pub expanded: bool,
}

impl NavigationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }
}

type Sections = Vec<(String, Vec<Page>)>;

/// Resolve the page to run for this rerun.
///
/// Declaration mistakes (no pages, several defaults, a URL path used twice, a
/// page that cannot be built) fail the rerun. A navigation intent that
/// matches nothing does not: the default page is returned and a page-not-found
/// notice is queued ahead of the page menu.
///
/// Without a session context the default page is returned ready to run and
/// nothing is published.
pub fn navigation(
    ctx: Option<&mut ScriptRunContext>,
    pages: NavigationPages,
    options: NavigationOptions,
) -> Result<Page> {
    let base_dir = match ctx.as_deref() {
        Some(ctx) => ctx.pages_manager().main_script_dir().to_path_buf(),
        None => std::env::current_dir()?,
    };

    let mut sections = build_sections(pages, &base_dir)?;
    let (section_idx, page_idx) = select_default(&sections)?;
    sections[section_idx].1[page_idx].mark_default();

    let Some(ctx) = ctx else {
        let mut page = take_page(sections, section_idx, page_idx);
        page.ordain();
        return Ok(page);
    };

    let (snapshot, app_pages) = registry_snapshot(&sections)?;
    let position = if options.position == Position::Hidden || !ctx.config().show_sidebar_navigation
    {
        Position::Hidden
    } else {
        Position::Sidebar
    };
    let mut msg = NavigationMsg {
        position,
        expanded: options.expanded,
        sections: sections.iter().map(|(header, _)| header.clone()).collect(),
        app_pages,
        page_script_hash: String::new(),
    };

    let page_count = snapshot.len();
    ctx.pages_manager_mut().set_pages(snapshot);

    let default_hash = sections[section_idx].1[page_idx].script_hash();
    let resolved = ctx
        .pages_manager()
        .resolve(&default_hash)
        .map(|info| info.page_script_hash.clone());
    let found = resolved.is_some();
    let selected_hash = match resolved {
        Some(hash) => hash,
        None => {
            ctx.log(
                LogLevel::Warn,
                NAVIGATION_TARGET,
                "page_not_found",
                [json_str("intent", format!("{:?}", ctx.pages_manager().intent()))],
            );
            ctx.enqueue(ForwardMsg::PageNotFound(PageNotFound::default()));
            default_hash
        }
    };

    // The selected hash always comes from this snapshot.
    let (section_idx, page_idx) =
        locate(&sections, &selected_hash).unwrap_or((section_idx, page_idx));
    let mut page = take_page(sections, section_idx, page_idx);
    page.ordain();

    msg.page_script_hash = selected_hash.clone();
    ctx.set_page_script_hash(selected_hash.clone());
    ctx.enqueue(ForwardMsg::Navigation(msg));
    ctx.record_metric(|metrics| metrics.record_navigation(found));
    ctx.log(
        LogLevel::Debug,
        NAVIGATION_TARGET,
        "navigation_resolved",
        [
            json_str("page", page.title()),
            json_str("page_script_hash", selected_hash),
            json_kv("pages", page_count),
            json_kv("found", found),
        ],
    );

    Ok(page)
}

fn build_sections(pages: NavigationPages, base_dir: &Path) -> Result<Sections> {
    if pages.page_count() == 0 {
        return Err(RerunError::NoPages);
    }
    pages
        .sections
        .into_iter()
        .map(|(header, inputs)| {
            let built = inputs
                .into_iter()
                .map(|input| input.into_page(base_dir))
                .collect::<Result<Vec<_>>>()?;
            Ok((header, built))
        })
        .collect()
}

/// Position of the default page: the one page flagged default, otherwise the
/// first page in declaration order.
fn select_default(sections: &Sections) -> Result<(usize, usize)> {
    let mut flagged = sections.iter().enumerate().flat_map(|(s, (_, pages))| {
        pages
            .iter()
            .enumerate()
            .filter(|(_, page)| page.is_default())
            .map(move |(p, _)| (s, p))
    });

    match (flagged.next(), flagged.next()) {
        (Some(_), Some(_)) => Err(RerunError::MultipleDefaults),
        (Some(position), None) => Ok(position),
        (None, _) => sections
            .iter()
            .position(|(_, pages)| !pages.is_empty())
            .map(|s| (s, 0))
            .ok_or(RerunError::NoPages),
    }
}

/// Page table for the registry plus the menu entries, both in declaration
/// order. Two pages resolving to the same URL path are rejected here.
fn registry_snapshot(sections: &Sections) -> Result<(Vec<PageInfo>, Vec<AppPage>)> {
    let mut seen = HashSet::new();
    let mut snapshot = Vec::new();
    let mut app_pages = Vec::new();

    for (header, pages) in sections {
        for page in pages {
            let info = page.page_info();
            if !seen.insert(info.page_script_hash.clone()) {
                return Err(RerunError::DuplicateUrlPath(page.route().to_string()));
            }
            app_pages.push(AppPage {
                page_script_hash: info.page_script_hash.clone(),
                page_name: info.page_name.clone(),
                icon: info.icon.clone(),
                is_default: page.is_default(),
                section_header: header.clone(),
                url_pathname: info.url_pathname.clone(),
            });
            snapshot.push(info);
        }
    }

    Ok((snapshot, app_pages))
}

fn locate(sections: &Sections, hash: &str) -> Option<(usize, usize)> {
    sections.iter().enumerate().find_map(|(s, (_, pages))| {
        pages
            .iter()
            .position(|page| page.script_hash() == hash)
            .map(|p| (s, p))
    })
}

fn take_page(mut sections: Sections, section_idx: usize, page_idx: usize) -> Page {
    sections.swap_remove(section_idx).1.swap_remove(page_idx)
}
