//! Page descriptors.
//!
//! A [`Page`] is rebuilt on every rerun from a [`PageInput`]. Its identity
//! hash comes from its URL path alone, so the same page keeps its identity
//! across reruns even when its title or icon change.

mod core;
mod naming;

pub use self::core::{Page, PageCallable, PageFn, PageInput, PageOptions, PageSource};
pub use naming::{extract_leading_emoji, page_icon_and_name, url_path_from_title, validate_icon};
