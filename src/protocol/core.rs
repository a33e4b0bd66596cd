use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RerunError, Result};

/// Where the browser draws the page menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    #[default]
    Sidebar,
    Hidden,
}

impl FromStr for Position {
    type Err = RerunError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "sidebar" => Ok(Position::Sidebar),
            "hidden" => Ok(Position::Hidden),
            other => Err(RerunError::InvalidPosition(other.to_string())),
        }
    }
}

/// One entry of the page menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPage {
    pub page_script_hash: String,
    pub page_name: String,
    pub icon: String,
    pub is_default: bool,
    pub section_header: String,
    pub url_pathname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavigationMsg {
    pub position: Position,
    pub expanded: bool,
    pub sections: Vec<String>,
    pub app_pages: Vec<AppPage>,
    /// Hash of the page selected to run. Empty until resolution completes.
    pub page_script_hash: String,
}

impl NavigationMsg {
    pub fn pages_in_section<'a>(&'a self, header: &'a str) -> impl Iterator<Item = &'a AppPage> {
        self.app_pages
            .iter()
            .filter(move |page| page.section_header == header)
    }

    pub fn default_page(&self) -> Option<&AppPage> {
        self.app_pages.iter().find(|page| page.is_default)
    }
}

/// Sent when the requested page could not be matched. An empty name means
/// resolution fell back to the default page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageNotFound {
    pub page_name: String,
}

/// Asks the scheduler to replay a fragment every `interval` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoRerun {
    pub interval: f64,
    pub fragment_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardMsg {
    Navigation(NavigationMsg),
    PageNotFound(PageNotFound),
    AutoRerun(AutoRerun),
}

impl ForwardMsg {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn as_navigation(&self) -> Option<&NavigationMsg> {
        match self {
            ForwardMsg::Navigation(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn as_auto_rerun(&self) -> Option<&AutoRerun> {
        match self {
            ForwardMsg::AutoRerun(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn is_page_not_found(&self) -> bool {
        matches!(self, ForwardMsg::PageNotFound(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ForwardMsg::Navigation(_) => "navigation",
            ForwardMsg::PageNotFound(_) => "page_not_found",
            ForwardMsg::AutoRerun(_) => "auto_rerun",
        }
    }
}
