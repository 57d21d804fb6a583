use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::message::JsonMap;

/// Page metadata captured at send time and merged into `context.page`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageDefaults {
    pub path: String,
    pub referrer: String,
    pub search: String,
    pub title: String,
    pub url: String,
}

impl PageDefaults {
    pub fn to_map(&self) -> JsonMap {
        let mut map = JsonMap::new();
        map.insert("path".to_string(), json!(self.path));
        map.insert("referrer".to_string(), json!(self.referrer));
        map.insert("search".to_string(), json!(self.search));
        map.insert("title".to_string(), json!(self.title));
        map.insert("url".to_string(), json!(self.url));
        map
    }
}

/// Port for the page-context collaborator. A browser embedding would derive
/// these values from the current document/location.
pub trait PageContext: Send + Sync {
    fn page_defaults(&self) -> PageDefaults;
}

/// Page context backed by a fixed set of values.
pub struct StaticPageContext {
    defaults: PageDefaults,
}

impl StaticPageContext {
    pub fn new(defaults: PageDefaults) -> Self {
        Self { defaults }
    }
}

impl Default for StaticPageContext {
    fn default() -> Self {
        Self {
            defaults: PageDefaults::default(),
        }
    }
}

impl PageContext for StaticPageContext {
    fn page_defaults(&self) -> PageDefaults {
        self.defaults.clone()
    }
}
