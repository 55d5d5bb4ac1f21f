//! Top-level success documents for collection requests.

use jsonapi_core::{PagePosition, Resource};
use jsonapi_exec::{Execution, Pagination};
use serde::Serialize;

use crate::extract::QueryPairs;

pub const JSONAPI_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize)]
pub struct JsonApiObject {
    pub version: &'static str,
}

impl Default for JsonApiObject {
    fn default() -> Self {
        Self {
            version: JSONAPI_VERSION,
        }
    }
}

/// Pagination links; unavailable ones render as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_link: String,
    pub first: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub last: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMetaView {
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl From<&Pagination> for PageMetaView {
    fn from(p: &Pagination) -> Self {
        let (number, offset, cursor) = match &p.position {
            PagePosition::Number(n) => (Some(*n), None, None),
            PagePosition::Offset(o) => (None, Some(*o), None),
            PagePosition::Cursor(c) => (None, None, Some(c.clone())),
        };
        Self {
            size: p.size,
            number,
            offset,
            cursor,
            total: p.total,
            has_next_page: p.has_next_page,
            has_previous_page: p.has_previous_page,
            next_cursor: p.next_cursor.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub page: PageMetaView,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionDocument {
    pub data: Vec<Resource>,
    pub included: Vec<Resource>,
    pub jsonapi: JsonApiObject,
    pub links: Links,
    pub meta: Meta,
}

/// Path and query of the request the document answers; page links are derived from it.
#[derive(Debug, Clone)]
pub struct RequestTarget {
    pub path: String,
    pub query: QueryPairs,
}

impl RequestTarget {
    pub fn new(path: impl Into<String>, query: QueryPairs) -> Self {
        Self {
            path: path.into(),
            query,
        }
    }

    fn render(&self, pairs: &[(&str, String)]) -> String {
        if pairs.is_empty() {
            return self.path.clone();
        }
        let mut ser = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs {
            ser.append_pair(k, v);
        }
        format!("{}?{}", self.path, ser.finish())
    }

    pub fn self_link(&self) -> String {
        let pairs: Vec<(&str, String)> = self.query.iter().map(|(k, v)| (k, v.to_owned())).collect();
        self.render(&pairs)
    }

    /// Same request with the page position replaced by `position`.
    pub fn page_link(&self, size: u64, position: &PagePosition) -> String {
        let size_param = if self.query.iter().any(|(k, _)| k == "page[limit]") {
            "page[limit]"
        } else {
            "page[size]"
        };
        let mut pairs: Vec<(&str, String)> = self
            .query
            .iter()
            .filter(|(k, _)| !k.starts_with("page["))
            .map(|(k, v)| (k, v.to_owned()))
            .collect();
        match position {
            PagePosition::Number(n) => pairs.push(("page[number]", n.to_string())),
            PagePosition::Offset(o) => pairs.push(("page[offset]", o.to_string())),
            PagePosition::Cursor(c) => pairs.push(("page[cursor]", c.clone())),
        }
        pairs.push((size_param, size.to_string()));
        self.render(&pairs)
    }
}

impl CollectionDocument {
    pub fn new(execution: Execution, target: &RequestTarget) -> Self {
        let p = &execution.pagination;
        let link = |pos: &Option<PagePosition>| pos.as_ref().map(|pos| target.page_link(p.size, pos));
        let links = Links {
            self_link: target.self_link(),
            first: link(&p.first),
            prev: link(&p.prev),
            next: link(&p.next),
            last: link(&p.last),
        };
        let meta = Meta {
            page: PageMetaView::from(p),
        };
        Self {
            data: execution.data,
            included: execution.included,
            jsonapi: JsonApiObject::default(),
            links,
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(query: &str) -> RequestTarget {
        RequestTarget::new("/articles", QueryPairs::parse(query))
    }

    #[test]
    fn page_links_replace_only_page_params() {
        let t = target("sort=-title&page%5Bnumber%5D=2&filter%5Btitle%5D=x");
        assert_eq!(
            t.page_link(10, &PagePosition::Number(3)),
            "/articles?sort=-title&filter%5Btitle%5D=x&page%5Bnumber%5D=3&page%5Bsize%5D=10"
        );
    }

    #[test]
    fn offset_links_keep_limit_alias() {
        let t = target("page%5Blimit%5D=5&page%5Boffset%5D=10");
        assert_eq!(
            t.page_link(5, &PagePosition::Offset(5)),
            "/articles?page%5Boffset%5D=5&page%5Blimit%5D=5"
        );
    }

    #[test]
    fn self_link_without_query() {
        assert_eq!(target("").self_link(), "/articles");
    }
}
