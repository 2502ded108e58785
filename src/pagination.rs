//! Limit/offset pagination for list endpoints.

use rocket::http::uri::Origin;
use rocket::http::RawStr;
use rocket::request::{self, FromRequest, Request};
use serde::Serialize;

/// A window over a list, parsed from `limit` and `offset` query values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitOffset {
    pub limit: i64,
    pub offset: i64,
}

impl LimitOffset {
    /// A non-positive or unparseable `limit` falls back to `default_limit`;
    /// with neither, the list is not paginated. A bad `offset` reads as 0.
    pub fn from_query(
        limit: Option<&str>,
        offset: Option<&str>,
        default_limit: Option<i64>,
    ) -> Option<LimitOffset> {
        let limit = limit
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0)
            .or(default_limit)?;
        let offset = offset
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .unwrap_or(0);
        Some(LimitOffset { limit, offset })
    }

    /// An end past `i64::MAX` cannot have anything after it.
    pub fn next_offset(&self, count: i64) -> Option<i64> {
        match self.offset.checked_add(self.limit) {
            Some(end) if end < count => Some(end),
            _ => None,
        }
    }

    /// `Some(None)` means the previous page starts at the beginning and the
    /// link carries no offset at all.
    pub fn previous_offset(&self) -> Option<Option<i64>> {
        if self.offset <= 0 {
            None
        } else if self.offset - self.limit <= 0 {
            Some(None)
        } else {
            Some(Some(self.offset - self.limit))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Absolute address of the current request, used to build page links.
/// Query parameters are held decoded and encoded again on output.
#[derive(Debug, Clone)]
pub struct RequestUrl {
    base: String,
    params: Vec<(String, String)>,
}

impl RequestUrl {
    /// `host` prefixes the path when known; otherwise links stay relative.
    pub fn from_origin(host: Option<&str>, uri: &Origin<'_>) -> Self {
        let path = uri.path().as_str();
        let base = match host {
            Some(host) => format!("http://{}{}", host, path),
            None => path.to_string(),
        };
        let params = uri
            .query()
            .map(|query| {
                query
                    .segments()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        RequestUrl { base, params }
    }

    /// Sets `key` to `value`, keeping the position of an existing pair.
    pub fn replace_param(&self, key: &str, value: &str) -> RequestUrl {
        let mut params = self.params.clone();
        let mut found = false;
        params.retain_mut(|(k, v)| {
            if k.as_str() != key {
                return true;
            }
            if found {
                return false;
            }
            found = true;
            *v = value.to_string();
            true
        });
        if !found {
            params.push((key.to_string(), value.to_string()));
        }
        RequestUrl {
            base: self.base.clone(),
            params,
        }
    }

    pub fn remove_param(&self, key: &str) -> RequestUrl {
        RequestUrl {
            base: self.base.clone(),
            params: self
                .params
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .cloned()
                .collect(),
        }
    }

    pub fn as_string(&self) -> String {
        if self.params.is_empty() {
            return self.base.clone();
        }
        let query = self
            .params
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    RawStr::new(k).percent_encode().as_str(),
                    RawStr::new(v).percent_encode().as_str()
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.base, query)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestUrl {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, ()> {
        let host = request.host().map(|host| host.to_string());
        request::Outcome::Success(RequestUrl::from_origin(host.as_deref(), request.uri()))
    }
}

/// Builds the response envelope for one page of `count` items.
pub fn paginate<T>(
    results: Vec<T>,
    count: i64,
    window: LimitOffset,
    url: &RequestUrl,
) -> Page<T> {
    let limit = window.limit.to_string();
    let next = window.next_offset(count).map(|offset| {
        url.replace_param("limit", &limit)
            .replace_param("offset", &offset.to_string())
            .as_string()
    });
    let previous = window.previous_offset().map(|offset| {
        let url = url.replace_param("limit", &limit);
        match offset {
            Some(offset) => url.replace_param("offset", &offset.to_string()).as_string(),
            None => url.remove_param("offset").as_string(),
        }
    });
    Page {
        count,
        next,
        previous,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_required_unless_defaulted() {
        assert_eq!(LimitOffset::from_query(None, Some("5"), None), None);
        assert_eq!(
            LimitOffset::from_query(None, None, Some(10)),
            Some(LimitOffset { limit: 10, offset: 0 })
        );
        assert_eq!(
            LimitOffset::from_query(Some("3"), Some("6"), None),
            Some(LimitOffset { limit: 3, offset: 6 })
        );
    }

    #[test]
    fn bad_values_fall_back() {
        assert_eq!(LimitOffset::from_query(Some("0"), None, None), None);
        assert_eq!(LimitOffset::from_query(Some("-2"), None, None), None);
        assert_eq!(
            LimitOffset::from_query(Some("abc"), None, Some(4)),
            Some(LimitOffset { limit: 4, offset: 0 })
        );
        assert_eq!(
            LimitOffset::from_query(Some("2"), Some("-1"), None),
            Some(LimitOffset { limit: 2, offset: 0 })
        );
        assert_eq!(
            LimitOffset::from_query(Some("2"), Some("x"), None),
            Some(LimitOffset { limit: 2, offset: 0 })
        );
    }

    #[test]
    fn neighbour_offsets() {
        let window = LimitOffset { limit: 2, offset: 0 };
        assert_eq!(window.next_offset(5), Some(2));
        assert_eq!(window.previous_offset(), None);

        let window = LimitOffset { limit: 2, offset: 3 };
        assert_eq!(window.next_offset(5), None);
        assert_eq!(window.previous_offset(), Some(Some(1)));

        let window = LimitOffset { limit: 2, offset: 2 };
        assert_eq!(window.previous_offset(), Some(None));
    }

    fn url(host: Option<&str>, uri: &'static str) -> RequestUrl {
        RequestUrl::from_origin(host, &Origin::parse(uri).unwrap())
    }

    #[test]
    fn huge_limit_has_no_next_page() {
        let window = LimitOffset {
            limit: i64::MAX,
            offset: 5,
        };
        assert_eq!(window.next_offset(10), None);
        assert_eq!(window.previous_offset(), Some(None));
    }

    #[test]
    fn links_keep_other_params() {
        let url = url(Some("testserver"), "/v1/posts/?group=1&limit=2&offset=2");
        let page = paginate(vec![1, 2], 7, LimitOffset { limit: 2, offset: 2 }, &url);

        assert_eq!(page.count, 7);
        assert_eq!(
            page.next.as_deref(),
            Some("http://testserver/v1/posts/?group=1&limit=2&offset=4")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("http://testserver/v1/posts/?group=1&limit=2")
        );
    }

    #[test]
    fn links_add_missing_params() {
        let url = url(None, "/v1/posts/");
        let page = paginate(vec!["a"], 3, LimitOffset { limit: 1, offset: 0 }, &url);
        assert_eq!(page.next.as_deref(), Some("/v1/posts/?limit=1&offset=1"));
        assert_eq!(page.previous, None);
    }

    #[test]
    fn duplicate_params_collapse() {
        let url = url(None, "/x/?offset=1&offset=9");
        assert_eq!(url.replace_param("offset", "4").as_string(), "/x/?offset=4");
        assert_eq!(url.remove_param("offset").as_string(), "/x/");
    }

    #[test]
    fn encoded_params_are_matched_and_kept() {
        let url = url(None, "/x/?%6Cimit=2&q=a%26b%3Dc&offset=%34");
        assert_eq!(
            url.replace_param("limit", "3")
                .replace_param("offset", "6")
                .as_string(),
            "/x/?limit=3&q=a%26b%3Dc&offset=6"
        );
    }
}
