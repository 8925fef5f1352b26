use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use url::Url;

/// A call that can be built into an HTTP request and sent by
/// [`HttpApiClient`](super::HttpApiClient).
pub trait Endpoint {
    type Response: for<'a> Deserialize<'a> + Debug;

    fn method(&self) -> reqwest::Method {
        reqwest::Method::GET
    }

    /// Path relative to the client's base url.
    fn path(&self) -> String;

    /// Url-encoded query string, if any.
    #[inline]
    fn query(&self) -> Option<String> {
        None
    }

    #[inline]
    fn headers(&self) -> Option<reqwest::header::HeaderMap> {
        None
    }

    /// Full url including the query. Implementors should not override this.
    fn url(&self, base_url: &Url) -> Result<Url, url::ParseError> {
        let mut url = base_url.join(&self.path())?;
        url.set_query(self.query().as_deref());
        Ok(url)
    }
}

/// Serialize parameters into a url query string; `None` when there is
/// nothing to send.
#[inline]
pub fn serialize_query<Q: Serialize>(q: &Q) -> Option<String> {
    serde_urlencoded::to_string(q).ok().filter(|s| !s.is_empty())
}
