use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Default desktop user agent sent to every platform.
pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Shared HTTP scaffolding for source adapters.
///
/// Each adapter instance owns one `SourceClient` carrying the platform's
/// default headers and an optional cookie jar. Requests built through
/// [`SourceClient::get`] pick both up automatically, so adapter code only
/// deals with URLs and response bodies.
#[derive(Debug, Clone)]
pub struct SourceClient {
    /// Name of the platform, e.g. "bilibili", "tencent".
    pub platform_name: String,
    pub client: Client,
    headers: HeaderMap,
    cookies: FxHashMap<String, String>,
}

impl SourceClient {
    pub fn new<S: Into<String>>(platform_name: S, client: Client) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(DEFAULT_UA));
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json, text/xml, text/plain, */*"),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.8,en-US;q=0.5,en;q=0.3"),
        );

        Self {
            platform_name: platform_name.into(),
            client,
            headers,
            cookies: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn set_referer_static(&mut self, referer: &'static str) {
        self.headers
            .insert(reqwest::header::REFERER, HeaderValue::from_static(referer));
    }

    #[inline]
    pub fn set_origin_static(&mut self, origin: &'static str) {
        self.headers
            .insert(reqwest::header::ORIGIN, HeaderValue::from_static(origin));
    }

    pub fn add_cookie<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Import cookies from a "name1=value1; name2=value2" string.
    pub fn set_cookies_from_string(&mut self, cookie_string: &str) {
        for part in cookie_string.split(';').map(str::trim) {
            let Some((name, value)) = part.split_once('=') else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                continue;
            }
            self.cookies.insert(name.to_owned(), value.to_owned());
        }
    }

    fn build_cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut out = String::new();
        for (name, value) in &self.cookies {
            if !out.is_empty() {
                out.push_str("; ");
            }
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        Some(out)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut headers = self.headers.clone();

        if let Some(cookie_header) = self.build_cookie_header() {
            match HeaderValue::from_str(&cookie_header) {
                Ok(value) => {
                    headers.insert(reqwest::header::COOKIE, value);
                }
                Err(e) => {
                    // Malformed cookies: skip the header rather than send garbage.
                    debug!(error = %e, "failed to build Cookie header");
                }
            }
        }

        self.client.request(method, url).headers(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_string_parsing() {
        let mut client = SourceClient::new("test", Client::new());
        client.set_cookies_from_string("sid=abc123; token=xyz; =bad; empty=");

        assert_eq!(client.cookies.get("sid").map(String::as_str), Some("abc123"));
        assert_eq!(client.cookies.get("token").map(String::as_str), Some("xyz"));
        assert_eq!(client.cookies.len(), 2);
    }

    #[test]
    fn test_cookie_header_round_trip() {
        let mut client = SourceClient::new("test", Client::new());
        assert!(client.build_cookie_header().is_none());

        client.add_cookie("a", "1");
        let header = client.build_cookie_header().unwrap();
        assert_eq!(header, "a=1");
    }
}
