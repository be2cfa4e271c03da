use url::Url;

/// Returns the origin key (`host` or `host:port`) of a URL
///
/// The host is lowercased. Explicit ports are kept because two services on
/// the same host but different ports have independent robots.txt files.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_harvest::url::origin_key;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(origin_key(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(origin_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn origin_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}
