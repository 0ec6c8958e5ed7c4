//! JSON helpers shared by the providers.

use super::HttpTransport;
use crate::core::UpdaterError;
use reqwest::Url;
use serde::de::DeserializeOwned;

/// GET `url` and decode the body as `T`.
///
/// # Errors
///
/// Transport errors pass through unchanged; decode failures become
/// [`UpdaterError::Parse`] carrying the URL.
pub async fn fetch_json<T: DeserializeOwned>(
    transport: &dyn HttpTransport,
    url: &str,
) -> Result<T, UpdaterError> {
    let body = transport.get_text(url).await?;
    serde_json::from_str(&body).map_err(|e| UpdaterError::parse(url, e))
}

/// Build an API URL from a base, path segments and query pairs.
///
/// Segments are percent-encoded individually, so names containing `/` or
/// spaces cannot escape their position in the path.
///
/// ```rust
/// use updraft::net::api_url;
///
/// let url = api_url("https://api.example.com/v1/", &["projects", "a b"], &[("limit", "5".into())]).unwrap();
/// assert_eq!(url, "https://api.example.com/v1/projects/a%20b?limit=5");
/// ```
///
/// # Errors
///
/// Returns [`UpdaterError::Configuration`] when `base` is not an absolute
/// http(s) URL.
pub fn api_url(base: &str, segments: &[&str], query: &[(&str, String)]) -> Result<String, UpdaterError> {
    let mut url = Url::parse(base)
        .map_err(|e| UpdaterError::config("url", format!("invalid base URL '{base}': {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| UpdaterError::config("url", format!("base URL '{base}' cannot have a path")))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeTransport;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Project {
        versions: Vec<String>,
    }

    #[test]
    fn test_api_url_joins_segments() {
        let url = api_url("https://api.example.com/v2", &["projects", "paper"], &[]).unwrap();
        assert_eq!(url, "https://api.example.com/v2/projects/paper");

        let url = api_url("https://h.example.com/api/v1/", &["projects", "o", "s", "versions"], &[
            ("limit", "25".to_string()),
            ("offset", "50".to_string()),
        ])
        .unwrap();
        assert_eq!(url, "https://h.example.com/api/v1/projects/o/s/versions?limit=25&offset=50");
    }

    #[test]
    fn test_api_url_rejects_relative_base() {
        assert!(matches!(api_url("not a url", &[], &[]), Err(UpdaterError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_fetch_json_decodes() {
        let transport = FakeTransport::new().with_json("https://x.test/p", r#"{"versions":["1.0"]}"#);
        let project: Project = fetch_json(&transport, "https://x.test/p").await.unwrap();
        assert_eq!(project.versions, vec!["1.0"]);
    }

    #[tokio::test]
    async fn test_fetch_json_parse_error_carries_url() {
        let transport = FakeTransport::new().with_json("https://x.test/p", "<html>");
        let err = fetch_json::<Project>(&transport, "https://x.test/p").await.unwrap_err();
        match err {
            UpdaterError::Parse { url, .. } => assert_eq!(url, "https://x.test/p"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
