use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use reqwest::Url;

/// Join `path` onto `base` and append percent-encoded query parameters.
///
/// `base` may or may not end in a slash, and may itself carry a path prefix
/// (`https://example.com/api`); `path` is always appended to it rather than
/// replacing it.
pub fn build_url(base: &str, path: &str, query: &[(&str, &str)]) -> Result<String> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    let url = if query.is_empty() {
        Url::parse(&joined)
    } else {
        Url::parse_with_params(&joined, query)
    };
    Ok(url.or_raise(|| ErrorKind::InvalidRequest(joined))?.into())
}
