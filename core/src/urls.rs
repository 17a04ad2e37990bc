//! Base-URL navigation.
//!
//! Relative updates are always a path join followed by normalization
//! (`.` and `..` segments collapsed), never raw string concatenation. The
//! stored base keeps the caller's spelling until the first relative update,
//! so a base of `http://localhost` reads back unchanged.

use url::{ParseError, Url};

use crate::error::GatewayError;

/// Join `path` onto `base` and normalize the result.
///
/// Only the path part of `path` is appended to the base's path. A query or
/// fragment on `path` replaces the base's; otherwise the base's are kept, so
/// `http://h/x/items?page=2` + `7` is `http://h/x/items/7?page=2`.
///
/// Trailing slashes are dropped from the resulting path so that repeated
/// navigation composes: `http://h/x` + `a/b` + `..` is `http://h/x/a`.
pub fn join_relative(base: &str, path: &str) -> Result<String, GatewayError> {
    let invalid = |reason: String| {
        GatewayError::configuration(format!("cannot join {path:?} onto {base:?}: {reason}"))
    };
    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("base has no hierarchical path".to_string()));
    }

    let (rest, fragment) = match path.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (path, None),
    };
    let (relative, query) = match rest.split_once('?') {
        Some((relative, query)) => (relative, Some(query)),
        None => (rest, None),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in url.path().split('/').chain(relative.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    let normalized = format!("/{}", segments.join("/"));
    url.set_path(&normalized);
    if let Some(query) = query {
        url.set_query(Some(query).filter(|q| !q.is_empty()));
    }
    if let Some(fragment) = fragment {
        url.set_fragment(Some(fragment).filter(|f| !f.is_empty()));
    }
    Ok(render(&url))
}

/// Resolve a request target against `base`.
///
/// A target is absolute only when it names a host (`https://other/y`);
/// anything else, including `projects:list`, is joined onto the base. An
/// empty target resolves to the base itself.
pub fn resolve(base: &str, target: &str) -> Result<Url, GatewayError> {
    if target.is_empty() {
        return parse_absolute(base);
    }
    match Url::parse(target) {
        Ok(url) if url.has_host() => Ok(url),
        Ok(_) | Err(ParseError::RelativeUrlWithoutBase) => {
            parse_absolute(&join_relative(base, target)?)
        }
        Err(e) => Err(GatewayError::configuration(format!(
            "invalid request target {target:?}: {e}"
        ))),
    }
}

fn parse_absolute(raw: &str) -> Result<Url, GatewayError> {
    Url::parse(raw).map_err(|e| GatewayError::configuration(format!("invalid base URL {raw:?}: {e}")))
}

/// Serialize without the lone `/` the URL parser adds to an empty path.
fn render(url: &Url) -> String {
    let rendered = url.to_string();
    if url.path() == "/" && url.query().is_none() && url.fragment().is_none() {
        rendered.trim_end_matches('/').to_string()
    } else {
        rendered
    }
}
