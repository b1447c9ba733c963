//! Site URL normalization and course link parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::{MoodleError, MoodleResult};

static COURSE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)course/view\.php\?id=([0-9]{1,6})$").expect("valid course link regex")
});

/// Parse a site URL given by the user.
///
/// The path always ends with a slash so that relative endpoints like
/// `webservice/rest/server.php` resolve below the site's directory.
pub fn parse_site_url(input: &str) -> MoodleResult<Url> {
    let trimmed = input.trim();
    let mut url = Url::parse(trimmed).map_err(|e| MoodleError::InvalidUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(MoodleError::InvalidUrl {
            url: trimmed.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Split a course link into the site URL and the course id.
///
/// ```
/// use moodle2pdf::moodle::parse_course_link;
///
/// let (site, id) = parse_course_link("https://moodle.example.org/school/course/view.php?id=7").unwrap();
/// assert_eq!(site.as_str(), "https://moodle.example.org/school/");
/// assert_eq!(id, 7);
/// ```
pub fn parse_course_link(link: &str) -> MoodleResult<(Url, u64)> {
    let link = link.trim();
    let captures =
        COURSE_LINK.captures(link).ok_or_else(|| MoodleError::InvalidLink(link.to_string()))?;

    let site = parse_site_url(&captures[1])?;
    let course_id =
        captures[2].parse::<u64>().map_err(|_| MoodleError::InvalidLink(link.to_string()))?;

    tracing::debug!("Result of link parsing: {} {}", site, course_id);
    Ok((site, course_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_url_gets_trailing_slash() {
        let url = parse_site_url("https://moodle.example.org/school").unwrap();
        assert_eq!(url.as_str(), "https://moodle.example.org/school/");
        assert_eq!(
            url.join("webservice/rest/server.php").unwrap().as_str(),
            "https://moodle.example.org/school/webservice/rest/server.php"
        );
    }

    #[test]
    fn test_site_url_rejects_garbage() {
        assert!(matches!(parse_site_url("not a url"), Err(MoodleError::InvalidUrl { .. })));
        assert!(matches!(parse_site_url("ftp://example.org"), Err(MoodleError::InvalidUrl { .. })));
    }

    #[test]
    fn test_course_link() {
        let (site, id) =
            parse_course_link("https://moodle.nibis.de/bbs_osb/course/view.php?id=288").unwrap();
        assert_eq!(site.as_str(), "https://moodle.nibis.de/bbs_osb/");
        assert_eq!(id, 288);
    }

    #[test]
    fn test_glossary_link_is_not_a_course_link() {
        let err =
            parse_course_link("https://moodle.nibis.de/bbs_osb/mod/glossary/view.php?id=12")
                .unwrap_err();
        assert!(matches!(err, MoodleError::InvalidLink(_)));
    }

    #[test]
    fn test_course_link_id_too_long() {
        assert!(parse_course_link("https://example.org/course/view.php?id=1234567").is_err());
    }
}
