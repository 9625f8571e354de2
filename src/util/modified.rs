//! Modification stamps for URL-addressed resources.

use std::fs;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::LAST_MODIFIED;
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::{debug, warn};
use url::Url;

use crate::caching::LastModified;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// IMF-fixdate, the only form servers are required to send.
const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Last modification of the resource at `url`.
///
/// `file` URLs report the filesystem mtime and `http(s)` URLs the
/// `Last-Modified` header of a `HEAD` request. Anything unreachable,
/// unparsable or of another scheme is `Unknown`.
pub fn last_modified(url: &Url) -> LastModified {
    match url.scheme() {
        "file" => file_modified(url),
        "http" | "https" => http_modified(url),
        scheme => {
            debug!(url = %url, scheme, "No modification lookup for scheme");
            LastModified::Unknown
        }
    }
}

fn file_modified(url: &Url) -> LastModified {
    let Ok(path) = url.to_file_path() else {
        warn!(url = %url, "File URL does not name a local path");
        return LastModified::Unknown;
    };

    match fs::metadata(&path).and_then(|meta| meta.modified()) {
        Ok(modified) => LastModified::from(modified),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Cannot read modification time");
            LastModified::Unknown
        }
    }
}

fn http_modified(url: &Url) -> LastModified {
    let Some(client) = client() else {
        return LastModified::Unknown;
    };

    let response = match client.head(url.as_str()).send() {
        Ok(response) => response,
        Err(err) => {
            warn!(url = %url, error = %err, "Modification lookup failed");
            return LastModified::Unknown;
        }
    };

    let header = response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|value| value.to_str().ok());
    match header {
        Some(value) => parse_http_date(value),
        None => {
            debug!(url = %url, status = %response.status(), "No Last-Modified header");
            LastModified::Unknown
        }
    }
}

fn client() -> Option<&'static Client> {
    static CLIENT: OnceLock<Option<Client>> = OnceLock::new();
    CLIENT
        .get_or_init(|| match Client::builder().timeout(LOOKUP_TIMEOUT).build() {
            Ok(client) => Some(client),
            Err(err) => {
                warn!(error = %err, "Cannot build HTTP client for modification lookups");
                None
            }
        })
        .as_ref()
}

pub(crate) fn parse_http_date(value: &str) -> LastModified {
    match PrimitiveDateTime::parse(value.trim(), HTTP_DATE) {
        Ok(parsed) => LastModified::At(parsed.assume_utc()),
        Err(err) => {
            debug!(value, error = %err, "Unparsable Last-Modified header");
            LastModified::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use filetime::{FileTime, set_file_mtime};
    use time::macros::datetime;

    use super::*;

    #[test]
    fn parses_imf_fixdate() {
        assert_eq!(
            parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"),
            LastModified::At(datetime!(1994-11-06 08:49:37 UTC))
        );
        assert_eq!(parse_http_date("yesterday"), LastModified::Unknown);
    }

    #[test]
    fn file_urls_report_mtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("page.txt");
        fs::write(&path, "hello").expect("write");
        set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 0)).expect("set mtime");

        let url = Url::from_file_path(&path).expect("absolute path");
        assert_eq!(last_modified(&url), LastModified::from_millis(1_600_000_000_000));
    }

    #[test]
    fn missing_files_are_unknown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = Url::from_file_path(dir.path().join("gone.txt")).expect("absolute path");

        assert_eq!(last_modified(&url), LastModified::Unknown);
    }

    #[test]
    fn other_schemes_are_unknown() {
        let url = Url::parse("data:text/plain,hello").expect("valid url");
        assert_eq!(last_modified(&url), LastModified::Unknown);
    }
}
