//! Static file serving: maps a request path onto a configured root
//! directory, rejecting any attempt to escape it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::RouteConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileServeError {
    /// The request path contained a `..` segment or otherwise resolved
    /// outside the route's root.
    Traversal,
    NotFound,
    Forbidden,
}

pub struct ResolvedFile {
    pub path: PathBuf,
    pub is_directory: bool,
    pub size: u64,
}

pub struct FileServer<'a> {
    route: &'a RouteConfig,
}

impl<'a> FileServer<'a> {
    pub fn new(route: &'a RouteConfig) -> Self {
        FileServer { route }
    }

    /// Joins `request_path` (already stripped of the route's path prefix)
    /// onto the route's root, rejecting `..` segments outright rather than
    /// relying solely on a post-hoc canonicalize check.
    fn sanitize(&self, request_path: &str) -> Result<PathBuf, FileServeError> {
        if request_path.split('/').any(|seg| seg == "..") {
            return Err(FileServeError::Traversal);
        }
        let rel = request_path.trim_start_matches('/');
        Ok(if rel.is_empty() {
            self.route.root.clone()
        } else {
            self.route.root.join(rel)
        })
    }

    /// Resolves a request path to a file on disk, serving `index` inside a
    /// directory when present, rejecting traversal, and treating symlinks
    /// that escape the root the same as a traversal attempt.
    pub fn resolve(&self, request_path: &str) -> Result<ResolvedFile, FileServeError> {
        let candidate = self.sanitize(request_path)?;

        let metadata = fs::metadata(&candidate).map_err(|_| FileServeError::NotFound)?;
        let final_path = if metadata.is_dir() {
            let indexed = candidate.join(&self.route.index);
            if fs::metadata(&indexed).map(|m| m.is_file()).unwrap_or(false) {
                indexed
            } else if self.route.autoindex {
                return Ok(ResolvedFile {
                    path: candidate,
                    is_directory: true,
                    size: 0,
                });
            } else {
                return Err(FileServeError::Forbidden);
            }
        } else {
            candidate
        };

        if let (Ok(canon_root), Ok(canon_file)) = (fs::canonicalize(&self.route.root), fs::canonicalize(&final_path)) {
            if !canon_file.starts_with(&canon_root) {
                return Err(FileServeError::Forbidden);
            }
        }

        let size = fs::metadata(&final_path).map_err(|_| FileServeError::NotFound)?.len();
        Ok(ResolvedFile {
            path: final_path,
            is_directory: false,
            size,
        })
    }

    /// Renders a simple HTML directory listing.
    pub fn generate_autoindex(&self, dir: &Path, request_path: &str) -> Result<String, FileServeError> {
        let entries = fs::read_dir(dir).map_err(|_| FileServeError::NotFound)?;
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html><head><title>Index of ");
        html.push_str(request_path);
        html.push_str("</title></head><body>\n<h1>Index of ");
        html.push_str(request_path);
        html.push_str("</h1>\n<ul>\n");
        if request_path != "/" {
            html.push_str("<li><a href=\"../\">../</a></li>\n");
        }
        for name in names {
            html.push_str(&format!("<li><a href=\"{name}\">{name}</a></li>\n"));
        }
        html.push_str("</ul>\n</body></html>\n");
        Ok(html)
    }
}

const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Formats a `SystemTime` as an RFC 1123 `Date`/`Last-Modified` header
/// value, e.g. `Tue, 15 Nov 1994 08:12:31 GMT`.
pub fn format_http_date(time: SystemTime) -> String {
    let secs = time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let days_since_epoch = secs / 86400;
    let time_of_day = secs % 86400;
    let (hour, minute, second) = (time_of_day / 3600, (time_of_day / 60) % 60, time_of_day % 60);

    // 1970-01-01 was a Thursday.
    let weekday = DAYS[((days_since_epoch + 4) % 7) as usize];

    let (year, month, day) = civil_from_days(days_since_epoch as i64);
    format!(
        "{weekday}, {day:02} {} {year} {hour:02}:{minute:02}:{second:02} GMT",
        MONTHS[(month - 1) as usize]
    )
}

/// Howard Hinnant's days-from-civil algorithm, run in reverse.
fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as i64;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as i64;
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

pub fn mime_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "txt" => "text/plain; charset=utf-8",
        "pdf" => "application/pdf",
        "xml" => "application/xml",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        _ => "text/html",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn route(tmp: &Path) -> RouteConfig {
        RouteConfig {
            path: "/".to_string(),
            root: tmp.to_path_buf(),
            index: "index.html".to_string(),
            autoindex: false,
        }
    }

    #[test]
    fn rejects_dotdot_traversal() {
        let tmp = std::env::temp_dir();
        let cfg = route(&tmp);
        let fs = FileServer::new(&cfg);
        assert_eq!(fs.resolve("/../etc/passwd").unwrap_err(), FileServeError::Traversal);
    }

    #[test]
    fn serves_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        let cfg = route(dir.path());
        let fs = FileServer::new(&cfg);
        let resolved = fs.resolve("/a.txt").unwrap();
        assert_eq!(resolved.size, 2);
        assert!(!resolved.is_directory);
    }

    #[test]
    fn empty_path_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), b"home").unwrap();
        let cfg = route(dir.path());
        let fs = FileServer::new(&cfg);
        let resolved = fs.resolve("/").unwrap();
        assert_eq!(resolved.path, dir.path().join("index.html"));
    }

    #[test]
    fn missing_index_without_autoindex_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = route(dir.path());
        let fs = FileServer::new(&cfg);
        assert_eq!(fs.resolve("/").unwrap_err(), FileServeError::Forbidden);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = route(dir.path());
        let fs = FileServer::new(&cfg);
        assert_eq!(fs.resolve("/nope.txt").unwrap_err(), FileServeError::NotFound);
    }

    #[test]
    fn formats_known_epoch_date() {
        let t = UNIX_EPOCH + std::time::Duration::from_secs(784887151);
        assert_eq!(format_http_date(t), "Tue, 15 Nov 1994 08:12:31 GMT");
    }

    #[test]
    fn mime_type_lookup() {
        assert_eq!(mime_type_for(&PathBuf::from("x.html")), "text/html; charset=utf-8");
        assert_eq!(mime_type_for(&PathBuf::from("x.jpg")), "image/jpg");
        assert_eq!(mime_type_for(&PathBuf::from("x.bin")), "text/html");
    }
}
