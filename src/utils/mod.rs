use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

pub const FALLBACK_PREFIX: &str = "images";
pub const DEFAULT_EXTENSION: &str = "jpg";

static TRAILING_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.([a-zA-Z0-9]+)(?:[?#]|$)").expect("valid extension pattern")
});

/// Filename stem shared by every image of a run.
///
/// `/condo/{name}/.../{room}` becomes `condo_{name without hyphens}_{room}`.
/// A last segment starting with `#` is an anchor, so the room comes from the
/// segment before it. Anything else, including unparsable URLs, gives
/// `"images"`.
pub fn derive_prefix(page_url: &str) -> String {
    let Ok(url) = Url::parse(page_url) else {
        return FALLBACK_PREFIX.to_string();
    };
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    if segments.len() < 3 || segments[0] != "condo" {
        return FALLBACK_PREFIX.to_string();
    }

    let condo_name = segments[1].replace('-', "");
    let last = segments[segments.len() - 1];
    let room = if is_anchor_segment(last) {
        segments[segments.len() - 2]
    } else {
        last
    };

    format!("condo_{}_{}", condo_name, room)
}

fn is_anchor_segment(segment: &str) -> bool {
    segment.starts_with('#') || segment.to_ascii_lowercase().starts_with("%23")
}

/// Lowercased extension of the image URL's path, if it has one.
pub fn derive_extension(image_url: &str) -> Option<String> {
    let url = Url::parse(image_url).ok()?;
    let caps = TRAILING_EXTENSION.captures(url.path())?;
    Some(caps[1].to_ascii_lowercase())
}

/// `{prefix}_{index + 1}.{extension}`
pub fn image_filename(prefix: &str, index: usize, image_url: &str) -> String {
    let extension = derive_extension(image_url).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    sanitize_filename(&format!("{}_{}.{}", prefix, index + 1, extension))
}

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// First free path for `filename` in `dir`, numbering duplicates as
/// `name (1).ext`, `name (2).ext`, ...
pub async fn available_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }

    let (stem, extension) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };

    let mut n = 1;
    loop {
        let name = match extension {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(name);
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

/// The user's download folder, or `./downloads` when there is none.
pub fn default_save_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("downloads"))
}
