use url::Url;

const SIZE_UNITS: [&str; 5] = ["bytes", "KB", "MB", "GB", "PB"];

/// Formats a byte count as `"<value> <unit>"` with three decimals.
pub fn human_size(size: u64) -> String {
    let mut value = size as f64;
    for unit in SIZE_UNITS {
        if value < 1024.0 {
            return format!("{:.3} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{} ???", value)
}

/// Derives an output filename from the last path segment of `url_str`.
pub fn get_filename_from_url(url_str: &str) -> String {
    let filename = Url::parse(url_str)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.is_empty() && name != "." && name != "..");

    filename.unwrap_or_else(|| format!("download_{}", uuid::Uuid::new_v4()))
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(
        |c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_',
        "_",
    )
}
