//! Media type filter applied at enqueue time.

/// Extensions accepted for upload, lowercase and without the leading dot.
pub const ALLOWED_EXTENSIONS: [&str; 11] = [
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "heic", "mp4", "mov", "avi", "mkv",
];

/// Lowercased substring after the final `.`, or `None` when the name has no dot.
pub fn extension_of(name: &str) -> Option<String> {
    name.rfind('.').map(|idx| name[idx + 1..].to_ascii_lowercase())
}

pub fn is_allowed_media(name: &str) -> bool {
    extension_of(name)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
