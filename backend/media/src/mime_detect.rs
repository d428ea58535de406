//! Content types for files leaving the bot.

use std::path::Path;

/// Guess a content type from the file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "zip"          => "application/zip",
        "rar"          => "application/vnd.rar",
        "7z"           => "application/x-7z-compressed",
        "gz"           => "application/gzip",
        "tar"          => "application/x-tar",

        "jpg" | "jpeg" => "image/jpeg",
        "png"          => "image/png",
        "gif"          => "image/gif",
        "webp"         => "image/webp",

        "mp3"          => "audio/mpeg",
        "ogg" | "oga"  => "audio/ogg",
        "m4a"          => "audio/mp4",
        "flac"         => "audio/flac",

        "mp4"          => "video/mp4",
        "webm"         => "video/webm",
        "mkv"          => "video/x-matroska",
        "mov"          => "video/quicktime",

        "pdf"          => "application/pdf",
        "txt"          => "text/plain",
        "csv"          => "text/csv",
        "json"         => "application/json",

        _              => "application/octet-stream",
    }
}

/// Whether the bot knows how to unpack this content type.
pub fn is_archive(mime: &str) -> bool {
    matches!(
        mime,
        "application/zip"
            | "application/x-zip-compressed"
            | "application/vnd.rar"
            | "application/x-rar-compressed"
    )
}
