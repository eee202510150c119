//! Extension -> MIME type mapping.
//!
//! Mirrors `examples/original_source/server/contenttype.go`: `.mov` is
//! deliberately mapped to `video/mp4` instead of the technically-correct
//! `video/quicktime`, a long-standing compatibility workaround (Chrome would
//! not play back `video/quicktime` at the time it was introduced) that this
//! service carries forward unchanged. Everything else defers to the standard
//! extension database, falling back to `application/octet-stream`.

const FALLBACK: &str = "application/octet-stream";

/// Resolves the MIME type for a filename based on its extension.
pub fn content_type_for_filename(file_name: &str) -> &'static str {
    match extension_of(file_name) {
        Some(ext) => content_type_for_extension(&ext),
        None => FALLBACK,
    }
}

/// Resolves the MIME type for a bare extension (no leading dot).
pub fn content_type_for_extension(ext: &str) -> &'static str {
    let lower = ext.to_ascii_lowercase();
    if lower == "mov" {
        return "video/mp4";
    }
    mime_db::lookup(&lower).unwrap_or(FALLBACK)
}

fn extension_of(file_name: &str) -> Option<String> {
    let dot = file_name.rfind('.')?;
    if dot == file_name.len() - 1 {
        return None;
    }
    Some(file_name[dot + 1..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_is_mapped_to_mp4() {
        assert_eq!(content_type_for_filename("clip.mov"), "video/mp4");
        assert_eq!(content_type_for_filename("CLIP.MOV"), "video/mp4");
    }

    #[test]
    fn png_resolves_via_mime_db() {
        assert_eq!(content_type_for_filename("shot.png"), "image/png");
    }

    #[test]
    fn extensionless_and_unknown_fall_back() {
        assert_eq!(content_type_for_filename("noext"), FALLBACK);
        assert_eq!(content_type_for_filename("file.zzzzz"), FALLBACK);
        assert_eq!(content_type_for_filename("trailing."), FALLBACK);
    }
}
