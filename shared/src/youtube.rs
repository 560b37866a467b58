use std::sync::OnceLock;

use regex::Regex;

/// Number of characters in a YouTube video id.
pub const VIDEO_ID_LEN: usize = 11;

/// Thumbnail used when a video URL cannot be understood at all.
pub const PLACEHOLDER_THUMBNAIL: &str = "https://placehold.co/1280x720.png";

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^.*(?:youtu\.be/|v/|vi/|u/[A-Za-z0-9_]/|embed/|watch\?v=|watch\?v%3D)([^#&?]*).*",
        )
        .expect("video id pattern is valid")
    })
}

/// Extract the video id from a YouTube URL.
///
/// Understands watch, short (`youtu.be`), embed, `v/`, `vi/` and user-channel
/// forms. The last marker in the URL wins, and the id runs up to the first
/// `#`, `&` or `?`. Anything that is not exactly [`VIDEO_ID_LEN`] characters
/// long is rejected.
pub fn youtube_id(url: &str) -> Option<String> {
    let captures = id_pattern().captures(url)?;
    let id = captures.get(1)?.as_str();
    (id.chars().count() == VIDEO_ID_LEN).then(|| id.to_owned())
}

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

pub fn max_res_thumbnail(id: &str) -> String {
    format!("https://i.ytimg.com/vi/{id}/maxresdefault.jpg")
}

/// oEmbed hands out the `hqdefault` rendition; prefer the full resolution one.
pub fn upgrade_thumbnail(url: &str) -> String {
    url.replacen("hqdefault.jpg", "maxresdefault.jpg", 1)
}
