//! Segment timing math.

/// Shortest accepted video, seconds.
pub const MIN_VIDEO_DURATION: u32 = 5;

/// Longest accepted video, seconds.
pub const MAX_VIDEO_DURATION: u32 = 120;

/// Nominal segment length, seconds.
pub const DEFAULT_SEGMENT_DURATION: u32 = 12;

/// Segment duration for a target: the 5-second minimum fits a single
/// 5-second segment, everything else uses the nominal length.
pub fn segment_duration_for(target_duration: u32) -> u32 {
    if target_duration == MIN_VIDEO_DURATION {
        MIN_VIDEO_DURATION
    } else {
        DEFAULT_SEGMENT_DURATION
    }
}

/// ceil(target / segment).
pub fn segment_count(target_duration: u32, segment_duration: u32) -> u32 {
    target_duration.div_ceil(segment_duration.max(1))
}

/// Time range of the 1-based scene `n`; the last scene is truncated when the
/// target is not a multiple of the segment duration.
pub fn scene_bounds(n: u32, segment_duration: u32, target_duration: u32) -> (f64, f64) {
    let start = ((n - 1) * segment_duration) as f64;
    let end = (n * segment_duration).min(target_duration) as f64;
    (start, end)
}

/// First few words of the prompt, used as a provisional title until the
/// storyboard provider supplies one.
pub fn derive_title(prompt: &str) -> String {
    let title: String = prompt
        .split_whitespace()
        .take(8)
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() {
        "Untitled video".to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_duration_uses_five_second_segment() {
        assert_eq!(segment_duration_for(5), 5);
        assert_eq!(segment_count(5, segment_duration_for(5)), 1);
    }

    #[test]
    fn test_maximum_duration_is_ten_segments() {
        assert_eq!(segment_duration_for(120), 12);
        assert_eq!(segment_count(120, 12), 10);
    }

    #[test]
    fn test_non_multiple_rounds_up() {
        assert_eq!(segment_count(60, 12), 5);
        assert_eq!(segment_count(50, 12), 5);
        assert_eq!(segment_count(13, 12), 2);
    }

    #[test]
    fn test_scene_bounds_truncate_last() {
        assert_eq!(scene_bounds(1, 12, 50), (0.0, 12.0));
        assert_eq!(scene_bounds(5, 12, 50), (48.0, 50.0));
    }

    #[test]
    fn test_derive_title_takes_leading_words() {
        assert_eq!(derive_title("A majestic eagle soaring"), "A majestic eagle soaring");
        let long = "one two three four five six seven eight nine ten";
        assert_eq!(derive_title(long), "one two three four five six seven eight");
        assert_eq!(derive_title("   "), "Untitled video");
    }
}
