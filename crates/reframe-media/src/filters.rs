//! FFmpeg filter-graph builders.
//!
//! Pure string assembly; nothing here touches the filesystem or spawns
//! processes. Graphs built with `-filter_complex` expose their video result
//! as `[vout]`.

use std::path::Path;

use reframe_models::SubtitleStyle;

/// Label of the video output in every complex graph built here.
pub const VIDEO_OUT: &str = "[vout]";

/// Escape a path for use inside a single-quoted filter argument.
///
/// Backslashes become forward slashes so Windows paths survive; quotes and
/// colons are backslash-escaped.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// `-vf` chain cropping a `width`x`height` window at `(x, 0)`.
pub fn crop_filter(width: u32, height: u32, x: u32) -> String {
    format!("crop={width}:{height}:{x}:0,setsar=1")
}

/// Two full-height regions stacked top/bottom, then scaled to the output size.
///
/// Keeps each speaker's aspect ratio intact.
pub fn split_quality_graph(
    region_width: u32,
    region_height: u32,
    left_x: u32,
    right_x: u32,
    out_width: u32,
    out_height: u32,
) -> String {
    format!(
        "[0:v]split=2[top_src][bottom_src];\
         [top_src]crop={region_width}:{region_height}:{left_x}:0[top];\
         [bottom_src]crop={region_width}:{region_height}:{right_x}:0[bottom];\
         [top][bottom]vstack=inputs=2,scale={out_width}:{out_height},setsar=1{VIDEO_OUT}"
    )
}

/// Two 9:16 windows, each squashed to half the output height, stacked.
///
/// Used when the source is too narrow for two 9:8 regions; vertical
/// compression is expected.
pub fn split_squash_graph(
    window_width: u32,
    window_height: u32,
    left_x: u32,
    right_x: u32,
) -> String {
    let half = window_height / 2;
    format!(
        "[0:v]split=2[top_src][bottom_src];\
         [top_src]crop={window_width}:{window_height}:{left_x}:0,scale={window_width}:{half}[top];\
         [bottom_src]crop={window_width}:{window_height}:{right_x}:0,scale={window_width}:{half}[bottom];\
         [top][bottom]vstack=inputs=2,setsar=1{VIDEO_OUT}"
    )
}

/// ASS `force_style` for a subtitle track.
///
/// A background color switches to an opaque box (`BorderStyle=4`).
pub fn subtitle_force_style(style: &SubtitleStyle) -> String {
    let border_style = if style.background_color.is_some() { 4 } else { 1 };

    let mut parts = vec![
        format!("Fontname={}", style.font),
        format!("FontSize={}", style.font_size),
        format!("PrimaryColour={}", style.primary_color),
        format!("OutlineColour={}", style.outline_color),
        format!("BorderStyle={border_style}"),
        "Outline=1".to_string(),
        "Shadow=0".to_string(),
        "Alignment=2".to_string(),
        "MarginL=40".to_string(),
        "MarginR=40".to_string(),
        "MarginV=60".to_string(),
        "Bold=0".to_string(),
    ];

    if let Some(back) = &style.background_color {
        parts.push(format!("BackColour={back}"));
    }

    parts.join(",")
}

/// `subtitles` filter with the caller's style.
pub fn subtitles_filter(style: &SubtitleStyle) -> String {
    format!(
        "subtitles='{}':force_style='{}'",
        escape_filter_path(&style.path),
        subtitle_force_style(style)
    )
}

/// Graph for the single re-encode pass over the concatenated output.
///
/// Input 0 is the concatenation; input 1, when `with_overlay` is set, is the
/// overlay image. Returns `None` when there is nothing to burn in.
pub fn final_pass_graph(
    out_width: u32,
    out_height: u32,
    with_overlay: bool,
    subtitle: Option<&SubtitleStyle>,
) -> Option<String> {
    match (with_overlay, subtitle) {
        (false, None) => None,
        (true, None) => Some(format!(
            "[1:v]scale={out_width}:{out_height}[ovl];[0:v][ovl]overlay=0:0{VIDEO_OUT}"
        )),
        (false, Some(style)) => Some(format!("[0:v]{}{VIDEO_OUT}", subtitles_filter(style))),
        (true, Some(style)) => Some(format!(
            "[1:v]scale={out_width}:{out_height}[ovl];[0:v][ovl]overlay=0:0[base];[base]{}{VIDEO_OUT}",
            subtitles_filter(style)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(
            escape_filter_path(Path::new("C:\\clips\\it's.srt")),
            "C\\:/clips/it\\'s.srt"
        );
        assert_eq!(escape_filter_path(Path::new("/tmp/a.srt")), "/tmp/a.srt");
    }

    #[test]
    fn test_crop_filter() {
        assert_eq!(crop_filter(606, 1080, 657), "crop=606:1080:657:0,setsar=1");
    }

    #[test]
    fn test_split_graphs_end_in_vout() {
        let quality = split_quality_graph(1216, 1080, 0, 704, 606, 1080);
        assert!(quality.contains("crop=1216:1080:0:0[top]"));
        assert!(quality.contains("crop=1216:1080:704:0[bottom]"));
        assert!(quality.contains("vstack=inputs=2,scale=606:1080"));
        assert!(quality.ends_with("[vout]"));

        let squash = split_squash_graph(606, 1080, 0, 400);
        assert!(squash.contains("scale=606:540[top]"));
        assert!(squash.ends_with("[vout]"));
    }

    #[test]
    fn test_force_style_outline_only() {
        let style = SubtitleStyle::new("subs.srt");
        let forced = subtitle_force_style(&style);
        assert!(forced.starts_with("Fontname=Arial,FontSize=8,PrimaryColour=&H00FFFFFF"));
        assert!(forced.contains("BorderStyle=1"));
        assert!(!forced.contains("BackColour"));
        assert!(forced.ends_with("Bold=0"));
    }

    #[test]
    fn test_force_style_with_background_box() {
        let style = SubtitleStyle::new("subs.srt").with_background("&H80000000");
        let forced = subtitle_force_style(&style);
        assert!(forced.contains("BorderStyle=4"));
        assert!(!forced.contains("BorderStyle=1"));
        assert!(forced.ends_with("BackColour=&H80000000"));
    }

    #[test]
    fn test_final_pass_graph_branches() {
        assert!(final_pass_graph(606, 1080, false, None).is_none());

        let overlay = final_pass_graph(606, 1080, true, None).unwrap();
        assert!(overlay.starts_with("[1:v]scale=606:1080[ovl]"));

        let style = SubtitleStyle::new("/tmp/s.srt");
        let both = final_pass_graph(606, 1080, true, Some(&style)).unwrap();
        assert!(both.contains("overlay=0:0[base];[base]subtitles='/tmp/s.srt'"));
        assert!(both.ends_with("[vout]"));
    }
}
