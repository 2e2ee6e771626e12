/*!
 * Tests for LRC caption generation
 */

use bookcast::caption::{caption_lines, format_timestamp, generate};
use bookcast::database::ParagraphRecord;

fn timed(content: &str, duration_ms: i64) -> ParagraphRecord {
    let mut paragraph = ParagraphRecord::new(1, 1, 1, content.to_string());
    paragraph.audio_duration_ms = Some(duration_ms);
    paragraph
}

/// Test that timestamps past one hour keep counting minutes
#[test]
fn test_formatTimestamp_pastOneHour_shouldKeepCountingMinutes() {
    assert_eq!(format_timestamp(3_725_010), "[62:05.01]");
}

/// Test that every caption line is timestamped in non-decreasing order
#[test]
fn test_captionLines_overLongBook_shouldBeMonotonic() {
    let paragraphs: Vec<ParagraphRecord> = (0..50)
        .map(|i| timed(&format!("Sentence {} starts. It ends here! Or does it?", i), 7_001))
        .collect();

    let lines = caption_lines(&paragraphs);

    assert_eq!(lines.len(), 150);
    assert!(lines.windows(2).all(|w| w[0].time_ms <= w[1].time_ms));
    // Each paragraph's three truncated shares add up to 6999 ms
    assert_eq!(lines[147].time_ms, 49 * 6_999);
}

/// Test that multi-line paragraphs render as single LRC lines
#[test]
fn test_generate_withLineBreaksInText_shouldKeepOneLinePerCaption() {
    let lrc = generate(&[timed("A line\nthat wraps.", 1_000)], "", "");

    assert_eq!(lrc, "[00:00.00]A line that wraps.\n");
}

/// Test that nothing to caption produces an empty document
#[test]
fn test_generate_withNothingToCaption_shouldReturnEmpty() {
    assert_eq!(generate(&[], "", ""), "");
    assert_eq!(generate(&[timed("  ", 500)], " ", ""), "");
}
