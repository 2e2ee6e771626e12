/*!
 * Tests for sentence splitting and speech text helpers
 */

use bookcast::text_utils::{clean_for_speech, estimate_duration_ms, split_sentences};

/// Test that decimals and abbreviations never produce a bare "1." sentence
#[test]
fn test_splitSentences_withDecimalAndAbbreviation_shouldKeepTokensWhole() {
    let sentences = split_sentences("1.7 apples. e.g. item");

    assert_eq!(sentences, vec!["1.7 apples.", "e.g.", "item"]);
    assert!(sentences.iter().all(|s| s != "1."));
}

/// Test that mixed full-width and ASCII punctuation both split
#[test]
fn test_splitSentences_withMixedPunctuation_shouldSplitOnEach() {
    let sentences = split_sentences("第一句。Second one! 第三句？");

    assert_eq!(sentences, vec!["第一句。", "Second one!", "第三句？"]);
}

/// Test that a trailing citation marker stays with its sentence
#[test]
fn test_splitSentences_withCitationMarker_shouldAttachToPrevious() {
    assert_eq!(split_sentences("Proven long ago. (12)"), vec!["Proven long ago. (12)"]);
}

/// Test that text without terminals survives as a single sentence
#[test]
fn test_splitSentences_withoutTerminals_shouldReturnSingleElement() {
    assert_eq!(split_sentences("just a heading"), vec!["just a heading"]);
}

/// Test that markup characters are not sent to the speech backend
#[test]
fn test_cleanForSpeech_withMarkdown_shouldStripMarkup() {
    assert_eq!(clean_for_speech("## Title -- *bold* | end"), "Title bold end");
}

/// Test the reading speed estimate
#[test]
fn test_estimateDurationMs_withTenChars_shouldReturnTwoSeconds() {
    assert_eq!(estimate_duration_ms("0123456789"), 2000);
    assert_eq!(estimate_duration_ms("一二三四五六七八九十"), 2000);
}
