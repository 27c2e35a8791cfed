/*!
 * Tests for subtitle and dialogue parsing
 */

use subpipe::subtitle_processor::{
    AlignedCue, SubtitleCue, SubtitleTrack, Timecode, UNKNOWN_SPEAKER, parse_dialogue, write_srt,
};

use crate::common::{SAMPLE_SCRIPT, SAMPLE_SRT};

#[test]
fn test_parse_withSampleTrack_shouldYieldFiveCuesInOrder() {
    let track = SubtitleTrack::parse(SAMPLE_SRT);
    assert_eq!(track.len(), 5);
    assert_eq!(
        track.cues.iter().map(|c| c.index).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert_eq!(track.cues[2].text, "To the station, then home.");
}

#[test]
fn test_parse_withoutTimeRangeSeparator_shouldExcludeOnlyThatBlock() {
    let broken = SAMPLE_SRT.replace("00:00:06,500 --> 00:00:08,000", "00:00:06,500 00:00:08,000");
    let track = SubtitleTrack::parse(&broken);
    assert_eq!(track.len(), 4);
    assert!(track.cues.iter().all(|c| c.index != 4));
}

#[test]
fn test_parse_withCrlfAndNonIntegerIndex_shouldSkipBadBlock() {
    let content = "1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n\r\nx\r\n00:00:03,000 --> 00:00:04,000\r\nBad\r\n";
    let track = SubtitleTrack::parse(content);
    assert_eq!(track.len(), 1);
    assert_eq!(track.cues[0].text, "Hi");
}

#[test]
fn test_parse_withUnsortedTrack_shouldKeepSourceOrder() {
    let content = "9\n00:00:05,000 --> 00:00:06,000\nLater\n\n3\n00:00:01,000 --> 00:00:02,000\nEarlier\n";
    let track = SubtitleTrack::parse(content);
    assert_eq!(track.cues.iter().map(|c| c.index).collect::<Vec<_>>(), vec![9, 3]);
}

#[test]
fn test_cueNew_withInvertedTiming_shouldFail() {
    assert!(SubtitleCue::new(1, Timecode(2_000), Timecode(1_000), "x").is_err());
    assert!(SubtitleCue::new(0, Timecode(0), Timecode(1_000), "x").is_err());
}

#[test]
fn test_parseDialogue_shouldSplitOnFirstColonOnly() {
    let lines = parse_dialogue("Aki: Time: 10:30\n\n   \nno speaker here\n");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].speaker, "Aki");
    assert_eq!(lines[0].text, "Time: 10:30");
    assert_eq!(lines[1].speaker, UNKNOWN_SPEAKER);
    assert_eq!(lines[1].text, "no speaker here");
    assert_eq!(parse_dialogue(SAMPLE_SCRIPT).len(), 3);
}

#[test]
fn test_writeSrt_shouldReparseToSameTiming() {
    let track = SubtitleTrack::parse(SAMPLE_SRT);
    let aligned: Vec<AlignedCue> = track
        .cues
        .iter()
        .map(|c| AlignedCue {
            index: c.index,
            start: c.start,
            end: c.end,
            translated_text: format!("T{}", c.index),
        })
        .collect();

    let written = write_srt(&aligned);
    assert!(written.starts_with("1\n00:00:01,000 --> 00:00:02,000\nT1\n\n"));

    let reparsed = SubtitleTrack::parse(&written);
    assert_eq!(reparsed.len(), 5);
    for (a, b) in reparsed.cues.iter().zip(&track.cues) {
        assert_eq!((a.index, a.start, a.end), (b.index, b.start, b.end));
    }
}
