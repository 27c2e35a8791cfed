use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

// @module: Subtitle track and dialogue script parsing

// @const: Blank-line block separator (tolerates whitespace-only lines)
static BLOCK_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Separator between start and end timecodes on the second line of a block
pub const TIME_RANGE_SEPARATOR: &str = " --> ";

/// Speaker assigned to script lines without a `Speaker:` prefix
pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// A subtitle timecode, stored as milliseconds since the start of the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timecode(pub u64);

impl Timecode {
    /// Parse `HH:MM:SS,mmm` (a `.` before the milliseconds is accepted too)
    pub fn parse(timestamp: &str) -> Result<Self> {
        let parts: Vec<&str> = timestamp.trim().split(&[':', ',', '.'][..]).collect();

        if parts.len() != 4 {
            return Err(anyhow!("Invalid timestamp format: {}", timestamp));
        }

        let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
        let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
        let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
        let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        hours
            .checked_mul(3_600_000)
            .and_then(|ms| ms.checked_add(minutes * 60_000 + seconds * 1_000 + millis))
            .map(Self)
            .ok_or_else(|| anyhow!("Timestamp out of range: {}", timestamp))
    }

    /// Milliseconds since the start of the video
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0;
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        write!(f, "{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

// @struct: Single time-coded subtitle entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleCue {
    // @field: Index as written in the track (unique, not necessarily contiguous)
    pub index: u32,

    // @field: Display start
    pub start: Timecode,

    // @field: Display end, always after start
    pub end: Timecode,

    // @field: Cue text, continuation lines joined by a space
    pub text: String,
}

impl SubtitleCue {
    /// Create a cue, enforcing `index >= 1` and `start < end`
    pub fn new(index: u32, start: Timecode, end: Timecode, text: impl Into<String>) -> Result<Self> {
        if index == 0 {
            return Err(anyhow!("Subtitle index must be at least 1"));
        }
        if end <= start {
            return Err(anyhow!(
                "Invalid time range for cue {}: end {} <= start {}",
                index, end, start
            ));
        }

        Ok(Self {
            index,
            start,
            end,
            text: text.into(),
        })
    }

    /// Parse one blank-line-delimited block; `None` when the block is malformed
    fn from_block(block: &str) -> Option<Self> {
        let lines: Vec<&str> = block.lines().collect();
        if lines.len() < 3 {
            debug!("Skipping subtitle block with {} line(s)", lines.len());
            return None;
        }

        let times = lines[1].trim();
        let (start, end) = match times.split_once(TIME_RANGE_SEPARATOR) {
            Some(range) => range,
            None => {
                debug!("Skipping subtitle block without time range: {:?}", times);
                return None;
            }
        };

        let index: u32 = match lines[0].trim().parse() {
            Ok(index) => index,
            Err(_) => {
                debug!("Skipping subtitle block with non-numeric index: {:?}", lines[0]);
                return None;
            }
        };

        let text = lines[2..]
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let parsed = Timecode::parse(start)
            .and_then(|start| Ok((start, Timecode::parse(end)?)))
            .and_then(|(start, end)| Self::new(index, start, end, text));

        match parsed {
            Ok(cue) => Some(cue),
            Err(e) => {
                debug!("Skipping subtitle block {}: {}", index, e);
                None
            }
        }
    }
}

/// An ordered subtitle track; order is display order and is never re-sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleTrack {
    /// Well-formed cues in source order
    pub cues: Vec<SubtitleCue>,
}

impl SubtitleTrack {
    /// Parse SRT content, silently dropping malformed blocks
    pub fn parse(content: &str) -> Self {
        let normalized = content.replace("\r\n", "\n");
        let trimmed = normalized.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        let mut skipped = 0usize;
        let mut cues = Vec::new();
        for block in BLOCK_SEPARATOR.split(trimmed) {
            match SubtitleCue::from_block(block) {
                Some(cue) => cues.push(cue),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Parsed {} cue(s), dropped {} malformed block(s)", cues.len(), skipped);
        }

        Self { cues }
    }

    /// Read and parse an SRT file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read subtitle file: {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Number of cues in the track
    pub fn len(&self) -> usize {
        self.cues.len()
    }

    /// Whether the track has no cues
    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}

/// One line of dialogue attributed to a speaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueLine {
    pub speaker: String,
    pub text: String,
}

impl DialogueLine {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for DialogueLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)
    }
}

/// Parse `Speaker: text` lines; used for source scripts and translated scenes alike
pub fn parse_dialogue(content: &str) -> Vec<DialogueLine> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(':') {
            Some((speaker, text)) => DialogueLine::new(speaker.trim(), text.trim()),
            None => DialogueLine::new(UNKNOWN_SPEAKER, line),
        })
        .collect()
}

/// Render dialogue back into the `Speaker: text` convention
pub fn format_dialogue(lines: &[DialogueLine]) -> String {
    lines
        .iter()
        .map(|line| line.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A translated cue: timing copied from the source cue, text replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedCue {
    pub index: u32,
    pub start: Timecode,
    pub end: Timecode,
    pub translated_text: String,
}

impl fmt::Display for AlignedCue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{}{}{}", self.start, TIME_RANGE_SEPARATOR, self.end)?;
        writeln!(f, "{}", self.translated_text)?;
        writeln!(f)
    }
}

/// Serialize aligned cues as SRT
pub fn write_srt(cues: &[AlignedCue]) -> String {
    cues.iter().map(|cue| cue.to_string()).collect()
}
