/*!
 * Prompt templates for scene, line and variant translation.
 *
 * Each template carries `{placeholder}` slots that are filled at render time.
 */

use crate::subtitle_processor::{DialogueLine, format_dialogue};

/// Whole-scene translation: the model sees every dialogue line at once
pub const SCENE_TEMPLATE: &str = r#"You are a professional subtitler like Netflix's best localization experts.
Translate the following scene dialogue into {target_language}, preserving emotional tone, idioms, slang, and natural fluency.
Return lines ONLY in the format: SpeakerName: Translated text
Do NOT add numbering, timestamps, or extra commentary.

{dialogue}"#;

/// Single cue translation
pub const LINE_TEMPLATE: &str = "You are a professional subtitle translator. Translate into {target_language}.\n\
Original: \"{text}\"\n\
Output ONLY the translation, no quotes, no extra text.";

/// Pick one of several `/`-separated alternatives
pub const VARIANT_TEMPLATE: &str = "Choose the best {target_language} subtitle for the original:\n\
Original: \"{text}\"\n\
Options:\n\
{options}\n\
Reply with ONLY the chosen option text.";

/// Render the scene prompt
pub fn scene_prompt(dialogue: &[DialogueLine], target_language: &str) -> String {
    SCENE_TEMPLATE
        .replace("{target_language}", target_language)
        .replace("{dialogue}", &format_dialogue(dialogue))
}

/// Render the line prompt for already-normalized text
pub fn line_prompt(text: &str, target_language: &str) -> String {
    LINE_TEMPLATE
        .replace("{target_language}", target_language)
        .replace("{text}", text)
}

/// Render the variant-choice prompt, one `- option` line per variant
pub fn variant_prompt(original: &str, variants: &[String], target_language: &str) -> String {
    let options = variants
        .iter()
        .map(|v| format!("- {}", v))
        .collect::<Vec<_>>()
        .join("\n");

    VARIANT_TEMPLATE
        .replace("{target_language}", target_language)
        .replace("{text}", original)
        .replace("{options}", &options)
}
