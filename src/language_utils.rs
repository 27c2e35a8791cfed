use isolang::Language;

/// Language utilities for prompt construction
///
/// Target languages arrive either as ISO 639 codes ("ja", "fra", "ger") or as
/// free-form names ("Japanese", "Brazilian Portuguese"). Models do better with
/// names, so codes are expanded and everything else passes through untouched.
/// Map an ISO 639-2/B code to its ISO 639-2/T equivalent when they differ
fn part2b_to_part2t(code: &str) -> Option<&'static str> {
    let mapped = match code {
        "fre" => "fra",
        "ger" => "deu",
        "dut" => "nld",
        "gre" => "ell",
        "chi" => "zho",
        "cze" => "ces",
        "ice" => "isl",
        "alb" => "sqi",
        "arm" => "hye",
        "baq" => "eus",
        "bur" => "mya",
        "per" => "fas",
        "geo" => "kat",
        "may" => "msa",
        "mac" => "mkd",
        "rum" => "ron",
        "slo" => "slk",
        "wel" => "cym",
        _ => return None,
    };
    Some(mapped)
}

/// Resolve a 2- or 3-letter code to a language, if it is one
pub fn lookup_code(code: &str) -> Option<Language> {
    let normalized = code.trim().to_lowercase();

    match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => {
            let part2t = part2b_to_part2t(&normalized).unwrap_or(&normalized);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Human-readable name for a target language
pub fn display_name(target_language: &str) -> String {
    let trimmed = target_language.trim();
    match lookup_code(trimmed) {
        Some(lang) => lang.to_name().to_string(),
        None => trimmed.to_string(),
    }
}
