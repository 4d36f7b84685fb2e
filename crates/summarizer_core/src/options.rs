//! crates/summarizer_core/src/options.rs
//!
//! The option normalizer. Every function here is total: whatever a client or a
//! stale session sends, the result is drawn from the fixed enumerations and
//! numeric bounds below.

use crate::domain::{GenerationOptions, OutputFormat, RawOptions, TaskKind};

pub const MIN_WORDS: i64 = 200;
pub const MAX_WORDS: i64 = 20_000;
pub const DEFAULT_WORDS: i64 = 800;
pub const DEFAULT_LANGUAGE: &str = "English";

/// Languages offered when the deployment does not configure its own list.
pub const DEFAULT_LANGUAGES: [&str; 16] = [
    "English",
    "Polish",
    "Turkish",
    "Azerbaijani",
    "Russian",
    "German",
    "French",
    "Spanish",
    "Italian",
    "Portuguese",
    "Ukrainian",
    "Arabic",
    "Chinese",
    "Japanese",
    "Korean",
    "Hindi",
];

const TASK_ALIASES: &[(&str, TaskKind)] = &[
    ("summary", TaskKind::Summary),
    ("summarize", TaskKind::Summary),
    ("detailed", TaskKind::Detailed),
    ("report", TaskKind::Detailed),
    ("study note", TaskKind::StudyNotes),
    ("study notes", TaskKind::StudyNotes),
    ("studynote", TaskKind::StudyNotes),
    ("study-notes", TaskKind::StudyNotes),
    ("study_notes", TaskKind::StudyNotes),
    ("study", TaskKind::StudyNotes),
    ("notes", TaskKind::StudyNotes),
    ("presentation", TaskKind::Presentation),
    ("slides", TaskKind::Presentation),
];

/// Maps a task name or alias onto a `TaskKind`. Unknown input means a summary.
pub fn normalize_task(raw: &str) -> TaskKind {
    let key = raw.trim().to_lowercase();
    TASK_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, kind)| *kind)
        .unwrap_or(TaskKind::Summary)
}

/// Parses a user-supplied word count. Anything non-numeric becomes the default.
pub fn parse_words(raw: Option<&str>) -> i64 {
    raw.map(str::trim)
        .and_then(|s| {
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        })
        .unwrap_or(DEFAULT_WORDS)
}

/// Clamps a word count into `[MIN_WORDS, MAX_WORDS]`.
pub fn clamp_words(words: i64) -> u32 {
    words.clamp(MIN_WORDS, MAX_WORDS) as u32
}

/// Validates a language against the allow-list.
///
/// An exact match wins; otherwise one title-cased retry ("polish" -> "Polish").
/// Unmatched input falls back to English, or to the first allow-listed entry when
/// English is not offered.
pub fn normalize_language(raw: Option<&str>, allowed: &[String]) -> String {
    let fallback = || {
        allowed
            .iter()
            .find(|l| l.as_str() == DEFAULT_LANGUAGE)
            .or_else(|| allowed.first())
            .cloned()
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
    };

    let lang = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(lang) => lang,
        None => return fallback(),
    };
    if let Some(found) = allowed.iter().find(|l| l.as_str() == lang) {
        return found.clone();
    }

    let mut chars = lang.chars();
    let title_cased: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    };
    allowed
        .iter()
        .find(|l| **l == title_cased)
        .cloned()
        .unwrap_or_else(fallback)
}

/// Validates an output format. Anything unknown becomes plain text.
pub fn normalize_output(raw: Option<&str>) -> OutputFormat {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("docx") => OutputFormat::Docx,
        Some("pdf") => OutputFormat::Pdf,
        _ => OutputFormat::Txt,
    }
}

/// Turns a language into a filename token, e.g. "English (UK)" -> "EnglishUK".
pub fn language_token(language: &str) -> String {
    let token: String = language
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if token.is_empty() {
        DEFAULT_LANGUAGE.to_string()
    } else {
        token
    }
}

impl GenerationOptions {
    /// Normalizes a raw options bag.
    pub fn from_raw(raw: &RawOptions, allowed_languages: &[String]) -> Self {
        Self {
            task: normalize_task(raw.task.as_deref().unwrap_or("summary")),
            words: clamp_words(parse_words(raw.words.as_deref())),
            language: normalize_language(raw.language.as_deref(), allowed_languages),
            notes: raw.notes.as_deref().map(str::trim).unwrap_or_default().to_string(),
            output: normalize_output(raw.output.as_deref()),
        }
    }

    /// The inverse of `from_raw`, used to persist choices into the session.
    pub fn to_raw(&self) -> RawOptions {
        RawOptions {
            task: Some(self.task.as_str().to_string()),
            words: Some(self.words.to_string()),
            language: Some(self.language.clone()),
            notes: Some(self.notes.clone()),
            output: Some(self.output.extension().to_string()),
        }
    }

    /// `{Task}_{Words}w_{Language}`, e.g. `Presentation_1500w_Polish`.
    pub fn base_filename(&self) -> String {
        format!(
            "{}_{}w_{}",
            self.task.filename_token(),
            self.words,
            language_token(&self.language)
        )
    }
}

impl RawOptions {
    /// Fills every field missing here from `previous`.
    pub fn or(self, previous: &RawOptions) -> RawOptions {
        RawOptions {
            task: self.task.or_else(|| previous.task.clone()),
            words: self.words.or_else(|| previous.words.clone()),
            language: self.language.or_else(|| previous.language.clone()),
            notes: self.notes.or_else(|| previous.notes.clone()),
            output: self.output.or_else(|| previous.output.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn languages() -> Vec<String> {
        DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn task_aliases_resolve() {
        assert_eq!(normalize_task("Slides"), TaskKind::Presentation);
        assert_eq!(normalize_task(" report "), TaskKind::Detailed);
        assert_eq!(normalize_task("study note"), TaskKind::StudyNotes);
        assert_eq!(normalize_task("notes"), TaskKind::StudyNotes);
        assert_eq!(normalize_task("summarize"), TaskKind::Summary);
        assert_eq!(normalize_task("poem"), TaskKind::Summary);
        assert_eq!(normalize_task(""), TaskKind::Summary);
    }

    #[test]
    fn clamp_words_is_bounded_and_idempotent() {
        for x in [i64::MIN, -5, 0, 199, 200, 201, 800, 19_999, 20_000, 20_001, i64::MAX] {
            let once = clamp_words(x);
            assert!((200..=20_000).contains(&once), "{x} clamped to {once}");
            assert_eq!(clamp_words(once as i64), once);
        }
        assert_eq!(clamp_words(50), 200);
        assert_eq!(clamp_words(1500), 1500);
        assert_eq!(clamp_words(1_000_000), 20_000);
    }

    #[test]
    fn non_numeric_words_fall_back_to_default() {
        assert_eq!(parse_words(Some("abc")), 800);
        assert_eq!(parse_words(Some("")), 800);
        assert_eq!(parse_words(None), 800);
        assert_eq!(parse_words(Some(" 1200 ")), 1200);
        assert_eq!(parse_words(Some("950.7")), 950);
        assert_eq!(parse_words(Some("NaN")), 800);
    }

    #[test]
    fn language_normalization_is_total() {
        let allowed = languages();
        for input in [None, Some(""), Some("   "), Some("null"), Some("Klingon"), Some("ENGLISH")] {
            let lang = normalize_language(input, &allowed);
            assert!(allowed.contains(&lang), "{input:?} produced {lang}");
        }
        assert_eq!(normalize_language(Some("polish"), &allowed), "Polish");
        assert_eq!(normalize_language(Some("GERMAN"), &allowed), "German");
        assert_eq!(normalize_language(Some("Klingon"), &allowed), "English");
    }

    #[test]
    fn language_fallback_uses_first_entry_without_english() {
        let allowed = vec!["Polish".to_string(), "German".to_string()];
        assert_eq!(normalize_language(Some("French"), &allowed), "Polish");
    }

    #[test]
    fn output_format_defaults_to_txt() {
        assert_eq!(normalize_output(Some("PDF")), OutputFormat::Pdf);
        assert_eq!(normalize_output(Some("docx ")), OutputFormat::Docx);
        assert_eq!(normalize_output(Some("odt")), OutputFormat::Txt);
        assert_eq!(normalize_output(None), OutputFormat::Txt);
    }

    #[test]
    fn base_filename_follows_task_words_language() {
        let raw = RawOptions {
            task: Some("slides".into()),
            words: Some("1500".into()),
            language: Some("polish".into()),
            ..Default::default()
        };
        let options = GenerationOptions::from_raw(&raw, &languages());
        assert_eq!(options.base_filename(), "Presentation_1500w_Polish");
        assert_eq!(language_token("English (UK)"), "EnglishUK");
    }

    #[test]
    fn missing_fields_come_from_previous_choices() {
        let previous = RawOptions {
            task: Some("detailed".into()),
            words: Some("3000".into()),
            language: Some("French".into()),
            notes: Some("focus on chapter 2".into()),
            output: Some("pdf".into()),
        };
        let incoming = RawOptions {
            words: Some("1000".into()),
            ..Default::default()
        };
        let options = GenerationOptions::from_raw(&incoming.or(&previous), &languages());
        assert_eq!(options.task, TaskKind::Detailed);
        assert_eq!(options.words, 1000);
        assert_eq!(options.language, "French");
        assert_eq!(options.output, OutputFormat::Pdf);
        assert_eq!(GenerationOptions::from_raw(&options.to_raw(), &languages()), options);
    }
}
