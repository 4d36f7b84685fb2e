//! crates/summarizer_core/src/prompt.rs
//!
//! Prompt templates, the deterministic offline scaffold and the post-processing
//! applied to model output.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::{GenerationOptions, TaskKind};

pub const SYSTEM_PROMPT: &str =
    "You are a careful assistant that strictly uses the provided sources.";

const NO_SOURCES: &str =
    "(No sources uploaded. If no sources, say so and provide only general structure.)";

const SUMMARY_TEMPLATE: &str = r#"You are an expert academic summarizer. Write a concise, faithful, and well-structured **summary** of the provided sources in {language}, with a target length of ~{words} words (±10%). Preserve key terms, avoid hallucinations, and do not include content not supported by the sources.

{notes_block}
== SOURCES ==
{sources}

== OUTPUT RULES ==
- Use ONLY the sources above.
- Use clear headings.
- Bullet points where useful.
- No page markers. No citations unless explicitly present in the text.
"#;

const DETAILED_TEMPLATE: &str = r#"You are an expert technical writer. Produce a **detailed, structured report** in {language} based strictly on the provided sources, ~{words} words (±10%). Explain important concepts with brief, precise definitions and include a short executive summary at the top.

{notes_block}
== SOURCES ==
{sources}

== OUTPUT RULES ==
- Use ONLY the sources above.
- Use H2/H3 headings.
- Include short executive summary, key insights, and practical recommendations.
- Avoid fabrications. No page markers.
"#;

const STUDY_NOTES_TEMPLATE: &str = r#"Create **exam-ready study notes** in {language}, ~{words} words (±10%), strictly from the sources.

{notes_block}
== SOURCES ==
{sources}

== OUTPUT RULES ==
- Use ONLY the sources above. Avoid fabrications.
- Use concise bullet points.
- Include formulas or definitions when present.
- Add a quick self-check quiz (5 questions) at the end.
- No page markers.
"#;

const PRESENTATION_TEMPLATE: &str = r#"Create a **presentation-style outline** in {language}, ~{words} words (±10%), based strictly on the sources.

{notes_block}
== SOURCES ==
{sources}

== OUTPUT RULES ==
- Use ONLY the sources above. Avoid fabrications.
- Structure as slides with titles and 3-6 bullets each.
- Start with Agenda. End with Key Takeaways.
- Keep bullets crisp; no page markers.
"#;

fn template_for(task: TaskKind) -> &'static str {
    match task {
        TaskKind::Summary => SUMMARY_TEMPLATE,
        TaskKind::Detailed => DETAILED_TEMPLATE,
        TaskKind::StudyNotes => STUDY_NOTES_TEMPLATE,
        TaskKind::Presentation => PRESENTATION_TEMPLATE,
    }
}

/// Renders the task template with the corpus and options.
pub fn build_user_prompt(corpus: &str, options: &GenerationOptions) -> String {
    let notes_block = if options.notes.trim().is_empty() {
        String::new()
    } else {
        format!("== USER NOTES ==\n{}\n", options.notes.trim())
    };
    let sources = if corpus.trim().is_empty() {
        NO_SOURCES
    } else {
        corpus
    };

    // Sources go in last so that template markers inside uploaded text stay literal.
    template_for(options.task)
        .replace("{language}", &options.language)
        .replace("{words}", &options.words.to_string())
        .replace("{notes_block}", &notes_block)
        .replace("{sources}", sources)
        .trim()
        .to_string()
}

/// Produces the structure of the requested document without real content.
pub fn fallback_scaffold(options: &GenerationOptions) -> String {
    let mut blocks = vec![format!(
        "# {} ({}, ~{} words)",
        options.task.heading(),
        options.language,
        options.words
    )];

    let sections: &[&str] = match options.task {
        TaskKind::Presentation => &[
            "## Agenda",
            "- Problem Overview\n- Key Insights\n- Method/Approach\n- Results\n- Limitations\n- Key Takeaways",
            "## Slide 1: Problem Overview",
            "- Brief context\n- Why it matters\n- Scope and objectives",
            "## Slide 2: Key Insights",
            "- Insight 1\n- Insight 2\n- Insight 3",
            "## Slide 3: Method/Approach",
            "- Data used\n- Steps\n- Constraints",
            "## Slide 4: Results",
            "- Result A\n- Result B\n- Result C",
            "## Slide 5: Limitations",
            "- Data quality\n- Assumptions\n- External factors",
            "## Key Takeaways",
            "- Takeaway 1\n- Takeaway 2\n- Takeaway 3",
        ],
        TaskKind::StudyNotes => &[
            "## Core Concepts",
            "- Term 1: short definition\n- Term 2: short definition\n- Term 3: short definition",
            "## Key Points",
            "- Point A\n- Point B\n- Point C",
            "## Examples",
            "- Example 1\n- Example 2",
            "## Quick Self-Check (5)",
            "1) Question 1?\n2) Question 2?\n3) Question 3?\n4) Question 4?\n5) Question 5?",
        ],
        TaskKind::Detailed => &[
            "## Executive Summary",
            "- High-level overview with main findings.",
            "## Background",
            "- Context and definitions.",
            "## Analysis",
            "- Evidence-backed points derived from sources.",
            "## Recommendations",
            "- Actionable, prioritized steps.",
            "## Conclusion",
            "- Final synthesis.",
        ],
        TaskKind::Summary => &[
            "## Overview",
            "- Main idea and scope.",
            "## Key Insights",
            "- Insight 1\n- Insight 2\n- Insight 3",
            "## Conclusion",
            "- Short wrap-up.",
        ],
    };
    blocks.extend(sections.iter().map(|s| s.to_string()));

    post_process(&blocks.join("\n\n"))
}

static DASHED_PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-{2,}[ \t]*page[ \t]+\d+[ \t]*-{2,}").expect("valid regex"));
static BRACKETED_PAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[ \t]*(\[[ \t]*page[ \t]+\d+[ \t]*\]|\([ \t]*page[ \t]+\d+[ \t]*\))")
        .expect("valid regex")
});
static BARE_PAGE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*page[ \t]+\d+[ \t]*$").expect("valid regex"));
static TRAILING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[ \t]+$").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Strips page markers left by the model and collapses runs of blank lines.
pub fn post_process(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = DASHED_PAGE_MARKER.replace_all(&text, "");
    let text = BRACKETED_PAGE_MARKER.replace_all(&text, "");
    let text = BARE_PAGE_LINE.replace_all(&text, "");
    let text = TRAILING_SPACE.replace_all(&text, "");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}
