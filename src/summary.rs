//! # Dual Summary Parsing Module
//!
//! Questo modulo interpreta la risposta del backend che contiene due
//! sezioni: la versione dettagliata e la versione breve per YouTube.
//!
//! ## Responsabilità:
//! - Divisione della risposta sui marker letterali delle due sezioni
//! - Validazione del formato della versione breve
//! - Generazione deterministica di ripiego quando il parsing fallisce
//!
//! ## Contratto dei marker:
//! - `=== 詳細版 ===` deve precedere `=== YouTube版 ===`
//! - Marker mancanti o invertiti ⇒ entrambe le sezioni vuote, il
//!   chiamante usa l'intera risposta come versione dettagliata e genera
//!   la versione breve con `derive_short_form`
//!
//! ## Proprietà garantita (testata):
//! - `derive_short_form(x)` soddisfa sempre `validate_short_form`

/// Literal section markers the prompt instructs the model to emit
pub const DETAIL_MARKER: &str = "=== 詳細版 ===";
pub const SHORT_MARKER: &str = "=== YouTube版 ===";

/// Substrings every well-formed short-form text must contain
const SHORT_FORM_HEADER: &str = "📝";
const SHORT_FORM_HIGHLIGHTS: &str = "💡 この配信の見どころ：";
const SHORT_FORM_BULLET: &str = "•";
const SHORT_FORM_DISCLAIMER: &str = "※ この要約は自動生成されました";

const SHORT_FORM_TITLE: &str = "📝 配信まとめ";
const SHORT_FORM_CLOSING: &str = "ぜひご覧ください✨";
const SHORT_FORM_DEFAULT_BULLET: &str = "• 配信の内容をお楽しみください";

const MAX_TOPICS: usize = 5;
const MAX_OVERVIEW_CHARS: usize = 150;

/// Split a backend response into (detailed, short_form).
///
/// Both strings are empty when either marker is missing or the short-form
/// marker does not occur strictly after the detailed one.
pub fn split_dual(response: &str) -> (String, String) {
    let detail_start = match response.find(DETAIL_MARKER) {
        Some(i) => i,
        None => return (String::new(), String::new()),
    };
    let short_start = match response.find(SHORT_MARKER) {
        Some(i) => i,
        None => return (String::new(), String::new()),
    };

    if short_start <= detail_start {
        return (String::new(), String::new());
    }

    let detailed = response[detail_start + DETAIL_MARKER.len()..short_start]
        .trim()
        .to_string();
    let short_form = response[short_start + SHORT_MARKER.len()..]
        .trim()
        .to_string();

    (detailed, short_form)
}

/// Check that a short-form text carries all the fixed format markers and
/// starts with the header glyph.
pub fn validate_short_form(text: &str) -> bool {
    let required = [
        SHORT_FORM_HEADER,
        SHORT_FORM_HIGHLIGHTS,
        SHORT_FORM_BULLET,
        SHORT_FORM_DISCLAIMER,
    ];

    required.iter().all(|marker| text.contains(marker)) && text.trim().starts_with(SHORT_FORM_HEADER)
}

/// Derive a short-form text from a detailed summary (fallback path).
///
/// Collects up to five `**bold**` spans as highlight bullets, captures the
/// overview block after a `概要` heading (or the first two sentences when
/// absent), and assembles a fixed template that always validates.
pub fn derive_short_form(detailed: &str) -> String {
    let topics = extract_topics(detailed);
    let overview = extract_overview(detailed);

    let topics_text = if topics.is_empty() {
        SHORT_FORM_DEFAULT_BULLET.to_string()
    } else {
        topics
            .iter()
            .map(|t| format!("• {}", t))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "{}\n\n{}\n\n{}\n{}\n\n{}\n\n{}",
        SHORT_FORM_TITLE,
        truncate_chars(&overview, MAX_OVERVIEW_CHARS),
        SHORT_FORM_HIGHLIGHTS,
        topics_text,
        SHORT_FORM_CLOSING,
        SHORT_FORM_DISCLAIMER
    )
}

/// First `**…**` span per line, in order of appearance, up to five spans.
/// Spans of three characters or fewer are too generic to be highlights.
fn extract_topics(text: &str) -> Vec<String> {
    let mut topics = Vec::new();

    for line in text.lines() {
        if topics.len() >= MAX_TOPICS {
            break;
        }
        if let Some(topic) = first_bold_span(line) {
            if topic.chars().count() > 3 {
                topics.push(topic);
            }
        }
    }

    topics
}

fn first_bold_span(line: &str) -> Option<String> {
    let start = line.find("**")?;
    let rest = &line[start + 2..];
    let end = rest.find("**")?;
    let span = rest[..end].trim();
    if span.is_empty() {
        None
    } else {
        Some(span.to_string())
    }
}

/// Lines following a heading that mentions `概要`, until the next heading.
/// Falls back to the first two sentence-delimited clauses of the whole text.
fn extract_overview(text: &str) -> String {
    let mut overview = String::new();
    let mut capture = false;

    for line in text.lines() {
        if line.contains("概要") {
            capture = true;
            continue;
        }
        if capture {
            if line.starts_with('#') {
                break;
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                overview.push_str(trimmed);
                overview.push(' ');
            }
        }
    }

    let overview = overview.trim().to_string();
    if !overview.is_empty() {
        return overview;
    }

    let sentences: Vec<&str> = text.split('。').collect();
    let mut result = sentences
        .iter()
        .take(2)
        .copied()
        .collect::<Vec<_>>()
        .join("。");
    result.push('。');
    result
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_dual_round_trip() {
        let detailed = "## 概要\n楽しい配信でした。";
        let short = "📝 タイトル\n内容";
        let response = format!("{}\n{}\n{}\n{}", DETAIL_MARKER, detailed, SHORT_MARKER, short);

        let (d, s) = split_dual(&response);
        assert_eq!(d, detailed);
        assert_eq!(s, short);
    }

    #[test]
    fn test_split_dual_missing_detail_marker() {
        let (d, s) = split_dual("some text\n=== YouTube版 ===\nshort");
        assert!(d.is_empty());
        assert!(s.is_empty());
    }

    #[test]
    fn test_split_dual_missing_short_marker() {
        let (d, s) = split_dual("=== 詳細版 ===\ndetail only");
        assert!(d.is_empty());
        assert!(s.is_empty());
    }

    #[test]
    fn test_split_dual_markers_out_of_order() {
        let response = format!("{}\nB\n{}\nA", SHORT_MARKER, DETAIL_MARKER);
        let (d, s) = split_dual(&response);
        assert!(d.is_empty());
        assert!(s.is_empty());
    }

    #[test]
    fn test_validate_requires_leading_header() {
        let text = format!(
            "intro 📝 x\n{}\n• a\n{}",
            SHORT_FORM_HIGHLIGHTS, SHORT_FORM_DISCLAIMER
        );
        assert!(!validate_short_form(&text));
    }

    #[test]
    fn test_validate_requires_all_markers() {
        let missing_disclaimer = format!("📝 x\n{}\n• a", SHORT_FORM_HIGHLIGHTS);
        assert!(!validate_short_form(&missing_disclaimer));

        let missing_bullet = format!("📝 x\n{}\n{}", SHORT_FORM_HIGHLIGHTS, SHORT_FORM_DISCLAIMER);
        assert!(!validate_short_form(&missing_bullet));
    }

    #[test]
    fn test_derive_always_validates() {
        let inputs = [
            "## 概要\n配信の説明です。\n\n## 主なトピック\n1. **歌の練習**\n2. **雑談タイム**",
            "トピックも概要もないプレーンな文章。二つ目の文。三つ目の文。",
            "short",
            "**短**だけ", // bold span too short to become a bullet
        ];

        for input in inputs {
            let short = derive_short_form(input);
            assert!(
                validate_short_form(&short),
                "derived short form failed validation for {:?}:\n{}",
                input,
                short
            );
        }
    }

    #[test]
    fn test_derive_collects_topics_in_order() {
        let detailed =
            "1. **最初の話題です**\n2. **二番目の話題**\n3. **三番目の話題**";
        let short = derive_short_form(detailed);
        let first = short.find("最初の話題です").unwrap();
        let second = short.find("二番目の話題").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_derive_caps_topics_at_five() {
        let detailed = (1..=8)
            .map(|i| format!("- **とても長い話題その{}**", i))
            .collect::<Vec<_>>()
            .join("\n");
        let short = derive_short_form(&detailed);
        assert_eq!(short.matches('•').count(), 5);
    }

    #[test]
    fn test_derive_placeholder_bullet_without_topics() {
        let short = derive_short_form("強調なしのテキスト。");
        assert!(short.contains(SHORT_FORM_DEFAULT_BULLET));
    }

    #[test]
    fn test_overview_captured_until_next_heading() {
        let detailed = "## 概要\n一行目 \n二行目\n## 主なトピック\n除外される行";
        let overview = extract_overview(detailed);
        assert_eq!(overview, "一行目 二行目");
    }

    #[test]
    fn test_overview_fallback_first_two_sentences() {
        let overview = extract_overview("一文目。二文目。三文目。");
        assert_eq!(overview, "一文目。二文目。");
    }

    #[test]
    fn test_overview_truncated_at_150_chars() {
        let long = "あ".repeat(400);
        let detailed = format!("## 概要\n{}", long);
        let short = derive_short_form(&detailed);
        assert!(short.contains(&format!("{}...", "あ".repeat(150))));
        assert!(validate_short_form(&short));
    }
}
