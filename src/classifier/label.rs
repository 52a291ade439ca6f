use super::model::Classification;

/// Pick the highest-confidence classification
pub fn top_classification(results: &[Classification]) -> Option<&Classification> {
    results
        .iter()
        .filter(|c| !c.confidence.is_nan())
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
}

/// Turn a raw identifier into the displayed label: first segment before
/// `delimiter`, trimmed, each word title-cased.
pub fn format_label(identifier: &str, delimiter: &str) -> String {
    let first = identifier
        .split(delimiter)
        .next()
        .unwrap_or_default()
        .trim();

    first
        .split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Label to publish for a finished classification, or `None` when the top
/// result does not clear `threshold`.
pub fn accepted_label(
    results: &[Classification],
    threshold: f32,
    delimiter: &str,
) -> Option<(String, f32)> {
    let top = top_classification(results)?;
    if top.confidence <= threshold {
        return None;
    }

    let label = format_label(&top.identifier, delimiter);
    if label.is_empty() {
        return None;
    }
    Some((label, top.confidence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_label_takes_first_segment() {
        assert_eq!(format_label("daisy, oxeye daisy", ","), "Daisy");
        assert_eq!(format_label("golden retriever", ","), "Golden Retriever");
        assert_eq!(format_label("  tabby, tabby cat", ","), "Tabby");
        assert_eq!(format_label("PIZZA|pie", "|"), "Pizza");
    }

    #[test]
    fn test_format_label_empty() {
        assert_eq!(format_label("", ","), "");
        assert_eq!(format_label(", daisy", ","), "");
    }

    #[test]
    fn test_top_classification_ignores_order() {
        let results = vec![
            Classification::new("pot", 0.2),
            Classification::new("daisy", 0.7),
            Classification::new("bee", 0.1),
        ];
        assert_eq!(top_classification(&results).unwrap().identifier, "daisy");
        assert!(top_classification(&[]).is_none());
    }

    #[test]
    fn test_threshold_is_strict() {
        let at_threshold = vec![Classification::new("daisy", 0.5)];
        assert!(accepted_label(&at_threshold, 0.5, ",").is_none());

        for confidence in [0.0, 0.1, 0.25, 0.49, 0.5] {
            let results = vec![Classification::new("daisy", confidence)];
            assert!(accepted_label(&results, 0.5, ",").is_none());
        }

        for confidence in [0.51, 0.75, 0.9, 1.0] {
            let results = vec![Classification::new("daisy, oxeye daisy", confidence)];
            let (label, accepted) = accepted_label(&results, 0.5, ",").unwrap();
            assert_eq!(label, "Daisy");
            assert_eq!(accepted, confidence);
        }
    }
}
