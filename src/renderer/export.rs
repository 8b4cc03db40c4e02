/// Terms that suggest a reply contains curriculum data worth exporting.
pub const EXPORT_KEYWORDS: [&str; 7] = [
    "kerndoel",
    "domein",
    "subdomein",
    "examenprogramma",
    "curriculum",
    "resultaat",
    "gevonden",
];

/// Best-effort guess; false positives only cost an extra export button.
pub fn should_offer_export(text: &str) -> bool {
    let lower = text.to_lowercase();
    EXPORT_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curriculum_terms_offer_export() {
        assert!(should_offer_export("De kerndoelen voor groep 5 zijn..."));
        assert!(should_offer_export("Ik heb 12 RESULTATEN gevonden"));
        assert!(should_offer_export("Het Examenprogramma Wiskunde B"));
    }

    #[test]
    fn clarifying_questions_do_not() {
        assert!(!should_offer_export("Welk vak bedoel je?"));
        assert!(!should_offer_export(""));
    }
}
