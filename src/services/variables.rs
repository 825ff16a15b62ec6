//! Placeholder substitution for template subject and body.
//!
//! The default syntax is `{KEY}`; `[KEY]` is supported as a legacy form that
//! older templates still use. Matching is case-insensitive. Unresolved
//! placeholders are left untouched — callers are expected to supply a
//! complete variable set for the template they chose.

use std::collections::HashMap;

/// Placeholder delimiter style
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaceholderSyntax {
    /// `{KEY}` — default
    Curly,
    /// `[KEY]` — legacy
    Bracket,
}

impl PlaceholderSyntax {
    fn delimiters(self) -> (char, char) {
        match self {
            Self::Curly => ('{', '}'),
            Self::Bracket => ('[', ']'),
        }
    }
}

/// Substitute every variable in `vars` into `text`, in both syntaxes.
pub fn resolve(text: &str, vars: &HashMap<String, String>) -> String {
    resolve_with(text, vars, &[PlaceholderSyntax::Curly, PlaceholderSyntax::Bracket])
}

/// Substitute every variable in `vars` into `text` using the given syntaxes.
///
/// Keys are applied in sorted order so output is deterministic even when a
/// value itself contains placeholder-shaped text; substituted values are
/// never re-scanned for keys that sort before theirs.
pub fn resolve_with(
    text: &str,
    vars: &HashMap<String, String>,
    syntaxes: &[PlaceholderSyntax],
) -> String {
    let mut keys: Vec<&String> = vars.keys().collect();
    keys.sort();

    let mut out = text.to_string();
    for key in keys {
        let value = &vars[key];
        for syntax in syntaxes {
            let (open, close) = syntax.delimiters();
            let pattern = format!("{open}{key}{close}");
            out = replace_all_ci(&out, &pattern, value);
        }
    }
    out
}

/// Replace all case-insensitive (ASCII) occurrences of `pattern` with `value`.
///
/// When `value` is empty and the removal would leave a stray space directly
/// before punctuation ("Hej  !"), the stray whitespace is collapsed.
fn replace_all_ci(text: &str, pattern: &str, value: &str) -> String {
    if pattern.is_empty() {
        return text.to_string();
    }

    let bytes = text.as_bytes();
    let pat = pattern.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < bytes.len() {
        if i + pat.len() <= bytes.len() && bytes[i..i + pat.len()].eq_ignore_ascii_case(pat) {
            if value.is_empty() {
                i += pat.len();
                i += collapse_stray_whitespace(&mut out, &bytes[i..]);
            } else {
                out.push_str(value);
                i += pat.len();
            }
        } else {
            // advance one UTF-8 character
            let mut end = i + 1;
            while end < bytes.len() && (bytes[end] & 0b1100_0000) == 0b1000_0000 {
                end += 1;
            }
            out.push_str(&text[i..end]);
            i = end;
        }
    }

    out
}

/// If the removed placeholder sat between spaces and punctuation, drop the
/// spaces on both sides so "Hej  !" becomes "Hej!". Returns how many bytes
/// of `rest` were consumed.
fn collapse_stray_whitespace(out: &mut String, rest: &[u8]) -> usize {
    let mut skipped = 0;
    while skipped < rest.len() && rest[skipped] == b' ' {
        skipped += 1;
    }

    let next_is_punct = skipped < rest.len() && is_sentence_punct(rest[skipped]);
    if !next_is_punct {
        return 0;
    }

    while out.ends_with(' ') {
        out.pop();
    }
    skipped
}

fn is_sentence_punct(b: u8) -> bool {
    matches!(b, b'!' | b'?' | b'.' | b',' | b':' | b';')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn resolves_curly_placeholder() {
        let out = resolve("Hej {NAMN}!", &vars(&[("NAMN", "Anna")]));
        assert_eq!(out, "Hej Anna!");
    }

    #[test]
    fn resolves_bracket_placeholder() {
        let out = resolve("Hej [NAMN]!", &vars(&[("NAMN", "Anna")]));
        assert_eq!(out, "Hej Anna!");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let out = resolve("Hej {namn}, din kod: {Kod}", &vars(&[("NAMN", "Anna"), ("KOD", "X1")]));
        assert_eq!(out, "Hej Anna, din kod: X1");
    }

    #[test]
    fn replaces_all_occurrences() {
        let out = resolve("{NAMN} och {NAMN} igen", &vars(&[("NAMN", "Bo")]));
        assert_eq!(out, "Bo och Bo igen");
    }

    #[test]
    fn empty_value_collapses_stray_space_before_punctuation() {
        let out = resolve("Hej {NAMN}!", &vars(&[("NAMN", "")]));
        assert_eq!(out, "Hej!");
    }

    #[test]
    fn empty_value_collapses_space_on_both_sides_of_placeholder() {
        let out = resolve("Hej {NAMN} !", &vars(&[("NAMN", "")]));
        assert_eq!(out, "Hej!");
    }

    #[test]
    fn empty_value_mid_sentence_keeps_surrounding_text() {
        let out = resolve("Din kurs {KURS} startar snart", &vars(&[("KURS", "")]));
        assert_eq!(out, "Din kurs  startar snart");
    }

    #[test]
    fn unresolved_placeholders_are_left_untouched() {
        let out = resolve("Hej {NAMN}, kod {KOD}", &vars(&[("NAMN", "Anna")]));
        assert_eq!(out, "Hej Anna, kod {KOD}");
    }

    #[test]
    fn complete_variable_set_leaves_no_placeholders() {
        let out = resolve(
            "Hej {NAMN}! Din kurs [KURS] börjar {DATUM}.",
            &vars(&[("NAMN", "Anna"), ("KURS", "Keramik"), ("DATUM", "3 maj")]),
        );
        assert!(!out.contains('{') && !out.contains('['));
        assert_eq!(out, "Hej Anna! Din kurs Keramik börjar 3 maj.");
    }

    #[test]
    fn curly_only_syntax_leaves_bracket_form_alone() {
        let out = resolve_with(
            "Hej {NAMN} [NAMN]",
            &vars(&[("NAMN", "Anna")]),
            &[PlaceholderSyntax::Curly],
        );
        assert_eq!(out, "Hej Anna [NAMN]");
    }

    #[test]
    fn placeholder_shaped_values_resolve_deterministically() {
        // EPOST sorts before NAMN, so by the time NAMN's value is inserted
        // the EPOST pass is over and the inserted text stays literal
        let out = resolve(
            "Hej {NAMN}, vi mailar {EPOST}",
            &vars(&[("NAMN", "{EPOST}"), ("EPOST", "anna@example.com")]),
        );
        assert_eq!(out, "Hej {EPOST}, vi mailar anna@example.com");
    }

    #[test]
    fn non_ascii_text_around_placeholder_survives() {
        let out = resolve("Välkommen {NAMN} på kursen!", &vars(&[("NAMN", "Åsa")]));
        assert_eq!(out, "Välkommen Åsa på kursen!");
    }
}
