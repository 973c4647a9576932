//! Text helpers shared by normalization, fusion and scoring

/// Trim and collapse internal whitespace runs to a single space
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert shouted cover lettering ("THE BEATLES") to title case
///
/// Only applies when every letter is upper case and at least one run of
/// letters is four or longer, so country codes and short acronyms ("UK",
/// "USA", "AC/DC") are left alone. Within a converted string, roman
/// numerals ("IV") and dotted or slashed initials ("R.E.M.") keep their
/// capitals.
pub fn standardize_case(s: &str) -> String {
    let has_lowercase = s.chars().any(|c| c.is_lowercase());
    let has_long_word = s
        .split(|c: char| !c.is_alphabetic())
        .any(|w| w.chars().count() >= 4);

    if !has_lowercase && has_long_word {
        s.split(' ')
            .map(|word| {
                if keeps_capitals(word) {
                    word.to_string()
                } else {
                    title_case(word)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        s.to_string()
    }
}

fn keeps_capitals(word: &str) -> bool {
    let core = word.trim_matches(|c: char| !c.is_alphanumeric());
    if is_roman_numeral(core) {
        return true;
    }
    core.contains(['.', '/'])
        && core
            .split(|c: char| !c.is_alphabetic())
            .all(|run| run.chars().count() <= 2)
}

/// I through XXXIX
fn is_roman_numeral(s: &str) -> bool {
    let units = s.trim_start_matches('X');
    let tens = s.len() - units.len();
    !s.is_empty()
        && tens <= 3
        && matches!(units, "" | "I" | "II" | "III" | "IV" | "V" | "VI" | "VII" | "VIII" | "IX")
}

/// Upper-case the first letter of each word, lower-case the rest
pub fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Comparison key for names and titles
///
/// Lower-cases, turns punctuation into spaces, collapses whitespace and drops
/// a leading "the".
pub fn fold_for_match(s: &str) -> String {
    let spaced: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(|c| c.to_lowercase())
        .collect();
    let folded = collapse_whitespace(&spaced);

    match folded.strip_prefix("the ") {
        Some(rest) => rest.to_string(),
        None => folded,
    }
}

/// Comparison key for catalog and matrix numbers: alphanumerics only, upper case
pub fn compact_code(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

/// Normalized Levenshtein similarity (0.0-1.0) of the folded strings
///
/// Returns 0.0 when either side folds to nothing.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = fold_for_match(a);
    let b = fold_for_match(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}
