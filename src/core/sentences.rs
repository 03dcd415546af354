//! Sentence splitting that does not break on common abbreviations,
//! decimals, or ellipses.

/// Lowercased tokens (without the trailing period) that never end a
/// sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "jr", "sr", "st", "vs", "etc", "no", "ft", "mt", "approx", "jan",
    "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec", "a.m", "p.m",
    "u.s",
];

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// The word that a period closes, e.g. `"Mr"` for `"... Mr. Smith"`.
fn word_before(text: &str, end: usize) -> &str {
    let head = &text[..end];
    let start = head
        .rfind(|c: char| c.is_whitespace() || c == '(' || c == '"')
        .map(|i| i + 1)
        .unwrap_or(0);
    &head[start..]
}

fn is_abbreviation(word: &str) -> bool {
    let lowered = word.to_lowercase();
    ABBREVIATIONS.contains(&lowered.as_str())
        // Single initials such as "J." in "J. Smith".
        || (word.chars().count() == 1 && word.chars().all(char::is_alphabetic))
}

/// Split `text` into trimmed sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if c == '…' || !is_terminal(c) {
            i += 1;
            continue;
        }

        // Swallow a run of terminal punctuation ("?!", "...").
        let mut j = i;
        let mut periods = 0;
        while j < chars.len() && is_terminal(chars[j].1) {
            if chars[j].1 == '.' {
                periods += 1;
            }
            j += 1;
        }
        // Closing quotes and brackets belong to the sentence they end.
        while j < chars.len() && matches!(chars[j].1, '"' | '\'' | ')' | '”' | '’') {
            j += 1;
        }
        let end = chars.get(j).map(|(p, _)| *p).unwrap_or(text.len());
        let at_break = j >= chars.len() || chars[j].1.is_whitespace();

        let ellipsis = periods >= 3;
        let abbreviation = c == '.' && j - i == 1 && is_abbreviation(word_before(text, pos));

        if at_break && !ellipsis && !abbreviation {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = end;
        }
        i = j.max(i + 1);
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

pub fn count_sentences(text: &str) -> usize {
    split_sentences(text).len()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_simple_sentences() {
        assert_eq!(count_sentences("One. Two! Three?"), 3);
        assert_eq!(count_sentences("No terminal punctuation"), 1);
        assert_eq!(count_sentences("   "), 0);
        assert_eq!(count_sentences(""), 0);
    }

    #[test]
    fn abbreviations_do_not_split() {
        assert_eq!(
            count_sentences("Mr. Smith scored vs. Boston. The game moved to St. Louis."),
            2
        );
        assert_eq!(count_sentences("It was Jan. 5 in the arena."), 1);
        assert_eq!(count_sentences("Gary Payton Jr. hit a layup."), 1);
    }

    #[test]
    fn ellipsis_is_not_a_break() {
        assert_eq!(count_sentences("He waited... then scored. Done."), 2);
        assert_eq!(count_sentences("He waited… then scored."), 1);
    }

    #[test]
    fn decimals_and_clusters() {
        assert_eq!(count_sentences("He shot 3.5 percent better. Really?!"), 2);
    }

    #[test]
    fn quotes_stay_with_sentence() {
        let sentences = split_sentences("He said \"go.\" They went.");
        assert_eq!(sentences, vec!["He said \"go.\"", "They went."]);
    }

    #[test]
    fn initials_do_not_split() {
        assert_eq!(count_sentences("J. Smith hit a three. The lead grew."), 2);
    }
}
