//! Answer checking for typed responses.
//!
//! Answers are compared after normalization (case, punctuation, whitespace).
//! Polish diacritics are significant but a response that only misses them
//! still counts as a weaker correct answer.

use serde::Serialize;

use crate::srs::PASSING_QUALITY;

const PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '"', '\'', '„', '”', '“', '«', '»', '(', ')',
];
const ALTERNATIVE_SEPARATORS: &[char] = &['/', ';'];
const TYPO_MIN_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AnswerMatch {
    Empty,
    Wrong,
    Typo,
    MissingDiacritics,
    Exact,
}

impl AnswerMatch {
    pub fn quality(&self, hint_used: bool) -> u8 {
        match (self, hint_used) {
            (AnswerMatch::Exact, false) => 5,
            (AnswerMatch::Exact, true) => 4,
            (AnswerMatch::MissingDiacritics, false) => 4,
            (AnswerMatch::MissingDiacritics, true) => 3,
            (AnswerMatch::Typo, _) => 3,
            (AnswerMatch::Wrong, _) => 1,
            (AnswerMatch::Empty, _) => 0,
        }
    }

    pub fn is_correct(&self) -> bool {
        self.quality(false) >= PASSING_QUALITY
    }

    pub fn message(&self) -> &'static str {
        match self {
            AnswerMatch::Exact => "Correct!",
            AnswerMatch::MissingDiacritics => "Correct, but mind the Polish letters.",
            AnswerMatch::Typo => "Almost: check the spelling.",
            AnswerMatch::Wrong => "Incorrect.",
            AnswerMatch::Empty => "No answer given.",
        }
    }
}

pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| !PUNCTUATION.contains(c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'ą' => 'a',
            'ć' => 'c',
            'ę' => 'e',
            'ł' => 'l',
            'ń' => 'n',
            'ó' => 'o',
            'ś' => 's',
            'ź' | 'ż' => 'z',
            'Ą' => 'A',
            'Ć' => 'C',
            'Ę' => 'E',
            'Ł' => 'L',
            'Ń' => 'N',
            'Ó' => 'O',
            'Ś' => 'S',
            'Ź' | 'Ż' => 'Z',
            other => other,
        })
        .collect()
}

/// Key used to detect the same term written twice: normalized and folded.
pub fn match_key(s: &str) -> String {
    fold_diacritics(&normalize(s))
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn compare(given: &str, expected: &str) -> AnswerMatch {
    let expected = normalize(expected);
    if given == expected {
        return AnswerMatch::Exact;
    }

    let given_folded = fold_diacritics(given);
    let expected_folded = fold_diacritics(&expected);
    if given_folded == expected_folded {
        return AnswerMatch::MissingDiacritics;
    }

    if expected_folded.chars().count() >= TYPO_MIN_LEN
        && levenshtein(&given_folded, &expected_folded) == 1
    {
        return AnswerMatch::Typo;
    }

    AnswerMatch::Wrong
}

/// Best match of `given` against `expected`, which may list alternatives
/// separated by `/` or `;`.
pub fn check_answer(given: &str, expected: &str) -> AnswerMatch {
    let given = normalize(given);
    if given.is_empty() {
        return AnswerMatch::Empty;
    }

    expected
        .split(ALTERNATIVE_SEPARATORS)
        .filter(|alt| !normalize(alt).is_empty())
        .map(|alt| compare(&given, alt))
        .max()
        .unwrap_or(AnswerMatch::Wrong)
}

/// Reveal the first `level` letters of each word and mask the rest.
pub fn hint(answer: &str, level: usize) -> String {
    answer
        .split_whitespace()
        .map(|word| {
            word.chars()
                .enumerate()
                .map(|(i, c)| if i < level || !c.is_alphabetic() { c } else { '_' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    mod normalize_tests {
        use super::*;

        #[test]
        fn lowercases_and_trims() {
            assert_eq!(normalize("  Dzień Dobry  "), "dzień dobry");
        }

        #[test]
        fn strips_punctuation_and_collapses_spaces() {
            assert_eq!(normalize("„Jak   się masz?”"), "jak się masz");
        }

        #[test]
        fn lowercases_polish_capitals() {
            assert_eq!(normalize("ŁÓDŹ"), "łódź");
        }

        #[test]
        fn fold_maps_every_polish_letter() {
            assert_eq!(fold_diacritics("ąćęłńóśźż"), "acelnoszz");
            assert_eq!(fold_diacritics("ĄĆĘŁŃÓŚŹŻ"), "ACELNOSZZ");
        }

        #[test]
        fn match_key_ignores_case_and_accents() {
            assert_eq!(match_key("Źródło!"), match_key("zrodlo"));
        }
    }

    mod check_tests {
        use super::*;

        #[test]
        fn exact_match() {
            assert_eq!(check_answer("Dziękuję.", "dziękuję"), AnswerMatch::Exact);
        }

        #[test]
        fn missing_diacritics() {
            assert_eq!(
                check_answer("dziekuje", "dziękuję"),
                AnswerMatch::MissingDiacritics
            );
        }

        #[test]
        fn single_typo_on_long_word() {
            assert_eq!(check_answer("dziekije", "dziękuję"), AnswerMatch::Typo);
        }

        #[test]
        fn typo_not_allowed_on_short_words() {
            // kot vs kto
            assert_eq!(check_answer("kto", "kot"), AnswerMatch::Wrong);
            assert_eq!(check_answer("kos", "kot"), AnswerMatch::Wrong);
        }

        #[test]
        fn wrong_answer() {
            assert_eq!(check_answer("pies", "kot"), AnswerMatch::Wrong);
        }

        #[test]
        fn blank_answer_is_empty() {
            assert_eq!(check_answer("   ", "kot"), AnswerMatch::Empty);
            assert_eq!(check_answer("?!", "kot"), AnswerMatch::Empty);
        }

        #[test]
        fn alternatives_take_best_match() {
            assert_eq!(check_answer("kotek", "kot / kotek"), AnswerMatch::Exact);
            assert_eq!(check_answer("kotek", "kot; kotek"), AnswerMatch::Exact);
            assert_eq!(
                check_answer("zolw", "żółw / żółwik"),
                AnswerMatch::MissingDiacritics
            );
        }

        #[test]
        fn empty_expected_is_wrong() {
            assert_eq!(check_answer("kot", " / "), AnswerMatch::Wrong);
        }
    }

    mod quality_tests {
        use super::*;

        #[test]
        fn quality_mapping() {
            assert_eq!(AnswerMatch::Exact.quality(false), 5);
            assert_eq!(AnswerMatch::Exact.quality(true), 4);
            assert_eq!(AnswerMatch::MissingDiacritics.quality(false), 4);
            assert_eq!(AnswerMatch::MissingDiacritics.quality(true), 3);
            assert_eq!(AnswerMatch::Typo.quality(true), 3);
            assert_eq!(AnswerMatch::Wrong.quality(false), 1);
            assert_eq!(AnswerMatch::Empty.quality(false), 0);
        }

        #[test]
        fn correctness_follows_passing_quality() {
            assert!(AnswerMatch::Exact.is_correct());
            assert!(AnswerMatch::MissingDiacritics.is_correct());
            assert!(AnswerMatch::Typo.is_correct());
            assert!(!AnswerMatch::Wrong.is_correct());
            assert!(!AnswerMatch::Empty.is_correct());
        }
    }

    mod hint_tests {
        use super::*;

        #[test]
        fn masks_after_level() {
            assert_eq!(hint("dzień dobry", 1), "d____ d____");
            assert_eq!(hint("dzień dobry", 2), "dz___ do___");
        }

        #[test]
        fn keeps_non_letters() {
            assert_eq!(hint("co-to", 0), "__-__");
        }

        #[test]
        fn level_beyond_length_reveals_all() {
            assert_eq!(hint("kot", 10), "kot");
        }

        #[test]
        fn levenshtein_basics() {
            assert_eq!(levenshtein("", "abc"), 3);
            assert_eq!(levenshtein("kitten", "sitting"), 3);
            assert_eq!(levenshtein("same", "same"), 0);
        }
    }
}
