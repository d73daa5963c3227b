use super::TimedWord;

const DIGIT_BONUS: u32 = 2;
const SENTENCE_PAUSE: u32 = 6;
const CLAUSE_PAUSE: u32 = 3;

/// Spread the words of `text` over `total_duration` seconds.
///
/// Each word gets a span proportional to its weight (see [`word_weight`]).
/// Spans are contiguous: the first starts at 0, each ends where the next
/// begins and the last ends exactly at `total_duration`. Empty text or a
/// non-positive duration yields no words.
pub fn estimate(text: &str, total_duration: f64) -> Vec<TimedWord> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || !(total_duration > 0.0) {
        return Vec::new();
    }

    let weights: Vec<u32> = words.iter().map(|w| word_weight(w)).collect();
    let total_weight: u32 = weights.iter().sum();
    let per_weight = total_duration / total_weight as f64;

    let mut timings = Vec::with_capacity(words.len());
    let mut cursor = 0.0;
    let mut consumed = 0u32;

    for (word, weight) in words.iter().zip(&weights) {
        consumed += weight;
        // Derive each end from the running weight so rounding never accumulates
        let end = if consumed == total_weight {
            total_duration
        } else {
            consumed as f64 * per_weight
        };
        timings.push(TimedWord::new(*word, cursor, end));
        cursor = end;
    }

    timings
}

/// Relative speaking time of a word: its character count, plus extra for
/// numerals and for the pause that trailing punctuation implies.
pub fn word_weight(word: &str) -> u32 {
    let mut weight = word.chars().count() as u32;

    if word.chars().any(|c| c.is_ascii_digit()) {
        weight += DIGIT_BONUS;
    }

    match word.chars().last() {
        Some('.' | '!' | '?') => weight += SENTENCE_PAUSE,
        Some(',' | ':' | ';') => weight += CLAUSE_PAUSE,
        _ => {}
    }

    weight.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiles(timings: &[TimedWord], total: f64) {
        assert_eq!(timings[0].start_time, 0.0);
        assert!((timings.last().unwrap().end_time - total).abs() < 1e-9);
        for pair in timings.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
            assert!(pair[0].start_time < pair[0].end_time);
        }
    }

    #[test]
    fn test_spans_tile_duration() {
        let cases = [
            ("Hello world", 1.0),
            ("In 1969, humans walked on the Moon. Amazing!", 7.3),
            ("a", 0.25),
            ("Wait... what? Really; yes: absolutely, certainly.", 12.0),
        ];
        for (text, total) in cases {
            let timings = estimate(text, total);
            assert_eq!(timings.len(), text.split_whitespace().count());
            assert_tiles(&timings, total);
        }
    }

    #[test]
    fn test_sentence_end_gets_longer_span() {
        let timings = estimate("word. word", 4.0);
        assert!(timings[0].duration() > timings[1].duration());
    }

    #[test]
    fn test_weights() {
        assert_eq!(word_weight("cat"), 3);
        assert_eq!(word_weight("cat."), 4 + 6);
        assert_eq!(word_weight("cat,"), 4 + 3);
        assert_eq!(word_weight("1969"), 4 + 2);
        assert_eq!(word_weight("1969."), 5 + 2 + 6);
    }

    #[test]
    fn test_proportional_spans() {
        // Weights 2 and 5
        let timings = estimate("hi there", 7.0);
        assert!((timings[0].duration() - 2.0).abs() < 1e-9);
        assert!((timings[1].duration() - 5.0).abs() < 1e-9);

        // "there." weighs 6 + 6
        let timings = estimate("hi there.", 14.0);
        assert!((timings[0].duration() - 2.0).abs() < 1e-9);
        assert!((timings[1].duration() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text() {
        assert!(estimate("", 3.0).is_empty());
        assert!(estimate("   \n\t", 3.0).is_empty());
    }

    #[test]
    fn test_non_positive_duration() {
        assert!(estimate("hello", 0.0).is_empty());
        assert!(estimate("hello", f64::NAN).is_empty());
    }

    #[test]
    fn test_whitespace_runs_preserve_order() {
        let timings = estimate("  one\ntwo\t\tthree ", 3.0);
        let words: Vec<&str> = timings.iter().map(|t| t.word.as_str()).collect();
        assert_eq!(words, vec!["one", "two", "three"]);
    }
}
