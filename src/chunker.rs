//! Sentence-aware text chunking.
//!
//! Generation models degrade on long inputs, so text is cut into pieces of
//! at most `max_units` units before each generation call. A unit is a
//! whitespace-separated word for space-delimited scripts and a single
//! non-whitespace character for CJK scripts.
//!
//! Sentences are packed greedily into chunks. A sentence that is longer than
//! the budget on its own is cut at clause punctuation; a clause that is still
//! too long is emitted unchanged.
//!
//! ```
//! use chatterbox_studio::chunker::Chunker;
//!
//! let chunker = Chunker::new(40);
//! let chunks = chunker.split("Hello there. How are you?");
//! assert_eq!(chunks, vec!["Hello there. How are you?".to_string()]);
//! ```

use std::collections::VecDeque;

/// Default chunk budget (words, or characters for CJK text).
pub const DEFAULT_MAX_UNITS: usize = 40;

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？', '।', '؟'];
const CLAUSE_SEPARATORS: &[char] = &[',', ';', '،', '、', '；', '，'];
// Characters that stay glued to the sentence they close: `"Done!"`, `(really?)`.
const SENTENCE_CLOSERS: &[char] = &['"', '\'', '\u{201d}', '\u{2019}', ')', ']', '」', '』'];

/// Script family of an input text, decided once per text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Latin, Cyrillic, Devanagari, Arabic... words are separated by spaces.
    Spaced,
    /// Chinese, Japanese or Korean: budgets count characters.
    Cjk,
}

impl ScriptKind {
    /// `Cjk` if any character of `text` is a CJK ideograph, kana or hangul syllable.
    pub fn detect(text: &str) -> Self {
        if text.chars().any(is_cjk_char) {
            ScriptKind::Cjk
        } else {
            ScriptKind::Spaced
        }
    }

    /// Number of budget units in `text`.
    pub fn count_units(self, text: &str) -> usize {
        match self {
            ScriptKind::Spaced => text.split_whitespace().count(),
            ScriptKind::Cjk => text.chars().filter(|c| !c.is_whitespace()).count(),
        }
    }

    /// String placed between the pieces of one chunk.
    pub fn joiner(self) -> &'static str {
        match self {
            ScriptKind::Spaced => " ",
            ScriptKind::Cjk => "",
        }
    }
}

fn is_cjk_char(ch: char) -> bool {
    matches!(
        ch,
        '\u{4e00}'..='\u{9fff}'
            | '\u{3040}'..='\u{309f}'
            | '\u{30a0}'..='\u{30ff}'
            | '\u{ac00}'..='\u{d7af}'
    )
}

/// Splits text into generation-sized chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_units: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNITS)
    }
}

impl Chunker {
    /// Create a chunker with the given budget. A budget of zero is raised to one.
    pub fn new(max_units: usize) -> Self {
        Self {
            max_units: max_units.max(1),
        }
    }

    pub fn max_units(&self) -> usize {
        self.max_units
    }

    /// Lazily chunk `text`.
    ///
    /// The returned iterator is `Clone`; cloning it (or calling `chunks`
    /// again) restarts the sequence without re-chunking what came before.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        let script = ScriptKind::detect(text);
        Chunks {
            source: text,
            sentences: Sentences { text, pos: 0 },
            script,
            max_units: self.max_units,
            current: Vec::new(),
            current_units: 0,
            ready: VecDeque::new(),
            produced: false,
            exhausted: false,
        }
    }

    /// Eagerly chunk `text`.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.chunks(text).collect()
    }
}

/// Lazy chunk sequence produced by [`Chunker::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    source: &'a str,
    sentences: Sentences<'a>,
    script: ScriptKind,
    max_units: usize,
    current: Vec<&'a str>,
    current_units: usize,
    ready: VecDeque<String>,
    produced: bool,
    exhausted: bool,
}

impl<'a> Chunks<'a> {
    pub fn script(&self) -> ScriptKind {
        self.script
    }

    fn push_sentence(&mut self, sentence: &'a str) {
        let units = self.script.count_units(sentence);
        if self.current_units + units <= self.max_units {
            self.push_piece(sentence, units);
            return;
        }

        self.flush();
        if units <= self.max_units {
            self.push_piece(sentence, units);
            return;
        }

        for clause in split_clauses(sentence) {
            let clause_units = self.script.count_units(clause);
            if self.current_units + clause_units > self.max_units && !self.current.is_empty() {
                self.flush();
            }
            self.push_piece(clause, clause_units);
        }
    }

    fn push_piece(&mut self, piece: &'a str, units: usize) {
        self.current.push(piece);
        self.current_units += units;
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let chunk = self.current.join(self.script.joiner());
        self.current.clear();
        self.current_units = 0;
        self.ready.push_back(chunk);
        self.produced = true;
    }
}

impl Iterator for Chunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(chunk) = self.ready.pop_front() {
                return Some(chunk);
            }
            if self.exhausted {
                return None;
            }
            match self.sentences.next() {
                Some(sentence) => self.push_sentence(sentence),
                None => {
                    self.exhausted = true;
                    self.flush();
                    if !self.produced {
                        // Nothing speakable: hand back the input untouched.
                        self.ready.push_back(self.source.to_string());
                    }
                }
            }
        }
    }
}

/// Trimmed, non-empty sentences of a text, in order.
#[derive(Debug, Clone)]
struct Sentences<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for Sentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while self.pos < self.text.len() {
            let (end, resume) = sentence_bounds(self.text, self.pos);
            let sentence = self.text[self.pos..end].trim();
            self.pos = resume;
            if !sentence.is_empty() {
                return Some(sentence);
            }
        }
        None
    }
}

/// End of the sentence starting at `start`, and where the next one begins.
fn sentence_bounds(text: &str, start: usize) -> (usize, usize) {
    let mut chars = text[start..].char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        let idx = start + offset;
        if ch == '\n' {
            return (idx, idx + 1);
        }
        if SENTENCE_TERMINATORS.contains(&ch) && !is_numeric_connector(text, idx, ch) {
            let mut end = idx + ch.len_utf8();
            while let Some(&(next_offset, next)) = chars.peek() {
                if !SENTENCE_TERMINATORS.contains(&next) && !SENTENCE_CLOSERS.contains(&next) {
                    break;
                }
                end = start + next_offset + next.len_utf8();
                chars.next();
            }
            return (end, end);
        }
    }
    (text.len(), text.len())
}

/// Cut a sentence after each clause separator, keeping the separator.
fn split_clauses(sentence: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut start = 0;
    for (idx, ch) in sentence.char_indices() {
        if CLAUSE_SEPARATORS.contains(&ch) && !is_numeric_connector(sentence, idx, ch) {
            let end = idx + ch.len_utf8();
            push_trimmed(&mut clauses, &sentence[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut clauses, &sentence[start..]);
    clauses
}

fn push_trimmed<'a>(parts: &mut Vec<&'a str>, part: &'a str) {
    let trimmed = part.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed);
    }
}

/// `3.14` and `1,000` keep their separators inside the number.
fn is_numeric_connector(text: &str, idx: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }

    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch.len_utf8()..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

#[cfg(test)]
mod tests {
    use super::{split_clauses, Chunker, ScriptKind, Sentences};

    fn non_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn sentence_of(words: usize, tag: &str) -> String {
        let body: Vec<String> = (0..words).map(|i| format!("{tag}{i}")).collect();
        format!("{}.", body.join(" "))
    }

    #[test]
    fn short_text_stays_in_one_chunk() {
        let chunks = Chunker::new(40).split("Hello there. How are you?");
        assert_eq!(chunks, vec!["Hello there. How are you?".to_string()]);
    }

    #[test]
    fn sentences_are_packed_greedily() {
        let text: Vec<String> = (0..5).map(|i| sentence_of(8, &format!("s{i}w"))).collect();
        let text = text.join(" ");

        let chunks = Chunker::new(20).split(&text);
        let counts: Vec<usize> = chunks
            .iter()
            .map(|c| ScriptKind::Spaced.count_units(c))
            .collect();
        assert_eq!(counts, vec![16, 16, 8]);
    }

    #[test]
    fn fifteen_word_sentences_with_budget_twenty_get_one_chunk_each() {
        let text: Vec<String> = (0..5).map(|i| sentence_of(15, &format!("s{i}w"))).collect();
        let chunks = Chunker::new(20).split(&text.join(" "));
        assert_eq!(chunks.len(), 5);
        assert!(chunks
            .iter()
            .all(|c| ScriptKind::Spaced.count_units(c) <= 20));
    }

    #[test]
    fn long_sentence_is_cut_at_clauses() {
        let text = "one two three four, five six seven eight, nine ten eleven twelve.";
        let chunks = Chunker::new(5).split(text);
        assert_eq!(
            chunks,
            vec![
                "one two three four,".to_string(),
                "five six seven eight,".to_string(),
                "nine ten eleven twelve.".to_string(),
            ]
        );
    }

    #[test]
    fn unsplittable_clause_is_emitted_as_is() {
        let text = "a b c d e f g h i j";
        let chunks = Chunker::new(3).split(text);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn oversized_clause_does_not_share_a_chunk() {
        let chunks = Chunker::new(3).split("Hi. a b c d e, f.");
        assert_eq!(
            chunks,
            vec!["Hi.".to_string(), "a b c d e,".to_string(), "f.".to_string()]
        );
    }

    #[test]
    fn cjk_text_counts_characters_and_joins_without_spaces() {
        let chunker = Chunker::new(6);
        let chunks = chunker.chunks("你好。今天天气很好！我们走吧。");
        assert_eq!(chunks.script(), ScriptKind::Cjk);
        assert_eq!(
            chunks.collect::<Vec<_>>(),
            vec!["你好。".to_string(), "今天天气很好！".to_string(), "我们走吧。".to_string()]
        );
    }

    #[test]
    fn cjk_sentences_pack_together_when_they_fit() {
        let chunks = Chunker::new(40).split("你好。今天天气很好！");
        assert_eq!(chunks, vec!["你好。今天天气很好！".to_string()]);
    }

    #[test]
    fn empty_input_yields_the_original_text() {
        assert_eq!(Chunker::default().split(""), vec![String::new()]);
        assert_eq!(Chunker::default().split("  \n "), vec!["  \n ".to_string()]);
    }

    #[test]
    fn decimals_and_thousands_do_not_break_sentences() {
        let sentences: Vec<&str> = Sentences {
            text: "Pi is 3.14 today. We sold 1,000 units!",
            pos: 0,
        }
        .collect();
        assert_eq!(sentences, vec!["Pi is 3.14 today.", "We sold 1,000 units!"]);
    }

    #[test]
    fn ellipses_and_closing_quotes_stay_with_their_sentence() {
        let sentences: Vec<&str> = Sentences {
            text: "Wait... \"Really?\" Yes.",
            pos: 0,
        }
        .collect();
        assert_eq!(sentences, vec!["Wait...", "\"Really?\"", "Yes."]);
    }

    #[test]
    fn newlines_separate_sentences() {
        let chunks = Chunker::new(2).split("first line\n\n\nsecond line");
        assert_eq!(
            chunks,
            vec!["first line".to_string(), "second line".to_string()]
        );
    }

    #[test]
    fn other_script_terminators_are_recognised() {
        let sentences: Vec<&str> = Sentences {
            text: "नमस्ते दुनिया। कैसे हो? مرحبا؟ شكرا",
            pos: 0,
        }
        .collect();
        assert_eq!(sentences.len(), 4);
    }

    #[test]
    fn clause_split_keeps_punctuation_and_numbers() {
        assert_eq!(
            split_clauses("We paid 1,200 dollars, then left; finally、 home"),
            vec!["We paid 1,200 dollars,", "then left;", "finally、", "home"]
        );
    }

    #[test]
    fn chunking_preserves_non_whitespace_content() {
        let inputs = [
            "Hello there. How are you? I am fine, thanks; and you?",
            "One, two, three, four, five, six, seven, eight, nine, ten, eleven.",
            "今天天气很好，我们去公园吧。好的！",
            "Line one\nLine two\n\nLine three...",
            "   ",
        ];
        for budget in [1, 3, 7, 40] {
            let chunker = Chunker::new(budget);
            for input in inputs {
                let joined: String = chunker.chunks(input).collect();
                assert_eq!(non_whitespace(&joined), non_whitespace(input), "{input:?} @ {budget}");
            }
        }
    }

    #[test]
    fn chunk_sequence_is_restartable() {
        let chunker = Chunker::new(3);
        let mut chunks = chunker.chunks("a b c. d e f. g h i.");
        let first = chunks.next();
        let resumed = chunks.clone();
        assert_eq!(first.as_deref(), Some("a b c."));
        assert_eq!(chunks.collect::<Vec<_>>(), resumed.collect::<Vec<_>>());
        assert_eq!(chunker.split("a b c. d e f. g h i.").len(), 3);
    }

    #[test]
    fn zero_budget_is_treated_as_one() {
        assert_eq!(Chunker::new(0).max_units(), 1);
    }
}
