use std::{
    collections::HashMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use serde::{Serialize, Serializer};

use crate::error::ServiceError;

pub const META_TOKEN: &str = "<s>";

/// Left padding, also stands in for characters the vocabulary lacks. Never
/// present in the vocabulary file.
pub const PAD_INDEX: i64 = 0;

/// Character-level vocabulary, stored on disk as a `{token: index}` JSON
/// object with indices `1..=len`.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    index: HashMap<String, i64>,
    tokens: Vec<Option<String>>,
    meta: Option<i64>,
}

impl Vocabulary {
    /// Ranks characters by frequency (ties keep first-seen order), keeps the
    /// `max_words` most frequent and appends the meta token unless the model
    /// trains on a single text.
    pub fn from_texts(texts: &[String], max_words: usize, single_text: bool) -> Self {
        let mut counts: HashMap<char, usize> = HashMap::new();
        let mut order: Vec<char> = Vec::new();
        for text in texts {
            for ch in text.chars() {
                let count = counts.entry(ch).or_insert_with(|| {
                    order.push(ch);
                    0
                });
                *count += 1;
            }
        }

        // stable sort keeps first-seen order among equal counts
        order.sort_by(|a, b| counts[b].cmp(&counts[a]));
        order.truncate(max_words);

        let mut entries: Vec<(String, i64)> = order
            .into_iter()
            .enumerate()
            .map(|(idx, ch)| (ch.to_string(), idx as i64 + 1))
            .collect();
        if !single_text {
            let next = entries.len() as i64 + 1;
            entries.push((META_TOKEN.to_string(), next));
        }

        Self::from_entries(entries)
    }

    pub fn from_map(map: HashMap<String, i64>) -> Result<Self, ServiceError> {
        let len = map.len() as i64;
        let mut seen = HashMap::with_capacity(map.len());
        for (token, &idx) in &map {
            if idx <= PAD_INDEX || idx > len {
                return Err(ServiceError::Vocabulary(format!(
                    "token {token:?} has index {idx} outside 1..={len}"
                )));
            }
            if token != META_TOKEN && token.chars().count() != 1 {
                return Err(ServiceError::Vocabulary(format!(
                    "token {token:?} is not a single character"
                )));
            }
            if let Some(other) = seen.insert(idx, token) {
                return Err(ServiceError::Vocabulary(format!(
                    "tokens {other:?} and {token:?} share index {idx}"
                )));
            }
        }
        Ok(Self::from_entries(map))
    }

    // indices must already be unique and within 1..=len
    fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        let index: HashMap<String, i64> = entries.into_iter().collect();
        let mut tokens = vec![None; index.len() + 1];
        for (token, &idx) in &index {
            tokens[idx as usize] = Some(token.clone());
        }
        let meta = index.get(META_TOKEN).copied();
        Self {
            index,
            tokens,
            meta,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Artifact(format!("cannot read vocabulary {}: {e}", path.display()))
        })?;
        let map: HashMap<String, i64> = serde_json::from_str(&raw).map_err(|e| {
            ServiceError::Vocabulary(format!("invalid vocabulary {}: {e}", path.display()))
        })?;
        Self::from_map(map)
    }

    pub fn save(&self, path: &Path) -> Result<(), ServiceError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn num_classes(&self) -> i64 {
        self.tokens.len() as i64
    }

    pub fn meta_index(&self) -> Option<i64> {
        self.meta
    }

    pub fn index_of(&self, token: &str) -> Option<i64> {
        self.index.get(token).copied()
    }

    pub fn token(&self, idx: i64) -> Option<&str> {
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.tokens.get(i))
            .and_then(|t| t.as_deref())
    }

    /// Encodes a prompt. Unknown characters become `PAD_INDEX` so they still
    /// occupy a slot in the model's window.
    pub fn encode(&self, text: &str) -> Vec<i64> {
        let mut buf = [0u8; 4];
        text.chars()
            .map(|ch| self.index_of(ch.encode_utf8(&mut buf)).unwrap_or(PAD_INDEX))
            .collect()
    }

    /// Encodes a training text as `<s> text <s>`, skipping characters cut by
    /// `max_words`.
    pub fn encode_wrapped(&self, text: &str) -> Vec<i64> {
        let mut buf = [0u8; 4];
        let mut tokens = Vec::with_capacity(text.len() + 2);
        tokens.extend(self.meta);
        tokens.extend(
            text.chars()
                .filter_map(|ch| self.index_of(ch.encode_utf8(&mut buf))),
        );
        tokens.extend(self.meta);
        tokens
    }
}

// serialised as a JSON object in index order
impl Serialize for Vocabulary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.tokens
                .iter()
                .enumerate()
                .filter_map(|(idx, token)| token.as_deref().map(|token| (token, idx))),
        )
    }
}

/// Left-pads (or truncates from the left) to exactly `max_length` tokens.
pub fn pad_window(tokens: &[i64], max_length: usize) -> Vec<i64> {
    let start = tokens.len().saturating_sub(max_length);
    let window = &tokens[start..];
    let mut padded = vec![PAD_INDEX; max_length - window.len()];
    padded.extend_from_slice(window);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn indices_follow_frequency_then_first_seen() {
        let vocab = Vocabulary::from_texts(&texts(&["abca", "cb"]), 100, false);
        // a:2 b:2 c:2 -> first-seen order among ties
        assert_eq!(vocab.index_of("a"), Some(1));
        assert_eq!(vocab.index_of("b"), Some(2));
        assert_eq!(vocab.index_of("c"), Some(3));
        assert_eq!(vocab.meta_index(), Some(4));
        assert_eq!(vocab.num_classes(), 5);

        let vocab = Vocabulary::from_texts(&texts(&["xyy"]), 100, false);
        assert_eq!(vocab.index_of("y"), Some(1));
        assert_eq!(vocab.index_of("x"), Some(2));
    }

    #[test]
    fn max_words_truncates_rare_characters() {
        let vocab = Vocabulary::from_texts(&texts(&["aaabbc"]), 2, false);
        assert_eq!(vocab.index_of("c"), None);
        assert_eq!(vocab.meta_index(), Some(3));
        assert_eq!(vocab.len(), 3);
    }

    #[test]
    fn single_text_has_no_meta_token() {
        let vocab = Vocabulary::from_texts(&texts(&["ab"]), 100, true);
        assert_eq!(vocab.meta_index(), None);
        assert_eq!(vocab.encode_wrapped("ab"), vec![1, 2]);
    }

    #[test]
    fn unknown_prompt_characters_encode_as_padding() {
        let vocab = Vocabulary::from_texts(&texts(&["hello"]), 100, false);
        let l = vocab.index_of("l").unwrap();
        assert_eq!(vocab.encode("lzl"), vec![l, PAD_INDEX, l]);
    }

    #[test]
    fn training_encoding_skips_truncated_characters() {
        let vocab = Vocabulary::from_texts(&texts(&["aab"]), 1, false);
        let (a, meta) = (vocab.index_of("a").unwrap(), vocab.meta_index().unwrap());
        assert_eq!(vocab.encode_wrapped("ab"), vec![meta, a, meta]);
    }

    #[test]
    fn token_lookup_skips_padding() {
        let vocab = Vocabulary::from_texts(&texts(&["ab"]), 100, false);
        assert_eq!(vocab.token(PAD_INDEX), None);
        assert_eq!(vocab.token(1), Some("a"));
        assert_eq!(vocab.token(3), Some(META_TOKEN));
        assert_eq!(vocab.token(99), None);
        assert_eq!(vocab.token(-1), None);
    }

    #[test]
    fn saved_vocabulary_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        let vocab = Vocabulary::from_texts(&texts(&["Sydney \"harbour\"\n", "Perth"]), 100, false);
        vocab.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let object: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(object[META_TOKEN], serde_json::json!(vocab.meta_index().unwrap()));

        let loaded = Vocabulary::load(&path).unwrap();
        assert_eq!(loaded.len(), vocab.len());
        for ch in ["S", "\"", "\n", "P", META_TOKEN] {
            assert_eq!(loaded.index_of(ch), vocab.index_of(ch), "token {ch:?}");
        }
    }

    #[test]
    fn invalid_vocabularies_are_rejected() {
        let zero = HashMap::from([("a".to_string(), 0)]);
        assert!(Vocabulary::from_map(zero).is_err());

        let shared = HashMap::from([("a".to_string(), 1), ("b".to_string(), 1)]);
        assert!(Vocabulary::from_map(shared).is_err());

        let word = HashMap::from([("hello".to_string(), 1)]);
        assert!(Vocabulary::from_map(word).is_err());
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let huge = HashMap::from([("a".to_string(), i64::MAX)]);
        assert!(matches!(
            Vocabulary::from_map(huge),
            Err(ServiceError::Vocabulary(_))
        ));

        let gap = HashMap::from([("a".to_string(), 1), ("b".to_string(), 3)]);
        assert!(matches!(
            Vocabulary::from_map(gap),
            Err(ServiceError::Vocabulary(_))
        ));

        let dense = HashMap::from([("b".to_string(), 2), ("a".to_string(), 1)]);
        assert_eq!(Vocabulary::from_map(dense).unwrap().num_classes(), 3);
    }

    #[test]
    fn windows_are_left_padded_and_truncated() {
        assert_eq!(pad_window(&[5, 6], 4), vec![0, 0, 5, 6]);
        assert_eq!(pad_window(&[1, 2, 3, 4, 5], 3), vec![3, 4, 5]);
        assert_eq!(pad_window(&[], 2), vec![0, 0]);
    }
}
