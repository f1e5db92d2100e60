// tokenizer.rs
// Description: Whitespace word tokenizer over a fixed vocabulary table.
// History:
// - 2026-10-18: Word level Vocab with padding fallback on encode and <unk> on decode.

use std::collections::HashMap;

pub const S_PAD: &str = "<pad>";
pub const S_BOS: &str = "<bos>";
pub const S_EOS: &str = "<eos>";
pub const S_UNK: &str = "<unk>";

/// Id substituted for words missing from the table.
pub const PAD_ID: usize = 0;

#[derive(Clone, Debug)]
pub struct Vocab {
    pub encode: HashMap<String, usize>,
    pub words: Vec<String>,
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new(Self::default_words())
    }
}

impl Vocab {
    pub fn new(v_words: Vec<&str>) -> Self {
        let mut m_encode: HashMap<String, usize> = HashMap::new();
        for (i_id, s_word) in v_words.iter().enumerate() {
            // First occurrence wins for duplicate words.
            m_encode.entry((*s_word).to_string()).or_insert(i_id);
        }

        Self {
            encode: m_encode,
            words: v_words.iter().map(|w| (*w).to_string()).collect(),
        }
    }

    pub fn default_words() -> Vec<&'static str> {
        vec![S_PAD, S_BOS, S_EOS, "hello", "how", "are", "you", "i", "am", "fine"]
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn encode_word(&self, s_word: &str) -> usize {
        self.encode.get(s_word).copied().unwrap_or(PAD_ID)
    }

    pub fn decode_id(&self, i_token_id: usize) -> &str {
        self.words.get(i_token_id).map(String::as_str).unwrap_or(S_UNK)
    }

    pub fn encode(&self, s_text: &str) -> Vec<usize> {
        s_text.split_whitespace().map(|w| self.encode_word(w)).collect()
    }

    pub fn decode(&self, v_ids: &[usize]) -> String {
        v_ids
            .iter()
            .map(|&i| self.decode_id(i))
            .collect::<Vec<&str>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_and_unknown_words() {
        let vocab = Vocab::default();
        assert_eq!(vocab.len(), 10);
        assert_eq!(vocab.encode("<bos> hello how are you"), vec![1, 3, 4, 5, 6]);
        assert_eq!(vocab.encode("hello   there\tyou"), vec![3, PAD_ID, 6]);
        assert!(vocab.encode("   ").is_empty());
    }

    #[test]
    fn test_decode_out_of_table_is_unk() {
        let vocab = Vocab::default();
        assert_eq!(vocab.decode(&[1, 7, 8, 9, 42]), "<bos> i am fine <unk>");
        assert_eq!(vocab.decode(&[]), "");
    }

    #[test]
    fn test_duplicate_words_keep_first_id() {
        let vocab = Vocab::new(vec!["<pad>", "x", "x"]);
        assert_eq!(vocab.encode_word("x"), 1);
        assert_eq!(vocab.decode_id(2), "x");
    }
}
