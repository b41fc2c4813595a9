use crate::{Error, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

/// Maps every distinct character of a corpus to its rank in code point order.
#[derive(Clone, Debug)]
pub struct CharTokenizer {
    itos: Vec<char>,
    stoi: HashMap<char, usize>,
}

#[derive(Deserialize, Serialize)]
struct VocabFile {
    chars: Vec<char>,
}

impl CharTokenizer {
    pub fn from_text(text: &str) -> Result<Self> {
        Self::from_chars(text.chars().sorted_unstable().dedup().collect())
    }

    pub fn from_chars(itos: Vec<char>) -> Result<Self> {
        if itos.is_empty() {
            return Err(Error::EmptyVocabulary);
        }
        let mut stoi = HashMap::with_capacity(itos.len());
        for (i, &c) in itos.iter().enumerate() {
            if stoi.insert(c, i).is_some() {
                return Err(Error::DuplicateChar(c));
            }
        }
        Ok(Self { itos, stoi })
    }

    pub fn vocab_size(&self) -> usize {
        self.itos.len()
    }

    pub fn chars(&self) -> &[char] {
        &self.itos
    }

    pub fn encode(&self, text: &str) -> Result<Vec<usize>> {
        text.chars()
            .map(|c| self.stoi.get(&c).copied().ok_or(Error::UnknownChar(c)))
            .collect()
    }

    pub fn decode(&self, ids: &[usize]) -> Result<String> {
        ids.iter()
            .map(|&i| self.itos.get(i).copied().ok_or(Error::UnknownId(i)))
            .collect()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(&VocabFile {
            chars: self.itos.clone(),
        })
        .map_err(Error::json(path))?;
        fs::write(path, json).map_err(Error::io(path))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(Error::io(path))?;
        let file: VocabFile = serde_json::from_str(&json).map_err(Error::json(path))?;
        Self::from_chars(file.chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_is_sorted_and_unique() {
        let tok = CharTokenizer::from_text("hello world").unwrap();
        assert_eq!(tok.chars(), &[' ', 'd', 'e', 'h', 'l', 'o', 'r', 'w']);
        assert_eq!(tok.vocab_size(), 8);
    }

    #[test]
    fn encode_decode() {
        let tok = CharTokenizer::from_text("hii there").unwrap();
        let ids = tok.encode("hii there").unwrap();
        assert_eq!(ids[0], 2);
        assert_eq!(tok.decode(&ids).unwrap(), "hii there");
    }

    #[test]
    fn rejects_unknown_input() {
        let tok = CharTokenizer::from_text("abc").unwrap();
        assert!(matches!(tok.encode("abz"), Err(Error::UnknownChar('z'))));
        assert!(matches!(tok.decode(&[0, 3]), Err(Error::UnknownId(3))));
    }

    #[test]
    fn rejects_bad_vocabularies() {
        assert!(matches!(
            CharTokenizer::from_text(""),
            Err(Error::EmptyVocabulary)
        ));
        assert!(matches!(
            CharTokenizer::from_chars(vec!['a', 'b', 'a']),
            Err(Error::DuplicateChar('a'))
        ));
    }

    #[test]
    fn multibyte_chars_are_single_tokens() {
        let tok = CharTokenizer::from_text("héé").unwrap();
        assert_eq!(tok.encode("hé").unwrap(), vec![0, 1]);
    }
}
