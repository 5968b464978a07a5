//! Feature-hashing tokenizer producing padded, attention-masked batches.
//!
//! Words are lowercased alphanumeric runs. Each word is mapped to a bucket id
//! through SHA-256, so no vocabulary file is needed and ids are stable across
//! runs and machines. Every sequence is framed as `[CLS] words... [SEP]`,
//! which guarantees at least two unmasked tokens per input.

use sha2::{Digest, Sha256};

use crate::vector::VectorError;

/// Padding token; always masked out.
pub const PAD_TOKEN_ID: u32 = 0;

/// Sequence start token.
pub const CLS_TOKEN_ID: u32 = 1;

/// Sequence end token.
pub const SEP_TOKEN_ID: u32 = 2;

/// Ids below this value are reserved for special tokens.
const RESERVED_IDS: u32 = 3;

/// Default number of hash buckets.
pub const DEFAULT_VOCAB_SIZE: u32 = 1 << 18;

/// A batch of token sequences padded to a common length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBatch {
    /// Token ids, one row per input, each of length `seq_len`.
    pub input_ids: Vec<Vec<u32>>,
    /// 1 for real tokens, 0 for padding. Same shape as `input_ids`.
    pub attention_mask: Vec<Vec<u8>>,
    /// Padded sequence length.
    pub seq_len: usize,
}

impl TokenBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Hashing tokenizer with truncation to a maximum sequence length.
#[derive(Debug, Clone)]
pub struct HashingTokenizer {
    vocab_size: u32,
    max_length: usize,
}

impl HashingTokenizer {
    /// Creates a tokenizer.
    ///
    /// `max_length` counts the `[CLS]` and `[SEP]` framing tokens and must be
    /// at least 2.
    pub fn new(vocab_size: u32, max_length: usize) -> Result<Self, VectorError> {
        if max_length < 2 {
            return Err(VectorError::InvalidTokenizer(format!(
                "max_length must be at least 2 to hold [CLS] and [SEP], got {max_length}"
            )));
        }
        if vocab_size <= RESERVED_IDS {
            return Err(VectorError::InvalidTokenizer(format!(
                "vocab_size must exceed the {RESERVED_IDS} reserved ids, got {vocab_size}"
            )));
        }
        Ok(Self {
            vocab_size,
            max_length,
        })
    }

    #[must_use]
    pub fn vocab_size(&self) -> u32 {
        self.vocab_size
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Tokenizes one text, truncating words beyond `max_length - 2`.
    #[must_use]
    pub fn tokenize(&self, text: &str) -> Vec<u32> {
        let budget = self.max_length - 2;
        let mut ids = Vec::with_capacity(budget.min(64) + 2);
        ids.push(CLS_TOKEN_ID);
        ids.extend(
            text.split(|c: char| !c.is_alphanumeric())
                .filter(|word| !word.is_empty())
                .take(budget)
                .map(|word| self.word_id(&word.to_lowercase())),
        );
        ids.push(SEP_TOKEN_ID);
        ids
    }

    /// Tokenizes a batch and pads every row to the longest sequence.
    #[must_use]
    pub fn encode_batch(&self, texts: &[&str]) -> TokenBatch {
        let sequences: Vec<Vec<u32>> = texts.iter().map(|text| self.tokenize(text)).collect();
        let seq_len = sequences.iter().map(Vec::len).max().unwrap_or(0);

        let mut input_ids = Vec::with_capacity(sequences.len());
        let mut attention_mask = Vec::with_capacity(sequences.len());

        for mut ids in sequences {
            let real = ids.len();
            let mut mask = vec![1u8; real];
            ids.resize(seq_len, PAD_TOKEN_ID);
            mask.resize(seq_len, 0);
            input_ids.push(ids);
            attention_mask.push(mask);
        }

        TokenBatch {
            input_ids,
            attention_mask,
            seq_len,
        }
    }

    fn word_id(&self, word: &str) -> u32 {
        let digest = Sha256::digest(word.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let bucket = u64::from_le_bytes(prefix) % u64::from(self.vocab_size - RESERVED_IDS);
        RESERVED_IDS + bucket as u32
    }
}
