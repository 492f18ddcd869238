use thiserror::Error;

use crate::entity::EntityMap;
use crate::label::Label;

/// Word-boundary marker used by byte-level BPE tokenizers (RoBERTa, LayoutLMv3).
pub const WORD_BOUNDARY: char = 'Ġ';

/// Start/end/padding markers for BERT- and RoBERTa-style vocabularies.
pub const DEFAULT_SPECIAL_TOKENS: &[&str] = &["[CLS]", "[SEP]", "[PAD]", "<s>", "</s>", "<pad>"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("tokens ({tokens}) and labels ({labels}) count mismatch")]
    LengthMismatch { tokens: usize, labels: usize },
}

/// Groups a token-level BIO sequence into named entities.
#[derive(Debug, Clone)]
pub struct TokenDecoder {
    special_tokens: Vec<String>,
    word_boundary: char,
}

impl Default for TokenDecoder {
    fn default() -> Self {
        Self {
            special_tokens: DEFAULT_SPECIAL_TOKENS.iter().map(|t| t.to_string()).collect(),
            word_boundary: WORD_BOUNDARY,
        }
    }
}

/// The entity currently being accumulated.
struct OpenEntity {
    kind: String,
    pieces: Vec<String>,
}

impl OpenEntity {
    fn flush_into(self, entities: &mut EntityMap) {
        entities.push(&self.kind, self.pieces.join(" "));
    }
}

impl TokenDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_special_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.special_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_word_boundary(mut self, marker: char) -> Self {
        self.word_boundary = marker;
        self
    }

    pub fn is_special(&self, token: &str) -> bool {
        self.special_tokens.iter().any(|t| t == token)
    }

    /// Replace word-boundary markers with spaces and trim.
    pub fn clean_token(&self, token: &str) -> String {
        token.replace(self.word_boundary, " ").trim().to_string()
    }

    /// Decode aligned token/label sequences in a single left-to-right pass.
    pub fn decode<T, L>(&self, tokens: &[T], labels: &[L]) -> Result<EntityMap, DecodeError>
    where
        T: AsRef<str>,
        L: AsRef<str>,
    {
        if tokens.len() != labels.len() {
            return Err(DecodeError::LengthMismatch {
                tokens: tokens.len(),
                labels: labels.len(),
            });
        }
        Ok(self.decode_pairs(
            tokens
                .iter()
                .map(AsRef::as_ref)
                .zip(labels.iter().map(AsRef::as_ref)),
        ))
    }

    pub fn decode_pairs<'a, I>(&self, pairs: I) -> EntityMap
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut entities = EntityMap::new();
        let mut open: Option<OpenEntity> = None;

        for (token, raw_label) in pairs {
            if self.is_special(token) {
                continue;
            }

            match Label::parse(raw_label) {
                Label::Begin(kind) => {
                    if let Some(prev) = open.take() {
                        prev.flush_into(&mut entities);
                    }
                    open = Some(OpenEntity {
                        kind,
                        pieces: vec![self.clean_token(token)],
                    });
                }
                Label::Inside(kind) if open.as_ref().is_some_and(|o| o.kind == kind) => {
                    if let Some(current) = open.as_mut() {
                        current.pieces.push(self.clean_token(token));
                    }
                }
                _ => {
                    if let Some(prev) = open.take() {
                        prev.flush_into(&mut entities);
                    }
                }
            }
        }

        if let Some(last) = open {
            last.flush_into(&mut entities);
        }
        entities
    }
}
