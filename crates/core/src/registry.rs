use std::collections::HashMap;

use thiserror::Error;

use crate::types::{Token, TokenId};

/// In-memory collection of issued tokens for one session.
///
/// Tokens are stored in insertion order and indexed both by lowercased
/// domain and by identifier. Nothing is removed or mutated after insertion.
#[derive(Debug, Default, Clone)]
pub struct TokenRegistry {
    tokens: Vec<Token>,
    by_domain: HashMap<String, usize>,
    by_id: HashMap<TokenId, usize>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, domain: &str) -> bool {
        self.by_domain.contains_key(&domain_key(domain))
    }

    /// Commits a token, refusing it when its domain or identifier is taken.
    pub fn insert(&mut self, token: Token) -> Result<(), RegistryError> {
        let key = domain_key(token.domain());
        if self.by_domain.contains_key(&key) {
            return Err(RegistryError::DuplicateDomain(token.domain().to_string()));
        }
        if self.by_id.contains_key(&token.token_id()) {
            return Err(RegistryError::DuplicateTokenId(token.token_id()));
        }

        let index = self.tokens.len();
        self.by_domain.insert(key, index);
        self.by_id.insert(token.token_id(), index);
        self.tokens.push(token);
        Ok(())
    }

    /// Returns every token, most recently minted first.
    pub fn list_all(&self) -> Vec<Token> {
        self.iter().cloned().collect()
    }

    /// Iterates most recently minted first.
    pub fn iter(&self) -> impl Iterator<Item = &Token> + '_ {
        self.tokens.iter().rev()
    }

    pub fn get(&self, token_id: TokenId) -> Option<&Token> {
        self.by_id.get(&token_id).map(|&index| &self.tokens[index])
    }

    /// Case-insensitive lookup by domain.
    pub fn find_by_domain(&self, domain: &str) -> Option<&Token> {
        self.by_domain
            .get(&domain_key(domain))
            .map(|&index| &self.tokens[index])
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn domain_key(domain: &str) -> String {
    domain.to_ascii_lowercase()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("domain already minted: {0}")]
    DuplicateDomain(String),
    #[error("token id already issued: {0}")]
    DuplicateTokenId(TokenId),
}
