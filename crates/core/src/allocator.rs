use crate::types::TokenId;

/// Default identifier handed out by the first successful allocation.
pub const DEFAULT_START_ID: TokenId = 1001;

/// Monotonic token identifier counter owned by a single mint session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdAllocator {
    next: TokenId,
    last_issued: Option<TokenId>,
}

impl TokenIdAllocator {
    /// Creates an allocator whose first identifier is `start`.
    pub fn new(start: TokenId) -> Self {
        Self {
            next: start,
            last_issued: None,
        }
    }

    /// Returns the next identifier, one greater than the previous.
    pub fn next_id(&mut self) -> TokenId {
        let id = self.next;
        self.next += 1;
        self.last_issued = Some(id);
        id
    }

    /// Returns the identifier the next call to [`Self::next_id`] will produce.
    pub fn peek(&self) -> TokenId {
        self.next
    }

    /// Hands back `id` so it is issued again.
    ///
    /// Only the most recently issued identifier can be released, and only
    /// once. Returns `false` when the release was refused.
    pub fn release(&mut self, id: TokenId) -> bool {
        if self.last_issued != Some(id) {
            return false;
        }
        self.next = id;
        self.last_issued = None;
        true
    }
}

impl Default for TokenIdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_START_ID)
    }
}
