/// Supplies the identity of the actor minting tokens.
///
/// Implemented outside the core by whatever wallet integration the session
/// uses. `None` means no actor is connected and minting is refused.
pub trait IdentityProvider: Send + Sync {
    fn actor_identity(&self) -> Option<String>;
}

/// Fixed identity, mostly useful in tests and scripted sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity(pub Option<String>);

impl IdentityProvider for StaticIdentity {
    fn actor_identity(&self) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_identity_reports_configured_owner() {
        let connected = StaticIdentity(Some("0xabc".into()));
        assert_eq!(connected.actor_identity().as_deref(), Some("0xabc"));
        assert_eq!(StaticIdentity(None).actor_identity(), None);
    }
}
