//! Domain layer for wrapping domain names as simulated NFTs.
//!
//! Everything here is synchronous and free of I/O; the app crate drives the
//! async parts of the mint workflow on top of [`session::MintSession`].

pub mod allocator;
pub mod identity;
pub mod metadata;
pub mod registry;
pub mod session;
pub mod types;
pub mod validator;

pub use allocator::TokenIdAllocator;
pub use identity::IdentityProvider;
pub use metadata::{build_metadata, MetadataBuilder};
pub use registry::{RegistryError, TokenRegistry};
pub use session::{MintError, MintSession, MintTicket, SessionSettings};
pub use types::{
    FailedMintIdPolicy, FailureReason, Metadata, MintState, RejectReason, Token, TokenId,
};
pub use validator::is_valid_domain;
