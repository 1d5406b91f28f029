//! Access control for the point registry.
//!
//! Verifies bearer tokens issued by an external identity provider and maps
//! the verified subject to the single point it is granted.
//!
//! # Architecture
//!
//! ```text
//! Authorization header
//!        │
//!        ▼
//! ┌──────────────┐    ┌──────────────┐
//! │ RequestGate  │───▶│TokenVerifier │───▶ KeySetCache ───▶ <issuer>/.well-known/jwks.json
//! └──────┬───────┘    └──────────────┘
//!        │ VerifiedIdentity
//!        ▼
//! ┌──────────────────────┐
//! │AuthorizationResolver │───▶ grants table
//! └──────────────────────┘
//! ```

pub mod gate;
pub mod jwks;
pub mod resolver;
pub mod verifier;

#[cfg(test)]
pub mod testing;

pub use gate::{Access, Authenticated, RequestGate};
pub use jwks::{KeyRetrievalError, KeySetCache};
pub use resolver::{Authorization, AuthorizationResolver};
pub use verifier::{TokenVerifier, VerifiedIdentity, is_asymmetric};
