//! Platform access for kubebrowser.
//!
//! This crate holds the parts of the gateway that do not talk to the
//! network themselves:
//! - OIDC client configuration (`OidcConfig`)
//! - The `IdentityProvider` seam and verified-token types
//! - Claims extraction into a typed `Identity`
//! - The access filter deciding which records a principal may see
//! - The materializer turning a record into a per-user kubeconfig
//! - Per-browser sessions and the `SessionStore` abstraction
//!
//! # Example
//!
//! ```
//! use kubebrowser_core::{ConfigRecord, KubeconfigData, KubeconfigSpec, Whitelist};
//! use kubebrowser_platform_access::{Identity, filter};
//!
//! let record = ConfigRecord::new(
//!     "default",
//!     "staging",
//!     KubeconfigSpec {
//!         name: "Staging".to_string(),
//!         kubeconfig: KubeconfigData::default(),
//!         whitelist: Some(Whitelist {
//!             users: vec![],
//!             groups: vec!["ops".to_string()],
//!         }),
//!     },
//! );
//!
//! let ops = Identity::new("alice@example.com", vec!["ops".to_string()]);
//! let dev = Identity::new("bob@example.com", vec!["dev".to_string()]);
//!
//! assert_eq!(filter::visible([&record], &ops).len(), 1);
//! assert!(filter::visible([&record], &dev).is_empty());
//! ```

pub mod error;
pub mod filter;
pub mod identity;
pub mod materialize;
pub mod memory_store;
pub mod oidc;
pub mod session;
pub mod token;

// Re-export main types at crate root
pub use error::{ClaimsError, IdpError, SessionStoreError};
pub use identity::{ClaimsExtractor, Identity};
pub use materialize::{MaterializedKubeconfig, Materializer, OIDC_USER_NAME, ProviderCredentials};
pub use memory_store::MemorySessionStore;
pub use oidc::{OidcConfig, OidcConfigBuilder};
pub use session::{Session, SessionData, SessionId, SessionKey, SessionStore};
pub use token::{IdentityProvider, TokenSet, VerifiedIdToken};
