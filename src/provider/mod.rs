//! CI providers: where cases and raw logs come from
//!
//! Two implementations of [`CIProvider`]:
//! - `LocalLogProvider`: reads logs previously downloaded to a directory
//! - `MockProvider`: returns preconfigured responses (testing)
//!
//! Both also implement [`crate::case::IdentifierResolver`].

mod local;
mod mock;
mod traits;

pub use local::{JobManifest, LocalLogProvider, RunManifest, LOCAL_CONTENT_TYPE, MANIFEST_FILE};
pub use mock::{MockProvider, MOCK_CONTENT_TYPE};
pub use traits::{CIProvider, CaseListing, FetchError, FetchedContent};
