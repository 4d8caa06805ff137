//! Result publication: canonical local copy plus cloud upload.
//!
//! Providers sit behind the [`ObjectStore`] trait and are selected by the
//! variant of the caller's [`Destination`]. A pre-authorized URL, when
//! supplied, is used as a raw HTTP PUT fallback after the primary upload
//! fails.

pub mod azure;
pub mod destination;
pub mod presigned;
pub mod publisher;
pub mod s3;
pub mod store;

pub use destination::Destination;
pub use publisher::{Publication, PublishError, Publisher};
pub use store::{ObjectStore, UploadError};
