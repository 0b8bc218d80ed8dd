//! Identity derivation and first-seen / re-seen resolution.

use sha1::{Digest, Sha1};

use crate::error::IngestError;
use crate::models::RecordKind;
use crate::store::DocumentStore;

/// Content-addressed identity for sources without a native key.
///
/// SHA-1 over the UTF-8 permalink, hex-encoded. Existing stored news
/// documents are keyed this way, so the digest must not change.
pub fn permalink_identity(permalink: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(permalink.as_bytes());
    hex::encode(hasher.finalize())
}

/// Release identity: the version string with `.` replaced by `-`.
pub fn release_identity(version: &str) -> String {
    version.replace('.', "-")
}

/// Whether a record has been stored before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    New,
    Existing,
}

/// Decide first vs. repeat observation with one existence check.
///
/// No caching across calls. A store failure is returned as
/// [`IngestError::Transport`]; it is never folded into [`Resolution::New`].
pub async fn resolve(
    store: &dyn DocumentStore,
    kind: RecordKind,
    identity: &str,
) -> Result<Resolution, IngestError> {
    if identity.trim().is_empty() {
        return Err(IngestError::MalformedIdentity {
            raw: format!("{:?}", identity),
        });
    }

    let exists = store
        .exists(kind, identity)
        .await
        .map_err(|source| IngestError::Transport {
            context: format!("existence check for {} '{}'", kind, identity),
            source,
        })?;

    Ok(if exists {
        Resolution::Existing
    } else {
        Resolution::New
    })
}
