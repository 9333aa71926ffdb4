//! Batch resolution of shader identifiers into fetched documents.
//!
//! Requests are issued strictly one after another so every failure can be
//! attributed to a single identifier. The batch is all-or-nothing: the first
//! transport failure or repository-reported error aborts it, remaining ids are
//! never requested, and documents gathered so far are dropped.

use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::document::ShaderDocument;
use crate::ShaderId;

/// Failure of a single request.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("repository answered with HTTP status {0}")]
    Status(u16),
    #[error("repository returned an empty body")]
    EmptyBody,
    #[error("unexpected repository response; could not find 'Shader' field. First 200 bytes: {0}")]
    Malformed(String),
    #[error("{0}")]
    InvalidRequest(String),
}

/// Aggregate failure of a whole batch, naming the identifier that stopped it.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("error fetching shader for ID {id}: {source}")]
    Network {
        id: ShaderId,
        #[source]
        source: FetchError,
    },
    #[error("shader {id} error: {message}")]
    Rejected { id: ShaderId, message: String },
}

impl BatchError {
    pub fn identifier(&self) -> &str {
        match self {
            BatchError::Network { id, .. } | BatchError::Rejected { id, .. } => id,
        }
    }
}

/// Anything that can produce the document for one identifier.
pub trait DocumentSource {
    fn fetch_document(&self, id: &str) -> Result<ShaderDocument, FetchError>;
}

/// Fetches every identifier in order. The result preserves input order.
pub fn fetch_all<S>(source: &S, ids: &[ShaderId]) -> Result<Vec<ShaderDocument>, BatchError>
where
    S: DocumentSource + ?Sized,
{
    let mut documents = Vec::with_capacity(ids.len());
    for id in ids {
        let document = source
            .fetch_document(id)
            .map_err(|source| BatchError::Network {
                id: id.clone(),
                source,
            })?;
        if let Some(message) = document.error() {
            return Err(BatchError::Rejected {
                id: id.clone(),
                message: message.to_string(),
            });
        }
        debug!(shader = %id, name = %document.label(), "fetched shader document");
        documents.push(document);
    }
    Ok(documents)
}

/// Runs [`fetch_all`] on a dedicated thread and hands the outcome to
/// `on_complete` exactly once.
pub fn spawn_fetch<S, F>(
    source: S,
    ids: Vec<ShaderId>,
    on_complete: F,
) -> std::io::Result<JoinHandle<()>>
where
    S: DocumentSource + Send + 'static,
    F: FnOnce(Result<Vec<ShaderDocument>, BatchError>) + Send + 'static,
{
    thread::Builder::new()
        .name("shader-fetch".into())
        .spawn(move || {
            info!(count = ids.len(), "fetching shader batch");
            let result = fetch_all(&source, &ids);
            match &result {
                Ok(documents) => info!(count = documents.len(), "shader batch fetched"),
                Err(err) => {
                    error!(shader = %err.identifier(), error = %err, "shader batch failed")
                }
            }
            on_complete(result);
        })
}
