//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-request bucket context.

use crate::config::Config;
use crate::documents::PdfFont;
use crate::storage::BucketStore;
use crate::web::session::{CookieSigner, SessionStore};
use std::sync::Arc;
use summarizer_core::ports::SessionMetadataService;
use summarizer_core::SummarizerService;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub metadata: Arc<dyn SessionMetadataService>,
    pub summarizer: SummarizerService,
    pub storage: Arc<BucketStore>,
    pub sessions: SessionStore,
    pub signer: CookieSigner,
    pub pdf_font: Arc<PdfFont>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the state from its collaborators. Storage limits and session
    /// lifetime both come from the configured quotas.
    pub fn new(
        config: Arc<Config>,
        metadata: Arc<dyn SessionMetadataService>,
        summarizer: SummarizerService,
        signer: CookieSigner,
        pdf_font: PdfFont,
    ) -> Self {
        let storage = BucketStore::new(
            config.upload_dir.clone(),
            config.output_dir.clone(),
            config.quotas.clone(),
        );
        Self {
            metadata,
            summarizer,
            storage: Arc::new(storage),
            sessions: SessionStore::new(config.quotas.retention),
            signer,
            pdf_font: Arc::new(pdf_font),
            config,
        }
    }
}

//=========================================================================================
// BucketContext (Specific to One Request)
//=========================================================================================

/// The bucket resolved for the current request by the bucket middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketContext {
    pub bucket_id: Uuid,
    /// The bucket was minted by this request; the response carries its cookie.
    pub is_new: bool,
}
