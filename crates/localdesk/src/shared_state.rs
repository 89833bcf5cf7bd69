//! State shared by every request handler

use std::sync::Arc;

use crate::{
    auth::Authenticator,
    config::Config,
    db::Database,
    llm::{Embedder, OpenAIClient},
    rag::Retriever,
};

#[derive(Clone)]
pub struct AppState {
    /// Configuration (read-only after initialization)
    pub config: Arc<Config>,
    pub database: Arc<Database>,
    pub auth: Arc<dyn Authenticator>,
    /// Chat completions and embeddings
    pub llm: Arc<OpenAIClient>,
    pub retriever: Arc<Retriever>,
}

impl AppState {
    pub fn new(
        config: Config,
        database: Arc<Database>,
        auth: Arc<dyn Authenticator>,
        llm: Arc<OpenAIClient>,
    ) -> Self {
        let embedder: Arc<dyn Embedder> = llm.clone();
        let retriever = Arc::new(Retriever::new(Arc::clone(&database), embedder));
        Self {
            config: Arc::new(config),
            database,
            auth,
            llm,
            retriever,
        }
    }
}
