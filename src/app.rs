//! Application context: every long-lived component, built once from [`Settings`].

use crate::agent::Agent;
use crate::auth::{AuthService, UserStore};
use crate::chat::ChatService;
use crate::config::{CheckpointProvider, Settings, VectorStoreProvider};
use crate::conversation::{CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::llm::{LanguageModel, OpenAIChatModel};
use crate::openai::create_client;
use crate::tools::{ToolContext, ToolDispatcher};
use crate::vector_store::{MemoryVectorStore, QdrantVectorStore, SqliteVectorStore, VectorStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared handles to the configured services.
pub struct AppContext {
    pub settings: Settings,
    pub vector_store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub tools: Arc<ToolDispatcher>,
    pub chat: Arc<ChatService>,
    pub auth: Arc<AuthService>,
}

fn open_vector_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match settings.vector_store.provider {
        VectorStoreProvider::Sqlite => Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?),
        VectorStoreProvider::Memory => Arc::new(MemoryVectorStore::new()),
        VectorStoreProvider::Qdrant => Arc::new(QdrantVectorStore::new(
            &settings.vector_store.qdrant_url,
            settings.vector_store.qdrant_api_key.clone(),
        )?),
    };
    info!("Using {} vector store", settings.vector_store.provider);
    Ok(store)
}

fn open_checkpoints(settings: &Settings) -> Result<Arc<dyn CheckpointStore>> {
    Ok(match settings.checkpoint.provider {
        CheckpointProvider::Sqlite => Arc::new(SqliteCheckpointStore::new(&settings.checkpoint_path())?),
        CheckpointProvider::Memory => Arc::new(MemoryCheckpointStore::new()),
    })
}

impl AppContext {
    /// Build the OpenAI-backed context described by `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let client = create_client(&settings.llm)?;
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::new(
            client.clone(),
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ));
        let model: Arc<dyn LanguageModel> = Arc::new(OpenAIChatModel::new(client, &settings.llm.model));

        let vector_store = open_vector_store(&settings)?;
        let checkpoints = open_checkpoints(&settings)?;
        let users = UserStore::new(&settings.users_db_path())?;

        Self::from_parts(settings, vector_store, embedder, model, checkpoints, users)
    }

    /// Assemble a context from already constructed services.
    pub fn from_parts(
        settings: Settings,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
        checkpoints: Arc<dyn CheckpointStore>,
        users: UserStore,
    ) -> Result<Self> {
        let context = ToolContext::new(vector_store.clone(), embedder.clone(), settings.tools.clone());
        let tools = Arc::new(ToolDispatcher::new(context)?);

        let agent = Agent::from_settings(model, tools.clone(), &settings.agent);
        let timeout = match settings.agent.turn_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let chat = Arc::new(ChatService::new(agent, checkpoints).with_turn_timeout(timeout));

        let auth = Arc::new(AuthService::from_settings(&settings.auth, users)?);

        Ok(Self {
            settings,
            vector_store,
            embedder,
            tools,
            chat,
            auth,
        })
    }
}
