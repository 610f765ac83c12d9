//! Collections command: list and create collections.

use crate::app::AppContext;
use crate::cli::{CollectionsAction, Output};
use anyhow::Result;

/// Run the collections command.
pub async fn run_collections(action: &CollectionsAction, ctx: &AppContext) -> Result<()> {
    match action {
        CollectionsAction::List => {
            let names = ctx.vector_store.list_collections().await?;
            if names.is_empty() {
                Output::info("No collections yet. Create one with: ragchat collections create <name>");
                return Ok(());
            }
            Output::header(&format!("Collections ({})", names.len()));
            for name in &names {
                let info = ctx.vector_store.collection_info(name).await?;
                Output::collection_info(&info.name, info.points, info.dimensions);
            }
        }

        CollectionsAction::Create { name } => {
            if ctx.tools.context().create_collection(name).await? {
                Output::success(&format!("Collection '{}' created.", name));
            } else {
                Output::info(&format!("Collection '{}' already exists; nothing changed.", name));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::test_support::{test_context, ScriptedModel};

    #[tokio::test]
    async fn test_create_then_list() {
        let ctx = test_context(Settings::default(), ScriptedModel::new(vec![]));
        let create = CollectionsAction::Create { name: "handbook".into() };
        run_collections(&create, &ctx).await.unwrap();
        run_collections(&create, &ctx).await.unwrap();
        run_collections(&CollectionsAction::List, &ctx).await.unwrap();

        assert_eq!(ctx.vector_store.list_collections().await.unwrap(), vec!["handbook"]);
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected() {
        let ctx = test_context(Settings::default(), ScriptedModel::new(vec![]));
        let create = CollectionsAction::Create { name: "bad name!".into() };
        assert!(run_collections(&create, &ctx).await.is_err());
    }
}
