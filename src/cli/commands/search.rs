//! Search command implementation.

use crate::app::AppContext;
use crate::cli::Output;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, collection: &str, top_k: Option<u32>, ctx: &AppContext) -> Result<()> {
    let top_k = top_k.unwrap_or(ctx.settings.tools.default_top_k);
    let max = ctx.settings.tools.max_top_k;
    if top_k == 0 || top_k > max {
        anyhow::bail!("--top-k must be between 1 and {}", max);
    }

    let spinner = Output::spinner("Searching...");
    let results = ctx.tools.context().rag_search(query, collection, top_k).await;
    spinner.finish_and_clear();

    match results {
        Ok(result) if result.is_empty() => {
            Output::warning("No relevant documents found for the query.");
        }
        Ok(result) => {
            Output::success(&format!("Found {} passage(s) in '{}'", result.passages.len(), collection));
            for (rank, passage) in result.passages.iter().enumerate() {
                Output::passage(rank + 1, passage.score, &passage.text);
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
