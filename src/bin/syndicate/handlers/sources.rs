use syndicate::api::{keys, queries};
use syndicate::config::SourcesCmd;
use syndicate::infra::Runtime;
use syndicate_api_types::ContentSourceCreate;

use crate::error::AppError;
use crate::print::print_json;

pub async fn handle(ctx: &Runtime, cmd: SourcesCmd) -> Result<(), AppError> {
    match cmd {
        SourcesCmd::List => {
            let sources = ctx
                .queries
                .fetch_query(&keys::content_sources::list(), || ctx.api.content_sources())
                .await?;
            print_json(&sources)
        }
        SourcesCmd::Add {
            platform,
            query,
            keywords,
        } => {
            let created = queries::create_content_source(&ctx.queries, &ctx.api)
                .mutate_async(source_input(platform, query, keywords)?)
                .await?;
            print_json(&created)
        }
        SourcesCmd::Update {
            id,
            platform,
            query,
            keywords,
        } => {
            let updated = queries::update_content_source(&ctx.queries, &ctx.api)
                .mutate_async((id, source_input(platform, query, keywords)?))
                .await?;
            print_json(&updated)
        }
        SourcesCmd::Delete { id } => {
            let deleted = queries::delete_content_source(&ctx.queries, &ctx.api)
                .mutate_async(id)
                .await?;
            print_json(&deleted)
        }
    }
}

fn source_input(
    platform: String,
    query: String,
    keywords: Vec<String>,
) -> Result<ContentSourceCreate, AppError> {
    let platform = platform.trim().to_lowercase();
    if platform.is_empty() || query.trim().is_empty() {
        return Err(AppError::invalid_input(
            "--platform and --query must not be empty",
        ));
    }
    Ok(ContentSourceCreate {
        platform,
        query,
        keywords,
        ..Default::default()
    })
}
