use syndicate::api::{ListParams, keys, queries};
use syndicate::config::{NewsletterStatusArg, NewslettersCmd, PageArgs};
use syndicate::infra::Runtime;
use syndicate_api_types::{NewsletterCreate, NewsletterUpdate};

use crate::error::AppError;
use crate::io::parse_timestamp_opt;
use crate::print::print_json;

pub async fn handle(ctx: &Runtime, cmd: NewslettersCmd) -> Result<(), AppError> {
    match cmd {
        NewslettersCmd::List { page } => list(ctx, page).await,
        NewslettersCmd::Get { id } => get(ctx, id).await,
        NewslettersCmd::Create {
            title,
            subject,
            audience,
            sources,
            scheduled_for,
        } => {
            let input = NewsletterCreate {
                title,
                subject_line: subject,
                content_sources: sources,
                target_audience: audience,
                scheduled_for: parse_timestamp_opt(scheduled_for)?,
            };
            create(ctx, input).await
        }
        NewslettersCmd::Update {
            id,
            title,
            subject,
            content,
            status,
            scheduled_for,
        } => {
            let input = NewsletterUpdate {
                title,
                subject_line: subject,
                content,
                status: status.map(NewsletterStatusArg::into),
                scheduled_for: parse_timestamp_opt(scheduled_for)?,
            };
            update(ctx, id, input).await
        }
        NewslettersCmd::Delete { id } => delete(ctx, id).await,
        NewslettersCmd::Preview { id } => {
            let preview = ctx
                .queries
                .fetch_query(&keys::newsletters::preview(id), || {
                    ctx.api.newsletter_preview(id)
                })
                .await?;
            print_json(&preview)
        }
        NewslettersCmd::Analytics { id } => {
            let analytics = ctx
                .queries
                .fetch_query(&keys::analytics::newsletter(id), || {
                    ctx.api.newsletter_analytics(id)
                })
                .await?;
            print_json(&analytics)
        }
    }
}

async fn list(ctx: &Runtime, page: PageArgs) -> Result<(), AppError> {
    let params = ListParams::new(page.page, page.limit);
    let newsletters = ctx
        .queries
        .fetch_query(&keys::newsletters::list(params), || ctx.api.newsletters(params))
        .await?;
    print_json(&newsletters)
}

async fn get(ctx: &Runtime, id: i64) -> Result<(), AppError> {
    let newsletter = ctx
        .queries
        .fetch_query(&keys::newsletters::detail(id), || ctx.api.newsletter(id))
        .await?;
    print_json(&newsletter)
}

async fn create(ctx: &Runtime, input: NewsletterCreate) -> Result<(), AppError> {
    if input.title.trim().is_empty() {
        return Err(AppError::invalid_input("title must not be empty"));
    }
    let created = queries::create_newsletter(&ctx.queries, &ctx.api)
        .mutate_async(input)
        .await?;
    print_json(&created)
}

async fn update(ctx: &Runtime, id: i64, input: NewsletterUpdate) -> Result<(), AppError> {
    if input.is_empty() {
        return Err(AppError::invalid_input(
            "at least one of --title, --subject, --content, --status, --scheduled-for is required",
        ));
    }
    let updated = queries::update_newsletter(&ctx.queries, &ctx.api)
        .mutate_async((id, input))
        .await?;
    print_json(&updated)
}

async fn delete(ctx: &Runtime, id: i64) -> Result<(), AppError> {
    let deleted = queries::delete_newsletter(&ctx.queries, &ctx.api)
        .mutate_async(id)
        .await?;
    print_json(&deleted)
}
