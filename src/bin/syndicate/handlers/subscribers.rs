use syndicate::api::{ListParams, keys, queries};
use syndicate::config::SubscribersCmd;
use syndicate::infra::Runtime;
use syndicate_api_types::SubscriberCreate;

use crate::error::AppError;
use crate::print::print_json;

pub async fn handle(ctx: &Runtime, cmd: SubscribersCmd) -> Result<(), AppError> {
    match cmd {
        SubscribersCmd::List { page, all } => {
            let params = ListParams::new(page.page, page.limit);
            let subscribers = ctx
                .queries
                .fetch_query(&keys::subscribers::list(params, all), || {
                    ctx.api.subscribers(params, all)
                })
                .await?;
            print_json(&subscribers)
        }
        SubscribersCmd::Add { email, name } => {
            check_email(&email)?;
            let created = queries::create_subscriber(&ctx.queries, &ctx.api)
                .mutate_async(SubscriberCreate { email, name })
                .await?;
            print_json(&created)
        }
        SubscribersCmd::Get { id } => {
            let subscriber = ctx
                .queries
                .fetch_query(&keys::subscribers::detail(id), || ctx.api.subscriber(id))
                .await?;
            print_json(&subscriber)
        }
        SubscribersCmd::Update { id, email, name } => {
            check_email(&email)?;
            let updated = queries::update_subscriber(&ctx.queries, &ctx.api)
                .mutate_async((id, SubscriberCreate { email, name }))
                .await?;
            print_json(&updated)
        }
        SubscribersCmd::Remove { id } => {
            let deleted = queries::delete_subscriber(&ctx.queries, &ctx.api)
                .mutate_async(id)
                .await?;
            print_json(&deleted)
        }
        SubscribersCmd::Stats => {
            let stats = ctx
                .queries
                .fetch_query(&keys::subscribers::stats(), || ctx.api.subscription_stats())
                .await?;
            print_json(&stats)
        }
    }
}

fn check_email(email: &str) -> Result<(), AppError> {
    if email.contains('@') {
        Ok(())
    } else {
        Err(AppError::invalid_input(format!(
            "`{email}` is not an email address"
        )))
    }
}
