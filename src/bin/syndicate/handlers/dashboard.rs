use syndicate::api::keys;
use syndicate::infra::Runtime;

use crate::error::AppError;
use crate::print::print_json;

pub async fn handle(ctx: &Runtime) -> Result<(), AppError> {
    let metrics = ctx
        .queries
        .fetch_query(&keys::analytics::dashboard(), || ctx.api.dashboard())
        .await?;
    print_json(&metrics)
}
