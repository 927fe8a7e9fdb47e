use syndicate::api::keys;
use syndicate::infra::Runtime;

use crate::error::AppError;
use crate::print::print_json;

pub async fn handle(ctx: &Runtime) -> Result<(), AppError> {
    let profile = ctx
        .queries
        .fetch_query(&keys::users::profile(), || ctx.api.profile())
        .await?;
    print_json(&profile)
}
