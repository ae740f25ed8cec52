use shared::{error::ApiError, protocol::TagSummary};

use crate::{internal, ApiContext};

pub async fn list_tags(ctx: &ApiContext) -> Result<Vec<TagSummary>, ApiError> {
    let tags = ctx.storage.list_tags().await.map_err(internal)?;
    Ok(tags
        .into_iter()
        .map(|tag| TagSummary {
            tag_id: tag.tag_id,
            name: tag.name,
        })
        .collect())
}

pub async fn create_tag(ctx: &ApiContext, name: &str) -> Result<TagSummary, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("tag name cannot be empty"));
    }

    let tag_id = ctx
        .storage
        .create_tag(name)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::conflict(format!("tag '{name}' already exists")))?;

    Ok(TagSummary {
        tag_id,
        name: name.to_string(),
    })
}
