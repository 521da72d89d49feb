use super::DBClient;
use crate::dtos::NewTagDto;
use crate::error::DbError;
use crate::models::Tag;
use tracing::instrument;
use validator::Validate;

pub trait TagExt {
    async fn create_tag(&self, tag: &NewTagDto) -> Result<Tag, DbError>;
    async fn get_tag(&self, tag_id: i64) -> Result<Option<Tag>, DbError>;
    async fn get_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, DbError>;
    async fn get_tags(&self) -> Result<Vec<Tag>, DbError>;
    async fn delete_tag(&self, tag_id: i64) -> Result<(), DbError>;
}

impl TagExt for DBClient {
    #[instrument(skip(self, tag), fields(slug = %tag.slug))]
    async fn create_tag(&self, tag: &NewTagDto) -> Result<Tag, DbError> {
        tag.validate()?;

        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (name, color, slug)
            VALUES ($1, $2, $3)
            RETURNING id, name, color, slug
            "#,
        )
        .bind(&tag.name)
        .bind(&tag.color)
        .bind(&tag.slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let err = DbError::from(e);
            tracing::warn!("DB error, saving tag: {}", err);
            err
        })?;

        Ok(tag)
    }

    async fn get_tag(&self, tag_id: i64) -> Result<Option<Tag>, DbError> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags WHERE id = $1")
            .bind(tag_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tag)
    }

    async fn get_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, DbError> {
        let tag =
            sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;

        Ok(tag)
    }

    async fn get_tags(&self) -> Result<Vec<Tag>, DbError> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(tags)
    }

    #[instrument(skip(self))]
    async fn delete_tag(&self, tag_id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(tag_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }
}
