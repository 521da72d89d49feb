use super::DBClient;
use crate::error::{DbError, ErrorMessage};
use crate::models::{Subscription, User};
use tracing::instrument;
use uuid::Uuid;

/// Author subscriptions: `subscriber_id` follows `user_id`.
pub trait SubscriptionExt {
    async fn subscribe(&self, user_id: Uuid, subscriber_id: Uuid)
    -> Result<Subscription, DbError>;

    async fn unsubscribe(&self, user_id: Uuid, subscriber_id: Uuid) -> Result<(), DbError>;

    async fn is_subscribed(&self, user_id: Uuid, subscriber_id: Uuid) -> Result<bool, DbError>;

    /// Users following `user_id`
    async fn get_subscribers(&self, user_id: Uuid) -> Result<Vec<User>, DbError>;

    /// Authors `subscriber_id` follows
    async fn get_subscriptions(&self, subscriber_id: Uuid) -> Result<Vec<User>, DbError>;
}

impl SubscriptionExt for DBClient {
    #[instrument(skip(self))]
    async fn subscribe(
        &self,
        user_id: Uuid,
        subscriber_id: Uuid,
    ) -> Result<Subscription, DbError> {
        if user_id == subscriber_id {
            return Err(DbError::ConstraintViolation(
                ErrorMessage::SelfSubscription.to_string(),
            ));
        }

        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (user_id, subscriber_id)
            VALUES ($1, $2)
            RETURNING user_id, subscriber_id
            "#,
        )
        .bind(user_id)
        .bind(subscriber_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let err = DbError::from(e);
            tracing::warn!("DB error, saving subscription: {}", err);
            err
        })?;

        Ok(subscription)
    }

    #[instrument(skip(self))]
    async fn unsubscribe(&self, user_id: Uuid, subscriber_id: Uuid) -> Result<(), DbError> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND subscriber_id = $2")
                .bind(user_id)
                .bind(subscriber_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn is_subscribed(&self, user_id: Uuid, subscriber_id: Uuid) -> Result<bool, DbError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM subscriptions WHERE user_id = $1 AND subscriber_id = $2)"#,
        )
        .bind(user_id)
        .bind(subscriber_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn get_subscribers(&self, user_id: Uuid) -> Result<Vec<User>, DbError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password, u.first_name, u.last_name, u.role, u.is_staff, u.is_superuser, u.date_joined
            FROM subscriptions s
            INNER JOIN users u ON s.subscriber_id = u.id
            WHERE s.user_id = $1
            ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn get_subscriptions(&self, subscriber_id: Uuid) -> Result<Vec<User>, DbError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password, u.first_name, u.last_name, u.role, u.is_staff, u.is_superuser, u.date_joined
            FROM subscriptions s
            INNER JOIN users u ON s.user_id = u.id
            WHERE s.subscriber_id = $1
            ORDER BY u.username
            "#,
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{UserExt, fixtures};
    use sqlx::PgPool;

    #[sqlx::test(migrations = "./migrations")]
    async fn subscription_pair_is_unique(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        let reader = fixtures::user(&db, "reader").await;

        let sub = db.subscribe(author.id, reader.id).await.unwrap();
        assert_eq!(sub.subscriber_id, reader.id);
        assert!(db.is_subscribed(author.id, reader.id).await.unwrap());
        assert!(!db.is_subscribed(reader.id, author.id).await.unwrap());

        let err = db.subscribe(author.id, reader.id).await.unwrap_err();
        assert!(err.is_unique_violation());

        // the reverse direction is a different pair
        db.subscribe(reader.id, author.id).await.unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn cannot_subscribe_to_self(pool: PgPool) {
        let db = DBClient::new(pool);
        let user = fixtures::user(&db, "narcissus").await;

        let err = db.subscribe(user.id, user.id).await.unwrap_err();
        assert!(err.is_constraint_violation());

        // the table enforces it as well
        let raw = sqlx::query("INSERT INTO subscriptions (user_id, subscriber_id) VALUES ($1, $1)")
            .bind(user.id)
            .execute(&db.pool)
            .await
            .unwrap_err();
        assert!(DbError::from(raw).is_constraint_violation());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn listing_and_cascade(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        let alice = fixtures::user(&db, "alice").await;
        let bob = fixtures::user(&db, "bob").await;

        db.subscribe(author.id, alice.id).await.unwrap();
        db.subscribe(author.id, bob.id).await.unwrap();

        let names: Vec<String> = db
            .get_subscribers(author.id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, ["alice", "bob"]);
        assert_eq!(db.get_subscriptions(bob.id).await.unwrap()[0].id, author.id);

        db.delete_user(bob.id).await.unwrap();
        assert_eq!(db.get_subscribers(author.id).await.unwrap().len(), 1);

        db.unsubscribe(author.id, alice.id).await.unwrap();
        assert!(matches!(
            db.unsubscribe(author.id, alice.id).await.unwrap_err(),
            DbError::NotFound
        ));
    }
}
