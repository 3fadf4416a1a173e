/// Teacher profile model
///
/// Display data for a teacher login; shown on the teacher dashboard.

use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Teacher profile linked to a user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeacherProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

/// Input for creating a teacher profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeacherProfile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl TeacherProfile {
    /// Creates a teacher profile
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateTeacherProfile,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TeacherProfile>(
            r#"
            INSERT INTO teachers (user_id, first_name, last_name)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, first_name, last_name
            "#,
        )
        .bind(data.user_id)
        .bind(data.first_name)
        .bind(data.last_name)
        .fetch_one(executor)
        .await
    }

    /// Finds the profile of a teacher login
    pub async fn find_by_user_id<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeacherProfile>(
            "SELECT id, user_id, first_name, last_name FROM teachers WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_serializes_camel_case() {
        let profile = TeacherProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            first_name: "Minerva".to_string(),
            last_name: "McGonagall".to_string(),
        };

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["firstName"], "Minerva");
        assert_eq!(json["lastName"], "McGonagall");
    }
}
