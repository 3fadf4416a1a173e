/// Student model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE students (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID UNIQUE REFERENCES users(id) ON DELETE SET NULL,
///     first_name VARCHAR(100) NOT NULL,
///     last_name VARCHAR(100) NOT NULL,
///     student_id_number VARCHAR(50) NOT NULL UNIQUE,
///     house_spirit_id UUID REFERENCES house_spirits(id) ON DELETE SET NULL
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Student record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    /// Unique student ID
    pub id: Uuid,

    /// Login account of the student, if they have one
    pub user_id: Option<Uuid>,

    pub first_name: String,

    pub last_name: String,

    /// School-issued student number
    pub student_id_number: String,

    /// House the student belongs to (weak reference)
    pub house_spirit_id: Option<Uuid>,
}

/// Input for creating a student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStudent {
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub student_id_number: String,
    pub house_spirit_id: Option<Uuid>,
}

impl Student {
    /// Creates a new student
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateStudent,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (user_id, first_name, last_name, student_id_number, house_spirit_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, first_name, last_name, student_id_number, house_spirit_id
            "#,
        )
        .bind(data.user_id)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.student_id_number)
        .bind(data.house_spirit_id)
        .fetch_one(executor)
        .await
    }

    /// Finds a student by ID
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            SELECT id, user_id, first_name, last_name, student_id_number, house_spirit_id
            FROM students
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Finds the student linked to a login account
    pub async fn find_by_user_id<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            SELECT id, user_id, first_name, last_name, student_id_number, house_spirit_id
            FROM students
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Lists all students ordered by last name, then first name
    pub async fn list<'e, E: PgExecutor<'e>>(executor: E) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            SELECT id, user_id, first_name, last_name, student_id_number, house_spirit_id
            FROM students
            ORDER BY last_name ASC, first_name ASC
            "#,
        )
        .fetch_all(executor)
        .await
    }
}
