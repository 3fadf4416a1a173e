/// Result ledger
///
/// Records, edits and removes activity results on behalf of teachers and
/// administrators. Every mutation runs in one ledger transaction together
/// with the house adjustment it causes, so a result write and its effect on
/// the standings either both land or neither does.
///
/// # Point accounting
///
/// | Operation | House adjustment |
/// |---|---|
/// | create | `+points` on the student's house |
/// | update, same house | `new_points - old_points` |
/// | update, student moved to another house | `-old_points` on the old house, `+new_points` on the new one |
/// | delete | `-points` on the student's house |
///
/// An update that omits `house_spirit_points` keeps the stored value.
///
/// # Concurrency
///
/// Update and delete lock the result row before reading it, so concurrent
/// edits of one result serialize and each sees the points left by the
/// previous one. House totals change through storage-level increments, so
/// concurrent creates in one house do not lose updates.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use housepoints_shared::auth::token::Claims;
/// use housepoints_shared::ledger::{ResultLedger, ResultSubmission};
/// use housepoints_shared::store::memory::MemoryStore;
/// use serde_json::json;
///
/// # async fn example(teacher: Claims, student_id: String) -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = ResultLedger::new(Arc::new(MemoryStore::new()));
///
/// let result = ledger
///     .create_result(
///         &teacher,
///         ResultSubmission {
///             student_id: Some(student_id),
///             activity_name: Some("Potions exam".to_string()),
///             score: Some(json!(88.5)),
///             house_spirit_points: Some(json!(5)),
///         },
///     )
///     .await?;
///
/// ledger.delete_result(&teacher, result.id).await?;
/// # Ok(())
/// # }
/// ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::auth::{
    guard::{require_owner_or_admin, require_role, STAFF},
    token::Claims,
};
use crate::models::{
    house_spirit::HouseSpirit,
    result::{ActivityResult, NewResult, ResultRow},
    student::Student,
};
use crate::standings::StandingAggregator;
use crate::store::{SchoolStore, StoreError};

/// How many results the teacher dashboard shows
pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// A field that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn from_validation(errors: &ValidationErrors) -> Vec<Self> {
        errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| FieldError {
                    field: field.clone(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                })
            })
            .collect()
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Error type for ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Role or ownership mismatch
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing student, result or house
    #[error("{0} not found")]
    NotFound(&'static str),

    /// One or more submitted fields are missing or invalid
    #[error("Validation failed: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", "))]
    Validation(Vec<FieldError>),

    /// Persistence failure
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => LedgerError::NotFound(entity),
            other => LedgerError::Store(other),
        }
    }
}

/// Ledger result type alias
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result fields as submitted by a client
///
/// `score` and `house_spirit_points` stay untyped until validation so that
/// numeric strings (`"7.5"`) are accepted and anything else is reported
/// against the field that carried it. A JSON `null` counts as omitted.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ResultSubmission {
    pub student_id: Option<String>,

    #[validate(length(min = 1, max = 255, message = "activity_name must be 1-255 characters"))]
    pub activity_name: Option<String>,

    pub score: Option<Value>,

    pub house_spirit_points: Option<Value>,
}

/// Validated fields of a submission; `None` means "not submitted"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPatch {
    pub student_id: Option<Uuid>,
    pub activity_name: Option<String>,
    pub score: Option<f64>,
    pub house_spirit_points: Option<i32>,
}

fn parse_student_id(raw: &str) -> Result<Uuid, FieldError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| FieldError::new("student_id", "student_id must be a valid id"))
}

fn parse_score(value: &Value) -> Result<f64, FieldError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|score| score.is_finite())
        .ok_or_else(|| FieldError::new("score", "score must be a finite number"))
}

fn parse_points(value: &Value) -> Result<i32, FieldError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed
        .filter(|points| *points >= 0)
        .and_then(|points| i32::try_from(points).ok())
        .ok_or_else(|| {
            FieldError::new(
                "house_spirit_points",
                "house_spirit_points must be a non-negative integer",
            )
        })
}

fn keep<T>(errors: &mut Vec<FieldError>, parsed: Option<Result<T, FieldError>>) -> Option<T> {
    match parsed {
        Some(Ok(value)) => Some(value),
        Some(Err(e)) => {
            errors.push(e);
            None
        }
        None => None,
    }
}

impl ResultSubmission {
    fn parse(mut self) -> (ResultPatch, Vec<FieldError>) {
        self.activity_name = self.activity_name.map(|name| name.trim().to_string());

        let mut errors = match self.validate() {
            Ok(()) => Vec::new(),
            Err(e) => FieldError::from_validation(&e),
        };

        let student_id = keep(&mut errors, self.student_id.as_deref().map(parse_student_id));
        let score = keep(&mut errors, self.score.as_ref().map(parse_score));
        let house_spirit_points = keep(
            &mut errors,
            self.house_spirit_points.as_ref().map(parse_points),
        );
        let activity_name = if errors.iter().any(|e| e.field == "activity_name") {
            None
        } else {
            self.activity_name
        };

        let patch = ResultPatch {
            student_id,
            activity_name,
            score,
            house_spirit_points,
        };
        (patch, errors)
    }

    /// Validates the fields that were submitted; omitted fields stay `None`
    pub fn into_patch(self) -> LedgerResult<ResultPatch> {
        let (patch, mut errors) = self.parse();
        if errors.is_empty() {
            Ok(patch)
        } else {
            errors.sort_by(|a, b| a.field.cmp(&b.field));
            Err(LedgerError::Validation(errors))
        }
    }

    /// Validates a complete new result; points default to zero
    fn into_entry(self) -> LedgerResult<(Uuid, String, f64, i32)> {
        let submitted = (
            self.student_id.is_some(),
            self.activity_name.is_some(),
            self.score.is_some(),
        );
        let (patch, mut errors) = self.parse();

        for (present, field) in [
            (submitted.0, "student_id"),
            (submitted.1, "activity_name"),
            (submitted.2, "score"),
        ] {
            if !present {
                errors.push(FieldError::new(field, format!("{} is required", field)));
            }
        }

        match patch {
            ResultPatch {
                student_id: Some(student_id),
                activity_name: Some(activity_name),
                score: Some(score),
                house_spirit_points,
            } if errors.is_empty() => Ok((
                student_id,
                activity_name,
                score,
                house_spirit_points.unwrap_or(0),
            )),
            _ => {
                errors.sort_by(|a, b| a.field.cmp(&b.field));
                Err(LedgerError::Validation(errors))
            }
        }
    }
}

fn staff_only(actor: &Claims) -> LedgerResult<()> {
    require_role(actor, STAFF).map_err(|e| LedgerError::Forbidden(e.to_string()))
}

/// Teacher-facing operations over results and standings
#[derive(Clone)]
pub struct ResultLedger {
    store: Arc<dyn SchoolStore>,
    standings: StandingAggregator,
    recent_limit: usize,
}

impl ResultLedger {
    pub fn new(store: Arc<dyn SchoolStore>) -> Self {
        Self {
            standings: StandingAggregator::new(Arc::clone(&store)),
            store,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    /// Caps how many results `list_recent_by_teacher` returns
    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    /// Records a result and credits the student's house
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the actor is a teacher or admin
    /// - `Validation` for a missing `student_id`, `activity_name` or `score`,
    ///   a non-numeric score, or negative points
    /// - `NotFound` if the student does not exist
    pub async fn create_result(
        &self,
        actor: &Claims,
        submission: ResultSubmission,
    ) -> LedgerResult<ActivityResult> {
        staff_only(actor)?;
        let (student_id, activity_name, score, points) = submission.into_entry()?;

        let mut tx = self.store.begin().await?;

        let student = tx
            .find_student(student_id)
            .await?
            .ok_or(LedgerError::NotFound("student"))?;

        let result = tx
            .insert_result(NewResult {
                student_id,
                recorded_by: actor.id,
                activity_name,
                score,
                house_spirit_points: points,
                date_recorded: Utc::now(),
            })
            .await?;

        StandingAggregator::adjust(tx.as_mut(), student.house_spirit_id, i64::from(points))
            .await?;

        tx.commit().await?;

        info!(
            result_id = %result.id,
            user_id = %actor.id,
            student_id = %student_id,
            points,
            "Result recorded"
        );
        Ok(result)
    }

    /// Applies a partial edit and moves the point difference between houses
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the actor recorded the result or is an admin
    /// - `NotFound` if the result, or a newly named student, does not exist
    /// - `Validation` for invalid submitted fields
    pub async fn update_result(
        &self,
        actor: &Claims,
        result_id: Uuid,
        submission: ResultSubmission,
    ) -> LedgerResult<ActivityResult> {
        staff_only(actor)?;
        let patch = submission.into_patch()?;

        let mut tx = self.store.begin().await?;

        let current = tx
            .lock_result(result_id)
            .await?
            .ok_or(LedgerError::NotFound("result"))?;
        require_owner_or_admin(actor, current.recorded_by)
            .map_err(|e| LedgerError::Forbidden(e.to_string()))?;

        let old_house = tx
            .find_student(current.student_id)
            .await?
            .and_then(|s| s.house_spirit_id);

        let student_id = patch.student_id.unwrap_or(current.student_id);
        let new_house = if student_id == current.student_id {
            old_house
        } else {
            tx.find_student(student_id)
                .await?
                .ok_or(LedgerError::NotFound("student"))?
                .house_spirit_id
        };

        let old_points = current.house_spirit_points;
        let new_points = patch.house_spirit_points.unwrap_or(old_points);

        let updated = tx
            .update_result_row(
                result_id,
                ResultRow {
                    student_id,
                    activity_name: patch.activity_name.unwrap_or(current.activity_name),
                    score: patch.score.unwrap_or(current.score),
                    house_spirit_points: new_points,
                },
            )
            .await?;

        // Concurrent moves in opposite directions lock houses in the same order
        let deltas = StandingAggregator::move_deltas(
            old_house,
            i64::from(old_points),
            new_house,
            i64::from(new_points),
        );
        for (house_id, delta) in deltas {
            StandingAggregator::adjust(tx.as_mut(), Some(house_id), delta).await?;
        }

        tx.commit().await?;

        info!(
            result_id = %result_id,
            user_id = %actor.id,
            old_points,
            new_points,
            "Result updated"
        );
        Ok(updated)
    }

    /// Removes a result and retracts its points
    ///
    /// Deleting an id that is already gone fails with `NotFound` and leaves
    /// the standings alone.
    pub async fn delete_result(&self, actor: &Claims, result_id: Uuid) -> LedgerResult<()> {
        staff_only(actor)?;

        let mut tx = self.store.begin().await?;

        let current = tx
            .lock_result(result_id)
            .await?
            .ok_or(LedgerError::NotFound("result"))?;
        require_owner_or_admin(actor, current.recorded_by)
            .map_err(|e| LedgerError::Forbidden(e.to_string()))?;

        let house = tx
            .find_student(current.student_id)
            .await?
            .and_then(|s| s.house_spirit_id);

        tx.delete_result_row(result_id).await?;
        StandingAggregator::adjust(
            tx.as_mut(),
            house,
            -i64::from(current.house_spirit_points),
        )
        .await?;

        tx.commit().await?;

        info!(
            result_id = %result_id,
            user_id = %actor.id,
            points = current.house_spirit_points,
            "Result deleted"
        );
        Ok(())
    }

    /// Results the actor recorded, newest first
    pub async fn list_recent_by_teacher(&self, actor: &Claims) -> LedgerResult<Vec<ActivityResult>> {
        staff_only(actor)?;
        Ok(self
            .store
            .list_results_by_teacher(actor.id, self.recent_limit)
            .await?)
    }

    pub async fn list_all_students(&self, actor: &Claims) -> LedgerResult<Vec<Student>> {
        staff_only(actor)?;
        Ok(self.store.list_students().await?)
    }

    pub async fn list_standings(&self, actor: &Claims) -> LedgerResult<Vec<HouseSpirit>> {
        staff_only(actor)?;
        Ok(self.standings.standings().await?)
    }
}
