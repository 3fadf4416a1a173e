/// In-process implementation of the persistence interface
///
/// State sits behind a single `tokio::sync::Mutex`. A ledger transaction
/// takes the lock for its whole lifetime and works on a copy of the state;
/// commit swaps the copy in, drop discards it. Writers are therefore fully
/// serialized, which is stricter than the per-row locking of
/// [`super::postgres::PgStore`] and gives the same observable outcomes.
///
/// Constraints mirror the SQL schema: unique usernames, house names and
/// student numbers; foreign keys from students and results; house points
/// never below zero.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{LedgerTx, SchoolStore, StoreError, StoreResult};
use crate::models::{
    house_spirit::{CreateHouseSpirit, HouseSpirit},
    result::{ActivityResult, NewResult, ResultRow},
    student::{CreateStudent, Student},
    teacher::{CreateTeacherProfile, TeacherProfile},
    user::{CreateUser, User},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    houses: HashMap<Uuid, HouseSpirit>,
    students: HashMap<Uuid, Student>,
    teachers: HashMap<Uuid, TeacherProfile>,
    /// Insertion order doubles as the tie-breaker for equal timestamps
    results: Vec<ActivityResult>,
    /// Houses whose increments fail, for exercising rollback
    failing_houses: HashSet<Uuid>,
}

impl MemoryState {
    fn student(&self, id: Uuid) -> Option<Student> {
        self.students.get(&id).cloned()
    }

    fn result_index(&self, id: Uuid) -> Option<usize> {
        self.results.iter().position(|r| r.id == id)
    }

    fn newest_first<'a>(results: impl DoubleEndedIterator<Item = &'a ActivityResult>) -> Vec<ActivityResult> {
        let mut sorted: Vec<ActivityResult> = results.rev().cloned().collect();
        sorted.sort_by(|a, b| b.date_recorded.cmp(&a.date_recorded));
        sorted
    }

    fn houses_by_id(&self) -> Vec<HouseSpirit> {
        let mut houses: Vec<HouseSpirit> = self.houses.values().cloned().collect();
        houses.sort_by_key(|h| h.id);
        houses
    }

    fn ledger_totals(&self) -> HashMap<Uuid, i64> {
        let mut totals: HashMap<Uuid, i64> = HashMap::new();
        for result in &self.results {
            let house_id = self
                .students
                .get(&result.student_id)
                .and_then(|s| s.house_spirit_id);
            if let Some(house_id) = house_id {
                *totals.entry(house_id).or_insert(0) += i64::from(result.house_spirit_points);
            }
        }
        totals
    }

    fn check_result_refs(&self, student_id: Uuid, recorded_by: Option<Uuid>) -> StoreResult<()> {
        if !self.students.contains_key(&student_id) {
            return Err(StoreError::Integrity(format!(
                "student {} does not exist",
                student_id
            )));
        }
        if let Some(user_id) = recorded_by {
            if !self.users.contains_key(&user_id) {
                return Err(StoreError::Integrity(format!("user {} does not exist", user_id)));
            }
        }
        Ok(())
    }
}

/// Store that keeps everything in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every increment of `house_id` fail with an integrity error
    ///
    /// Lets tests observe that a failed house adjustment undoes the result
    /// write that triggered it.
    pub async fn fail_increments_for(&self, house_id: Uuid) {
        self.state.lock().await.failing_houses.insert(house_id);
    }

    /// Overwrites a house total outside the ledger, simulating drift
    pub async fn corrupt_house_points(&self, house_id: Uuid, points: i64) {
        if let Some(house) = self.state.lock().await.houses.get_mut(&house_id) {
            house.points = points;
        }
    }
}

#[async_trait]
impl SchoolStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|u| u.username == data.username) {
            return Err(StoreError::Conflict(format!(
                "username {} already exists",
                data.username
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: data.username,
            password_hash: data.password_hash,
            role: data.role,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_house_spirit(&self, data: CreateHouseSpirit) -> StoreResult<HouseSpirit> {
        let mut state = self.state.lock().await;

        if state.houses.values().any(|h| h.name == data.name) {
            return Err(StoreError::Conflict(format!(
                "house spirit {} already exists",
                data.name
            )));
        }

        let house = HouseSpirit {
            id: Uuid::new_v4(),
            name: data.name,
            points: 0,
        };
        state.houses.insert(house.id, house.clone());
        Ok(house)
    }

    async fn find_house_spirit(&self, id: Uuid) -> StoreResult<Option<HouseSpirit>> {
        Ok(self.state.lock().await.houses.get(&id).cloned())
    }

    async fn list_house_spirits(&self) -> StoreResult<Vec<HouseSpirit>> {
        let state = self.state.lock().await;
        let mut houses: Vec<HouseSpirit> = state.houses.values().cloned().collect();
        houses.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.name.cmp(&b.name)));
        Ok(houses)
    }

    async fn create_student(&self, data: CreateStudent) -> StoreResult<Student> {
        let mut state = self.state.lock().await;

        if state
            .students
            .values()
            .any(|s| s.student_id_number == data.student_id_number)
        {
            return Err(StoreError::Conflict(format!(
                "student number {} already exists",
                data.student_id_number
            )));
        }
        if let Some(house_id) = data.house_spirit_id {
            if !state.houses.contains_key(&house_id) {
                return Err(StoreError::Integrity(format!(
                    "house spirit {} does not exist",
                    house_id
                )));
            }
        }
        if let Some(user_id) = data.user_id {
            if !state.users.contains_key(&user_id) {
                return Err(StoreError::Integrity(format!("user {} does not exist", user_id)));
            }
            if state.students.values().any(|s| s.user_id == Some(user_id)) {
                return Err(StoreError::Conflict(format!(
                    "user {} already linked to a student",
                    user_id
                )));
            }
        }

        let student = Student {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            first_name: data.first_name,
            last_name: data.last_name,
            student_id_number: data.student_id_number,
            house_spirit_id: data.house_spirit_id,
        };
        state.students.insert(student.id, student.clone());
        Ok(student)
    }

    async fn find_student_by_id(&self, id: Uuid) -> StoreResult<Option<Student>> {
        Ok(self.state.lock().await.student(id))
    }

    async fn find_student_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Student>> {
        let state = self.state.lock().await;
        Ok(state
            .students
            .values()
            .find(|s| s.user_id == Some(user_id))
            .cloned())
    }

    async fn list_students(&self) -> StoreResult<Vec<Student>> {
        let state = self.state.lock().await;
        let mut students: Vec<Student> = state.students.values().cloned().collect();
        students.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        Ok(students)
    }

    async fn create_teacher_profile(&self, data: CreateTeacherProfile) -> StoreResult<TeacherProfile> {
        let mut state = self.state.lock().await;

        if !state.users.contains_key(&data.user_id) {
            return Err(StoreError::Integrity(format!(
                "user {} does not exist",
                data.user_id
            )));
        }
        if state.teachers.values().any(|t| t.user_id == data.user_id) {
            return Err(StoreError::Conflict(format!(
                "user {} already has a teacher profile",
                data.user_id
            )));
        }

        let profile = TeacherProfile {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            first_name: data.first_name,
            last_name: data.last_name,
        };
        state.teachers.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn find_teacher_profile(&self, user_id: Uuid) -> StoreResult<Option<TeacherProfile>> {
        let state = self.state.lock().await;
        Ok(state.teachers.values().find(|t| t.user_id == user_id).cloned())
    }

    async fn find_result(&self, id: Uuid) -> StoreResult<Option<ActivityResult>> {
        let state = self.state.lock().await;
        Ok(state.results.iter().find(|r| r.id == id).cloned())
    }

    async fn list_results_by_teacher(
        &self,
        teacher_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<ActivityResult>> {
        let state = self.state.lock().await;
        let mut results =
            MemoryState::newest_first(state.results.iter().filter(|r| r.recorded_by == teacher_id));
        results.truncate(limit);
        Ok(results)
    }

    async fn list_results_by_student(&self, student_id: Uuid) -> StoreResult<Vec<ActivityResult>> {
        let state = self.state.lock().await;
        Ok(MemoryState::newest_first(
            state.results.iter().filter(|r| r.student_id == student_id),
        ))
    }

    async fn standings_snapshot(&self) -> StoreResult<(Vec<HouseSpirit>, HashMap<Uuid, i64>)> {
        let state = self.state.lock().await;
        Ok((state.houses_by_id(), state.ledger_totals()))
    }

    async fn begin(&self) -> StoreResult<Box<dyn LedgerTx>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryLedgerTx { guard, working }))
    }
}

/// Ledger transaction holding the store lock and a working copy
pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn find_student(&mut self, id: Uuid) -> StoreResult<Option<Student>> {
        Ok(self.working.student(id))
    }

    async fn lock_result(&mut self, id: Uuid) -> StoreResult<Option<ActivityResult>> {
        Ok(self.working.results.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_result(&mut self, data: NewResult) -> StoreResult<ActivityResult> {
        self.working
            .check_result_refs(data.student_id, Some(data.recorded_by))?;
        if data.house_spirit_points < 0 {
            return Err(StoreError::Integrity(
                "house_spirit_points cannot be negative".to_string(),
            ));
        }

        let result = ActivityResult {
            id: Uuid::new_v4(),
            student_id: data.student_id,
            recorded_by: data.recorded_by,
            activity_name: data.activity_name,
            score: data.score,
            house_spirit_points: data.house_spirit_points,
            date_recorded: data.date_recorded,
        };
        self.working.results.push(result.clone());
        Ok(result)
    }

    async fn update_result_row(&mut self, id: Uuid, row: ResultRow) -> StoreResult<ActivityResult> {
        self.working.check_result_refs(row.student_id, None)?;
        if row.house_spirit_points < 0 {
            return Err(StoreError::Integrity(
                "house_spirit_points cannot be negative".to_string(),
            ));
        }

        let index = self
            .working
            .result_index(id)
            .ok_or(StoreError::NotFound("result"))?;
        let result = &mut self.working.results[index];
        result.student_id = row.student_id;
        result.activity_name = row.activity_name;
        result.score = row.score;
        result.house_spirit_points = row.house_spirit_points;
        Ok(result.clone())
    }

    async fn delete_result_row(&mut self, id: Uuid) -> StoreResult<()> {
        let index = self
            .working
            .result_index(id)
            .ok_or(StoreError::NotFound("result"))?;
        self.working.results.remove(index);
        Ok(())
    }

    async fn increment_house_points(&mut self, house_id: Uuid, delta: i64) -> StoreResult<()> {
        if self.working.failing_houses.contains(&house_id) {
            return Err(StoreError::Integrity(format!(
                "increment rejected for house spirit {}",
                house_id
            )));
        }

        let house = self
            .working
            .houses
            .get_mut(&house_id)
            .ok_or(StoreError::NotFound("house spirit"))?;
        let points = house.points + delta;
        if points < 0 {
            return Err(StoreError::Integrity(format!(
                "points for house spirit {} cannot go negative",
                house_id
            )));
        }
        house.points = points;
        Ok(())
    }

    async fn lock_house_spirits(&mut self) -> StoreResult<Vec<HouseSpirit>> {
        Ok(self.working.houses_by_id())
    }

    async fn ledger_totals(&mut self) -> StoreResult<HashMap<Uuid, i64>> {
        Ok(self.working.ledger_totals())
    }

    async fn set_house_points(&mut self, house_id: Uuid, points: i64) -> StoreResult<()> {
        if points < 0 {
            return Err(StoreError::Integrity(format!(
                "points for house spirit {} cannot go negative",
                house_id
            )));
        }

        let house = self
            .working
            .houses
            .get_mut(&house_id)
            .ok_or(StoreError::NotFound("house spirit"))?;
        house.points = points;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryLedgerTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
