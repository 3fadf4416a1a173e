/// API route handlers
///
/// - `health`: liveness and store connectivity
/// - `auth`: login
/// - `student`: the signed-in student's dashboard
/// - `teacher`: teacher dashboard and result recording
/// - `house_spirits`: house standings
/// - `admin`: standings drift detection and repair

pub mod admin;
pub mod auth;
pub mod health;
pub mod house_spirits;
pub mod student;
pub mod teacher;
