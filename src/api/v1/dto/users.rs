use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: u64,
}
