use serde::{Deserialize, Serialize};

/// POST /projects body. `user_id` is what the ownership guard checks.
#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub user_id: u64,
    pub name: String,
}

impl CreateProjectRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name is empty");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub user_id: u64,
    pub name: String,
}
