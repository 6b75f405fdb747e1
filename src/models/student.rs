use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

use crate::utils::validation::validate_not_blank;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    /// 指导老师，未分配时为空
    pub advisor_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn is_advised_by(&self, advisor_id: &str) -> bool {
        self.advisor_id.as_deref() == Some(advisor_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpsertStudentRequest {
    #[validate(length(max = 100), custom = "validate_not_blank")]
    pub name: String,

    #[validate(email)]
    pub email: Option<String>,

    pub advisor_id: Option<String>,
}
