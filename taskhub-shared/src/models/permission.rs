/// Permission model
///
/// A permission is a named capability such as `"Task.Delete"`. Names are
/// unique; the resource evaluators look permissions up by name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Entity;

/// Named capability
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    pub id: Uuid,

    pub name: String,

    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description,
            created_at: Utc::now(),
        }
    }
}

impl Entity for Permission {
    const NAME: &'static str = "Permission";

    fn id(&self) -> Uuid {
        self.id
    }
}

