use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// The kinds of thing a quota can be measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    App,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::User, EntityKind::App];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::App => "app",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(EntityKind::User),
            "app" => Ok(EntityKind::App),
            other => Err(format!("unsupported entity kind '{}'", other)),
        }
    }
}

/// Identity of an entity without any of its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A user account or an installed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    User {
        id: Uuid,
        #[serde(default)]
        is_staff: bool,
    },
    App {
        id: Uuid,
    },
}

impl Entity {
    pub fn user(id: Uuid) -> Self {
        Entity::User { id, is_staff: false }
    }

    pub fn staff(id: Uuid) -> Self {
        Entity::User { id, is_staff: true }
    }

    pub fn app(id: Uuid) -> Self {
        Entity::App { id }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::User { .. } => EntityKind::User,
            Entity::App { .. } => EntityKind::App,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Entity::User { id, .. } | Entity::App { id } => *id,
        }
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef {
            kind: self.kind(),
            id: self.id(),
        }
    }

    /// Trusted principals are never limited by any quota.
    pub fn is_trusted(&self) -> bool {
        matches!(self, Entity::User { is_staff: true, .. })
    }
}
