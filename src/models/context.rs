use crate::models::{Entity, EntityKind};

/// Who is acting on the current request: the signed-in user, the active
/// installed application, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub user: Option<Entity>,
    pub app: Option<Entity>,
}

impl RequestContext {
    pub fn for_user(user: Entity) -> Self {
        Self {
            user: Some(user),
            app: None,
        }
    }

    pub fn for_app(app: Entity) -> Self {
        Self {
            user: None,
            app: Some(app),
        }
    }

    /// The acting entity of the given kind, if there is one.
    pub fn entity(&self, kind: EntityKind) -> Option<&Entity> {
        let candidate = match kind {
            EntityKind::User => self.user.as_ref(),
            EntityKind::App => self.app.as_ref(),
        };
        candidate.filter(|entity| entity.kind() == kind)
    }

    pub fn is_staff(&self) -> bool {
        self.user.as_ref().is_some_and(Entity::is_trusted)
    }
}
