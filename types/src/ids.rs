use std::fmt;

use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Allocate a fresh random id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            #[must_use]
            pub fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identity of a registered constraint.
    ConstraintId
);
uuid_id!(
    /// Identity of a submitted action.
    ActionId
);
uuid_id!(ViolationId);
uuid_id!(
    /// Identity of a registered observer.
    ObserverId
);
uuid_id!(
    /// Identity of a reversible unit of work.
    ///
    /// Rollback procedures registered for an action share the action's uuid,
    /// see `From<ActionId>`.
    UnitId
);
uuid_id!(RollbackRecordId);

impl From<ActionId> for UnitId {
    fn from(id: ActionId) -> Self {
        Self(id.as_uuid())
    }
}
