//! Row-level access rules: admins see everything, regular users only the
//! rows they created. Applied uniformly to clients, quotes and invoices.

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
};

pub trait Owned {
    fn created_by(&self) -> Uuid;
}

impl Owned for crate::entity::clients::Model {
    fn created_by(&self) -> Uuid {
        self.created_by
    }
}

impl Owned for crate::entity::quotes::Model {
    fn created_by(&self) -> Uuid {
        self.created_by
    }
}

impl Owned for crate::entity::invoices::Model {
    fn created_by(&self) -> Uuid {
        self.created_by
    }
}

pub fn can_view(user: &AuthUser, entity: &impl Owned) -> bool {
    user.role == "admin" || entity.created_by() == user.user_id
}

pub fn can_modify(user: &AuthUser, entity: &impl Owned) -> bool {
    can_view(user, entity)
}

pub fn ensure_can_view(user: &AuthUser, entity: &impl Owned) -> AppResult<()> {
    if can_view(user, entity) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub fn ensure_can_modify(user: &AuthUser, entity: &impl Owned) -> AppResult<()> {
    if can_modify(user, entity) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(Uuid);

    impl Owned for Row {
        fn created_by(&self) -> Uuid {
            self.0
        }
    }

    fn user(role: &str) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role: role.into(),
        }
    }

    #[test]
    fn admin_sees_everything() {
        let admin = user("admin");
        let row = Row(Uuid::new_v4());
        assert!(can_view(&admin, &row));
        assert!(can_modify(&admin, &row));
    }

    #[test]
    fn owner_sees_own_rows() {
        let u = user("user");
        let row = Row(u.user_id);
        assert!(can_view(&u, &row));
        assert!(ensure_can_modify(&u, &row).is_ok());
    }

    #[test]
    fn non_owner_is_forbidden() {
        let u = user("user");
        let row = Row(Uuid::new_v4());
        assert!(!can_view(&u, &row));
        assert!(matches!(
            ensure_can_view(&u, &row),
            Err(AppError::Forbidden)
        ));
    }
}
