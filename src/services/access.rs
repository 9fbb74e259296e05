use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::entities::{submissions, users, users::Role};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AccessError {
    #[error("{0}")]
    Forbidden(&'static str),
}

/// The authenticated principal of a request, built from the live account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Identity {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub plant: String,
    pub must_reset_password: bool,
}

impl From<&users::Model> for Identity {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            plant: user.plant.clone(),
            must_reset_password: user.must_reset_password,
        }
    }
}

pub fn require_admin(identity: &Identity) -> Result<(), AccessError> {
    match identity.role {
        Role::SuperAdmin | Role::RegularAdmin => Ok(()),
    }
}

pub fn require_super_admin(identity: &Identity) -> Result<(), AccessError> {
    match identity.role {
        Role::SuperAdmin => Ok(()),
        Role::RegularAdmin => Err(AccessError::Forbidden("Not enough permissions")),
    }
}

/// Regular admins are pinned to their own plant whatever they ask for.
pub fn scope_submissions(identity: &Identity, requested: Option<&str>) -> Option<String> {
    match identity.role {
        Role::SuperAdmin => requested.map(str::to_owned),
        Role::RegularAdmin => Some(identity.plant.clone()),
    }
}

pub fn can_access_plant(identity: &Identity, plant: &str) -> bool {
    match identity.role {
        Role::SuperAdmin => true,
        Role::RegularAdmin => identity.plant == plant,
    }
}

pub fn can_access_submission(identity: &Identity, submission: &submissions::Model) -> bool {
    can_access_plant(identity, &submission.plant)
}

pub fn can_delete_account(actor: &Identity, target: &users::Model) -> bool {
    if actor.id == target.id {
        return false;
    }
    match actor.role {
        Role::SuperAdmin => true,
        Role::RegularAdmin => false,
    }
}
