use std::ops::{Deref, DerefMut};

use mongodb::bson::doc;
use mongodb::error::Error as DbError;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{Coll, Id};

/// Core admin user data.
///
/// Credential verification is handled by the external authentication
/// service; this record only anchors admin identity for token checks.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Ensure at least one admin account exists, creating the default one if the
/// collection is empty. Idempotent.
pub async fn ensure_admin_exists(admins: &Coll<NewAdmin>) -> Result<(), DbError> {
    let existing = admins.count_documents(doc! {}, None).await?;
    if existing == 0 {
        warn!("No admin accounts found, creating the default admin");
        admins
            .insert_one(
                NewAdmin {
                    username: "admin".to_string(),
                },
                None,
            )
            .await?;
    }
    Ok(())
}
