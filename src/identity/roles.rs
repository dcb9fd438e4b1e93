//! Fixed roles seeded by the `insert_2_roles` migration.
//!
//! Ids and stamps are hard-coded so every environment ends up with identical
//! rows and the migration can be reverted by id.

use uuid::Uuid;

pub const VISITOR: &str = "Visitor";
pub const ADMINISTRATOR: &str = "Administrator";

/// Named authorization group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub normalized_name: String,
    pub concurrency_stamp: String,
}

/// Compile-time description of a seeded role row.
#[derive(Clone, Copy, Debug)]
pub struct SeedRole {
    pub id: Uuid,
    pub concurrency_stamp: &'static str,
    pub name: &'static str,
    pub normalized_name: &'static str,
}

impl SeedRole {
    #[must_use]
    pub fn to_role(&self) -> Role {
        Role {
            id: self.id,
            name: self.name.to_string(),
            normalized_name: self.normalized_name.to_string(),
            concurrency_stamp: self.concurrency_stamp.to_string(),
        }
    }
}

pub const SEED_ROLES: [SeedRole; 2] = [
    SeedRole {
        id: Uuid::from_u128(0x5149_875c_c951_4af8_a955_7fd4_6134_07fb),
        concurrency_stamp: "a5195215-39e9-4fbd-a314-166be7c8f5c4",
        name: VISITOR,
        normalized_name: "VISITOR",
    },
    SeedRole {
        id: Uuid::from_u128(0x2ff4_eebe_34fe_4ec6_8b85_0753_4ad8_c430),
        concurrency_stamp: "c5a44b4a-9623-4c2f-a29f-3e7c52ecc080",
        name: ADMINISTRATOR,
        normalized_name: "ADMINISTRATOR",
    },
];
