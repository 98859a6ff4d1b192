//! Role directory: which roles a user holds for a subject. Assignments without a
//! subject are global and apply to every subject.

use crate::error::StoreError;
use crate::sql::{create_schema, qualified_table};
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn roles_for(&self, user: &str, subject: &str) -> Result<HashSet<String>, StoreError>;
}

/// One role assignment, as stored in a JSON assignments file.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RoleAssignment {
    #[serde(default)]
    pub subject: Option<String>,
    pub player: String,
    pub role: String,
}

/// In-memory directory built from assignments.
#[derive(Clone, Debug, Default)]
pub struct StaticRoleDirectory {
    global: HashMap<String, HashSet<String>>,
    scoped: HashMap<(String, String), HashSet<String>>,
}

impl StaticRoleDirectory {
    pub fn new() -> Self {
        StaticRoleDirectory::default()
    }

    pub fn from_assignments(assignments: impl IntoIterator<Item = RoleAssignment>) -> Self {
        assignments.into_iter().fold(StaticRoleDirectory::new(), |dir, a| match a.subject {
            Some(subject) => dir.grant(&subject, &a.player, &a.role),
            None => dir.grant_global(&a.player, &a.role),
        })
    }

    pub fn grant(mut self, subject: &str, user: &str, role: &str) -> Self {
        self.scoped
            .entry((subject.to_string(), user.to_string()))
            .or_default()
            .insert(role.to_string());
        self
    }

    pub fn grant_global(mut self, user: &str, role: &str) -> Self {
        self.global.entry(user.to_string()).or_default().insert(role.to_string());
        self
    }
}

#[async_trait]
impl RoleDirectory for StaticRoleDirectory {
    async fn roles_for(&self, user: &str, subject: &str) -> Result<HashSet<String>, StoreError> {
        let mut roles = self.global.get(user).cloned().unwrap_or_default();
        if let Some(scoped) = self.scoped.get(&(subject.to_string(), user.to_string())) {
            roles.extend(scoped.iter().cloned());
        }
        Ok(roles)
    }
}

const ASSIGNMENTS_TABLE: &str = "role_assignments";

/// Directory backed by `<schema>.role_assignments(subject, player, role)`.
#[derive(Clone)]
pub struct PgRoleDirectory {
    pool: PgPool,
    schema: String,
}

impl PgRoleDirectory {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgRoleDirectory { pool, schema: schema.into() }
    }

    /// Create the assignments table if missing.
    pub async fn ensure_table(&self) -> Result<(), StoreError> {
        sqlx::query(&create_schema(&self.schema)).execute(&self.pool).await?;
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                subject TEXT,
                player TEXT NOT NULL,
                role TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            qualified_table(&self.schema, ASSIGNMENTS_TABLE)
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl RoleDirectory for PgRoleDirectory {
    async fn roles_for(&self, user: &str, subject: &str) -> Result<HashSet<String>, StoreError> {
        let sql = format!(
            "SELECT DISTINCT role FROM {} WHERE player = $1 AND (subject IS NULL OR subject = $2)",
            qualified_table(&self.schema, ASSIGNMENTS_TABLE)
        );
        let rows = sqlx::query_scalar::<_, String>(&sql)
            .bind(user)
            .bind(subject)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }
}
