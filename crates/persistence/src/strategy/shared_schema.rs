//! Shared schema tenancy strategy.
//!
//! All tenants share the same tables, distinguished by a tenant column. The
//! database enforces isolation through row-level-security policies that read
//! the transaction-scoped variables the gateway sets:
//!
//! - tenant variable set: only rows of that tenant
//! - tenant variable unset, user variable set: all rows (the cross-tenant path)
//! - neither set: no rows
//!
//! ```sql
//! ALTER TABLE orders ENABLE ROW LEVEL SECURITY;
//! ALTER TABLE orders FORCE ROW LEVEL SECURITY;
//! CREATE POLICY tenant_isolation ON orders
//!     USING (
//!         tenant_id = NULLIF(current_setting('app.tenant_id', true), '')::uuid
//!         OR (NULLIF(current_setting('app.tenant_id', true), '') IS NULL
//!             AND NULLIF(current_setting('app.user_id', true), '') IS NOT NULL)
//!     );
//! ```

use serde::{Deserialize, Serialize};

use crate::gateway::SessionVariables;
use crate::tenant::IdentifierFormat;

/// Configuration for shared schema tenancy.
///
/// # Example
///
/// ```
/// use opsconsole_persistence::strategy::SharedSchemaConfig;
///
/// let config = SharedSchemaConfig {
///     tenant_column: "org_id".to_string(),
///     ..Default::default()
/// };
/// let ddl = config.policy_ddl("orders");
/// assert!(ddl.contains("org_id = NULLIF(current_setting('app.tenant_id', true), '')::uuid"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedSchemaConfig {
    /// The name of the tenant ID column in tables.
    #[serde(default = "default_tenant_column")]
    pub tenant_column: String,

    /// Identifier format, which decides the SQL type of the tenant column.
    #[serde(default)]
    pub id_format: IdentifierFormat,

    /// Variable names read by the policies.
    #[serde(default)]
    pub variables: SessionVariables,

    /// Apply policies to the table owner as well.
    #[serde(default = "default_true")]
    pub force_row_level_security: bool,

    /// Column filled from the user variable on every insert and update.
    #[serde(default)]
    pub audit_column: Option<String>,
}

fn default_tenant_column() -> String {
    "tenant_id".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SharedSchemaConfig {
    fn default() -> Self {
        Self {
            tenant_column: default_tenant_column(),
            id_format: IdentifierFormat::default(),
            variables: SessionVariables::default(),
            force_row_level_security: true,
            audit_column: None,
        }
    }
}

impl SharedSchemaConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tenant column name.
    pub fn with_tenant_column(mut self, column: impl Into<String>) -> Self {
        self.tenant_column = column.into();
        self
    }

    /// Sets the variable names the policies read.
    pub fn with_variables(mut self, variables: SessionVariables) -> Self {
        self.variables = variables;
        self
    }

    /// Records the acting user in `column` via a trigger.
    pub fn with_audit_column(mut self, column: impl Into<String>) -> Self {
        self.audit_column = Some(column.into());
        self
    }

    /// Returns the SQL type used for tenant identifiers.
    pub fn tenant_sql_type(&self) -> &'static str {
        match self.id_format {
            IdentifierFormat::Uuid => "UUID",
            IdentifierFormat::Slug => "VARCHAR(64)",
        }
    }

    fn setting_expr(&self, variable: &str) -> String {
        format!("NULLIF(current_setting('{}', true), '')", variable)
    }

    /// Returns the policy predicate for `USING` and `WITH CHECK`.
    pub fn policy_predicate(&self) -> String {
        let tenant = self.setting_expr(&self.variables.tenant);
        let user = self.setting_expr(&self.variables.user);
        let cast = match self.id_format {
            IdentifierFormat::Uuid => "::uuid",
            IdentifierFormat::Slug => "",
        };
        format!(
            "{column} = {tenant}{cast}\n        OR ({tenant} IS NULL\n            AND {user} IS NOT NULL)",
            column = self.tenant_column,
            tenant = tenant,
            cast = cast,
            user = user,
        )
    }

    /// Generates the row-level-security DDL for `table`.
    ///
    /// Idempotent: the policy is dropped and recreated.
    pub fn policy_ddl(&self, table: &str) -> String {
        let mut ddl = format!("ALTER TABLE {} ENABLE ROW LEVEL SECURITY;\n", table);
        if self.force_row_level_security {
            ddl.push_str(&format!("ALTER TABLE {} FORCE ROW LEVEL SECURITY;\n", table));
        }
        ddl.push_str(&format!(
            "DROP POLICY IF EXISTS tenant_isolation ON {};\n",
            table
        ));
        ddl.push_str(&format!(
            "CREATE POLICY tenant_isolation ON {}\n    USING (\n        {}\n    );\n",
            table,
            self.policy_predicate()
        ));
        ddl
    }

    /// Generates the trigger filling the audit column, if one is configured.
    pub fn audit_trigger_ddl(&self, table: &str) -> Option<String> {
        let column = self.audit_column.as_ref()?;
        let function = format!("{}_set_{}", table, column);
        Some(format!(
            "CREATE OR REPLACE FUNCTION {function}() RETURNS trigger AS $$\n\
             BEGIN\n    NEW.{column} := {user};\n    RETURN NEW;\nEND;\n$$ LANGUAGE plpgsql;\n\
             DROP TRIGGER IF EXISTS {function} ON {table};\n\
             CREATE TRIGGER {function} BEFORE INSERT OR UPDATE ON {table}\n    \
             FOR EACH ROW EXECUTE FUNCTION {function}();\n",
            function = function,
            column = column,
            table = table,
            user = self.setting_expr(&self.variables.user),
        ))
    }

    /// Generates a WHERE clause fragment comparing the tenant column to `$n`.
    ///
    /// Redundant with the policy. Only ever an additional filter inside a
    /// scoped session, never a replacement for it.
    pub fn tenant_filter_sql(&self, table_alias: Option<&str>, param_index: usize) -> String {
        match table_alias {
            Some(alias) => format!("{}.{} = ${}", alias, self.tenant_column, param_index),
            None => format!("{} = ${}", self.tenant_column, param_index),
        }
    }
}

/// Builder for creating table DDL with tenant support.
#[derive(Debug)]
pub struct TenantAwareTableBuilder<'c> {
    table_name: String,
    config: &'c SharedSchemaConfig,
    columns: Vec<ColumnDef>,
    indexes: Vec<IndexDef>,
}

#[derive(Debug)]
struct ColumnDef {
    name: String,
    data_type: String,
    nullable: bool,
}

#[derive(Debug)]
struct IndexDef {
    name: String,
    columns: Vec<String>,
    unique: bool,
}

impl<'c> TenantAwareTableBuilder<'c> {
    /// Creates a new table builder.
    pub fn new(table_name: impl Into<String>, config: &'c SharedSchemaConfig) -> Self {
        Self {
            table_name: table_name.into(),
            config,
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Adds a column to the table.
    pub fn column(
        mut self,
        name: impl Into<String>,
        data_type: impl Into<String>,
        nullable: bool,
    ) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        });
        self
    }

    /// Adds an index (the tenant column is prepended automatically).
    pub fn index(mut self, name: impl Into<String>, columns: Vec<&str>, unique: bool) -> Self {
        self.indexes.push(IndexDef {
            name: name.into(),
            columns: columns.into_iter().map(String::from).collect(),
            unique,
        });
        self
    }

    /// Generates PostgreSQL DDL for the table, its indexes, policy and audit trigger.
    pub fn to_postgres_ddl(&self) -> String {
        let tenant_column = &self.config.tenant_column;
        let mut lines = vec![format!(
            "    {} {} NOT NULL",
            tenant_column,
            self.config.tenant_sql_type()
        )];

        for col in &self.columns {
            let null_str = if col.nullable { "" } else { " NOT NULL" };
            lines.push(format!("    {} {}{}", col.name, col.data_type, null_str));
        }

        if let Some(audit) = &self.config.audit_column {
            if !self.columns.iter().any(|c| &c.name == audit) {
                lines.push(format!("    {} TEXT", audit));
            }
        }

        let mut ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);\n\n",
            self.table_name,
            lines.join(",\n")
        );

        for idx in &self.indexes {
            let unique_str = if idx.unique { "UNIQUE " } else { "" };
            let columns: Vec<_> = std::iter::once(tenant_column.as_str())
                .chain(idx.columns.iter().map(|s| s.as_str()))
                .collect();
            ddl.push_str(&format!(
                "CREATE {}INDEX IF NOT EXISTS {} ON {} ({});\n",
                unique_str,
                idx.name,
                self.table_name,
                columns.join(", ")
            ));
        }

        ddl.push('\n');
        ddl.push_str(&self.config.policy_ddl(&self.table_name));

        if let Some(trigger) = self.config.audit_trigger_ddl(&self.table_name) {
            ddl.push('\n');
            ddl.push_str(&trigger);
        }

        ddl
    }
}
