use std::collections::BTreeMap;
use std::path::Path;

use dbshift_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::adapter::Adapter;
use crate::database::Database;
use crate::loader::migrations_from_path;
use crate::migration::{Direction, Migration, MigrationId, Status, validate};

/// Applies and reverts an ordered set of migrations against one database.
///
/// The tracking table is the source of truth. Each migration's status is
/// read from it when the migrator is built and updated only after a step
/// succeeds, so after an error the cached status errs towards the state
/// before the failing step.
pub struct Migrator<'db> {
    db: &'db dyn Database,
    adapter: Box<dyn Adapter>,
    migrations: BTreeMap<MigrationId, Migration>,
    transactional: bool,
}

impl<'db> Migrator<'db> {
    /// Load migrations from `dir` and build a migrator for them.
    pub fn from_path(
        db: &'db dyn Database,
        adapter: Box<dyn Adapter>,
        dir: &Path,
    ) -> Result<Self> {
        let migrations = migrations_from_path(dir)?;
        Self::with_migrations(db, adapter, migrations)
    }

    /// Build a migrator for an in-memory list of migrations.
    ///
    /// Creates the tracking table when absent and reads each migration's
    /// status from it. Rows for unknown ids are left alone.
    pub fn with_migrations(
        db: &'db dyn Database,
        adapter: Box<dyn Adapter>,
        migrations: Vec<Migration>,
    ) -> Result<Self> {
        let migrations = validate(migrations)?;

        db.execute_script(&adapter.create_migration_table_sql())
            .map_err(|e| {
                Error::Database(format!(
                    "failed to create tracking table {}: {e}",
                    adapter.table()
                ))
            })?;

        let mut migrator = Self {
            db,
            adapter,
            migrations,
            transactional: true,
        };
        migrator.reconcile()?;
        Ok(migrator)
    }

    /// Wrap each script and its tracking row change in one transaction.
    /// Enabled by default.
    pub fn transactional(mut self, enabled: bool) -> Self {
        self.transactional = enabled;
        self
    }

    fn reconcile(&mut self) -> Result<()> {
        let sql = self.adapter.get_migration_sql();
        for migration in self.migrations.values_mut() {
            let row = self.db.query_id(&sql, migration.id()).map_err(|e| {
                Error::Database(format!(
                    "failed to read status of migration {}: {e}",
                    migration.id()
                ))
            })?;
            let status = if row.is_some() {
                Status::Active
            } else {
                Status::Inactive
            };
            debug!("migration {} ({}) is {status}", migration.id(), migration.name());
            migration.set_status(status);
        }
        Ok(())
    }

    pub fn adapter(&self) -> &dyn Adapter {
        self.adapter.as_ref()
    }

    /// All migrations in ascending id order.
    pub fn migrations(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.values()
    }

    pub fn migration(&self, id: MigrationId) -> Option<&Migration> {
        self.migrations.get(&id)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Inactive migrations in the order `migrate` would apply them.
    pub fn pending(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.values().filter(|m| !m.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.migrations.values().filter(|m| m.is_active()).count()
    }

    /// Ids present in the tracking table with no matching loaded migration.
    pub fn orphaned_ids(&self) -> Result<Vec<MigrationId>> {
        let applied = self.db.query_ids(&self.adapter.select_applied_sql())?;
        Ok(applied
            .into_iter()
            .filter(|id| !self.migrations.contains_key(id))
            .collect())
    }

    /// Apply one migration given a textual direction (`"up"` or `"down"`).
    ///
    /// An unrecognized direction fails before touching the database.
    pub fn apply(&mut self, id: MigrationId, direction: &str) -> Result<()> {
        let direction: Direction = direction.parse()?;
        self.apply_migration(id, direction)
    }

    /// Run one migration's script in `direction` and record the result.
    ///
    /// On failure the migration keeps the status it had before the call.
    pub fn apply_migration(&mut self, id: MigrationId, direction: Direction) -> Result<()> {
        let migration = self
            .migrations
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("migration {id}")))?;

        let target = direction.target_status();
        if migration.status() == target {
            return Err(Error::Migration(format!(
                "migration {id} ({}) is already {target}",
                migration.name()
            )));
        }

        let log_sql = match direction {
            Direction::Up => self.adapter.migration_log_insert_sql(),
            Direction::Down => self.adapter.migration_log_delete_sql(),
        };

        info!("applying migration {id} ({}) {direction}", migration.name());
        self.run_step(migration, direction, &log_sql)
            .map_err(|e| Error::Execution {
                id,
                name: migration.name().to_string(),
                reason: e.to_string(),
            })?;

        if let Some(migration) = self.migrations.get_mut(&id) {
            migration.set_status(target);
        }
        Ok(())
    }

    fn run_step(&self, migration: &Migration, direction: Direction, log_sql: &str) -> Result<()> {
        let use_transaction = self.transactional && self.adapter.transactional_ddl();
        if self.transactional && !use_transaction {
            warn!(
                "{} cannot roll back DDL; migration {} runs without a transaction",
                self.adapter.dialect(),
                migration.id()
            );
        }

        if use_transaction {
            self.db.execute_script(self.adapter.begin_sql())?;
        }

        let outcome = self.execute_step(migration, direction, log_sql);
        if !use_transaction {
            return outcome;
        }

        // A failed COMMIT can leave the transaction open (deferred constraints).
        match outcome.and_then(|()| self.db.execute_script(self.adapter.commit_sql())) {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(rollback_err) = self.db.execute_script(self.adapter.rollback_sql()) {
                    warn!(
                        "failed to roll back migration {}: {rollback_err}",
                        migration.id()
                    );
                }
                Err(e)
            }
        }
    }

    fn execute_step(&self, migration: &Migration, direction: Direction, log_sql: &str) -> Result<()> {
        for command in self.adapter.split_commands(migration.script(direction)) {
            self.db.execute_script(&command)?;
        }

        let affected = self.db.execute_with_id(log_sql, migration.id())?;
        if direction == Direction::Down && affected == 0 {
            warn!(
                "migration {} had no row in {}",
                migration.id(),
                self.adapter.table()
            );
        }
        Ok(())
    }

    /// Apply every inactive migration in ascending id order.
    ///
    /// Stops at the first failure. Migrations applied before it stay applied.
    /// Returns the ids applied by this call.
    pub fn migrate(&mut self) -> Result<Vec<MigrationId>> {
        let pending: Vec<MigrationId> = self.pending().map(Migration::id).collect();
        if pending.is_empty() {
            info!("no pending migrations");
            return Ok(pending);
        }

        for &id in &pending {
            self.apply_migration(id, Direction::Up)?;
        }
        info!("applied {} migrations", pending.len());
        Ok(pending)
    }

    /// Revert the `n` highest-id active migrations, highest first.
    ///
    /// Asking for more than are active reverts all of them; `n = 0` does
    /// nothing. Stops at the first failure. Returns the ids reverted.
    pub fn rollback_n(&mut self, n: usize) -> Result<Vec<MigrationId>> {
        let targets: Vec<MigrationId> = self
            .migrations
            .values()
            .rev()
            .filter(|m| m.is_active())
            .take(n)
            .map(Migration::id)
            .collect();

        for &id in &targets {
            self.apply_migration(id, Direction::Down)?;
        }
        if !targets.is_empty() {
            info!("rolled back {} migrations", targets.len());
        }
        Ok(targets)
    }

    /// Revert the most recent active migration.
    pub fn rollback(&mut self) -> Result<Vec<MigrationId>> {
        self.rollback_n(1)
    }

    /// Revert every active migration.
    pub fn rollback_all(&mut self) -> Result<Vec<MigrationId>> {
        self.rollback_n(self.migrations.len())
    }
}
