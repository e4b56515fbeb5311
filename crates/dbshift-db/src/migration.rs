use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use dbshift_common::{Error, Result};

/// Ordering key of a migration. Ascending id is application order.
pub type MigrationId = i64;

/// Whether a migration's forward script is currently applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Inactive,
    Active,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => f.pad("inactive"),
            Self::Active => f.pad("active"),
        }
    }
}

/// Which of a migration's two scripts to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Status a migration ends up in after being applied in this direction.
    pub fn target_status(self) -> Status {
        match self {
            Self::Up => Status::Active,
            Self::Down => Status::Inactive,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.pad("up"),
            Self::Down => f.pad("down"),
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("up") {
            Ok(Self::Up)
        } else if s.eq_ignore_ascii_case("down") {
            Ok(Self::Down)
        } else {
            Err(Error::UnrecognizedDirection(s.to_string()))
        }
    }
}

impl TryFrom<&str> for Direction {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

/// A single versioned schema change with its forward and reverse scripts.
///
/// Status is owned by the migrator: a freshly built migration is always
/// inactive until reconciled against the tracking table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    id: MigrationId,
    name: String,
    up: String,
    down: String,
    status: Status,
}

impl Migration {
    pub fn new(
        id: MigrationId,
        name: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            up: up.into(),
            down: down.into(),
            status: Status::Inactive,
        }
    }

    pub fn id(&self) -> MigrationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn up(&self) -> &str {
        &self.up
    }

    pub fn down(&self) -> &str {
        &self.down
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Script run when applying in `direction`.
    pub fn script(&self, direction: Direction) -> &str {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
    }
}

/// Check a batch of migrations and index it by id.
///
/// Rejects non-positive ids and ids that appear more than once.
pub fn validate(migrations: Vec<Migration>) -> Result<BTreeMap<MigrationId, Migration>> {
    let mut by_id = BTreeMap::new();
    for migration in migrations {
        if migration.id <= 0 {
            return Err(Error::InvalidMigrationId(format!(
                "{} ({}): ids must be positive",
                migration.id, migration.name
            )));
        }
        let id = migration.id;
        if by_id.insert(id, migration).is_some() {
            return Err(Error::DuplicateMigration(id));
        }
    }
    Ok(by_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_migration_starts_inactive() {
        let m = Migration::new(1, "create_users", "CREATE TABLE users (id INTEGER)", "");
        assert_eq!(m.status(), Status::Inactive);
        assert!(!m.is_active());
        assert_eq!(m.script(Direction::Up), "CREATE TABLE users (id INTEGER)");
        assert_eq!(m.script(Direction::Down), "");
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("up".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("DOWN".parse::<Direction>().unwrap(), Direction::Down);
        assert_eq!(Direction::try_from("Up").unwrap(), Direction::Up);
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let err = "foo".parse::<Direction>().unwrap_err();
        assert!(matches!(err, Error::UnrecognizedDirection(ref d) if d == "foo"));
        assert!(Direction::try_from("").is_err());
    }

    #[test]
    fn direction_maps_to_target_status() {
        assert_eq!(Direction::Up.target_status(), Status::Active);
        assert_eq!(Direction::Down.target_status(), Status::Inactive);
    }

    #[test]
    fn validate_orders_by_id() {
        let batch = vec![
            Migration::new(110, "second", "", ""),
            Migration::new(100, "first", "", ""),
        ];
        let ids: Vec<_> = validate(batch).unwrap().into_keys().collect();
        assert_eq!(ids, vec![100, 110]);
    }

    #[test]
    fn validate_rejects_duplicates() {
        let batch = vec![
            Migration::new(7, "a", "", ""),
            Migration::new(7, "b", "", ""),
        ];
        assert!(matches!(validate(batch), Err(Error::DuplicateMigration(7))));
    }

    #[test]
    fn validate_rejects_zero_and_negative_ids() {
        assert!(matches!(
            validate(vec![Migration::new(0, "zero", "", "")]),
            Err(Error::InvalidMigrationId(_))
        ));
        assert!(matches!(
            validate(vec![Migration::new(-3, "neg", "", "")]),
            Err(Error::InvalidMigrationId(_))
        ));
    }

    #[test]
    fn validate_accepts_empty_scripts() {
        let map = validate(vec![Migration::new(1, "noop", "", "")]).unwrap();
        assert_eq!(map.len(), 1);
    }
}
