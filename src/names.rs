//! Validated Cloud Spanner resource names.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

static INSTANCE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^projects/(?P<project>[^/]+)/instances/(?P<instance>[a-z][-a-z0-9]*)$").unwrap());

static BACKUP_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^projects/(?P<project>[^/]+)/instances/(?P<instance>[a-z][-a-z0-9]*)/backups/(?P<backup>[a-z][a-z0-9_\-]*[a-z0-9])$",
    )
    .unwrap()
});

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("invalid instance name {0:?}: expected projects/<project>/instances/<instance_id>")]
    InvalidInstanceName(String),
    #[error("invalid backup name {0:?}: expected projects/<project>/instances/<instance_id>/backups/<backup_id>")]
    InvalidBackupName(String),
}

/// `projects/<project>/instances/<instance_id>`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceName {
    pub project: String,
    pub instance_id: String,
}

impl FromStr for InstanceName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = INSTANCE_NAME_RE
            .captures(s)
            .ok_or_else(|| NameError::InvalidInstanceName(s.to_string()))?;
        Ok(InstanceName {
            project: caps["project"].to_string(),
            instance_id: caps["instance"].to_string(),
        })
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/instances/{}", self.project, self.instance_id)
    }
}

/// `projects/<project>/instances/<instance_id>/backups/<backup_id>`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BackupName {
    pub project: String,
    pub instance_id: String,
    pub backup_id: String,
}

impl FromStr for BackupName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = BACKUP_NAME_RE
            .captures(s)
            .ok_or_else(|| NameError::InvalidBackupName(s.to_string()))?;
        Ok(BackupName {
            project: caps["project"].to_string(),
            instance_id: caps["instance"].to_string(),
            backup_id: caps["backup"].to_string(),
        })
    }
}

impl fmt::Display for BackupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/instances/{}/backups/{}",
            self.project, self.instance_id, self.backup_id
        )
    }
}
