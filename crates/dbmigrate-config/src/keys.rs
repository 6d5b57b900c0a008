//! Setting keys.
//!
//! Every key doubles as the environment variable name and as the
//! [`DefaultSettings`](crate::DefaultSettings) key. The literal fallback used
//! when neither layer provides a value is stored alongside the name.

/// A configuration key and its last-resort literal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SettingKey {
    /// Environment variable / defaults-map key.
    pub name: &'static str,
    /// Value used when neither the environment nor the defaults map has one.
    pub fallback: &'static str,
}

impl SettingKey {
    const fn new(name: &'static str, fallback: &'static str) -> Self {
        Self { name, fallback }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Determines the migrator's logging verbosity.
pub const VERBOSE_LOGGING: SettingKey = SettingKey::new("VERBOSE_LOGGING", "false");

/// Host the migrator connects to.
pub const POSTGRES_HOST: SettingKey = SettingKey::new("POSTGRES_HOST", "localhost");

/// Port the migrator connects to.
pub const POSTGRES_PORT: SettingKey = SettingKey::new("POSTGRES_PORT", "5432");

/// User to connect as.
pub const POSTGRES_USER: SettingKey = SettingKey::new("POSTGRES_USER", "");

/// Password to connect with. Unset or empty means the migrator should
/// authenticate with an IAM auth token instead.
pub const POSTGRES_PASSWORD: SettingKey = SettingKey::new("POSTGRES_PASSWORD", "");

/// Database the migrations run in.
pub const POSTGRES_DATABASE: SettingKey = SettingKey::new("POSTGRES_DATABASE", "postgres");

/// Schema the migrator creates if necessary and runs in.
pub const POSTGRES_SCHEMA: SettingKey = SettingKey::new("POSTGRES_SCHEMA", "");

/// All keys, in resolution order.
pub const ALL: [SettingKey; 7] = [
    VERBOSE_LOGGING,
    POSTGRES_HOST,
    POSTGRES_PORT,
    POSTGRES_USER,
    POSTGRES_PASSWORD,
    POSTGRES_DATABASE,
    POSTGRES_SCHEMA,
];

/// Look up a key by its name.
#[must_use]
pub fn by_name(name: &str) -> Option<SettingKey> {
    ALL.iter().copied().find(|k| k.name == name)
}
