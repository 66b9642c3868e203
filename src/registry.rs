//! The site registry: the JSON list of monitored sites.
//!
//! ```json
//! [
//!   { "sitename": "example.com", "contact": "ops@example.com" },
//!   { "sitename": "intranet.example.com", "port": 8443, "enable": false },
//!   { "sitename": "shop.example.com", "contact": "shop@example.com", "ending_date": "2025-09-08" }
//! ]
//! ```
//!
//! Loading is fail-soft per entry: a malformed entry is reported as a
//! [`RegistryWarning`] and skipped, and is written back untouched when the
//! registry is persisted. Only an unreadable file or a root that is not a list
//! fails the whole load.

use crate::error::RegistryError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

pub const DEFAULT_PORT: u16 = 443;

const MARKER_FORMAT: &str = "%Y-%m-%d";

/// One monitored endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(rename = "sitename")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(rename = "enable", default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    /// Expiry date (UTC) of the certificate a reminder was last sent for.
    #[serde(rename = "ending_date", default, skip_serializing_if = "Option::is_none")]
    pub last_reminder_expiry: Option<String>,
    /// Fields this tool does not interpret, kept for round-tripping.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Site {
    pub fn new(name: &str) -> Self {
        Site {
            name: name.to_string(),
            port: None,
            enabled: None,
            contact: None,
            last_reminder_expiry: None,
            extra: Map::new(),
        }
    }

    /// Hostname to connect to. A sitename written as a URL is reduced to its host.
    pub fn host(&self) -> String {
        match parse_url_sitename(&self.name) {
            Some((host, _)) => host,
            None => self.name.trim().to_string(),
        }
    }

    /// Explicit port, else the port of a URL-style sitename, else 443.
    pub fn port(&self) -> u16 {
        self.port
            .or_else(|| parse_url_sitename(&self.name).and_then(|(_, port)| port))
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Notification address, `None` when absent or blank.
    pub fn contact(&self) -> Option<&str> {
        self.contact
            .as_deref()
            .map(str::trim)
            .filter(|contact| !contact.is_empty())
    }

    /// The stored dedup marker. An unparsable value counts as no marker.
    pub fn reminder_marker(&self) -> Option<NaiveDate> {
        let raw = self.last_reminder_expiry.as_deref()?;
        match NaiveDate::parse_from_str(raw.trim(), MARKER_FORMAT) {
            Ok(date) => Some(date),
            Err(e) => {
                debug!(site = %self.name, marker = raw, "ignoring unparsable ending_date: {}", e);
                None
            }
        }
    }

    /// Records that the reminder for the cycle expiring on `expiry` was sent.
    ///
    /// The marker only ever moves forward; returns whether it changed.
    pub fn record_reminder(&mut self, expiry: NaiveDate) -> bool {
        if let Some(current) = self.reminder_marker() {
            if current >= expiry {
                return false;
            }
        }
        self.last_reminder_expiry = Some(expiry.format(MARKER_FORMAT).to_string());
        true
    }
}

fn parse_url_sitename(name: &str) -> Option<(String, Option<u16>)> {
    let name = name.trim();
    if !name.contains("://") {
        return None;
    }
    let url = Url::parse(name).ok()?;
    let host = url.host_str()?.to_string();
    Some((host, url.port()))
}

/// A registry entry that was skipped during load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryWarning {
    /// 1-based position of the entry in the file
    pub entry: usize,
    pub reason: String,
}

impl fmt::Display for RegistryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entry #{} {}. Skipped.", self.entry, self.reason)
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Site(Site),
    Skipped(Value),
}

/// The loaded registry, bound to the file it came from.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    entries: Vec<Entry>,
}

impl Registry {
    /// Reads and validates the registry at `path`.
    ///
    /// Returns the registry together with one warning per skipped entry.
    pub fn load<P: AsRef<Path>>(
        path: P,
    ) -> Result<(Registry, Vec<RegistryWarning>), RegistryError> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).map_err(|source| RegistryError::Io {
            path: path.clone(),
            source,
        })?;
        let root: Value = serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
            path: path.clone(),
            source,
        })?;
        let (entries, warnings) = Self::validate(root, &path)?;
        Ok((Registry { path, entries }, warnings))
    }

    /// Builds an in-memory registry from already valid sites.
    pub fn from_sites<P: AsRef<Path>>(path: P, sites: Vec<Site>) -> Self {
        Registry {
            path: path.as_ref().to_path_buf(),
            entries: sites.into_iter().map(Entry::Site).collect(),
        }
    }

    fn validate(
        root: Value,
        path: &Path,
    ) -> Result<(Vec<Entry>, Vec<RegistryWarning>), RegistryError> {
        let items = match root {
            Value::Array(items) => items,
            _ => {
                return Err(RegistryError::NotAList {
                    path: path.to_path_buf(),
                })
            }
        };

        let mut entries = Vec::with_capacity(items.len());
        let mut warnings = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            match parse_entry(&item) {
                Ok(site) => entries.push(Entry::Site(site)),
                Err(reason) => {
                    warnings.push(RegistryWarning {
                        entry: index + 1,
                        reason,
                    });
                    entries.push(Entry::Skipped(item));
                }
            }
        }
        Ok((entries, warnings))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Valid sites in file order.
    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Site(site) => Some(site),
            Entry::Skipped(_) => None,
        })
    }

    pub fn sites_mut(&mut self) -> impl Iterator<Item = &mut Site> {
        self.entries.iter_mut().filter_map(|entry| match entry {
            Entry::Site(site) => Some(site),
            Entry::Skipped(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.sites().next().is_none()
    }

    /// Writes the registry back to its file.
    ///
    /// The new content goes to a temporary file next to the registry first;
    /// the current file is then moved to `<path>.bak` and the temporary file
    /// renamed into place, so the last good state always survives on disk.
    /// An existing file keeps its permissions.
    pub fn persist(&self) -> Result<(), RegistryError> {
        let values = self
            .entries
            .iter()
            .map(|entry| match entry {
                Entry::Site(site) => serde_json::to_value(site),
                Entry::Skipped(value) => Ok(value.clone()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut content = serde_json::to_string_pretty(&values)?;
        content.push('\n');

        let persist_err = |source: std::io::Error| RegistryError::Persist {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(persist_err)?;
        staged.write_all(content.as_bytes()).map_err(persist_err)?;
        staged.as_file().sync_all().map_err(persist_err)?;

        if self.path.exists() {
            let permissions = fs::metadata(&self.path).map_err(persist_err)?.permissions();
            staged
                .as_file()
                .set_permissions(permissions)
                .map_err(persist_err)?;
            fs::copy(&self.path, backup_path(&self.path)).map_err(persist_err)?;
        }
        staged
            .persist(&self.path)
            .map_err(|e| persist_err(e.error))?;
        Ok(())
    }
}

/// `sites.json` is backed up as `sites.json.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

fn parse_entry(item: &Value) -> Result<Site, String> {
    let object = item
        .as_object()
        .ok_or_else(|| "is not an object".to_string())?;

    match object.get("sitename") {
        Some(Value::String(name)) if !name.trim().is_empty() => {}
        _ => return Err("missing valid 'sitename'".to_string()),
    }
    if let Some(enable) = object.get("enable") {
        if !enable.is_boolean() {
            return Err("'enable' must be boolean".to_string());
        }
    }
    if let Some(contact) = object.get("contact") {
        if !contact.is_string() && !contact.is_null() {
            return Err("'contact' must be a string".to_string());
        }
    }

    let mut object = object.clone();
    let port = normalize_port(object.get("port"))?;
    match port {
        Some(port) => object.insert("port".to_string(), Value::from(port)),
        None => object.remove("port"),
    };
    if let Some(marker) = object.get("ending_date") {
        if !marker.is_string() {
            debug!("dropping non-string ending_date {}", marker);
            object.remove("ending_date");
        }
    }

    serde_json::from_value(Value::Object(object)).map_err(|e| e.to_string())
}

/// Accepts a port number or numeric string; null, zero and "" mean the default.
fn normalize_port(value: Option<&Value>) -> Result<Option<u16>, String> {
    let invalid = || "'port' must be an integer between 1 and 65535".to_string();
    let number = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(invalid)?,
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| invalid())?,
        Some(_) => return Err(invalid()),
    };
    if number == 0 {
        return Ok(None);
    }
    u16::try_from(number).map(Some).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn write_registry(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_defaults() {
        let file = write_registry(r#"[{"sitename": "example.com"}]"#);
        let (registry, warnings) = Registry::load(file.path()).unwrap();
        assert!(warnings.is_empty());

        let site = registry.sites().next().unwrap();
        assert_eq!(site.host(), "example.com");
        assert_eq!(site.port(), 443);
        assert!(site.is_enabled());
        assert_eq!(site.contact(), None);
        assert_eq!(site.reminder_marker(), None);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let file = write_registry(
            r#"[
                {"sitename": "good.example.com", "port": 8443},
                {"port": 443},
                "not an object",
                {"sitename": "bad-enable.example.com", "enable": "yes"},
                {"sitename": "bad-port.example.com", "port": 70000},
                {"sitename": "other.example.com", "enable": false}
            ]"#,
        );
        let (registry, warnings) = Registry::load(file.path()).unwrap();

        let names: Vec<&str> = registry.sites().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["good.example.com", "other.example.com"]);

        let skipped: Vec<usize> = warnings.iter().map(|w| w.entry).collect();
        assert_eq!(skipped, [2, 3, 4, 5]);
        assert_eq!(
            warnings[0].to_string(),
            "Entry #2 missing valid 'sitename'. Skipped."
        );
    }

    #[test]
    fn test_root_must_be_a_list() {
        let file = write_registry(r#"{"sitename": "example.com"}"#);
        let err = Registry::load(file.path()).unwrap_err();
        assert!(matches!(err, RegistryError::NotAList { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_registry("[{\"sitename\": ");
        let err = Registry::load(file.path()).unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = Registry::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
    }

    #[test]
    fn test_port_forms() {
        assert_eq!(normalize_port(Some(&json!("8443"))), Ok(Some(8443)));
        assert_eq!(normalize_port(Some(&json!(0))), Ok(None));
        assert_eq!(normalize_port(Some(&json!(""))), Ok(None));
        assert_eq!(normalize_port(Some(&Value::Null)), Ok(None));
        assert!(normalize_port(Some(&json!(-1))).is_err());
        assert!(normalize_port(Some(&json!("https"))).is_err());
    }

    #[test]
    fn test_url_sitename() {
        let site = Site::new("https://secure.example.com:9443/health");
        assert_eq!(site.host(), "secure.example.com");
        assert_eq!(site.port(), 9443);

        let site = Site::new("https://example.com");
        assert_eq!(site.host(), "example.com");
        assert_eq!(site.port(), 443);

        let mut site = Site::new(" example.com ");
        site.port = Some(8443);
        assert_eq!(site.host(), "example.com");
        assert_eq!(site.port(), 8443);
    }

    #[test]
    fn test_blank_contact_is_none() {
        let mut site = Site::new("example.com");
        site.contact = Some("   ".to_string());
        assert_eq!(site.contact(), None);
    }

    #[test]
    fn test_unparsable_marker_is_absent() {
        let mut site = Site::new("example.com");
        site.last_reminder_expiry = Some("08/09/2025".to_string());
        assert_eq!(site.reminder_marker(), None);

        let date = NaiveDate::from_ymd_opt(2025, 9, 8).unwrap();
        assert!(site.record_reminder(date));
        assert_eq!(site.last_reminder_expiry.as_deref(), Some("2025-09-08"));
    }

    #[test]
    fn test_marker_never_moves_backwards() {
        let mut site = Site::new("example.com");
        site.last_reminder_expiry = Some("2025-09-08".to_string());

        assert!(!site.record_reminder(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
        assert!(!site.record_reminder(NaiveDate::from_ymd_opt(2025, 9, 8).unwrap()));
        assert!(site.record_reminder(NaiveDate::from_ymd_opt(2025, 12, 7).unwrap()));
        assert_eq!(site.last_reminder_expiry.as_deref(), Some("2025-12-07"));
    }

    #[test]
    fn test_persist_keeps_backup_and_skipped_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sites.json");
        let original = r#"[
  {"sitename": "example.com", "contact": "ops@example.com", "owner": "web team"},
  {"port": 443}
]
"#;
        fs::write(&path, original).unwrap();

        let (mut registry, warnings) = Registry::load(&path).unwrap();
        assert_eq!(warnings.len(), 1);
        let site = registry.sites_mut().next().unwrap();
        site.record_reminder(NaiveDate::from_ymd_opt(2025, 9, 8).unwrap());
        registry.persist().unwrap();

        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), original);

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            written,
            json!([
                {
                    "sitename": "example.com",
                    "contact": "ops@example.com",
                    "owner": "web team",
                    "ending_date": "2025-09-08"
                },
                {"port": 443}
            ])
        );

        let (reloaded, _) = Registry::load(&path).unwrap();
        let site = reloaded.sites().next().unwrap();
        assert_eq!(
            site.reminder_marker(),
            NaiveDate::from_ymd_opt(2025, 9, 8)
        );
    }

    #[test]
    fn test_null_enable_is_skipped() {
        let file = write_registry(
            r#"[{"sitename": "a.example.com", "enable": null}, {"sitename": "b.example.com"}]"#,
        );
        let (registry, warnings) = Registry::load(file.path()).unwrap();

        let names: Vec<&str> = registry.sites().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["b.example.com"]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].to_string(),
            "Entry #1 'enable' must be boolean. Skipped."
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("sites.json");
        fs::write(&path, r#"[{"sitename": "example.com"}]"#).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let (mut registry, _) = Registry::load(&path).unwrap();
        let site = registry.sites_mut().next().unwrap();
        assert!(site.record_reminder(NaiveDate::from_ymd_opt(2025, 9, 8).unwrap()));
        registry.persist().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_persist_new_file_has_no_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sites.json");
        let registry = Registry::from_sites(&path, vec![Site::new("example.com")]);
        registry.persist().unwrap();

        assert!(path.exists());
        assert!(!backup_path(&path).exists());
        assert!(fs::read_to_string(&path).unwrap().ends_with("]\n"));
    }
}
