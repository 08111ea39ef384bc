use std::env;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Makes an installed tool directory discoverable by later lookups.
pub trait EnvironmentBinding: Send + Sync {
    fn name(&self) -> &str;

    /// Bind `dir`. Returns `Ok(false)` when it was already bound.
    fn ensure(&self, dir: &Path) -> io::Result<bool>;
}

/// Prepends a directory to a search-path variable of this process.
#[derive(Debug, Clone)]
pub struct ProcessPath {
    var: String,
}

impl ProcessPath {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for ProcessPath {
    fn default() -> Self {
        Self::new("PATH")
    }
}

impl EnvironmentBinding for ProcessPath {
    fn name(&self) -> &str {
        "process PATH"
    }

    fn ensure(&self, dir: &Path) -> io::Result<bool> {
        let current = env::var_os(&self.var).unwrap_or_default();
        if env::split_paths(&current).any(|p| p == dir) {
            return Ok(false);
        }

        let joined: OsString = env::join_paths(
            std::iter::once(dir.to_path_buf()).chain(env::split_paths(&current)),
        )
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: bindings run at the end of provisioning, after its HTTP
        // requests have finished, and callers provision before any session or
        // metadata lookup starts, so no engine process or resolver thread is
        // reading the environment. Readers left (progress rendering) go
        // through std, which serialises with `set_var`.
        unsafe { env::set_var(&self.var, joined) };
        Ok(true)
    }
}

/// Persists a directory into the user's durable search path.
///
/// On Windows this rewrites the per-user `Path` registry value in place and
/// broadcasts the environment change. Elsewhere an `export` line is appended
/// to a shell profile.
#[derive(Debug, Clone)]
pub struct PersistentPath {
    profile: PathBuf,
}

#[cfg_attr(windows, allow(dead_code))]
const PROFILE_MARKER: &str = "# added by tubefetch";

impl PersistentPath {
    pub fn new(profile: impl Into<PathBuf>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    pub fn profile(&self) -> &Path {
        &self.profile
    }

    #[cfg_attr(windows, allow(dead_code))]
    fn export_line(dir: &Path) -> String {
        format!("export PATH=\"{}:$PATH\"", dir.display())
    }

    #[cfg_attr(windows, allow(dead_code))]
    fn ensure_profile(&self, dir: &Path) -> io::Result<bool> {
        let line = Self::export_line(dir);
        let existing = match fs::read_to_string(&self.profile) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        if existing.lines().any(|l| l.trim() == line) {
            return Ok(false);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.profile)?;
        if !existing.is_empty() && !existing.ends_with('\n') {
            writeln!(file)?;
        }
        writeln!(file, "{}", PROFILE_MARKER)?;
        writeln!(file, "{}", line)?;
        Ok(true)
    }

    #[cfg(windows)]
    fn ensure_registry(&self, dir: &Path) -> io::Result<bool> {
        use winreg::RegKey;
        use winreg::enums::{HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, RegType};
        use winreg::types::{FromRegValue, ToRegValue};

        let key = RegKey::predef(HKEY_CURRENT_USER)
            .open_subkey_with_flags("Environment", KEY_READ | KEY_WRITE)?;
        let (current, kind) = match key.get_raw_value("Path") {
            Ok(raw) => (String::from_reg_value(&raw)?, raw.vtype),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                (String::new(), RegType::REG_EXPAND_SZ)
            }
            Err(e) => return Err(e),
        };

        let Some(updated) = prepend_entry(&current, &dir.to_string_lossy()) else {
            return Ok(false);
        };
        let mut value = updated.to_reg_value();
        value.vtype = kind;
        key.set_raw_value("Path", &value)?;

        broadcast_environment_change();
        Ok(true)
    }
}

/// `current` with `wanted` in front, or `None` when it is already listed.
#[cfg_attr(not(windows), allow(dead_code))]
fn prepend_entry(current: &str, wanted: &str) -> Option<String> {
    let current = current.trim_end_matches(';');
    if current
        .split(';')
        .any(|entry| entry.trim().eq_ignore_ascii_case(wanted))
    {
        return None;
    }
    if current.is_empty() {
        Some(wanted.to_string())
    } else {
        Some(format!("{};{}", wanted, current))
    }
}

#[cfg(windows)]
fn broadcast_environment_change() {
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        HWND_BROADCAST, SMTO_ABORTIFHUNG, SendMessageTimeoutW, WM_SETTINGCHANGE,
    };

    let area: Vec<u16> = "Environment".encode_utf16().chain(Some(0)).collect();
    let mut result = 0usize;
    // SAFETY: `area` is a NUL-terminated UTF-16 string that outlives the call,
    // and `result` is a valid out pointer.
    let sent = unsafe {
        SendMessageTimeoutW(
            HWND_BROADCAST,
            WM_SETTINGCHANGE,
            0,
            area.as_ptr() as isize,
            SMTO_ABORTIFHUNG,
            5000,
            &mut result,
        )
    };
    if sent == 0 {
        tracing::debug!("Environment change broadcast timed out");
    }
}

impl Default for PersistentPath {
    fn default() -> Self {
        let home = directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".profile"))
    }
}

impl EnvironmentBinding for PersistentPath {
    fn name(&self) -> &str {
        "user environment"
    }

    #[cfg(windows)]
    fn ensure(&self, dir: &Path) -> io::Result<bool> {
        self.ensure_registry(dir)
    }

    #[cfg(not(windows))]
    fn ensure(&self, dir: &Path) -> io::Result<bool> {
        self.ensure_profile(dir)
    }
}
