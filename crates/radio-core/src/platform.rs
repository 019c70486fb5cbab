use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

const APP_DIR: &str = "ascii-radio";

/// When set, external binaries are looked up on PATH only, skipping copies
/// bundled beside the executable.
static USE_SYSTEM_DEPS: AtomicBool = AtomicBool::new(false);

pub fn set_use_system_deps(use_system: bool) {
    USE_SYSTEM_DEPS.store(use_system, Ordering::Relaxed);
}

pub fn should_use_system_deps() -> bool {
    USE_SYSTEM_DEPS.load(Ordering::Relaxed)
}

#[cfg(unix)]
pub fn mpv_socket_name() -> String {
    format!(
        "{}/{}-mpv-{}.sock",
        std::env::temp_dir().display(),
        APP_DIR,
        std::process::id()
    )
}

#[cfg(windows)]
pub fn mpv_socket_name() -> String {
    format!("{}-mpv-{}", APP_DIR, std::process::id())
}

#[cfg(unix)]
pub fn mpv_socket_arg() -> String {
    format!("--input-ipc-server={}", mpv_socket_name())
}

#[cfg(windows)]
pub fn mpv_socket_arg() -> String {
    format!("--input-ipc-server=\\\\.\\pipe\\{}", mpv_socket_name())
}

pub fn data_dir() -> PathBuf {
    // XDG layout on macOS too, for consistency with Linux
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

/// External programs the radio drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Mpv,
    Ffmpeg,
}

impl Tool {
    fn stem(self) -> &'static str {
        match self {
            Tool::Mpv => "mpv",
            Tool::Ffmpeg => "ffmpeg",
        }
    }

    /// Environment variable holding an explicit path.
    pub fn env_override(self) -> &'static str {
        match self {
            Tool::Mpv => "MPV_PATH",
            Tool::Ffmpeg => "FFMPEG_PATH",
        }
    }

    fn file_names(self) -> Vec<String> {
        let stem = self.stem();
        if cfg!(windows) {
            vec![format!("{stem}.exe"), stem.to_string()]
        } else {
            vec![stem.to_string()]
        }
    }
}

/// Directories searched in order: beside the executable (and its `external/`
/// folder) unless system deps are forced, then every PATH entry.
fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if !should_use_system_deps() {
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(PathBuf::from))
        {
            dirs.push(exe_dir.join("external"));
            dirs.push(exe_dir);
        }
    }
    if let Some(path) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&path));
    }
    dirs
}

fn first_existing(dirs: &[PathBuf], names: &[String]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

pub fn find_tool(tool: Tool) -> Option<PathBuf> {
    let explicit = std::env::var_os(tool.env_override())
        .map(PathBuf::from)
        .filter(|p| p.is_file());
    explicit.or_else(|| first_existing(&search_dirs(), &tool.file_names()))
}

/// Find mpv for playback. `MPV_PATH` overrides the search.
pub fn find_mpv_binary() -> Option<PathBuf> {
    find_tool(Tool::Mpv)
}

/// Find ffmpeg for the analyser tap. `FFMPEG_PATH` overrides the search.
pub fn find_ffmpeg_binary() -> Option<PathBuf> {
    find_tool(Tool::Ffmpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirs_are_namespaced() {
        assert!(data_dir().ends_with(APP_DIR));
        assert!(config_dir().ends_with(APP_DIR));
    }

    #[test]
    fn socket_name_is_per_process() {
        assert!(mpv_socket_name().contains(&std::process::id().to_string()));
        assert!(mpv_socket_arg().starts_with("--input-ipc-server="));
    }

    #[test]
    fn search_takes_the_first_directory_that_has_the_file() {
        let root = std::env::temp_dir().join(format!("ascii-radio-lookup-{}", std::process::id()));
        let (a, b) = (root.join("a"), root.join("b"));
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(b.join("mpv"), b"").unwrap();

        let names = vec!["mpv".to_string()];
        assert_eq!(
            first_existing(&[a.clone(), b.clone()], &names),
            Some(b.join("mpv"))
        );
        std::fs::write(a.join("mpv"), b"").unwrap();
        assert_eq!(first_existing(&[a.clone(), b], &names), Some(a.join("mpv")));
        assert_eq!(first_existing(&[], &names), None);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn tool_names() {
        assert_eq!(Tool::Ffmpeg.env_override(), "FFMPEG_PATH");
        assert!(Tool::Mpv.file_names().contains(&"mpv".to_string()));
    }
}
