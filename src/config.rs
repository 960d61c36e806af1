use crate::settings::{SettingChange, Settings};
use crate::store::{Persistence, SETTINGS_KEY};
use crate::visibility::{VisibilityController, WindowHost};
use eyre::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    data_dir: PathBuf,
    store_path: PathBuf,
}

impl Config {
    /// Resolve the data directory. `store_path` overrides the default database file.
    pub fn new(store_path: Option<PathBuf>) -> Result<Self> {
        let data_dir = get_app_data_prefix()?;
        let store_path = store_path.unwrap_or_else(|| data_dir.join("store.db"));
        Ok(Self {
            settings: Settings::default(),
            data_dir,
            store_path,
        })
    }

    pub fn with_settings(settings: Settings, data_dir: &Path) -> Self {
        Self {
            settings,
            data_dir: data_dir.to_path_buf(),
            store_path: data_dir.join("store.db"),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("glance.log")
    }

    /// Overlay persisted settings on the defaults.
    pub fn load_settings(&mut self, persistence: &Persistence) {
        let mut settings = Settings::default();
        if let Some(saved) = persistence.load::<Settings>(SETTINGS_KEY) {
            settings.merge(saved);
        }
        self.settings = settings;
    }

    pub fn save(&self, persistence: &mut Persistence) {
        persistence.submit(SETTINGS_KEY, &self.settings);
    }

    pub fn reset(&mut self, persistence: &mut Persistence) {
        self.settings = Settings::default();
        self.save(persistence);
    }

    /// Push the window-related settings to the overlay.
    pub fn apply_to_window<H: WindowHost>(&self, visibility: &mut VisibilityController<H>) {
        visibility.host_mut().set_opacity(self.settings.opacity);
        visibility
            .host_mut()
            .set_always_on_top(self.settings.always_on_top);
        visibility.set_auto_hide_enabled(self.settings.auto_hide_on_mouse_leave);
    }

    /// Change one setting, persist, and apply its side effect on the window.
    pub fn update_setting<H: WindowHost>(
        &mut self,
        change: SettingChange,
        persistence: &mut Persistence,
        visibility: &mut VisibilityController<H>,
    ) {
        change.apply(&mut self.settings);
        self.save(persistence);

        match change {
            SettingChange::Opacity(_) => visibility.host_mut().set_opacity(self.settings.opacity),
            SettingChange::AlwaysOnTop(on_top) => visibility.host_mut().set_always_on_top(on_top),
            SettingChange::AutoHideOnMouseLeave(enabled) => {
                visibility.set_auto_hide_enabled(enabled)
            }
            _ => {}
        }
    }
}

pub fn get_app_data_prefix() -> Result<PathBuf> {
    if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
        let path = PathBuf::from(config_home).join("glance");
        return Ok(path);
    } else if let Some(home) = std::env::var_os("HOME") {
        let path = PathBuf::from(home.clone()).join(".config").join("glance");
        if path.exists() {
            return Ok(path);
        } else {
            return Ok(PathBuf::from(home).join(".glance"));
        }
    } else if let Some(user_profile) = std::env::var_os("USERPROFILE") {
        return Ok(PathBuf::from(user_profile).join(".glance"));
    }

    Err(eyre::eyre!(
        "Could not determine application data directory"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{Bounds, Point};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use std::env;
    use std::rc::Rc;
    use std::sync::{Mutex, OnceLock};
    use tempfile::tempdir;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .expect("lock env mutex")
    }

    struct SavedEnv {
        home: Option<std::ffi::OsString>,
        xdg_config_home: Option<std::ffi::OsString>,
        userprofile: Option<std::ffi::OsString>,
    }

    impl SavedEnv {
        fn capture() -> Self {
            Self {
                home: env::var_os("HOME"),
                xdg_config_home: env::var_os("XDG_CONFIG_HOME"),
                userprofile: env::var_os("USERPROFILE"),
            }
        }

        fn restore(self) {
            unsafe {
                match self.home {
                    Some(home) => env::set_var("HOME", home),
                    None => env::remove_var("HOME"),
                }
                match self.xdg_config_home {
                    Some(xdg) => env::set_var("XDG_CONFIG_HOME", xdg),
                    None => env::remove_var("XDG_CONFIG_HOME"),
                }
                match self.userprofile {
                    Some(profile) => env::set_var("USERPROFILE", profile),
                    None => env::remove_var("USERPROFILE"),
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingWindow {
        opacity: Option<u8>,
        on_top: Option<bool>,
    }

    impl WindowHost for RecordingWindow {
        fn show(&mut self) {}
        fn hide(&mut self) {}
        fn is_visible(&self) -> bool {
            true
        }
        fn bounds(&self) -> Bounds {
            Bounds::default()
        }
        fn set_opacity(&mut self, percent: u8) {
            self.opacity = Some(percent);
        }
        fn set_always_on_top(&mut self, on_top: bool) {
            self.on_top = Some(on_top);
        }
        fn cursor_position(&self) -> Point {
            Point::default()
        }
    }

    #[test]
    fn test_prefix_prefers_xdg_config_home() -> Result<()> {
        let _env_lock = lock_env();
        let saved = SavedEnv::capture();
        let dir = tempdir()?;
        unsafe {
            env::set_var("XDG_CONFIG_HOME", dir.path());
            env::remove_var("USERPROFILE");
        }

        let config = Config::new(None)?;
        assert_eq!(config.data_dir(), dir.path().join("glance"));
        assert_eq!(config.store_path(), dir.path().join("glance").join("store.db"));
        assert_eq!(config.log_path(), dir.path().join("glance").join("glance.log"));

        saved.restore();
        Ok(())
    }

    #[test]
    fn test_prefix_falls_back_to_home_dotdir() -> Result<()> {
        let _env_lock = lock_env();
        let saved = SavedEnv::capture();
        let dir = tempdir()?;
        unsafe {
            env::remove_var("XDG_CONFIG_HOME");
            env::set_var("HOME", dir.path());
        }
        assert_eq!(get_app_data_prefix()?, dir.path().join(".glance"));

        std::fs::create_dir_all(dir.path().join(".config").join("glance"))?;
        assert_eq!(get_app_data_prefix()?, dir.path().join(".config").join("glance"));

        saved.restore();
        Ok(())
    }

    #[test]
    fn test_store_path_override() -> Result<()> {
        let _env_lock = lock_env();
        let saved = SavedEnv::capture();
        let dir = tempdir()?;
        unsafe {
            env::set_var("XDG_CONFIG_HOME", dir.path());
        }
        let custom = dir.path().join("custom.db");
        let config = Config::new(Some(custom.clone()))?;
        assert_eq!(config.store_path(), custom);

        saved.restore();
        Ok(())
    }

    #[test]
    fn test_settings_roundtrip_through_store() {
        let store = MemoryStore::new();
        let mut persistence = Persistence::new(Box::new(store.clone()));
        let dir = tempdir().unwrap();

        let mut config = Config::with_settings(Settings::default(), dir.path());
        config.settings.display_lines = 3;
        config.save(&mut persistence);
        persistence.flush();

        let mut reloaded = Config::with_settings(Settings::default(), dir.path());
        reloaded.load_settings(&persistence);
        assert_eq!(reloaded.settings.display_lines, 3);

        reloaded.reset(&mut persistence);
        persistence.flush();
        reloaded.load_settings(&persistence);
        assert_eq!(reloaded.settings, Settings::default());
    }

    #[test]
    fn test_update_setting_side_effects() {
        let store = MemoryStore::new();
        let mut persistence = Persistence::new(Box::new(store.clone()));
        let clock = Rc::new(ManualClock::new(Utc::now()));
        let mut visibility = VisibilityController::new(RecordingWindow::default(), clock);
        let dir = tempdir().unwrap();
        let mut config = Config::with_settings(Settings::default(), dir.path());

        config.apply_to_window(&mut visibility);
        assert_eq!(visibility.host().opacity, Some(90));
        assert_eq!(visibility.host().on_top, Some(true));
        assert!(visibility.is_polling());

        config.update_setting(SettingChange::Opacity(40), &mut persistence, &mut visibility);
        assert_eq!(visibility.host().opacity, Some(40));

        config.update_setting(SettingChange::AlwaysOnTop(false), &mut persistence, &mut visibility);
        assert_eq!(visibility.host().on_top, Some(false));

        config.update_setting(SettingChange::AutoHideOnMouseLeave(false), &mut persistence, &mut visibility);
        assert!(!visibility.is_polling());
        assert!(!config.settings.auto_hide_on_mouse_leave);

        persistence.flush();
        let saved: Settings = serde_json::from_value(store.value(SETTINGS_KEY).unwrap()).unwrap();
        assert_eq!(saved.opacity, 40);
        assert!(!saved.always_on_top);
    }
}
