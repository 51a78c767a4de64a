use adw::Application;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::models::{SenderRole, Session};
use crate::error::{ClientError, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub api_url: String,
    pub backend_url: String,
    pub anon_key: String,
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub role: Option<SenderRole>,
    pub display_name: Option<String>,
    pub currency: String,
    pub page_size: u32,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            backend_url: String::new(),
            anon_key: String::new(),
            access_token: None,
            user_id: None,
            role: None,
            display_name: None,
            currency: "TL".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("catering-chat.toml"))
    }

    /// Reads the saved state, falling back to defaults when nothing usable is on disk.
    pub fn load() -> Self {
        let Some(path) = Self::toml_path() else {
            return Self::new();
        };
        if !path.exists() {
            return Self::new();
        }
        match Self::load_from(&path) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("Ignoring unreadable config {}: {e}", path.display());
                Self::new()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str::<AppState>(&text).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::toml_path().ok_or_else(|| ClientError::Config("no config dir".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))?;
        fs::write(path, toml)?;
        Ok(())
    }

    /// Whether the endpoints needed to sign in are known.
    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.backend_url.is_empty() && !self.anon_key.is_empty()
    }

    pub fn session(&self) -> Option<Session> {
        Some(Session {
            access_token: self.access_token.clone()?,
            user_id: self.user_id.clone()?,
            role: self.role?,
            display_name: self.display_name.clone(),
        })
    }

    pub fn apply_session(&mut self, session: &Session) {
        self.access_token = Some(session.access_token.clone());
        self.user_id = Some(session.user_id.clone());
        self.role = Some(session.role);
        self.display_name = session.display_name.clone();
    }

    pub fn sign_out(&mut self) {
        self.access_token = None;
        self.user_id = None;
        self.role = None;
        self.display_name = None;
    }
}

pub fn build_ui(app: &Application) {
    let state = AppState::load();
    match state.session() {
        Some(session) if state.is_configured() => crate::ui::main_window::show_main_window(app, session),
        _ => crate::ui::login::show_login_window(app),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            access_token: "jwt".into(),
            user_id: "u-1".into(),
            role: SenderRole::Vendor,
            display_name: Some("Lezzet Catering".into()),
        }
    }

    #[test]
    fn state_round_trips_through_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catering-chat.toml");
        let mut state = AppState {
            api_url: "https://app.example.com".into(),
            backend_url: "https://db.example.com".into(),
            anon_key: "anon".into(),
            ..AppState::default()
        };
        state.apply_session(&session());
        state.save_to(&path).unwrap();

        let loaded = AppState::load_from(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.session(), Some(session()));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "api_url = \"https://app.example.com\"\n").unwrap();
        let loaded = AppState::load_from(&path).unwrap();
        assert_eq!(loaded.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(loaded.currency, "TL");
        assert!(!loaded.is_configured());
        assert!(loaded.session().is_none());
    }

    #[test]
    fn sign_out_clears_credentials_only() {
        let mut state = AppState { anon_key: "anon".into(), ..AppState::default() };
        state.apply_session(&session());
        state.sign_out();
        assert!(state.session().is_none());
        assert_eq!(state.anon_key, "anon");
    }

    #[test]
    fn broken_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "page_size = \"many\"").unwrap();
        assert!(matches!(AppState::load_from(&path), Err(ClientError::Config(_))));
    }
}
