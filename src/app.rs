use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::backend::session::SessionStore;
use crate::backend::{Backend, BackendError, Session, SignUpOutcome};
use crate::card::share::share_url;
use crate::card::{Card, NewCard};
use crate::config::AppConfig;

/// How long a toast stays on screen
const TOAST_DURATION: Duration = Duration::from_secs(3);

/// Minimum password length accepted on sign-up
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Loading, // Restoring a saved session
    Auth,
    Cards,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    Help,
    ConfirmSignOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Email,
    Password,
}

/// Which box has the keyboard on the cards screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardsFocus {
    Compose,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub shown_at: Instant,
}

#[derive(Debug, Clone)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub field: AuthField,
    pub loading: bool,
}

impl Default for AuthForm {
    fn default() -> Self {
        Self {
            mode: AuthMode::SignIn,
            email: String::new(),
            password: String::new(),
            field: AuthField::Email,
            loading: false,
        }
    }
}

impl AuthForm {
    /// Switch between sign-in and sign-up, clearing the inputs
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        };
        self.email.clear();
        self.password.clear();
        self.field = AuthField::Email;
    }

    fn input_mut(&mut self) -> &mut String {
        match self.field {
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
        }
    }
}

/// Network work queued by a key press, run after the next frame is drawn
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RestoreSession,
    SignIn,
    SignUp,
    LoadCards,
    CreateCard(NewCard),
    SignOut,
}

pub struct App {
    pub screen: Screen,
    pub popup: Popup,

    pub auth: AuthForm,

    // Cards screen
    pub focus: CardsFocus,
    pub compose: String,
    pub cards: Vec<Card>,
    pub selected: usize,
    pub revealed: HashSet<Uuid>,
    pub creating: bool,
    pub loading_cards: bool,
    pub last_share_url: Option<String>,

    pub session: Option<Session>,
    pub toast: Option<Toast>,

    pending: Option<Action>,
    backend: Arc<dyn Backend>,
    sessions: Option<SessionStore>,

    share_base: String,
    copy_links: bool,
    notifications: bool,
}

impl App {
    /// Create the app. `sessions` is None when sessions are not remembered.
    pub fn new(backend: Arc<dyn Backend>, config: &AppConfig, sessions: Option<SessionStore>) -> Self {
        Self {
            screen: Screen::Loading,
            popup: Popup::None,

            auth: AuthForm::default(),

            focus: CardsFocus::Compose,
            compose: String::new(),
            cards: Vec::new(),
            selected: 0,
            revealed: HashSet::new(),
            creating: false,
            loading_cards: false,
            last_share_url: None,

            session: None,
            toast: None,

            pending: Some(Action::RestoreSession),
            backend,
            sessions,

            share_base: config.share_base(),
            copy_links: config.copy_links,
            notifications: config.notifications,
        }
    }

    /// Whether a bare `q` should quit (i.e. no text input has the keyboard)
    pub fn accepts_quit_key(&self) -> bool {
        self.popup == Popup::None
            && match self.screen {
                Screen::Loading => true,
                Screen::Auth => false,
                Screen::Cards => self.focus == CardsFocus::List,
            }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn selected_card(&self) -> Option<&Card> {
        self.cards.get(self.selected)
    }

    /// Compose box has something worth submitting
    pub fn can_create(&self) -> bool {
        !self.creating && !self.compose.trim().is_empty()
    }

    fn success(&mut self, msg: impl Into<String>) {
        self.show_toast(msg.into(), ToastKind::Success);
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.show_toast(msg.into(), ToastKind::Error);
    }

    fn show_toast(&mut self, message: String, kind: ToastKind) {
        if self.notifications {
            if let Err(e) = notify_rust::Notification::new()
                .summary("stampcards")
                .body(&message)
                .show()
            {
                tracing::warn!("Desktop notification failed: {}", e);
            }
        }
        self.toast = Some(Toast { message, kind, shown_at: Instant::now() });
    }

    /// Expire old toasts
    pub fn tick(&mut self) {
        if let Some(toast) = &self.toast {
            if toast.shown_at.elapsed() >= TOAST_DURATION {
                self.toast = None;
            }
        }
    }

    pub fn handle_paste(&mut self, text: &str) {
        match self.screen {
            Screen::Auth if !self.auth.loading => {
                // Single-line fields
                let line = text.lines().next().unwrap_or_default();
                self.auth.input_mut().push_str(line);
            }
            Screen::Cards if self.focus == CardsFocus::Compose && !self.creating => {
                self.compose.push_str(text);
            }
            _ => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.popup != Popup::None {
            self.handle_popup_key(key);
            return Ok(());
        }

        match self.screen {
            Screen::Loading => {}
            Screen::Auth => self.handle_auth_key(key),
            Screen::Cards => match self.focus {
                CardsFocus::Compose => self.handle_compose_key(key),
                CardsFocus::List => self.handle_list_key(key),
            },
        }
        Ok(())
    }

    fn handle_popup_key(&mut self, key: KeyEvent) {
        match self.popup {
            Popup::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Enter | KeyCode::Char('q')) {
                    self.popup = Popup::None;
                }
            }
            Popup::ConfirmSignOut => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.popup = Popup::None;
                    self.pending = Some(Action::SignOut);
                }
                KeyCode::Char('n') | KeyCode::Esc => self.popup = Popup::None,
                _ => {}
            },
            Popup::None => {}
        }
    }

    fn handle_auth_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            // Toggle sign in / sign up
            KeyCode::Char('t') if ctrl => {
                if !self.auth.loading {
                    self.auth.toggle_mode();
                }
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.auth.field = match self.auth.field {
                    AuthField::Email => AuthField::Password,
                    AuthField::Password => AuthField::Email,
                };
            }
            KeyCode::Enter => {
                if self.auth.field == AuthField::Email {
                    self.auth.field = AuthField::Password;
                } else {
                    self.submit_auth();
                }
            }
            KeyCode::Backspace => {
                if !self.auth.loading {
                    self.auth.input_mut().pop();
                }
            }
            KeyCode::Char(c) if !ctrl => {
                if !self.auth.loading {
                    self.auth.input_mut().push(c);
                }
            }
            _ => {}
        }
    }

    /// Validate the auth form and queue the request
    pub fn submit_auth(&mut self) {
        if self.auth.loading {
            return;
        }

        if self.auth.email.trim().is_empty() || self.auth.password.is_empty() {
            self.error("Please enter your email and password");
            return;
        }

        match self.auth.mode {
            AuthMode::SignIn => self.pending = Some(Action::SignIn),
            AuthMode::SignUp => {
                if self.auth.password.chars().count() < MIN_PASSWORD_LEN {
                    self.error(format!("Password must be at least {} characters long", MIN_PASSWORD_LEN));
                    return;
                }
                self.pending = Some(Action::SignUp);
            }
        }
        self.auth.loading = true;
    }

    fn handle_compose_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('s') if ctrl => self.submit_card(),
            KeyCode::F(2) => self.submit_card(),
            KeyCode::Esc | KeyCode::Tab => self.focus = CardsFocus::List,
            KeyCode::Enter => {
                if !self.creating {
                    self.compose.push('\n');
                }
            }
            KeyCode::Backspace => {
                if !self.creating {
                    self.compose.pop();
                }
            }
            KeyCode::Char(c) if !ctrl => {
                if !self.creating {
                    self.compose.push(c);
                }
            }
            _ => {}
        }
    }

    /// Queue creation of the composed card. Blank input is ignored.
    pub fn submit_card(&mut self) {
        if self.creating {
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        let Some(card) = NewCard::from_input(&self.compose, session.user.id) else {
            return;
        };

        self.compose.clear();
        self.creating = true;
        self.pending = Some(Action::CreateCard(card));
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(),
            KeyCode::Char('g') | KeyCode::Home => self.selected = 0,
            KeyCode::Char('G') | KeyCode::End => self.selected = self.cards.len().saturating_sub(1),

            // Flip the selected card
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_reveal(),

            KeyCode::Char('s') => self.share_selected(),
            KeyCode::Char('r') => {
                if !self.loading_cards {
                    self.loading_cards = true;
                    self.pending = Some(Action::LoadCards);
                }
            }
            KeyCode::Char('n') | KeyCode::Char('i') | KeyCode::Tab => self.focus = CardsFocus::Compose,
            KeyCode::Char('o') => self.popup = Popup::ConfirmSignOut,
            KeyCode::Char('?') => self.popup = Popup::Help,
            _ => {}
        }
    }

    fn move_down(&mut self) {
        if !self.cards.is_empty() {
            self.selected = (self.selected + 1) % self.cards.len();
        }
    }

    fn move_up(&mut self) {
        if !self.cards.is_empty() {
            self.selected = self.selected.checked_sub(1).unwrap_or(self.cards.len() - 1);
        }
    }

    fn toggle_reveal(&mut self) {
        if let Some(id) = self.selected_card().map(|c| c.id) {
            if !self.revealed.remove(&id) {
                self.revealed.insert(id);
            }
        }
    }

    pub fn is_revealed(&self, card: &Card) -> bool {
        self.revealed.contains(&card.id)
    }

    /// Build the share link for the selected card and copy it
    pub fn share_selected(&mut self) {
        let Some(card) = self.selected_card() else {
            return;
        };
        let url = share_url(&self.share_base, &card.share_id);

        if self.copy_links && copy_to_clipboard(&url) {
            self.success("Link copied to clipboard!");
        } else {
            self.success(format!("Share link: {}", url));
        }
        self.last_share_url = Some(url);
    }

    /// Run the queued network action, if any
    pub async fn run_pending(&mut self) -> Result<()> {
        let Some(action) = self.pending.take() else {
            return Ok(());
        };
        tracing::debug!("Running {:?}", action);

        match action {
            Action::RestoreSession => self.restore_session().await,
            Action::SignIn => self.sign_in().await,
            Action::SignUp => self.sign_up().await,
            Action::LoadCards => self.load_cards().await,
            Action::CreateCard(card) => self.create_card(card).await,
            Action::SignOut => self.sign_out().await,
        }
        Ok(())
    }

    async fn restore_session(&mut self) {
        let saved = self.sessions.as_ref().and_then(|s| s.load());
        let Some(saved) = saved else {
            self.screen = Screen::Auth;
            return;
        };

        let session = if saved.is_expired() {
            match self.backend.refresh(&saved).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    tracing::warn!("Saved session could not be refreshed: {}", e);
                    self.forget_session();
                    self.screen = Screen::Auth;
                    return;
                }
            }
        } else {
            saved
        };

        tracing::info!("Restored session for {}", session.user.id);
        self.enter_session(session).await;
    }

    async fn sign_in(&mut self) {
        let result = self.backend.sign_in(self.auth.email.trim(), &self.auth.password).await;
        self.auth.loading = false;

        match result {
            Ok(session) => {
                self.success("Welcome back!");
                self.auth = AuthForm::default();
                self.enter_session(session).await;
            }
            Err(e) => {
                tracing::warn!("Sign in failed: {}", e);
                let msg = auth_error_message(AuthMode::SignIn, &e);
                self.error(msg);
            }
        }
    }

    async fn sign_up(&mut self) {
        let result = self.backend.sign_up(self.auth.email.trim(), &self.auth.password).await;
        self.auth.loading = false;

        match result {
            Ok(SignUpOutcome::ConfirmationRequired(user)) => {
                tracing::info!("Created account {}", user.id);
                self.success("Account created successfully! You can now sign in.");
                self.auth.mode = AuthMode::SignIn;
            }
            Ok(SignUpOutcome::SignedIn(session)) => {
                tracing::info!("Created account {} (signed in)", session.user.id);
                self.success("Account created successfully!");
                self.auth = AuthForm::default();
                self.enter_session(session).await;
            }
            Err(e) => {
                tracing::warn!("Sign up failed: {}", e);
                let msg = auth_error_message(AuthMode::SignUp, &e);
                self.error(msg);
            }
        }
    }

    async fn enter_session(&mut self, session: Session) {
        if let Some(store) = &self.sessions {
            if let Err(e) = store.save(&session) {
                tracing::warn!("Could not save session: {}", e);
            }
        }
        self.session = Some(session);
        self.screen = Screen::Cards;
        self.focus = CardsFocus::Compose;
        self.load_cards().await;
    }

    /// Current session, refreshed first if it has expired. A session the
    /// backend no longer accepts is dropped and the sign-in form shown.
    async fn live_session(&mut self) -> Option<Session> {
        let session = self.session.clone()?;
        if !session.is_expired() {
            return Some(session);
        }

        match self.backend.refresh(&session).await {
            Ok(fresh) => {
                if let Some(store) = &self.sessions {
                    if let Err(e) = store.save(&fresh) {
                        tracing::warn!("Could not save session: {}", e);
                    }
                }
                self.session = Some(fresh.clone());
                Some(fresh)
            }
            Err(e) => {
                tracing::warn!("Session refresh failed: {}", e);
                self.end_session();
                None
            }
        }
    }

    async fn load_cards(&mut self) {
        self.loading_cards = true;
        let Some(session) = self.live_session().await else {
            self.loading_cards = false;
            return;
        };
        let result = self.backend.list_cards(&session).await;
        self.loading_cards = false;

        match result {
            Ok(cards) => {
                tracing::debug!("Loaded {} cards", cards.len());
                self.cards = cards;
                self.selected = self.selected.min(self.cards.len().saturating_sub(1));
            }
            Err(e) if is_unauthorized(&e) => {
                tracing::warn!("Token rejected while loading cards: {}", e);
                self.end_session();
            }
            Err(e) => {
                tracing::error!("Error loading cards: {}", e);
                self.error("Error loading cards");
            }
        }
    }

    async fn create_card(&mut self, card: NewCard) {
        let Some(session) = self.live_session().await else {
            self.creating = false;
            return;
        };
        let result = self.backend.insert_card(&session, &card).await;
        self.creating = false;

        match result {
            Ok(row) => {
                tracing::info!("Created card {} ({})", row.id, row.share_id);
                self.cards.insert(0, row);
                self.selected = 0;
                self.success("Card created successfully!");
            }
            Err(e) if is_unauthorized(&e) => {
                tracing::warn!("Token rejected while creating card: {}", e);
                self.end_session();
            }
            Err(e) => {
                tracing::error!("Error creating card: {}", e);
                self.error("Error creating card");
            }
        }
    }

    async fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = self.backend.sign_out(&session).await {
                tracing::warn!("Sign out request failed: {}", e);
            }
        }
        self.reset_to_auth();
        self.success("Signed out successfully");
    }

    /// The backend stopped accepting the session
    fn end_session(&mut self) {
        self.reset_to_auth();
        self.error("Your session has expired. Please sign in again.");
    }

    /// Drop the session and everything loaded under it, back to the sign-in form
    fn reset_to_auth(&mut self) {
        self.forget_session();
        self.session = None;

        self.cards.clear();
        self.revealed.clear();
        self.selected = 0;
        self.compose.clear();
        self.creating = false;
        self.loading_cards = false;
        self.last_share_url = None;
        self.auth = AuthForm::default();
        self.popup = Popup::None;
        self.screen = Screen::Auth;
    }

    fn forget_session(&mut self) {
        if let Some(store) = &self.sessions {
            if let Err(e) = store.clear() {
                tracing::warn!("Could not clear session: {}", e);
            }
        }
    }
}

/// User-facing message for a failed sign in / sign up
pub fn auth_error_message(mode: AuthMode, err: &BackendError) -> String {
    match (mode, err) {
        (AuthMode::SignIn, BackendError::InvalidCredentials) => {
            "Invalid email or password. Please try again.".to_string()
        }
        (AuthMode::SignUp, BackendError::AlreadyRegistered) => {
            "This email is already registered. Please sign in instead.".to_string()
        }
        (_, BackendError::Transport(_)) | (_, BackendError::Decode(_)) => {
            "An unexpected error occurred. Please try again.".to_string()
        }
        (_, other) => other.to_string(),
    }
}

fn is_unauthorized(err: &BackendError) -> bool {
    matches!(err, BackendError::Api { status: 401, .. })
}

fn copy_to_clipboard(text: &str) -> bool {
    use cli_clipboard::{ClipboardContext, ClipboardProvider};

    match ClipboardContext::new() {
        Ok(mut ctx) => match ctx.set_contents(text.to_string()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Clipboard write failed: {}", e);
                false
            }
        },
        Err(e) => {
            tracing::warn!("Clipboard unavailable: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::backend::User;

    const EMAIL: &str = "ada@example.com";
    const PASSWORD: &str = "hunter22";

    fn config() -> AppConfig {
        AppConfig {
            supabase_url: "https://abcd.supabase.co".to_string(),
            supabase_anon_key: "anon".to_string(),
            share_base_url: Some("https://cards.example.com".to_string()),
            copy_links: false,
            ..Default::default()
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c))).unwrap();
        }
    }

    fn toast(app: &App) -> (&str, ToastKind) {
        let t = app.toast.as_ref().expect("no toast");
        (t.message.as_str(), t.kind)
    }

    async fn started(fake: Arc<FakeBackend>) -> App {
        let mut app = App::new(fake, &config(), None);
        app.run_pending().await.unwrap();
        app
    }

    async fn signed_in(fake: Arc<FakeBackend>) -> App {
        let mut app = started(fake).await;
        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Enter)).unwrap();
        type_text(&mut app, PASSWORD);
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.run_pending().await.unwrap();
        assert_eq!(app.screen, Screen::Cards);
        app
    }

    #[tokio::test]
    async fn test_starts_logged_out_without_saved_session() {
        let app = started(Arc::new(FakeBackend::default())).await;
        assert_eq!(app.screen, Screen::Auth);
        assert!(app.session.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_loads_cards() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let app = signed_in(fake.clone()).await;

        assert_eq!(toast(&app), ("Welcome back!", ToastKind::Success));
        assert!(app.auth.email.is_empty());
        assert_eq!(fake.calls(), vec!["sign_in", "list_cards"]);
    }

    #[tokio::test]
    async fn test_submit_sets_loading_until_run() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = started(fake.clone()).await;
        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Tab)).unwrap();
        type_text(&mut app, PASSWORD);
        app.submit_auth();
        assert!(app.auth.loading);
        assert!(app.has_pending());

        // A second submit while loading is ignored
        app.submit_auth();
        app.run_pending().await.unwrap();
        assert!(!app.auth.loading);
        assert!(!app.has_pending());
        assert_eq!(fake.calls().iter().filter(|c| **c == "sign_in").count(), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_shows_friendly_message() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = started(fake).await;
        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Enter)).unwrap();
        type_text(&mut app, "wrong-password");
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.run_pending().await.unwrap();

        assert_eq!(app.screen, Screen::Auth);
        assert_eq!(toast(&app), ("Invalid email or password. Please try again.", ToastKind::Error));
        assert!(!app.auth.loading);
    }

    #[tokio::test]
    async fn test_sign_up_rejects_short_password_locally() {
        let fake = Arc::new(FakeBackend::default());
        let mut app = started(fake.clone()).await;
        app.handle_key(ctrl('t')).unwrap();
        assert_eq!(app.auth.mode, AuthMode::SignUp);

        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Enter)).unwrap();
        type_text(&mut app, "12345");
        app.handle_key(key(KeyCode::Enter)).unwrap();

        assert!(!app.has_pending());
        assert!(!app.auth.loading);
        assert_eq!(toast(&app), ("Password must be at least 6 characters long", ToastKind::Error));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_then_switches_to_sign_in() {
        let fake = Arc::new(FakeBackend::default());
        let mut app = started(fake).await;
        app.handle_key(ctrl('t')).unwrap();
        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Enter)).unwrap();
        type_text(&mut app, PASSWORD);
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.run_pending().await.unwrap();

        assert_eq!(app.auth.mode, AuthMode::SignIn);
        assert_eq!(app.screen, Screen::Auth);
        assert_eq!(toast(&app), ("Account created successfully! You can now sign in.", ToastKind::Success));
    }

    #[tokio::test]
    async fn test_sign_up_without_confirmation_signs_in() {
        let fake = Arc::new(FakeBackend { sign_up_signs_in: true, ..Default::default() });
        let mut app = started(fake).await;
        app.handle_key(ctrl('t')).unwrap();
        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Tab)).unwrap();
        type_text(&mut app, PASSWORD);
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.run_pending().await.unwrap();

        assert_eq!(app.screen, Screen::Cards);
        assert!(app.session.is_some());
    }

    #[tokio::test]
    async fn test_sign_up_existing_email() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = started(fake).await;
        app.handle_key(ctrl('t')).unwrap();
        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Tab)).unwrap();
        type_text(&mut app, "another-pass");
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.run_pending().await.unwrap();

        assert_eq!(
            toast(&app),
            ("This email is already registered. Please sign in instead.", ToastKind::Error)
        );
        assert_eq!(app.auth.mode, AuthMode::SignUp);
    }

    #[tokio::test]
    async fn test_backend_unreachable_shows_generic_error() {
        let fake = Arc::new(FakeBackend { offline: true, ..Default::default() });
        let mut app = started(fake).await;
        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Tab)).unwrap();
        type_text(&mut app, PASSWORD);
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.run_pending().await.unwrap();

        assert_eq!(toast(&app), ("An unexpected error occurred. Please try again.", ToastKind::Error));
    }

    #[tokio::test]
    async fn test_toggle_mode_clears_fields() {
        let mut app = started(Arc::new(FakeBackend::default())).await;
        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Tab)).unwrap();
        type_text(&mut app, "secret");
        app.handle_key(ctrl('t')).unwrap();

        assert_eq!(app.auth.mode, AuthMode::SignUp);
        assert!(app.auth.email.is_empty());
        assert!(app.auth.password.is_empty());
        assert_eq!(app.auth.field, AuthField::Email);
    }

    #[tokio::test]
    async fn test_empty_fields_are_rejected() {
        let fake = Arc::new(FakeBackend::default());
        let mut app = started(fake.clone()).await;
        app.handle_key(key(KeyCode::Tab)).unwrap();
        app.handle_key(key(KeyCode::Enter)).unwrap();
        assert!(!app.has_pending());
        assert_eq!(toast(&app).1, ToastKind::Error);
    }

    #[tokio::test]
    async fn test_create_card_prepends_trimmed_content() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = signed_in(fake.clone()).await;

        type_text(&mut app, "  first  ");
        app.handle_key(ctrl('s')).unwrap();
        assert!(app.creating);
        assert!(app.compose.is_empty());
        app.run_pending().await.unwrap();

        type_text(&mut app, "second");
        app.handle_key(key(KeyCode::F(2))).unwrap();
        app.run_pending().await.unwrap();

        let contents: Vec<&str> = app.cards.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "first"]);
        assert!(!app.creating);
        assert_eq!(toast(&app), ("Card created successfully!", ToastKind::Success));
        assert_eq!(app.cards[0].share_id.len(), 10);
    }

    #[tokio::test]
    async fn test_blank_card_is_not_submitted() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = signed_in(fake.clone()).await;

        type_text(&mut app, "   ");
        app.handle_key(key(KeyCode::Enter)).unwrap();
        assert!(!app.can_create());
        app.handle_key(ctrl('s')).unwrap();

        assert!(!app.has_pending());
        assert!(!fake.calls().contains(&"insert_card"));
    }

    #[tokio::test]
    async fn test_create_failure_shows_error() {
        let fake = Arc::new(FakeBackend { fail_insert: true, ..FakeBackend::with_user(EMAIL, PASSWORD) });
        let mut app = signed_in(fake).await;
        type_text(&mut app, "nope");
        app.handle_key(ctrl('s')).unwrap();
        app.run_pending().await.unwrap();

        assert!(app.cards.is_empty());
        assert_eq!(toast(&app), ("Error creating card", ToastKind::Error));
    }

    #[tokio::test]
    async fn test_load_failure_shows_error() {
        let fake = Arc::new(FakeBackend { fail_list: true, ..FakeBackend::with_user(EMAIL, PASSWORD) });
        let mut app = started(fake).await;
        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Tab)).unwrap();
        type_text(&mut app, PASSWORD);
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.run_pending().await.unwrap();

        assert_eq!(app.screen, Screen::Cards);
        assert_eq!(toast(&app), ("Error loading cards", ToastKind::Error));
    }

    #[tokio::test]
    async fn test_reveal_and_share() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = signed_in(fake).await;
        type_text(&mut app, "secret note");
        app.handle_key(ctrl('s')).unwrap();
        app.run_pending().await.unwrap();

        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert_eq!(app.focus, CardsFocus::List);

        let card = app.cards[0].clone();
        assert!(!app.is_revealed(&card));
        app.handle_key(key(KeyCode::Enter)).unwrap();
        assert!(app.is_revealed(&card));
        app.handle_key(key(KeyCode::Char(' '))).unwrap();
        assert!(!app.is_revealed(&card));

        app.handle_key(key(KeyCode::Char('s'))).unwrap();
        let url = format!("https://cards.example.com/card/{}", card.share_id);
        assert_eq!(app.last_share_url.as_deref(), Some(url.as_str()));
        assert_eq!(toast(&app).0, format!("Share link: {}", url));
    }

    #[tokio::test]
    async fn test_list_navigation_wraps() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = signed_in(fake).await;
        for text in ["a", "b", "c"] {
            type_text(&mut app, text);
            app.handle_key(ctrl('s')).unwrap();
            app.run_pending().await.unwrap();
        }
        app.handle_key(key(KeyCode::Tab)).unwrap();

        app.handle_key(key(KeyCode::Up)).unwrap();
        assert_eq!(app.selected, 2);
        app.handle_key(key(KeyCode::Char('j'))).unwrap();
        assert_eq!(app.selected, 0);
        app.handle_key(key(KeyCode::Char('G'))).unwrap();
        assert_eq!(app.selected, 2);
    }

    #[tokio::test]
    async fn test_sign_out_clears_state() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = signed_in(fake.clone()).await;
        type_text(&mut app, "bye");
        app.handle_key(ctrl('s')).unwrap();
        app.run_pending().await.unwrap();

        app.handle_key(key(KeyCode::Esc)).unwrap();
        app.handle_key(key(KeyCode::Char('o'))).unwrap();
        assert_eq!(app.popup, Popup::ConfirmSignOut);
        app.handle_key(key(KeyCode::Char('y'))).unwrap();
        app.run_pending().await.unwrap();

        assert_eq!(app.screen, Screen::Auth);
        assert!(app.cards.is_empty());
        assert!(app.session.is_none());
        assert_eq!(toast(&app), ("Signed out successfully", ToastKind::Success));
        assert!(fake.calls().contains(&"sign_out"));
    }

    #[tokio::test]
    async fn test_quit_key_only_outside_text_input() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = signed_in(fake).await;
        assert!(!app.accepts_quit_key());
        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert!(app.accepts_quit_key());
        app.handle_key(key(KeyCode::Char('?'))).unwrap();
        assert!(!app.accepts_quit_key());
    }

    #[tokio::test]
    async fn test_paste_into_compose_and_auth() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = started(fake.clone()).await;
        app.handle_paste("ada@example.com\nignored");
        assert_eq!(app.auth.email, "ada@example.com");

        let mut app = signed_in(fake).await;
        app.handle_paste("line one\nline two");
        assert_eq!(app.compose, "line one\nline two");
    }

    #[tokio::test]
    async fn test_restores_saved_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::at(dir.path().join("session.json"));
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let user_id = fake.users.lock().unwrap()[0].2;
        store.save(&expired_session(user_id)).unwrap();

        let mut app = App::new(fake.clone(), &config(), Some(SessionStore::at(store.path())));
        assert_eq!(app.screen, Screen::Loading);
        app.run_pending().await.unwrap();

        assert_eq!(app.screen, Screen::Cards);
        // Expired session gets refreshed and re-saved
        assert_eq!(fake.calls(), vec!["refresh", "list_cards"]);
        assert!(!store.load().unwrap().is_expired());
    }

    fn expired_session(user_id: Uuid) -> Session {
        Session {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_at: 0,
            user: User { id: user_id, email: Some(EMAIL.to_string()) },
        }
    }

    #[tokio::test]
    async fn test_unrefreshable_saved_session_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let fake = Arc::new(FakeBackend { fail_refresh: true, ..FakeBackend::with_user(EMAIL, PASSWORD) });
        let user_id = fake.users.lock().unwrap()[0].2;
        SessionStore::at(&path).save(&expired_session(user_id)).unwrap();

        let mut app = App::new(fake.clone(), &config(), Some(SessionStore::at(&path)));
        app.run_pending().await.unwrap();

        assert_eq!(app.screen, Screen::Auth);
        assert!(app.session.is_none());
        assert!(!path.exists());
        assert_eq!(fake.calls(), vec!["refresh"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_mid_session_returns_to_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let fake = Arc::new(FakeBackend { fail_refresh: true, ..FakeBackend::with_user(EMAIL, PASSWORD) });
        let mut app = App::new(fake.clone(), &config(), Some(SessionStore::at(&path)));
        app.run_pending().await.unwrap();
        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Tab)).unwrap();
        type_text(&mut app, PASSWORD);
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.run_pending().await.unwrap();
        type_text(&mut app, "kept");
        app.handle_key(ctrl('s')).unwrap();
        app.run_pending().await.unwrap();
        assert_eq!(app.cards.len(), 1);

        // The access token runs out and the refresh token has been revoked
        if let Some(session) = app.session.as_mut() {
            session.expires_at = 0;
        }
        type_text(&mut app, "lost");
        app.handle_key(ctrl('s')).unwrap();
        app.run_pending().await.unwrap();

        assert_eq!(app.screen, Screen::Auth);
        assert!(app.session.is_none());
        assert!(app.cards.is_empty());
        assert!(app.revealed.is_empty());
        assert!(!app.creating);
        assert!(!path.exists());
        assert_eq!(toast(&app), ("Your session has expired. Please sign in again.", ToastKind::Error));
        // No insert attempted with the dead session
        assert_eq!(fake.calls().last(), Some(&"refresh"));
    }

    #[tokio::test]
    async fn test_rejected_token_returns_to_sign_in() {
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = signed_in(fake).await;
        app.handle_key(key(KeyCode::Esc)).unwrap();

        if let Some(session) = app.session.as_mut() {
            session.access_token = "revoked".to_string();
        }
        app.handle_key(key(KeyCode::Char('r'))).unwrap();
        app.run_pending().await.unwrap();

        assert_eq!(app.screen, Screen::Auth);
        assert!(app.session.is_none());
        assert!(!app.loading_cards);
        assert_eq!(toast(&app).1, ToastKind::Error);
    }

    #[tokio::test]
    async fn test_sign_out_forgets_saved_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let fake = Arc::new(FakeBackend::with_user(EMAIL, PASSWORD));
        let mut app = App::new(fake, &config(), Some(SessionStore::at(&path)));
        app.run_pending().await.unwrap();
        type_text(&mut app, EMAIL);
        app.handle_key(key(KeyCode::Tab)).unwrap();
        type_text(&mut app, PASSWORD);
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.run_pending().await.unwrap();
        assert!(path.exists());

        app.handle_key(key(KeyCode::Esc)).unwrap();
        app.handle_key(key(KeyCode::Char('o'))).unwrap();
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.run_pending().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_toast_expires() {
        let mut app = started(Arc::new(FakeBackend::default())).await;
        app.submit_auth();
        assert!(app.toast.is_some());
        app.tick();
        assert!(app.toast.is_some());

        if let Some(t) = app.toast.as_mut() {
            t.shown_at = Instant::now() - Duration::from_secs(4);
        }
        app.tick();
        assert!(app.toast.is_none());
    }

    #[test]
    fn test_auth_error_message_passthrough() {
        let err = BackendError::Api { status: 429, message: "Email rate limit exceeded".to_string() };
        assert_eq!(auth_error_message(AuthMode::SignUp, &err), "Email rate limit exceeded");
        assert_eq!(
            auth_error_message(AuthMode::SignUp, &BackendError::InvalidCredentials),
            "Invalid login credentials"
        );
    }
}
