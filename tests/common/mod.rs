#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use unichat::{
    AppState,
    config::Config,
    database::MemoryStore,
    mailer::VerificationMailer,
    models::User,
    services::{CreateRoomRequest, RegisterRequest},
};

/// Captures verification mail instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn token_for(&self, address: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == address)
            .map(|(_, token)| token.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl VerificationMailer for RecordingMailer {
    async fn send_verification_email(&self, address: &str, _first_name: &str, token: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), token.to_string()));
        !self.fail
    }
}

pub fn test_config() -> Config {
    Config {
        jwt_secret: "integration-test-secret".to_string(),
        bcrypt_cost: 4,
        ..Config::default()
    }
}

pub struct TestApp {
    pub state: AppState<MemoryStore>,
    pub store: MemoryStore,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_app() -> TestApp {
    test_app_with(RecordingMailer::default())
}

pub fn test_app_with(mailer: RecordingMailer) -> TestApp {
    let mailer = Arc::new(mailer);
    let store = MemoryStore::new();
    let state = AppState::new(store.clone(), test_config(), mailer.clone());
    TestApp {
        state,
        store,
        mailer,
    }
}

pub const PASSWORD: &str = "correct-horse-9";

pub fn candidate(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
        first_name: "Test".to_string(),
        last_name: "Student".to_string(),
    }
}

impl TestApp {
    /// Registers, verifies and authenticates a user.
    pub async fn verified_user(&self, username: &str, email: &str) -> User {
        self.state
            .auth
            .register(candidate(username, email))
            .await
            .expect("register");
        let token = self.mailer.token_for(email).expect("verification mail");
        self.state.auth.verify_email(&token).await.expect("verify");
        self.state
            .auth
            .authenticate(username, PASSWORD)
            .await
            .expect("authenticate")
    }

    pub async fn room(&self, creator: &User, name: &str, max_members: Option<i32>) -> i64 {
        self.state
            .rooms
            .create_room(
                CreateRoomRequest {
                    name: name.to_string(),
                    description: None,
                    room_type: Default::default(),
                    subject: None,
                    max_members,
                },
                creator.id,
            )
            .await
            .expect("create room")
            .id
    }
}
