use std::sync::Arc;

use config::Config;
use database::Store;
use mailer::VerificationMailer;
use services::{AuthService, MessageService, NotificationService, QuizService, RoomService};

pub mod config;
pub mod database;
pub mod error;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod result;
pub mod router;
pub mod routes;
pub mod services;
pub mod utils;

#[derive(Clone)]
pub struct AppState<S: Store> {
    pub config: Arc<Config>,
    pub auth: AuthService<S>,
    pub rooms: RoomService<S>,
    pub messages: MessageService<S>,
    pub quizzes: QuizService<S>,
    pub notifications: NotificationService<S>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, config: Config, mailer: Arc<dyn VerificationMailer>) -> Self {
        let config = Arc::new(config);
        Self {
            auth: AuthService::new(store.clone(), config.clone(), mailer),
            rooms: RoomService::new(store.clone()),
            messages: MessageService::new(store.clone()),
            quizzes: QuizService::new(store.clone()),
            notifications: NotificationService::new(store),
            config,
        }
    }
}
