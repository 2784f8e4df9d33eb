use std::sync::Arc;

use crate::{
    auth::jwt::JwtService, clock::Clock, config::AppConfig, mail::Mailer, store::Store,
    uploads::UploadStorage,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub uploads: Arc<dyn UploadStorage>,
    pub clock: Arc<dyn Clock>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        uploads: Arc<dyn UploadStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let jwt = JwtService::from_config(&config);
        Self {
            config: Arc::new(config),
            store,
            mailer,
            uploads,
            clock,
            jwt,
        }
    }
}
