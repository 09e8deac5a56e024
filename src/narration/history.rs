use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use uuid::Uuid;

use super::GenerationRecord;
use crate::error::AppError;

const HISTORY_KEY: &str = "narrations";

/// Narrations produced in one browser session, oldest first.
pub struct SessionHistory {
    session: Session,
}

impl SessionHistory {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub async fn records(&self) -> Result<Vec<GenerationRecord>, AppError> {
        Ok(self
            .session
            .get::<Vec<GenerationRecord>>(HISTORY_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn append(&self, record: GenerationRecord) -> Result<(), AppError> {
        let mut records = self.records().await?;
        records.push(record);
        self.session.insert(HISTORY_KEY, records).await?;
        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<GenerationRecord>, AppError> {
        Ok(self.records().await?.into_iter().find(|r| r.id == id))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionHistory
where
    S: Send + Sync,
{
    type Rejection = <Session as FromRequestParts<S>>::Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Session::from_request_parts(parts, state)
            .await
            .map(Self::new)
    }
}
