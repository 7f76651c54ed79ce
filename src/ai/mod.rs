//! External AI capabilities consumed by the session manager. The wire
//! protocol behind them is out of scope; implementations live with the
//! embedder, test fakes live with the tests.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::model::{FoodImpact, MealRecommendation, ScanType, UserProfile};

/// Input to the analysis capability: a captured photo or free text, the
/// target display language, and the user's health context.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: Option<Bytes>,
    pub text: Option<String>,
    pub language: String,
    pub mode: ScanType,
    pub profile: UserProfile,
}

#[async_trait]
pub trait AnalysisCapability: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> anyhow::Result<FoodImpact>;
}

#[async_trait]
pub trait RecommendationCapability: Send + Sync {
    async fn recommend(
        &self,
        profile: &UserProfile,
        language: &str,
        current_glucose: Option<u32>,
    ) -> anyhow::Result<Vec<MealRecommendation>>;
}

/// Re-derived text fields of a displayed result. Numeric fields and the
/// curve are never part of a translation.
#[derive(Debug, Clone)]
pub struct TranslatedText {
    pub name: String,
    pub portion: String,
    pub summary: String,
}

#[async_trait]
pub trait TranslationCapability: Send + Sync {
    async fn translate(&self, impact: &FoodImpact, language: &str) -> anyhow::Result<TranslatedText>;
}

/// The capability set injected into the session manager.
#[derive(Clone)]
pub struct Capabilities {
    pub analysis: Arc<dyn AnalysisCapability>,
    pub recommender: Arc<dyn RecommendationCapability>,
    pub translator: Arc<dyn TranslationCapability>,
}
