use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use skald::{
    AbGroup, CallerPreference, CallerProfileStore, ContentMode, ExternalInvoker, InvokeOptions,
    Level, RequestContext, ResponseCategory, Result, Skald, StrategyConfig, Template,
    TemplateFilter, TemplateRepository,
};

/// Invoker that panics if touched — the template path must never reach
/// the network.
struct NoNetworkInvoker;

#[async_trait]
impl ExternalInvoker for NoNetworkInvoker {
    fn name(&self) -> &str {
        "no-network"
    }

    async fn generate(&self, _prompt: &str, _options: &InvokeOptions) -> Result<String> {
        panic!("template path must not invoke the external API");
    }
}

/// Repository that records the filters it was queried with.
struct RecordingTemplates {
    templates: Vec<Template>,
    queries: AtomicU32,
}

impl RecordingTemplates {
    fn new(templates: Vec<Template>) -> Self {
        Self {
            templates,
            queries: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl TemplateRepository for RecordingTemplates {
    async fn query(&self, filter: &TemplateFilter) -> Result<Vec<Template>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .templates
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }
}

struct FixedProfile(CallerPreference);

#[async_trait]
impl CallerProfileStore for FixedProfile {
    async fn get(&self, _caller_id: &str) -> Result<Option<CallerPreference>> {
        Ok(Some(self.0))
    }
}

fn template_only() -> StrategyConfig {
    StrategyConfig::new()
        .template_ratio(AbGroup::Control, 1.0)
        .template_ratio(AbGroup::Hybrid, 1.0)
        .template_ratio(AbGroup::Live, 1.0)
}

fn level(raw: u8) -> Level {
    Level::new(raw).unwrap()
}

fn pipeline_with(
    templates: Arc<RecordingTemplates>,
    preference: CallerPreference,
) -> skald::Pipeline {
    Skald::builder()
        .invoker(Arc::new(NoNetworkInvoker))
        .templates(templates)
        .profiles(Arc::new(FixedProfile(preference)))
        .strategy(template_only())
        .rate_limit(
            skald::RateLimitConfig::new()
                .requests_per_minute(10_000)
                .requests_per_hour(100_000)
                .burst_limit(10_000),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn exact_match_is_served() {
    let templates = Arc::new(RecordingTemplates::new(vec![
        Template::new("Morning sunshine!", 1.8)
            .category(ResponseCategory::Greeting)
            .level(level(2))
            .mode(ContentMode::Romantic),
    ]));
    let preference = CallerPreference {
        explicitness_level: level(2),
        mode: ContentMode::Romantic,
        ab_group: AbGroup::Control,
    };
    let pipeline = pipeline_with(templates.clone(), preference);

    let reply = pipeline
        .generate_response("alice", "good morning!", &RequestContext::new())
        .await;

    assert_eq!(reply, "Morning sunshine!");
    // One query is enough when the exact filter matches.
    assert_eq!(templates.queries.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn falls_back_to_level_only_match() {
    // Nothing matches (greeting, level 3, roleplay), but a level-3
    // template in another category exists.
    let templates = Arc::new(RecordingTemplates::new(vec![
        Template::new("Missed you today.", 1.0)
            .category(ResponseCategory::Comfort)
            .level(level(3))
            .mode(ContentMode::Casual),
    ]));
    let preference = CallerPreference {
        explicitness_level: level(3),
        mode: ContentMode::Roleplay,
        ab_group: AbGroup::Control,
    };
    let pipeline = pipeline_with(templates.clone(), preference);

    let reply = pipeline
        .generate_response("bob", "hello!", &RequestContext::new())
        .await;

    assert_eq!(reply, "Missed you today.");
    // Exact query plus the level-only retry.
    assert_eq!(templates.queries.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn empty_repository_serves_safe_fallback() {
    let templates = Arc::new(RecordingTemplates::new(vec![]));
    let preference = CallerPreference {
        explicitness_level: level(5),
        mode: ContentMode::Roleplay,
        ab_group: AbGroup::Control,
    };
    let pipeline = pipeline_with(templates, preference);

    let reply = pipeline
        .generate_response("carol", "hey", &RequestContext::new())
        .await;

    assert!(!reply.is_empty());
}

#[tokio::test]
async fn weighted_pick_favours_quality() {
    let templates = Arc::new(RecordingTemplates::new(vec![
        Template::new("low quality", 0.1).category(ResponseCategory::Greeting),
        Template::new("high quality", 2.0).category(ResponseCategory::Greeting),
    ]));
    let pipeline = pipeline_with(templates, CallerPreference::default());

    let mut high = 0;
    for i in 0..200 {
        // Unique text per iteration so the cache never short-circuits
        // the pick.
        let text = format!("hello number {i}");
        let reply = pipeline
            .generate_response("dave", &text, &RequestContext::new())
            .await;
        if reply == "high quality" {
            high += 1;
        }
    }
    // Expected share ≈ 95%; anything above 150 shows the bias held.
    assert!(high > 150, "high-quality template served only {high}/200");
}
