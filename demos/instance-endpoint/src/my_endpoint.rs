use femur::prelude::*;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Filter {
    pub f: Option<String>,
}

#[derive(Injectable)]
pub struct MyEndpoint {
    config: Arc<ConfigService>,
}

#[endpoints]
impl MyEndpoint {
    #[tags(["demo"])]
    #[summary("Greets the tomatos")]
    pub async fn handle_async(&self, #[from_query] Query(filter): Query<Filter>) -> String {
        tracing::info!(app = ?self.config.get("APP_NAME"), "I am a log");
        format!(
            "Hello there tomatos and {}",
            filter.f.as_deref().unwrap_or("{{empty}}")
        )
    }
}

/// The same endpoint written by hand, for comparison.
pub async fn standard(Inject(endpoint): Inject<MyEndpoint>, filter: Query<Filter>) -> String {
    endpoint.handle_async(filter).await
}
