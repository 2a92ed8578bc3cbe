use anyhow::Result;
use async_trait::async_trait;

use crate::replies;

/// Generative fallback consulted when a turn produced no response.
///
/// Implementations may call out to a language model. They only phrase a reply;
/// catalog facts, prices and calculations never come from here.
#[async_trait]
pub trait FallbackResponder: Send + Sync {
    async fn respond(&self, user_id: &str, message: &str, category_hints: &[String])
        -> Result<String>;
}

/// Offline fallback that points the user at the catalog categories.
#[derive(Clone, Copy, Debug, Default)]
pub struct CategoryFallback;

#[async_trait]
impl FallbackResponder for CategoryFallback {
    async fn respond(
        &self,
        _user_id: &str,
        _message: &str,
        category_hints: &[String],
    ) -> Result<String> {
        Ok(replies::unknown(category_hints))
    }
}

#[cfg(test)]
mod tests {
    use super::{CategoryFallback, FallbackResponder};

    #[tokio::test]
    async fn category_fallback_lists_hints() {
        let reply = CategoryFallback
            .respond("u", "qwerty", &["Fasteners".to_owned(), "Tile".to_owned()])
            .await
            .expect("static fallback never fails");

        assert!(reply.contains("- Fasteners\n- Tile"));
    }
}
