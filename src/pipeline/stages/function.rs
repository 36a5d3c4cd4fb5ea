//! Closure-backed stage

use std::{future::Future, pin::Pin};

use async_trait::async_trait;

use super::PipelineStage;
use crate::pipeline::{context::PipelineContext, error::PipelineError};

type StageFuture = Pin<Box<dyn Future<Output = Result<PipelineContext, PipelineError>> + Send>>;
type StageFn = Box<dyn Fn(PipelineContext) -> StageFuture + Send + Sync>;
type Predicate = Box<dyn Fn(&PipelineContext) -> bool + Send + Sync>;

/// Stage built from an async closure
///
/// The closure receives its own copy of the context and returns the next one.
pub struct FnStage {
    name: &'static str,
    func: StageFn,
    predicate: Option<Predicate>,
}

impl FnStage {
    pub fn new<F, Fut>(name: &'static str, func: F) -> Self
    where
        F: Fn(PipelineContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PipelineContext, PipelineError>> + Send + 'static,
    {
        Self {
            name,
            func: Box::new(move |ctx| Box::pin(func(ctx))),
            predicate: None,
        }
    }

    /// Only run when `predicate` holds for the incoming context
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&PipelineContext) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }
}

#[async_trait]
impl PipelineStage for FnStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        self.predicate.as_ref().is_none_or(|predicate| predicate(ctx))
    }

    async fn execute(&self, ctx: &PipelineContext) -> Result<PipelineContext, PipelineError> {
        (self.func)(ctx.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::chat::ChatMessage;

    #[tokio::test]
    async fn test_fn_stage_executes_closure() {
        let stage = FnStage::new("Mark", |ctx| async move { Ok(ctx.with_processed("marked", true)) });
        let ctx = PipelineContext::new("gpt-4o", vec![ChatMessage::user("hi")]);

        let next = stage.execute(&ctx).await.unwrap();
        assert_eq!(stage.name(), "Mark");
        assert!(ctx.processed("marked").is_none());
        assert_eq!(next.processed("marked"), Some(&serde_json::Value::Bool(true)));
    }

    #[test]
    fn test_fn_stage_predicate() {
        let stage = FnStage::new("SearchOnly", |ctx| async move { Ok(ctx) })
            .when(|ctx| ctx.web_search);
        let ctx = PipelineContext::new("gpt-4o", vec![]);

        assert!(!stage.should_run(&ctx));
        assert!(stage.should_run(&ctx.with_web_search(true)));
    }
}
