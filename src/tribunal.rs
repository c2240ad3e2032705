use futures::future::join_all;
use log::{ info, warn };
use std::sync::Arc;
use std::time::Duration;

use crate::llm::chat::{ Prompt, ProviderAdapter };
use crate::models::verdict::{ ProviderResult, TribunalVerdict };

/// Runs every registered engine on the same prompt and keeps the most
/// confident usable answer.
#[derive(Clone)]
pub struct Tribunal {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    adapter_timeout: Duration,
}

impl Tribunal {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, adapter_timeout: Duration) -> Self {
        Self { adapters, adapter_timeout }
    }

    pub fn engine_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    async fn invoke_with_deadline(
        &self,
        adapter: &Arc<dyn ProviderAdapter>,
        prompt: &Prompt
    ) -> Option<ProviderResult> {
        match tokio::time::timeout(self.adapter_timeout, adapter.invoke(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} engine timed out after {:?}", adapter.name(), self.adapter_timeout);
                None
            }
        }
    }

    pub async fn adjudicate(&self, prompt: &Prompt) -> TribunalVerdict {
        let calls = self.adapters.iter().map(|adapter| self.invoke_with_deadline(adapter, prompt));
        // join_all keeps registration order regardless of completion order.
        let results = join_all(calls).await;

        match select_winner(results) {
            Some(winner) => {
                info!(
                    "Tribunal winner: {} (confidence {})",
                    winner.model_label,
                    winner.confidence_score
                );
                winner.into()
            }
            None => {
                warn!("Tribunal: all engines failed, returning offline answer");
                TribunalVerdict::offline()
            }
        }
    }
}

/// Highest confidence wins; on a tie the earliest entry is kept.
pub fn select_winner(results: Vec<Option<ProviderResult>>) -> Option<ProviderResult> {
    let mut best: Option<ProviderResult> = None;
    for result in results.into_iter().flatten().filter(ProviderResult::is_usable) {
        let beats = best
            .as_ref()
            .map(|current| result.confidence_score > current.confidence_score)
            .unwrap_or(true);
        if beats {
            best = Some(result);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::verdict::OFFLINE_LABEL;
    use async_trait::async_trait;
    use std::sync::atomic::{ AtomicUsize, Ordering };

    struct ScriptedAdapter {
        name: String,
        reply: Option<(String, u8)>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedAdapter {
        fn answering(name: &str, answer: &str, confidence: u8) -> Arc<Self> {
            Self::delayed(name, Some((answer, confidence)), Duration::ZERO)
        }

        fn failing(name: &str) -> Arc<Self> {
            Self::delayed(name, None, Duration::ZERO)
        }

        fn delayed(name: &str, reply: Option<(&str, u8)>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                reply: reply.map(|(a, c)| (a.to_string(), c)),
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn invoke(&self, _prompt: &Prompt) -> Option<ProviderResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply.as_ref().map(|(answer, confidence)| ProviderResult {
                answer: answer.clone(),
                confidence_score: *confidence,
                scam_detected: false,
                model_label: self.name.clone(),
            })
        }
    }

    fn tribunal(adapters: Vec<Arc<dyn ProviderAdapter>>) -> Tribunal {
        Tribunal::new(adapters, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn more_confident_engine_wins() {
        let t = tribunal(vec![
            ScriptedAdapter::answering("A", "X", 70),
            ScriptedAdapter::answering("B", "Y", 85)
        ]);
        let verdict = t.adjudicate(&Prompt::text("P")).await;
        assert_eq!(verdict.answer, "Y");
        assert_eq!(verdict.confidence_score, 85);
        assert_eq!(verdict.model_label, "B");
    }

    #[tokio::test]
    async fn ties_go_to_first_registered_even_if_it_finishes_last() {
        let t = tribunal(vec![
            ScriptedAdapter::delayed("slow-first", Some(("first", 80)), Duration::from_millis(80)),
            ScriptedAdapter::answering("fast-second", "second", 80)
        ]);
        let verdict = t.adjudicate(&Prompt::text("P")).await;
        assert_eq!(verdict.answer, "first");
    }

    #[tokio::test]
    async fn all_failures_yield_offline_verdict() {
        let t = tribunal(vec![ScriptedAdapter::failing("A"), ScriptedAdapter::failing("B")]);
        let verdict = t.adjudicate(&Prompt::text("P")).await;
        assert_eq!(verdict.confidence_score, 0);
        assert_eq!(verdict.model_label, OFFLINE_LABEL);
        assert!(!verdict.scam_detected);
        assert!(!verdict.answer.is_empty());
        assert!(verdict.is_offline());
    }

    #[tokio::test]
    async fn no_engines_yield_offline_verdict() {
        let verdict = tribunal(Vec::new()).adjudicate(&Prompt::text("P")).await;
        assert!(verdict.is_offline());
    }

    #[tokio::test]
    async fn partial_failure_returns_survivor() {
        let t = tribunal(vec![
            ScriptedAdapter::failing("A"),
            ScriptedAdapter::answering("B", "only answer", 12)
        ]);
        let verdict = t.adjudicate(&Prompt::text("P")).await;
        assert_eq!(verdict.answer, "only answer");
        assert_eq!(verdict.confidence_score, 12);
    }

    #[tokio::test]
    async fn blank_answers_are_discarded() {
        let t = tribunal(vec![
            ScriptedAdapter::answering("A", "   ", 99),
            ScriptedAdapter::answering("B", "real", 10)
        ]);
        assert_eq!(t.adjudicate(&Prompt::text("P")).await.answer, "real");
    }

    #[tokio::test]
    async fn hung_engine_is_cut_off_by_deadline() {
        let hung = ScriptedAdapter::delayed("hung", Some(("late", 100)), Duration::from_secs(30));
        let quick = ScriptedAdapter::answering("quick", "on time", 40);
        let t = Tribunal::new(vec![hung.clone(), quick.clone()], Duration::from_millis(50));

        let started = std::time::Instant::now();
        let verdict = t.adjudicate(&Prompt::text("P")).await;
        assert_eq!(verdict.answer, "on time");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(hung.calls.load(Ordering::SeqCst), 1);
        assert_eq!(quick.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn engines_run_concurrently() {
        let t = Tribunal::new(
            vec![
                ScriptedAdapter::delayed("a", Some(("a", 1)), Duration::from_millis(300)),
                ScriptedAdapter::delayed("b", Some(("b", 2)), Duration::from_millis(300)),
                ScriptedAdapter::delayed("c", Some(("c", 3)), Duration::from_millis(300))
            ],
            Duration::from_secs(5)
        );
        let started = std::time::Instant::now();
        assert_eq!(t.adjudicate(&Prompt::text("P")).await.answer, "c");
        assert!(started.elapsed() < Duration::from_millis(800));
    }

    #[test]
    fn select_winner_keeps_first_of_equal_scores() {
        let make = |answer: &str, score: u8| ProviderResult {
            answer: answer.into(),
            confidence_score: score,
            scam_detected: false,
            model_label: answer.into(),
        };
        let winner = select_winner(
            vec![None, Some(make("a", 50)), Some(make("b", 90)), Some(make("c", 90))]
        ).unwrap();
        assert_eq!(winner.answer, "b");
        assert!(select_winner(vec![None, None]).is_none());
    }
}
