//! LLM-backed analyst panel.
//!
//! Each role maps onto an OpenAI-compatible chat-completions backend. The
//! panel owns the prompts and response parsing; the orchestrator only ever
//! sees `CouncilMessage` with a typed opinion. A response whose JSON block
//! cannot be parsed degrades to a content-only message with a neutral
//! opinion rather than failing the meeting.

use crate::domain::council::{AnalystOpinion, AnalystRole, CouncilMessage};
use crate::domain::errors::AnalystError;
use crate::domain::ports::{AnalystPanel, AnalystRequest, Clock};
use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

pub struct LlmAnalystPanel {
    http: ClientWithMiddleware,
    clock: Arc<dyn Clock>,
    quant: LlmBackendConfig,
    fundamental: LlmBackendConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

const QUANT_SYSTEM_PROMPT: &str = "You are a professional quantitative analyst on an \
investment council for KRX-listed equities. You judge technical indicators, volume and \
turnover behaviour, chart structure and risk. Respond concisely and always close with a \
JSON block: {\"analysis\": str, \"score\": 1-10, \"suggested_percent\": 0-100, \
\"target_price\": int or null, \"stop_loss\": int or null, \"reasoning\": str}";

const FUNDAMENTAL_SYSTEM_PROMPT: &str = "You are a fundamental analyst on an investment \
council for KRX-listed equities. You judge business quality, earnings trajectory and \
valuation. Respond concisely and always close with a JSON block: {\"analysis\": str, \
\"score\": 1-10, \"suggested_percent\": 0-100}";

const MODERATOR_SYSTEM_PROMPT: &str = "You moderate an investment council and produce the \
final consensus. Weigh the quant and fundamental positions, settle on one allocation and \
a holding horizon, and always close with a JSON block: {\"rationale\": str, \
\"suggested_percent\": number, \"holding_days\": 5-21}";

impl LlmAnalystPanel {
    pub fn new(
        clock: Arc<dyn Clock>,
        quant: LlmBackendConfig,
        fundamental: LlmBackendConfig,
    ) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);
        let client = Client::builder()
            .timeout(Duration::from_secs(55))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        let http = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            http,
            clock,
            quant,
            fundamental,
        }
    }

    fn backend(&self, role: AnalystRole) -> &LlmBackendConfig {
        match role {
            AnalystRole::GptQuant => &self.quant,
            // The consensus pass runs on the fundamental backend.
            _ => &self.fundamental,
        }
    }

    fn system_prompt(role: AnalystRole) -> &'static str {
        match role {
            AnalystRole::GptQuant => QUANT_SYSTEM_PROMPT,
            AnalystRole::Moderator => MODERATOR_SYSTEM_PROMPT,
            _ => FUNDAMENTAL_SYSTEM_PROMPT,
        }
    }

    fn conversation_digest(request: &AnalystRequest) -> String {
        if request.prior_messages.is_empty() {
            return "(you speak first)".to_string();
        }
        request
            .prior_messages
            .iter()
            .rev()
            .take(6)
            .rev()
            .map(|m| {
                let content: String = m.content.chars().take(200).collect();
                format!("[{}]: {content}", m.speaker)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn technical_digest(request: &AnalystRequest) -> String {
        let Some(tech) = &request.technical else {
            return "(no chart data available)".to_string();
        };
        let s = &tech.snapshot;
        let mut out = format!(
            "price {} | MA5/20/60 {:.0}/{:.0}/{:.0} | TV5/20 {:.2} | vol shock {:.2} | \
             AVWAP60 {:+.1}% | CMF {:.3} | MFI {:.0} | ADX {:.0} | BBWP {:.0} | \
             ATR% {:.1} | 52w pos {:.0}%",
            s.current_price,
            s.ma_5,
            s.ma_20,
            s.ma_60,
            s.tv5_20_ratio,
            s.volume_shock,
            s.avwap_60_pct,
            s.cmf_20,
            s.mfi_14,
            s.adx,
            s.bbwp,
            s.atr_pct,
            s.position_52w,
        );
        if let Some(score) = tech.composite_score {
            out.push_str(&format!(" | composite {score}/100"));
        }
        if !tech.triggers.is_empty() {
            out.push_str("\nactive triggers:\n");
            for t in tech.triggers.iter().take(12) {
                out.push_str(&format!("- {} {}: {}\n", t.id.code(), t.id.label(), t.details));
            }
        }
        out
    }

    fn user_prompt(role: AnalystRole, request: &AnalystRequest) -> String {
        let base = format!(
            "Symbol: {} ({})\nTrigger: {}\n\nConversation so far:\n{}\n",
            request.company_name,
            request.symbol,
            request.title,
            Self::conversation_digest(request),
        );
        match role {
            AnalystRole::GptQuant => format!(
                "{base}\nTechnical picture:\n{}\n\nTask: {}",
                Self::technical_digest(request),
                request.request
            ),
            AnalystRole::Moderator => format!("{base}\nTask: {}", request.request),
            _ => match &request.fundamentals {
                Some(data) => format!(
                    "{base}\nFinancial report digest:\n{data}\n\nTask: {}",
                    request.request
                ),
                None => format!(
                    "{base}\nNo financial report data is available for this name; judge from \
                     sector knowledge and the conversation, and say so explicitly.\n\nTask: {}",
                    request.request
                ),
            },
        }
    }

    fn extract_json_block(content: &str) -> Option<serde_json::Value> {
        let candidate = if let Some(start) = content.find("```json") {
            content[start + 7..].split("```").next()?
        } else if let Some(start) = content.find("```") {
            content[start + 3..].split("```").next()?
        } else {
            // Last top-level object in the reply.
            let start = content.rfind('{')?;
            &content[start..]
        };
        serde_json::from_str(candidate.trim()).ok()
    }

    fn opinion_from(role: AnalystRole, parsed: &serde_json::Value) -> AnalystOpinion {
        let score = parsed.get("score").and_then(|v| v.as_i64()).unwrap_or(5).clamp(1, 10);
        let percent = parsed
            .get("suggested_percent")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        match role {
            AnalystRole::GptQuant => AnalystOpinion::Quant {
                score,
                suggested_percent: percent,
                target_price: parsed.get("target_price").and_then(|v| v.as_i64()),
                stop_loss: parsed.get("stop_loss").and_then(|v| v.as_i64()),
            },
            AnalystRole::Moderator => AnalystOpinion::Consensus {
                suggested_percent: percent,
                holding_days: parsed
                    .get("holding_days")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(10),
            },
            _ => AnalystOpinion::Fundamental {
                score,
                suggested_percent: percent,
            },
        }
    }

    fn fallback_opinion(role: AnalystRole) -> AnalystOpinion {
        match role {
            AnalystRole::GptQuant => AnalystOpinion::Quant {
                score: 5,
                suggested_percent: 0.0,
                target_price: None,
                stop_loss: None,
            },
            AnalystRole::Moderator => AnalystOpinion::Consensus {
                suggested_percent: 0.0,
                holding_days: 10,
            },
            _ => AnalystOpinion::Fundamental {
                score: 5,
                suggested_percent: 0.0,
            },
        }
    }
}

#[async_trait]
impl AnalystPanel for LlmAnalystPanel {
    async fn analyze(
        &self,
        role: AnalystRole,
        request: AnalystRequest,
    ) -> Result<CouncilMessage, AnalystError> {
        let backend = self.backend(role);
        let body = json!({
            "model": backend.model,
            "messages": [
                { "role": "system", "content": Self::system_prompt(role) },
                { "role": "user", "content": Self::user_prompt(role, &request) },
            ],
            "temperature": 0.7,
            "max_tokens": 600,
        });

        let url = format!("{}/chat/completions", backend.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&backend.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalystError::Backend {
                reason: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(AnalystError::Backend {
                reason: format!("backend returned {}", response.status()),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| AnalystError::Malformed {
            reason: format!("invalid response body: {e}"),
        })?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| AnalystError::Malformed {
                reason: "empty choices".to_string(),
            })?;

        let opinion = match Self::extract_json_block(&content) {
            Some(parsed) => Self::opinion_from(role, &parsed),
            None => {
                warn!(
                    "LlmAnalystPanel: {role:?} reply had no parseable JSON block, using defaults"
                );
                Self::fallback_opinion(role)
            }
        };

        debug!("LlmAnalystPanel: {role:?} answered for {}", request.symbol);
        Ok(CouncilMessage::new(role, content, Some(opinion), self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_block_variants() {
        let fenced = "analysis...\n```json\n{\"score\": 8}\n```";
        assert_eq!(
            LlmAnalystPanel::extract_json_block(fenced).unwrap()["score"],
            8
        );

        let bare = "thoughts first {\"score\": 7, \"suggested_percent\": 20}";
        let parsed = LlmAnalystPanel::extract_json_block(bare).unwrap();
        assert_eq!(parsed["suggested_percent"], 20);

        assert!(LlmAnalystPanel::extract_json_block("no json here").is_none());
    }

    #[test]
    fn test_opinion_mapping_per_role() {
        let parsed = serde_json::json!({
            "score": 8, "suggested_percent": 30.0,
            "target_price": 80000, "stop_loss": 65000,
            "holding_days": 14,
        });

        match LlmAnalystPanel::opinion_from(AnalystRole::GptQuant, &parsed) {
            AnalystOpinion::Quant {
                score,
                target_price,
                stop_loss,
                ..
            } => {
                assert_eq!(score, 8);
                assert_eq!(target_price, Some(80_000));
                assert_eq!(stop_loss, Some(65_000));
            }
            other => panic!("expected quant opinion, got {other:?}"),
        }

        match LlmAnalystPanel::opinion_from(AnalystRole::Moderator, &parsed) {
            AnalystOpinion::Consensus { holding_days, .. } => assert_eq!(holding_days, 14),
            other => panic!("expected consensus opinion, got {other:?}"),
        }
    }

    #[test]
    fn test_score_clamped_into_band() {
        let parsed = serde_json::json!({ "score": 99, "suggested_percent": 10.0 });
        match LlmAnalystPanel::opinion_from(AnalystRole::ClaudeFundamental, &parsed) {
            AnalystOpinion::Fundamental { score, .. } => assert_eq!(score, 10),
            other => panic!("unexpected {other:?}"),
        }
    }
}
