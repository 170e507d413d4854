//! Narrative text: flavor lines for encounters and structured random
//! events. An external generation service can be enabled behind the
//! `narrative` feature; the canned local content below is always
//! compiled in and is the unconditional fallback, so combat and
//! exploration never block on the network.

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::NarrativeConfig;
use crate::game::types::{ActiveEvent, EventOutcome};
#[cfg(feature = "narrative")]
use crate::services::Gate;
use crate::services::{LatencyTracker, QuotaGuard};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeKind {
    Encounter,
    Story,
}

#[derive(Debug, Clone, Serialize)]
pub struct NarrativeRequest {
    pub kind: NarrativeKind,
    pub context: String,
}

/// Wire shape of a structured event from the service.
#[derive(Debug, Clone, Deserialize)]
pub struct NarrativePayload {
    pub description: String,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub outcomes: Vec<EventOutcome>,
}

const ENCOUNTER_LINES: &[&str] = &[
    "Something rustles in the undergrowth.",
    "A low growl rolls out of the dark.",
    "You catch a glint of eyes watching you.",
    "The air goes still. You are not alone.",
];

/// Canned flavor line for an encounter.
pub fn fallback_line(rng: &mut impl Rng) -> String {
    ENCOUNTER_LINES[rng.gen_range(0..ENCOUNTER_LINES.len())].to_string()
}

/// Canned structured events. Kept small; each has aligned choices and
/// outcomes so the event module can index them safely.
pub fn fallback_event(rng: &mut impl Rng) -> ActiveEvent {
    let events = [
        ActiveEvent {
            description: "A battered strongbox sits half-buried by the path.".into(),
            choices: vec!["Pry it open".into(), "Leave it be".into()],
            outcomes: vec![EventOutcome::Gold(25), EventOutcome::Nothing],
        },
        ActiveEvent {
            description: "A wandering healer offers you a poultice.".into(),
            choices: vec!["Accept".into(), "Decline".into()],
            outcomes: vec![EventOutcome::Heal(20), EventOutcome::Nothing],
        },
        ActiveEvent {
            description: "A rotted rope bridge sways over a ravine.".into(),
            choices: vec!["Cross carefully".into(), "Go around".into()],
            outcomes: vec![EventOutcome::Damage(8), EventOutcome::Nothing],
        },
        ActiveEvent {
            description: "A trapper's abandoned camp still holds supplies.".into(),
            choices: vec!["Search the packs".into(), "Move on".into()],
            outcomes: vec![
                EventOutcome::Item("healing_draught".into()),
                EventOutcome::Nothing,
            ],
        },
    ];
    events[rng.gen_range(0..events.len())].clone()
}

/// Client for the external narrative service. Degrades to the canned
/// content on any failure, timeout, quota exhaustion, or sustained
/// slowness.
pub struct NarrativeClient {
    config: NarrativeConfig,
    quota: QuotaGuard,
    latency: LatencyTracker,
    #[cfg(feature = "narrative")]
    http: reqwest::Client,
}

impl NarrativeClient {
    pub fn new(config: NarrativeConfig) -> Self {
        let quota = QuotaGuard::new(config.daily_quota);
        let latency = LatencyTracker::new(std::time::Duration::from_millis(config.timeout_ms));
        Self {
            config,
            quota,
            latency,
            #[cfg(feature = "narrative")]
            http: reqwest::Client::new(),
        }
    }

    /// A generated encounter flavor line, if the service produced one.
    /// `None` means use the canned content.
    pub async fn remote_line(&self, context: &str) -> Option<String> {
        let payload = self.request(NarrativeKind::Encounter, context).await?;
        Some(crate::logutil::escape_log(&payload.description))
    }

    /// A generated story event. Misaligned payloads yield `None` so the
    /// caller can index choices and outcomes safely.
    pub async fn remote_event(&self, context: &str) -> Option<ActiveEvent> {
        let payload = self.request(NarrativeKind::Story, context).await?;
        if payload.choices.is_empty() || payload.choices.len() != payload.outcomes.len() {
            warn!("Narrative payload misaligned, using canned event");
            return None;
        }
        Some(ActiveEvent {
            description: crate::logutil::escape_log(&payload.description),
            choices: payload.choices,
            outcomes: payload.outcomes,
        })
    }

    #[cfg(feature = "narrative")]
    async fn request(&self, kind: NarrativeKind, context: &str) -> Option<NarrativePayload> {
        let endpoint = self.config.endpoint.as_deref()?;
        if !self.quota.should_allow() {
            debug!("Narrative quota exhausted, using canned content");
            return None;
        }
        if !self.latency.should_allow() {
            debug!("Narrative service too slow lately, using canned content");
            return None;
        }
        self.quota.record_event();
        let started = std::time::Instant::now();
        let response = self
            .http
            .post(endpoint)
            .timeout(std::time::Duration::from_millis(self.config.timeout_ms))
            .json(&NarrativeRequest {
                kind,
                context: context.to_string(),
            })
            .send()
            .await;
        self.latency.record_sample(started.elapsed());
        match response {
            Ok(response) => match response.json::<NarrativePayload>().await {
                Ok(payload) => Some(payload),
                Err(err) => {
                    warn!("Narrative response malformed: {}", err);
                    None
                }
            },
            Err(err) => {
                warn!("Narrative request failed: {}", err);
                self.latency.record_event();
                None
            }
        }
    }

    #[cfg(not(feature = "narrative"))]
    async fn request(&self, _kind: NarrativeKind, _context: &str) -> Option<NarrativePayload> {
        let _ = (&self.config, &self.quota, &self.latency);
        debug!("Narrative service disabled at build time");
        None
    }
}
