//! Prometheus metrics exposed on `/metrics`.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use rr_core::models::Verification;

pub const OUTCOME_REJECTED: &str = "rejected";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

pub struct Metrics {
    registry: Registry,
    submissions: Family<OutcomeLabels, Counter>,
    listings: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let submissions = Family::<OutcomeLabels, Counter>::default();
        let listings = Counter::default();

        // Counters get the `_total` suffix on encode.
        registry.register(
            "rating_submissions",
            "Rating submissions by verification outcome",
            submissions.clone(),
        );
        registry.register(
            "content_listings",
            "Content listing requests served",
            listings.clone(),
        );

        Self {
            registry,
            submissions,
            listings,
        }
    }

    pub fn record_submission(&self, verification: Verification) {
        self.record_outcome(verification.as_str());
    }

    pub fn record_rejection(&self) {
        self.record_outcome(OUTCOME_REJECTED);
    }

    fn record_outcome(&self, outcome: &str) {
        self.submissions
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_listing(&self) {
        self.listings.inc();
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
