//! Test support: one-time tracing setup and fixtures

use std::env;
use std::sync::Once;
use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{Dataset, EffectOp, Node, Stage};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "debug");
        }
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Small dataset exercising every rule: principle tiers, AND/OR
/// requirements, stage gates, effects and a label-inferred stackable node.
///
/// Principle costs: ten 4, zetsu 3, ren 3, hatsu 5, fund 21.
pub fn sample_dataset() -> Dataset {
    Dataset::new(
        60,
        vec![
            Node::new("ten", 4)
                .with_label("Ten")
                .with_tags(&["Ten"])
                .with_type("principle")
                .with_effect("aura", EffectOp::Add, 2.0),
            Node::new("zetsu", 3)
                .with_label("Zetsu")
                .with_tags(&["Zetsu"])
                .with_requires(&["ten"]),
            Node::new("ren", 3)
                .with_label("Ren")
                .with_tags(&["Ren"])
                .with_requires(&["ten"])
                .with_effect("aura", EffectOp::Mul, 1.5),
            Node::new("hatsu", 5)
                .with_label("Hatsu")
                .with_tags(&["Hatsu"])
                .with_requires(&["ten", "ren"]),
            Node::new("gyo", 2)
                .with_label("Gyo")
                .with_tags(&["Gyo"])
                .with_requires_any(&["ren", "zetsu"])
                .with_stage(Stage::Expert),
            Node::new("ko", 4)
                .with_label("Ko")
                .with_tags(&["Ko"])
                .with_requires(&["gyo"])
                .with_stage(Stage::Master),
            Node::new("aura", 2)
                .with_label("Expansão de Aura")
                .with_tags(&["En"])
                .with_requires(&["ten"]),
            Node::new("fund", 21)
                .with_label("Fundamentos")
                .with_tags(&["Fundamental"]),
        ],
    )
}
