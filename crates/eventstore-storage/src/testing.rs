//! Test helpers for asserting on emitted log events

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::Level;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// Collects the message of every WARN event
struct WarningLayer {
    messages: Arc<Mutex<Vec<String>>>,
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            self.messages.lock().push(message);
        }
    }
}

/// Run `f` on this thread, returning its result and the WARN messages it emitted
pub(crate) fn capture_warnings<F, R>(f: F) -> (R, Vec<String>)
where
    F: FnOnce() -> R,
{
    let messages = Arc::new(Mutex::new(Vec::new()));
    let layer = WarningLayer {
        messages: messages.clone(),
    };
    let subscriber = tracing_subscriber::registry().with(layer);
    let result = tracing::subscriber::with_default(subscriber, f);
    let messages = messages.lock().clone();
    (result, messages)
}
