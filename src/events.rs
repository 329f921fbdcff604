//! Kubernetes events emitted against reconciled clusters.
//!
//! Publishing is fire-and-forget: a failed event is logged and never fails a sync.

use futures::{future::BoxFuture, FutureExt};
use k8s_openapi::api::core::v1::ObjectReference;
use kube_client::Client;
use kube_runtime::events;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

impl From<EventType> for events::EventType {
    fn from(type_: EventType) -> Self {
        match type_ {
            EventType::Normal => events::EventType::Normal,
            EventType::Warning => events::EventType::Warning,
        }
    }
}

/// A sink for events about an object.
pub trait Recorder: Send + Sync {
    /// Records an event. `reason` is a short CamelCase code, `note` the human readable message.
    fn publish<'a>(
        &'a self,
        object: &'a ObjectReference,
        type_: EventType,
        reason: &'a str,
        note: String,
    ) -> BoxFuture<'a, ()>;
}

/// Writes events to the apiserver, reported by the configured controller name.
pub struct KubeRecorder {
    client: Client,
    reporter: events::Reporter,
}

impl KubeRecorder {
    pub fn new(client: Client, reporter: impl Into<String>) -> Self {
        Self {
            client,
            reporter: events::Reporter {
                controller: reporter.into(),
                instance: None,
            },
        }
    }
}

impl Recorder for KubeRecorder {
    fn publish<'a>(
        &'a self,
        object: &'a ObjectReference,
        type_: EventType,
        reason: &'a str,
        note: String,
    ) -> BoxFuture<'a, ()> {
        async move {
            let recorder =
                events::Recorder::new(self.client.clone(), self.reporter.clone(), object.clone());
            let event = events::Event {
                type_: type_.into(),
                reason: reason.to_string(),
                note: Some(note),
                action: "Sync".to_string(),
                secondary: None,
            };
            if let Err(err) = recorder.publish(event).await {
                log::warn!(
                    "Failed to publish {reason} event for {}/{}: {err}",
                    object.namespace.as_deref().unwrap_or_default(),
                    object.name.as_deref().unwrap_or_default(),
                );
            }
        }
        .boxed()
    }
}

#[cfg(test)]
pub(crate) use recording::RecordingRecorder;
