//! Delivery sinks for normalized updates
//!
//! Each distributor fans every delivered update out to the sinks its
//! `SenderFactory` created. Sinks are independent: one failing sink never
//! stops delivery to the others.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::specification::DistributionContext;
use super::update::NormalizedUpdate;
use crate::errors::SinkError;

/// A destination for normalized updates
pub trait MarketDataSink: Send + Sync {
    fn name(&self) -> &str;

    fn send(&self, update: &NormalizedUpdate) -> Result<(), SinkError>;
}

/// Creates the sinks for a new distributor
pub trait SenderFactory: Send + Sync {
    fn create(&self, context: &DistributionContext) -> Vec<Arc<dyn MarketDataSink>>;
}

impl<F> SenderFactory for F
where
    F: Fn(&DistributionContext) -> Vec<Arc<dyn MarketDataSink>> + Send + Sync,
{
    fn create(&self, context: &DistributionContext) -> Vec<Arc<dyn MarketDataSink>> {
        self(context)
    }
}

/// Forwards updates to a consumer channel
///
/// Each consumer gets its own unbounded channel, so a slow consumer never
/// holds up the distributor's data path.
pub struct ChannelSink {
    name: String,
    tx: mpsc::UnboundedSender<NormalizedUpdate>,
}

impl ChannelSink {
    /// Create a sink and the receiver its consumer should listen on
    pub fn new(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<NormalizedUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::from_sender(name, tx), rx)
    }

    /// Sink writing into an existing channel, e.g. one shared by many subscriptions
    pub fn from_sender(name: impl Into<String>, tx: mpsc::UnboundedSender<NormalizedUpdate>) -> Self {
        Self { name: name.into(), tx }
    }
}

impl MarketDataSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, update: &NormalizedUpdate) -> Result<(), SinkError> {
        self.tx
            .send(update.clone())
            .map_err(|_| SinkError::Closed(self.name.clone()))
    }
}

/// Logs every update at debug level
#[derive(Debug, Clone)]
pub struct LoggingSink {
    name: String,
}

impl LoggingSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl MarketDataSink for LoggingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, update: &NormalizedUpdate) -> Result<(), SinkError> {
        tracing::debug!(
            "[{}] #{} {} {} fields",
            self.name,
            update.sequence_number,
            update.specification,
            update.fields.len()
        );
        Ok(())
    }
}

/// Keeps every update in memory
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    name: String,
    received: Arc<Mutex<Vec<NormalizedUpdate>>>,
}

impl CollectingSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn received(&self) -> Vec<NormalizedUpdate> {
        self.received.lock().clone()
    }

    pub fn sequence_numbers(&self) -> Vec<u64> {
        self.received.lock().iter().map(|u| u.sequence_number).collect()
    }

    pub fn len(&self) -> usize {
        self.received.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.lock().is_empty()
    }
}

impl MarketDataSink for CollectingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, update: &NormalizedUpdate) -> Result<(), SinkError> {
        self.received.lock().push(update.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::fields::FieldContainer;
    use crate::market_data::specification::{ExternalId, LiveDataSpecification};

    fn update(seq: u64) -> NormalizedUpdate {
        NormalizedUpdate::new(
            seq,
            LiveDataSpecification::new("Raw", ExternalId::of("TICKER", "EURUSD")),
            FieldContainer::new().with("BID", 1i64),
        )
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new("websocket");
        sink.send(&update(0)).unwrap();

        let received = tokio::time::timeout(tokio::time::Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.sequence_number, 0);
    }

    #[test]
    fn test_channel_sink_reports_closed_receiver() {
        let (sink, rx) = ChannelSink::new("websocket");
        drop(rx);

        assert_eq!(sink.send(&update(0)), Err(SinkError::Closed("websocket".to_string())));
    }

    #[test]
    fn test_collecting_sink_clones_share_storage() {
        let sink = CollectingSink::new("collector");
        let handle = sink.clone();

        sink.send(&update(0)).unwrap();
        sink.send(&update(1)).unwrap();

        assert_eq!(handle.sequence_numbers(), vec![0, 1]);
    }

    #[test]
    fn test_closure_is_a_sender_factory() {
        let collector = CollectingSink::new("collector");
        let factory = {
            let collector = collector.clone();
            move |_ctx: &DistributionContext| -> Vec<Arc<dyn MarketDataSink>> {
                vec![Arc::new(collector.clone()), Arc::new(LoggingSink::new("log"))]
            }
        };

        let context = DistributionContext {
            subscription: crate::market_data::SubscriptionHandle::new(
                "test",
                LiveDataSpecification::new("Raw", ExternalId::of("TICKER", "EURUSD")),
            ),
            persistent: false,
        };
        assert_eq!(factory.create(&context).len(), 2);
    }
}
