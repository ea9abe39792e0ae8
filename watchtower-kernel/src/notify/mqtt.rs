use super::{AlertSink, NotifyError};
use crate::config::MqttConf;
use async_trait::async_trait;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct AlertMessage<'a> {
    pub alert_id: String,
    pub subject: &'a str,
    pub body: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl<'a> AlertMessage<'a> {
    pub fn new(subject: &'a str, body: &'a str) -> Self {
        Self {
            alert_id: Uuid::new_v4().to_string(),
            subject,
            body,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Publishes alerts as JSON on a broker topic.
pub struct MqttAlertSink {
    client: AsyncClient,
    topic: String,
}

impl MqttAlertSink {
    /// Connects lazily; the event loop task keeps retrying in the background.
    /// Must be called from inside a tokio runtime.
    pub fn spawn(conf: &MqttConf) -> Self {
        let mut opts = MqttOptions::new(conf.client_id.clone(), conf.host.clone(), conf.port);
        opts.set_keep_alive(Duration::from_secs(15));
        let (client, mut eventloop) = AsyncClient::new(opts, 10);

        let host = conf.host.clone();
        task::spawn(async move {
            loop {
                if let Err(e) = eventloop.poll().await {
                    tracing::warn!(broker = %host, error = ?e, "MQTT connection error");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        });

        Self { client, topic: conf.topic.clone() }
    }
}

#[async_trait]
impl AlertSink for MqttAlertSink {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let payload = serde_json::to_vec(&AlertMessage::new(subject, body))?;
        self.client.publish(&self.topic, QoS::AtLeastOnce, false, payload).await?;
        tracing::debug!(topic = %self.topic, subject, "alert published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_message_shape() {
        let msg = AlertMessage::new("[Alert] NAS is ONLINE", "NAS (10.0.0.5) is now ONLINE");
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["subject"], "[Alert] NAS is ONLINE");
        assert_eq!(value["body"], "NAS (10.0.0.5) is now ONLINE");
        assert!(Uuid::parse_str(value["alert_id"].as_str().unwrap()).is_ok());
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }
}
