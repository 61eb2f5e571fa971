//! Fire-and-forget admin notification for newly recorded payments.
//!
//! At most one delivery attempt per inserted record. Failures are logged and
//! dropped; they never reach the caller that recorded the payment.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::domain::Payment;
use crate::services::email::{EmailMessage, EmailTransport, NotificationError};
use crate::validation::PRICE_SCALE;

pub const NOTIFICATION_SUBJECT: &str = "New Payment Received";

#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn EmailTransport>,
    recipient: Option<String>,
    currency: String,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn EmailTransport>, recipient: Option<String>, currency: String) -> Self {
        Self {
            transport,
            recipient,
            currency: currency.to_uppercase(),
        }
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn compose(&self, payment: &Payment, recipient: &str) -> EmailMessage {
        let paid_at = payment.created_at.format("%d %b %Y, %H:%M:%S UTC").to_string();
        let amount = format!("{} {}", payment.product_price.with_scale(PRICE_SCALE), self.currency);

        let text = format!(
            "New payment notification\n\n\
             Customer name: {}\n\
             Customer email: {}\n\
             Product: {}\n\
             Amount: {}\n\
             Payment date: {}\n\
             Payment ID: {}\n",
            payment.buyer_name, payment.buyer_email, payment.product_name, amount, paid_at, payment.id
        );

        let html = format!(
            "<h2>New Payment Notification</h2>\
             <table>\
             <tr><td><strong>Customer Name:</strong></td><td>{}</td></tr>\
             <tr><td><strong>Customer Email:</strong></td><td>{}</td></tr>\
             <tr><td><strong>Product:</strong></td><td>{}</td></tr>\
             <tr><td><strong>Amount:</strong></td><td>{}</td></tr>\
             <tr><td><strong>Payment Date:</strong></td><td>{}</td></tr>\
             </table>\
             <p>Payment ID: {}</p>",
            escape_html(&payment.buyer_name),
            escape_html(&payment.buyer_email),
            escape_html(&payment.product_name),
            escape_html(&amount),
            paid_at,
            payment.id
        );

        EmailMessage {
            to: recipient.to_string(),
            subject: NOTIFICATION_SUBJECT.to_string(),
            text,
            html,
        }
    }

    /// One delivery attempt, awaited. Used directly by the diagnostic
    /// endpoint; the recording path goes through [`Self::dispatch`].
    pub async fn notify(&self, payment: &Payment) -> Result<(), NotificationError> {
        let recipient = self
            .recipient
            .as_deref()
            .ok_or_else(|| NotificationError::NotConfigured("ADMIN_EMAIL not set".to_string()))?;

        let message = self.compose(payment, recipient);
        self.transport.send(&message).await
    }

    /// Detach a single notification attempt. The returned handle is only for
    /// tests and shutdown; callers on the request path drop it.
    pub fn dispatch(&self, payment: Payment) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            match dispatcher.notify(&payment).await {
                Ok(()) => tracing::info!(
                    payment_id = %payment.id,
                    transport = dispatcher.transport_name(),
                    "payment notification sent"
                ),
                Err(NotificationError::NotConfigured(reason)) => tracing::warn!(
                    payment_id = %payment.id,
                    reason = %reason,
                    "payment notification skipped"
                ),
                Err(e) => tracing::error!(
                    payment_id = %payment.id,
                    transport = dispatcher.transport_name(),
                    error = %e,
                    "payment notification failed"
                ),
            }
        })
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
