//! Notification boundary — fire-and-forget.
//!
//! RULE: a failed notification is logged and dropped. It never rolls back
//! or blocks a ledger mutation.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeTemplate {
    Welcome,
    WithdrawalSuccess,
    WithdrawalFailed,
    PaymentConfirmed,
}

impl NoticeTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeTemplate::Welcome => "welcome",
            NoticeTemplate::WithdrawalSuccess => "withdrawal_success",
            NoticeTemplate::WithdrawalFailed => "withdrawal_failed",
            NoticeTemplate::PaymentConfirmed => "payment_confirmed",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, account_id: &str, template: NoticeTemplate, context: &Value)
        -> anyhow::Result<()>;
}

/// Default notifier: writes the notice to the log. The real mail/SMS
/// collaborator lives outside the core.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(
        &self,
        account_id: &str,
        template: NoticeTemplate,
        context: &Value,
    ) -> anyhow::Result<()> {
        log::info!(
            "notify account={account_id} template={} context={context}",
            template.as_str()
        );
        Ok(())
    }
}

/// Send through `notifier`, demoting any failure to a warning.
pub fn dispatch(notifier: &dyn Notifier, account_id: &str, template: NoticeTemplate, context: &Value) {
    if let Err(e) = notifier.notify(account_id, template, context) {
        log::warn!(
            "notification failed account={account_id} template={}: {e}",
            template.as_str()
        );
    }
}
