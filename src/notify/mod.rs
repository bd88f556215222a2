pub mod telegram;

pub use telegram::TelegramNotifier;

use crate::ledger::ActionReference;
use async_trait::async_trait;

/// Severity of an operator notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

impl NoticeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// Best-effort delivery of human-readable status messages.
///
/// Delivery failures never reach the caller; implementations log and swallow
/// them so reporting can never take the keeper down.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, kind: NoticeKind, text: &str, reference: Option<&ActionReference>);
}

/// Fallback notifier used when no delivery channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, kind: NoticeKind, text: &str, reference: Option<&ActionReference>) {
        match (kind, reference) {
            (NoticeKind::Error, _) => tracing::error!(kind = kind.label(), "{text}"),
            (_, Some(reference)) => {
                tracing::info!(kind = kind.label(), %reference, "{text}");
            }
            (_, None) => tracing::info!(kind = kind.label(), "{text}"),
        }
    }
}
