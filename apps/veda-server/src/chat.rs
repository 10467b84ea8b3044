use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use veda_kernel::NewMessage;

use crate::ledger::Ledger;
use crate::oracle::{Oracle, OracleError};

/// Reply shown to the user when the oracle could not answer.
pub(crate) const APOLOGY: &str = "Sorry, I could not process your request.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChatOutcome {
    pub reply: String,
    pub is_winner: bool,
    pub persisted: bool,
}

/// Oracle round-trip followed by a best-effort ledger append.
pub(crate) struct ChatService {
    oracle: Arc<dyn Oracle>,
    ledger: Arc<Ledger>,
    win_phrase: Option<String>,
}

impl ChatService {
    pub fn new(oracle: Arc<dyn Oracle>, ledger: Arc<Ledger>, win_phrase: Option<String>) -> Self {
        let win_phrase = win_phrase
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty());
        Self {
            oracle,
            ledger,
            win_phrase,
        }
    }

    pub fn is_winner(&self, reply: &str) -> bool {
        match &self.win_phrase {
            Some(phrase) => reply.to_lowercase().contains(phrase.as_str()),
            None => false,
        }
    }

    /// Nothing is persisted when the oracle fails. A failed append is logged and
    /// the reply is still returned.
    pub async fn ask(&self, message: &str, wallet: Option<&str>) -> Result<ChatOutcome, OracleError> {
        let reply = match self.oracle.complete(message).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(code = err.code(), "oracle error: {}", err);
                return Err(err);
            }
        };
        let is_winner = self.is_winner(&reply);
        if is_winner {
            info!("winning reply issued");
        }

        let Some(wallet) = wallet.map(str::trim).filter(|w| !w.is_empty()) else {
            debug!("chat without wallet address; not persisted");
            return Ok(ChatOutcome {
                reply,
                is_winner,
                persisted: false,
            });
        };
        let persisted = match NewMessage::new(wallet, message, reply.as_str()) {
            Ok(new) => match self.ledger.append(new).await {
                Ok(row) => {
                    debug!(id = row.id, "chat exchange persisted");
                    true
                }
                Err(err) => {
                    warn!(code = err.code(), "chat exchange not persisted: {}", err);
                    false
                }
            },
            Err(err) => {
                warn!(code = err.code(), "chat exchange not persisted: {}", err);
                false
            }
        };
        Ok(ChatOutcome {
            reply,
            is_winner,
            persisted,
        })
    }
}

/// Process-local query counter; starts at zero on every boot.
#[derive(Debug, Default)]
pub(crate) struct QueryCounter(AtomicU64);

impl QueryCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}
