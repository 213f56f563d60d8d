use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// Scoped transaction for multi-step writes.
///
/// Call [`release`](Self::release) on every exit path. Releasing rolls back a transaction
/// that has not been committed and does nothing after a commit, so it can be called
/// unconditionally.
pub struct TransactionGuard {
    tx: Option<Transaction<'static, Postgres>>,
    label: &'static str,
}

impl TransactionGuard {
    pub async fn begin(pool: &PgPool, label: &'static str) -> crate::Result<Self> {
        let tx = pool.begin().await?;
        tracing::debug!(transaction = label, "transaction started");
        Ok(Self { tx: Some(tx), label })
    }

    /// The open connection. Fails once the transaction was committed or released.
    pub fn conn(&mut self) -> crate::Result<&mut PgConnection> {
        let label = self.label;
        self.tx.as_deref_mut().ok_or_else(|| {
            crate::Error::Internal(anyhow::anyhow!("transaction '{}' is already finished", label))
        })
    }

    pub async fn commit(&mut self) -> crate::Result<()> {
        match self.tx.take() {
            Some(tx) => {
                tx.commit().await?;
                tracing::debug!(transaction = self.label, "transaction committed");
                Ok(())
            }
            None => Err(crate::Error::Internal(anyhow::anyhow!(
                "transaction '{}' is already finished",
                self.label
            ))),
        }
    }

    pub async fn release(&mut self) {
        if let Some(tx) = self.tx.take() {
            match tx.rollback().await {
                Ok(()) => tracing::debug!(transaction = self.label, "transaction rolled back"),
                // the connection is closed instead; the server discards the transaction
                Err(e) => tracing::warn!(transaction = self.label, error = %e, "rollback failed"),
            }
        }
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::debug!(transaction = self.label, "transaction dropped while open");
        }
    }
}
