// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::proofs::common::error::{ProofError, ProofResult};

/// Run a remote call, aborting with [`ProofError::Cancelled`] as soon as `cancel` fires
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> ProofResult<T>
where
    F: Future<Output = ProofResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(ProofError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProofError::Cancelled),
        res = fut => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_result_through() {
        let cancel = CancellationToken::new();
        let v = cancellable(&cancel, async { Ok::<_, ProofError>(7) }).await;
        assert_eq!(v.unwrap(), 7);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let v = cancellable(&cancel, async { Ok::<_, ProofError>(7) }).await;
        assert!(matches!(v, Err(ProofError::Cancelled)));
    }

    #[tokio::test]
    async fn cancelled_while_pending() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move { trigger.cancel() });
        let v = cancellable(&cancel, std::future::pending::<ProofResult<()>>()).await;
        assert!(matches!(v, Err(ProofError::Cancelled)));
    }
}
