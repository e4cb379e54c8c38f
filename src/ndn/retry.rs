use tracing::{debug, warn};
use crate::error::AbacError;
use super::{face::{Face, RequestFailure}, packet::{Data, Interest}};

/// Expresses `interest` until Data arrives or `attempts` NACKs/timeouts
/// have been seen. Every retransmission carries a fresh nonce.
pub async fn express_with_retry(
    face: &dyn Face,
    interest: &Interest,
    attempts: u32,
) -> Result<Data, AbacError> {
    let attempts = attempts.max(1);
    let mut last = RequestFailure::Timeout;
    for attempt in 1..=attempts {
        let mut outgoing = interest.clone();
        if attempt > 1 {
            outgoing.refresh_nonce();
        }
        match face.express_interest(outgoing).await {
            Ok(data) => {
                debug!(name = %interest.name, attempt, "received data");
                return Ok(data);
            }
            Err(failure) => {
                warn!(name = %interest.name, attempt, attempts, %failure, "request failed");
                last = failure;
            }
        }
    }
    Err(AbacError::Transport(format!(
        "{} for {} after {} attempts",
        last, interest.name, attempts
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndn::{face::{sync_handler, Forwarder}, name::Name};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn one_loss_is_absorbed() {
        let forwarder = Forwarder::new();
        let server = forwarder.add_face();
        let client = forwarder.add_face();
        let prefix = Name::from_uri("/aa/PUBLIC_PARAMS").unwrap();
        let _registration = server.set_interest_filter(
            prefix.clone(),
            sync_handler(|i: Interest| Some(Data::with_content(i.name, b"pp".to_vec()))),
        );
        forwarder.inject_loss(prefix.clone(), 1);
        let interest = Interest::new(prefix).with_lifetime(Duration::from_millis(200));
        let data = express_with_retry(client.as_ref(), &interest, 3).await.unwrap();
        assert_eq!(&data.content[..], b"pp");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_are_terminal() {
        let forwarder = Forwarder::new();
        let server = forwarder.add_face();
        let client = forwarder.add_face();
        let prefix = Name::from_uri("/aa/PUBLIC_PARAMS").unwrap();
        let _registration = server.set_interest_filter(
            prefix.clone(),
            sync_handler(|i: Interest| Some(Data::with_content(i.name, b"pp".to_vec()))),
        );
        forwarder.inject_loss(prefix.clone(), 3);
        let interest = Interest::new(prefix).with_lifetime(Duration::from_millis(200));
        let result = express_with_retry(client.as_ref(), &interest, 3).await;
        assert!(matches!(result, Err(AbacError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn nacks_are_retried_too() {
        let forwarder = Forwarder::new();
        let client = forwarder.add_face();
        let interest = Interest::new(Name::from_uri("/nowhere").unwrap());
        let result = express_with_retry(client.as_ref(), &interest, 2).await;
        match result {
            Err(AbacError::Transport(reason)) => assert!(reason.contains("after 2 attempts")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
