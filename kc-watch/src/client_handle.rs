use std::sync::{
    Mutex,
    PoisonError,
};

use tokio_util::sync::CancellationToken;
use tracing::*;

struct ClientGeneration {
    client: kube::Client,
    signal: CancellationToken,
}

// Holds the current kube client along with a signal that is cancelled when that client gets
// replaced or torn down.  Anybody holding onto an old client can watch the signal to find out that
// they should go get a new one.  The lock is only held for the swap itself.
#[derive(Default)]
pub struct SharedClient {
    current: Mutex<Option<ClientGeneration>>,
}

impl SharedClient {
    pub fn new() -> SharedClient {
        SharedClient::default()
    }

    pub fn get(&self) -> Option<(kube::Client, CancellationToken)> {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current.as_ref().map(|g| (g.client.clone(), g.signal.clone()))
    }

    pub fn set(&self, client: kube::Client, signal: CancellationToken) {
        self.replace(Some(ClientGeneration { client, signal }));
    }

    pub fn close(&self) {
        self.replace(None);
    }

    fn replace(&self, next: Option<ClientGeneration>) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = current.take() {
            info!("closing k8s client channel");
            prev.signal.cancel();
        }
        *current = next;
    }
}

#[cfg(test)]
mod tests {
    use kc_testutils::*;
    use rstest::*;

    use super::*;

    #[rstest]
    #[tokio::test]
    async fn test_get_before_set() {
        let shared = SharedClient::new();
        assert!(shared.get().is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn test_replace_invalidates_holder() {
        let (_fake_apiserver, client) = make_fake_apiserver();
        let shared = SharedClient::new();

        let first = CancellationToken::new();
        shared.set(client.clone(), first.clone());
        let (held_client, held_signal) = shared.get().unwrap();
        assert!(!held_signal.is_cancelled());

        let second = CancellationToken::new();
        shared.set(client, second.clone());

        // The stale holder still has a usable client, but its signal has fired
        assert!(held_signal.is_cancelled());
        assert!(first.is_cancelled());
        let _ = held_client.default_namespace();

        let (_, current_signal) = shared.get().unwrap();
        assert!(!current_signal.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[rstest]
    #[tokio::test]
    async fn test_close() {
        let (_fake_apiserver, client) = make_fake_apiserver();
        let shared = SharedClient::new();
        let signal = CancellationToken::new();
        shared.set(client, signal.clone());

        shared.close();
        assert!(signal.is_cancelled());
        assert!(shared.get().is_none());

        // closing twice is a no-op
        shared.close();
    }
}
