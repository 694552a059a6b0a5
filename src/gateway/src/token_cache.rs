// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::Result;
use crate::token::{Token, TokenProvider};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
// Using tokio's wrapper makes the cache testable without relying on clock times.
use tokio::time::Instant;

// A login in progress. Every caller that needs a token while the login is
// outstanding awaits a clone of the same future.
type Refresh = Shared<BoxFuture<'static, Result<Token>>>;

#[derive(Default)]
struct CacheState {
    // The cached token. `None` before the first login, after a forced
    // refresh, and after a failed login.
    token: Option<Token>,

    // The in-flight refresh, if any. Cleared when the login settles.
    refresh: Option<Refresh>,
}

impl CacheState {
    fn valid_token(&self, margin: Duration) -> Option<Token> {
        self.token
            .as_ref()
            .filter(|t| !t.is_expired_at(Instant::now(), margin))
            .cloned()
    }
}

/// Caches the token returned by `T` and coalesces concurrent refreshes.
///
/// Clones share the cached token and the in-flight refresh.
pub(crate) struct TokenCache<T>
where
    T: TokenProvider,
{
    state: Arc<Mutex<CacheState>>,

    // Treat tokens as expired this long before their declared expiry.
    refresh_margin: Duration,

    // The token provider. This thing does the refreshing.
    inner: Arc<T>,
}

// We manually implement the `Clone` trait because the Rust compiler will
// squawk if `T` is not `Clone`, even though we only hold an `Arc<T>`.
impl<T: TokenProvider> Clone for TokenCache<T> {
    fn clone(&self) -> TokenCache<T> {
        TokenCache {
            state: self.state.clone(),
            refresh_margin: self.refresh_margin,
            inner: self.inner.clone(),
        }
    }
}

impl<T: TokenProvider> std::fmt::Debug for TokenCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("refresh_margin", &self.refresh_margin)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<T: TokenProvider + 'static> TokenCache<T> {
    pub(crate) fn new(inner: T, refresh_margin: Duration) -> TokenCache<T> {
        TokenCache {
            state: Arc::new(Mutex::new(CacheState::default())),
            refresh_margin,
            inner: Arc::new(inner),
        }
    }

    /// Returns the cached token, refreshing it if it is absent or expired.
    pub(crate) async fn token(&self) -> Result<Token> {
        let refresh = {
            let mut state = self.state.lock().await;
            if let Some(token) = state.valid_token(self.refresh_margin) {
                tracing::trace!("using cached upstream token");
                return Ok(token);
            }
            self.join_or_start(&mut state)
        };
        // The state lock is released, other callers can join the refresh.
        refresh.await
    }

    /// Refreshes the token after the upstream rejected `rejected`.
    ///
    /// The expiry check is bypassed. If the cache already holds a newer
    /// token, some other caller refreshed it after `rejected` was issued and
    /// that token is returned without a new login.
    pub(crate) async fn refresh(&self, rejected: &Token) -> Result<Token> {
        let refresh = {
            let mut state = self.state.lock().await;
            if let Some(current) = state.valid_token(self.refresh_margin) {
                if current.token != rejected.token {
                    tracing::debug!("upstream token already refreshed by another caller");
                    return Ok(current);
                }
            }
            state.token = None;
            self.join_or_start(&mut state)
        };
        refresh.await
    }

    /// Discards the cached token. An in-flight refresh is not affected.
    pub(crate) async fn invalidate(&self) {
        self.state.lock().await.token = None;
    }

    fn join_or_start(&self, state: &mut CacheState) -> Refresh {
        if let Some(refresh) = &state.refresh {
            tracing::trace!("joining in-flight upstream token refresh");
            return refresh.clone();
        }
        let refresh = self.start_refresh();
        // Publish the refresh before anybody awaits it.
        state.refresh = Some(refresh.clone());
        refresh
    }

    fn start_refresh(&self) -> Refresh {
        let inner = self.inner.clone();
        let state = self.state.clone();
        async move {
            tracing::debug!("refreshing upstream token");
            let result = inner.token().await;

            // Settle the refresh inside the shared future. If the caller that
            // started it is cancelled, the next caller to poll a clone drives
            // the login to completion and clears the marker.
            let mut state = state.lock().await;
            state.refresh = None;
            match &result {
                Ok(token) => {
                    tracing::debug!(expires_at = ?token.expires_at, "upstream token refreshed");
                    state.token = Some(token.clone());
                }
                Err(e) => {
                    tracing::warn!("upstream token refresh failed: {e}");
                    state.token = None;
                }
            }
            result
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, GatewayError};
    use crate::token::tests::MockTokenProvider;
    use mockall::Sequence;
    use std::sync::Mutex as StdMutex;

    static TOKEN_VALID_DURATION: Duration = Duration::from_secs(82_800);
    static MARGIN: Duration = Duration::from_secs(600);

    fn token_expiring_in(token: &str, d: Duration) -> Token {
        Token {
            token: token.to_string(),
            expires_at: Some(Instant::now() + d),
        }
    }

    #[tokio::test]
    async fn initial_token_success() {
        let expected = Token {
            token: "test-token".to_string(),
            expires_at: None,
        };
        let expected_clone = expected.clone();

        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .return_once(|| Ok(expected_clone));

        let cache = TokenCache::new(mock, MARGIN);
        let actual = cache.token().await.unwrap();
        assert_eq!(actual, expected);

        // Verify that we use the cached token instead of making a new request
        // to the mock token provider.
        let actual = cache.token().await.unwrap();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn initial_token_failure() {
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(2)
            .returning(|| Err(GatewayError::from_msg(ErrorKind::UpstreamAuth, "fail")));

        let cache = TokenCache::new(mock, MARGIN);
        let err = cache.token().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamAuth, "{err}");

        // The failure is not cached, and the in-flight marker is cleared. The
        // next call makes a new request to the mock token provider.
        assert!(cache.token().await.is_err());
        assert!(cache.state.lock().await.refresh.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cached_until_margin() {
        let mut seq = Sequence::new();
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(token_expiring_in("abc", TOKEN_VALID_DURATION)));
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(token_expiring_in("def", TOKEN_VALID_DURATION)));

        let cache = TokenCache::new(mock, MARGIN);
        let actual = cache.token().await.unwrap();
        assert_eq!(actual.token, "abc");

        tokio::time::advance(Duration::from_secs(1)).await;
        let actual = cache.token().await.unwrap();
        assert_eq!(actual.token, "abc");

        // Just before the margin starts the cached token is still used.
        tokio::time::advance(TOKEN_VALID_DURATION - MARGIN - Duration::from_secs(2)).await;
        let actual = cache.token().await.unwrap();
        assert_eq!(actual.token, "abc");

        // 500 seconds before the expiry is inside the 600 second margin.
        tokio::time::advance(Duration::from_secs(101)).await;
        let actual = cache.token().await.unwrap();
        assert_eq!(actual.token, "def");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_success() {
        let now = Instant::now();

        let initial = Token {
            token: "initial-token".to_string(),
            expires_at: Some(now + TOKEN_VALID_DURATION),
        };
        let initial_clone = initial.clone();

        let refresh = Token {
            token: "refresh-token".to_string(),
            expires_at: Some(now + 2 * TOKEN_VALID_DURATION),
        };
        let refresh_clone = refresh.clone();

        let mut seq = Sequence::new();
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|| Ok(initial_clone));
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|| Ok(refresh_clone));

        // fetch an initial token
        let cache = TokenCache::new(mock, MARGIN);
        let actual = cache.token().await.unwrap();
        assert_eq!(actual, initial);

        // wait long enough for the token to be expired
        tokio::time::advance(TOKEN_VALID_DURATION).await;

        // make sure this is the new token
        let actual = cache.token().await.unwrap();
        assert_eq!(actual, refresh);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_failure() {
        let initial = token_expiring_in("initial-token", TOKEN_VALID_DURATION);
        let initial_clone = initial.clone();

        let mut seq = Sequence::new();
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|| Ok(initial_clone));
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|| Err(GatewayError::from_msg(ErrorKind::UpstreamAuth, "fail")));

        // fetch an initial token
        let cache = TokenCache::new(mock, MARGIN);
        let actual = cache.token().await.unwrap();
        assert_eq!(actual, initial);

        // wait long enough for the token to be expired
        tokio::time::advance(TOKEN_VALID_DURATION).await;

        // make sure we return the error, not the expired token
        assert!(cache.token().await.is_err());
        assert!(cache.state.lock().await.token.is_none());
    }

    #[tokio::test]
    async fn refresh_replaces_rejected_token() {
        let mut seq = Sequence::new();
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(token_expiring_in("abc", TOKEN_VALID_DURATION)));
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(token_expiring_in("def", TOKEN_VALID_DURATION)));

        let cache = TokenCache::new(mock, MARGIN);
        let rejected = cache.token().await.unwrap();
        assert_eq!(rejected.token, "abc");

        // The token is still valid by time, the refresh bypasses the check.
        let actual = cache.refresh(&rejected).await.unwrap();
        assert_eq!(actual.token, "def");
        let actual = cache.token().await.unwrap();
        assert_eq!(actual.token, "def");
    }

    #[tokio::test]
    async fn refresh_skips_login_when_already_replaced() {
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .returning(|| Ok(token_expiring_in("def", TOKEN_VALID_DURATION)));

        let cache = TokenCache::new(mock, MARGIN);
        let current = cache.token().await.unwrap();
        assert_eq!(current.token, "def");

        let stale = token_expiring_in("abc", TOKEN_VALID_DURATION);
        let actual = cache.refresh(&stale).await.unwrap();
        assert_eq!(actual, current);
    }

    #[tokio::test]
    async fn invalidate() {
        let mut seq = Sequence::new();
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(token_expiring_in("abc", TOKEN_VALID_DURATION)));
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(token_expiring_in("def", TOKEN_VALID_DURATION)));

        let cache = TokenCache::new(mock, MARGIN);
        assert_eq!(cache.token().await.unwrap().token, "abc");
        cache.invalidate().await;
        assert_eq!(cache.token().await.unwrap().token, "def");
    }

    #[derive(Clone, Debug)]
    struct FakeTokenProvider {
        fail: bool,
        calls: Arc<StdMutex<i32>>,
    }

    impl FakeTokenProvider {
        pub fn new(fail: bool) -> Self {
            FakeTokenProvider {
                fail,
                calls: Arc::new(StdMutex::new(0)),
            }
        }

        pub fn calls(&self) -> i32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl TokenProvider for FakeTokenProvider {
        async fn token(&self) -> Result<Token> {
            // Release a token periodically. We give enough time for the
            // waiters in a thundering herd to pile up.
            tokio::time::sleep(Duration::from_millis(50)).await;

            // Track how many calls were made to the inner token provider.
            let n = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };

            if self.fail {
                return Err(GatewayError::from_msg(
                    ErrorKind::UpstreamAuth,
                    format!("epic fail {n}"),
                ));
            }
            Ok(token_expiring_in(&format!("token-{n}"), TOKEN_VALID_DURATION))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn initial_token_thundering_herd_success() {
        let tp = FakeTokenProvider::new(false);
        let cache = TokenCache::new(tp.clone(), MARGIN);

        // Spawn N tasks, all asking for a token at once.
        let tasks = (0..100)
            .map(|_| {
                let cache_clone = cache.clone();
                tokio::spawn(async move { cache_clone.token().await })
            })
            .collect::<Vec<_>>();

        // Wait for the N token requests to complete, verifying the returned token.
        for task in tasks {
            let actual = task.await.unwrap();
            assert!(actual.is_ok(), "{}", actual.err().unwrap());
            assert_eq!(actual.unwrap().token, "token-1");
        }

        // Tasks that start after the refresh completes find a valid token in
        // the cache, so exactly one login is made regardless of timing.
        assert_eq!(tp.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_token_thundering_herd_failure_shares_error() {
        let tp = FakeTokenProvider::new(true);
        let cache = TokenCache::new(tp.clone(), MARGIN);

        // All the futures are polled before the login completes.
        let results = futures::future::join_all((0..100).map(|_| cache.token())).await;
        for actual in results {
            let e = actual.unwrap_err();
            assert_eq!(e.kind(), ErrorKind::UpstreamAuth, "{e}");
            assert!(format!("{e}").contains("epic fail 1"), "{e}");
        }
        assert_eq!(tp.calls(), 1);

        // The marker was cleared, the next call attempts a fresh login.
        let e = cache.token().await.unwrap_err();
        assert!(format!("{e}").contains("epic fail 2"), "{e}");
        assert_eq!(tp.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refresh_joins_in_flight_login() {
        let tp = FakeTokenProvider::new(false);
        let cache = TokenCache::new(tp.clone(), MARGIN);
        let rejected = token_expiring_in("rejected", TOKEN_VALID_DURATION);

        let (a, b, c) = tokio::join!(
            cache.token(),
            cache.refresh(&rejected),
            cache.refresh(&rejected)
        );
        assert_eq!(a.unwrap().token, "token-1");
        assert_eq!(b.unwrap().token, "token-1");
        assert_eq!(c.unwrap().token, "token-1");
        assert_eq!(tp.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_leader_does_not_strand_waiters() {
        let tp = FakeTokenProvider::new(false);
        let cache = TokenCache::new(tp.clone(), MARGIN);

        let leader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.token().await })
        };
        // Let the leader start the login, then cancel it mid-flight.
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        // The next caller drives the same login to completion.
        let actual = cache.token().await.unwrap();
        assert_eq!(actual.token, "token-1");
        assert_eq!(tp.calls(), 1);
        assert!(cache.state.lock().await.refresh.is_none());
    }
}
