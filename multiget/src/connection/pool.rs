//! Process-wide cache of idle connections.
//!
//! Connections are keyed by origin (`scheme://host:port`). A request borrows
//! one through a [`PoolGuard`], which hands it back when dropped. The pool
//! reuses an idle connection before creating a new one; new connections are
//! connected with a bounded number of attempts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rustls::ClientConfig;

use super::{Connection, ProxyTarget};
use crate::transport::default_client_config;
use crate::url::Endpoint;

/// Connection attempts made for a freshly created connection.
pub const DEFAULT_CONNECT_ATTEMPTS: usize = 5;

/// Cache of idle connections keyed by origin.
#[derive(Debug)]
pub struct ConnectionPool {
    idle: Mutex<HashMap<String, Vec<Connection>>>,
    connect_attempts: usize,
    tls_config: Arc<ClientConfig>,
    created: AtomicUsize,
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::with_connect_attempts(DEFAULT_CONNECT_ATTEMPTS)
    }

    /// Create an empty pool making `attempts` connection attempts (minimum 1).
    pub fn with_connect_attempts(attempts: usize) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            connect_attempts: attempts.max(1),
            tls_config: default_client_config(),
            created: AtomicUsize::new(0),
        }
    }

    /// Verify `https` origins of new connections against `config` instead
    /// of the Mozilla roots.
    pub fn with_tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls_config = config;
        self
    }

    /// The process-wide pool, created on first use.
    pub fn global() -> Arc<ConnectionPool> {
        static GLOBAL: OnceLock<Arc<ConnectionPool>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| {
                tracing::info!("initializing connection pool");
                Arc::new(ConnectionPool::new())
            })
            .clone()
    }

    /// Take an idle connection for the endpoint's origin, or build and
    /// connect a new one.
    ///
    /// If every connection attempt fails the unconnected connection is
    /// returned anyway; callers must check [`Connection::connected`].
    pub fn get(&self, endpoint: &Endpoint, proxy: Option<&ProxyTarget>) -> Connection {
        self.checkout(endpoint, proxy).0
    }

    /// Like [`get`](Self::get), also reporting whether the connection was
    /// reused from the pool.
    pub(crate) fn checkout(
        &self,
        endpoint: &Endpoint,
        proxy: Option<&ProxyTarget>,
    ) -> (Connection, bool) {
        if let Some(conn) = self.take_idle(&endpoint.origin_key(), proxy) {
            tracing::trace!(origin = %endpoint.origin_key(), "reusing pooled connection");
            return (conn, true);
        }
        (self.create(endpoint, proxy), false)
    }

    fn take_idle(&self, key: &str, proxy: Option<&ProxyTarget>) -> Option<Connection> {
        let mut idle = self.idle.lock();
        let queue = idle.get_mut(key)?;
        let index = queue.iter().rposition(|conn| conn.proxy() == proxy)?;
        Some(queue.swap_remove(index))
    }

    fn create(&self, endpoint: &Endpoint, proxy: Option<&ProxyTarget>) -> Connection {
        self.created.fetch_add(1, Ordering::Relaxed);
        let mut conn = Connection::new(endpoint, proxy.cloned(), &self.tls_config);

        for attempt in 1..=self.connect_attempts {
            match conn.connect() {
                Ok(()) => return conn,
                Err(e) => {
                    tracing::warn!(
                        origin = %endpoint.origin_key(),
                        attempt,
                        error = %e,
                        "connection attempt failed"
                    );
                }
            }
        }

        tracing::error!(
            host = %endpoint.host,
            attempts = self.connect_attempts,
            "connection to {} failed",
            endpoint.host
        );
        conn
    }

    /// Return a connection to the pool.
    ///
    /// Connections that are no longer connected are dropped instead.
    pub fn put(&self, endpoint: &Endpoint, conn: Connection) {
        self.put_key(endpoint.origin_key(), conn);
    }

    fn put_key(&self, key: String, conn: Connection) {
        if !conn.connected() {
            tracing::debug!(origin = %key, "discarding closed connection");
            return;
        }
        self.idle.lock().entry(key).or_default().push(conn);
    }

    /// Number of idle connections held for the endpoint's origin.
    pub fn idle_count(&self, endpoint: &Endpoint) -> usize {
        self.idle
            .lock()
            .get(&endpoint.origin_key())
            .map_or(0, Vec::len)
    }

    /// Number of idle connections across all origins.
    pub fn total_idle(&self) -> usize {
        self.idle.lock().values().map(Vec::len).sum()
    }

    /// Number of connections this pool has created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

/// Scoped borrow of one pooled connection.
///
/// The connection goes back to the pool when the guard is dropped or
/// [`release`](Self::release)d. A guard whose connection was
/// [`invalidate`](Self::invalidate)d returns nothing.
#[derive(Debug)]
pub struct PoolGuard {
    pool: Arc<ConnectionPool>,
    key: String,
    conn: Option<Connection>,
    reused: bool,
}

impl PoolGuard {
    /// Borrow a connection for `endpoint` from `pool`.
    pub fn acquire(
        pool: Arc<ConnectionPool>,
        endpoint: &Endpoint,
        proxy: Option<&ProxyTarget>,
    ) -> Self {
        let (conn, reused) = pool.checkout(endpoint, proxy);
        Self {
            pool,
            key: endpoint.origin_key(),
            conn: Some(conn),
            reused,
        }
    }

    /// The borrowed connection.
    pub fn connection(&mut self) -> Option<&mut Connection> {
        self.conn.as_mut()
    }

    /// Whether the borrowed connection is connected.
    pub fn connected(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::connected)
    }

    /// Whether the connection came from the idle pool rather than being
    /// created for this guard.
    pub fn reused(&self) -> bool {
        self.reused
    }

    /// Close the connection so it is not handed to anyone else.
    pub fn invalidate(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.disconnect();
        }
    }

    /// Return the connection to the pool now.
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_key(std::mem::take(&mut self.key), conn);
        }
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.give_back();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ok_response, Reply, TestServer};
    use std::net::TcpListener;

    #[test]
    fn test_global_is_shared() {
        let a = ConnectionPool::global();
        let b = ConnectionPool::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_guard_returns_connection_on_drop() {
        let server = TestServer::start(|_| Reply::keep_alive(ok_response(b"")));
        let pool = Arc::new(ConnectionPool::new());
        let endpoint = Endpoint::parse(&server.url("/")).unwrap();

        {
            let guard = PoolGuard::acquire(Arc::clone(&pool), &endpoint, None);
            assert!(guard.connected());
            assert!(!guard.reused());
            assert_eq!(pool.idle_count(&endpoint), 0);
        }
        assert_eq!(pool.idle_count(&endpoint), 1);

        let guard = PoolGuard::acquire(Arc::clone(&pool), &endpoint, None);
        assert!(guard.reused());
        assert_eq!(pool.idle_count(&endpoint), 0);
        guard.release();

        assert_eq!(pool.idle_count(&endpoint), 1);
        assert_eq!(pool.created(), 1);
        assert_eq!(server.accepted(), 1);
    }

    #[test]
    fn test_invalidated_connection_is_not_pooled() {
        let server = TestServer::start(|_| Reply::keep_alive(ok_response(b"")));
        let pool = Arc::new(ConnectionPool::new());
        let endpoint = Endpoint::parse(&server.url("/")).unwrap();

        let mut guard = PoolGuard::acquire(Arc::clone(&pool), &endpoint, None);
        guard.invalidate();
        drop(guard);

        assert_eq!(pool.idle_count(&endpoint), 0);
    }

    #[test]
    fn test_failed_connect_returns_unconnected_connection() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let pool = ConnectionPool::with_connect_attempts(2);
        let endpoint = Endpoint::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();

        let conn = pool.get(&endpoint, None);
        assert!(!conn.connected());

        pool.put(&endpoint, conn);
        assert_eq!(pool.total_idle(), 0);
    }

    #[test]
    fn test_proxy_mismatch_is_not_reused() {
        let server = TestServer::start(|_| Reply::keep_alive(ok_response(b"")));
        let pool = Arc::new(ConnectionPool::new());
        let endpoint = Endpoint::parse(&server.url("/")).unwrap();

        drop(PoolGuard::acquire(Arc::clone(&pool), &endpoint, None));
        assert_eq!(pool.idle_count(&endpoint), 1);

        let proxy = ProxyTarget::new("127.0.0.1", 1);
        let mut conn = pool.take_idle(&endpoint.origin_key(), Some(&proxy));
        assert!(conn.is_none());
        conn = pool.take_idle(&endpoint.origin_key(), None);
        assert!(conn.is_some());
    }

    #[test]
    fn test_connect_attempts_minimum() {
        let pool = ConnectionPool::with_connect_attempts(0);
        assert_eq!(pool.connect_attempts, 1);
    }
}
