//! # stayrank server library
//!
//! Server core of the hotel-discovery/review system: a non-blocking framed
//! request/response protocol server, a periodically re-run ranking engine,
//! and a dual-channel change-notification fan-out.
//!
//! ## Architecture
//!
//! ### Request path
//! The accept loop (`network`) owns the listener and spawns a reader and a
//! writer task per connection (`connection`). The reader reassembles
//! frames from arbitrary chunk boundaries, decodes each request, and hands
//! it to the connection's dispatcher (`dispatcher`); the writer drains the
//! outbound queue, resuming partial writes. A connection's requests are
//! dispatched strictly in arrival order, so its responses come back in the
//! same order; different connections run concurrently on the runtime's
//! worker threads.
//!
//! ### Shared state
//! Hotels, users and reviews live in independently locked registries
//! (`registry`); the global logged-in set lives in `session`. Everything
//! is constructed once in `main` and passed around as `Arc` handles, so
//! tests can build the same services in isolation. Reads that feed longer
//! computations snapshot under the lock and work on the copy.
//!
//! ### Ranking and notifications
//! A long-lived background task (`ranking`) recomputes every reviewed
//! hotel's global score on a fixed interval, re-derives per-city local
//! ranks, persists the registry and diffs each city against the previous
//! cycle's snapshot. Changes fan out over two independent paths
//! (`notify`): a best-effort multicast datagram when a city's top hotel
//! changes, and per-subscriber delivery of the full new ordering when the
//! ordering changes at all. A subscriber whose delivery fails is dropped
//! after the fan-out completes.
//!
//! ### Persistence
//! Registries are saved as JSON snapshots (`persistence`) after every
//! mutating operation and after every ranking cycle. Saving never fails
//! the operation that triggered it; loading happens once at startup, where
//! a missing or malformed hotels snapshot aborts the process.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod network;
pub mod notify;
pub mod persistence;
pub mod ranking;
pub mod registry;
pub mod session;
