//! sqlscale-postgres — a scaler driven by a scalar PostgreSQL query.
//!
//! The trigger runs one configured statement per poll, reports its result
//! as a milli-encoded external metric, and marks the workload active when
//! the result exceeds the activation target.
//!
//! # Architecture
//!
//! ```text
//! PostgresScaler (lifecycle: construct → poll → close)
//!   ├── parse_postgres_metadata()   ScalerConfig → PostgresMetadata
//!   ├── open_verified()             Connector::open + ping, failure-atomic
//!   │     └── PgConnector / PgHandle (sqlx, lazy single-connection pool)
//!   ├── execute()                   one query, bounded by CallContext
//!   └── is_active()                 sample > activation target
//! ```
//!
//! # Trigger metadata
//!
//! | Key | Namespace | Notes |
//! |---|---|---|
//! | `query` | trigger | required |
//! | `targetQueryValue` | trigger | required float |
//! | `activationTargetQueryValue` | trigger | float, default 0 |
//! | `connection` | auth | full descriptor, highest precedence |
//! | `connectionFromEnv` | trigger | env variable holding a descriptor |
//! | `host`, `port`, `userName`, `dbName`, `sslmode` | auth or trigger | required without a descriptor |
//! | `password` / `passwordFromEnv` | auth / trigger | optional |
//! | `metricName` | trigger | suffix of the advertised name |

pub mod activation;
pub mod connection;
pub mod dsn;
pub mod metadata;
pub mod postgres;
pub mod query;
pub mod sample;
pub mod scaler;

pub use connection::{Connection, Connector, open_verified};
pub use metadata::{ConnectionFields, ConnectionSource, PostgresMetadata, parse_postgres_metadata};
pub use postgres::{PgConnector, PgHandle};
pub use sample::Sample;
pub use scaler::PostgresScaler;
