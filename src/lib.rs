#![allow(clippy::doc_markdown)] // Allow technical terms like Kinesis, S3 in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Stream Ingest
//!
//! Checkpointed ingestion worker: a partitioned record stream in, two Parquet
//! datasets in object storage out.
//!
//! ## Overview
//!
//! Every invocation runs the same pipeline once:
//!
//! 1. Resolve the stream and bucket names from configuration and a secret document.
//! 2. Enumerate the stream's partitions and read each one from its checkpointed
//!    position to the current head.
//! 3. Persist the advanced checkpoint, once, before anything downstream runs.
//! 4. Project every record into an order row and an optional creator row.
//! 5. Write each non-empty dataset as a single Parquet object.
//!
//! A run that finds no new records writes nothing and leaves the checkpoint
//! untouched. Malformed records are dropped and counted; they never fail a run.
//!
//! ## Module Organization
//!
//! - [`stream`] - Stream client traits, partition enumeration and paged readers
//! - [`checkpoint`] - Checkpoint persistence
//! - [`consumer`] - The per-run consumer coordinator
//! - [`transform`] - Record to row projection
//! - [`sink`] - Parquet encoding and object upload
//! - [`handler`] - The invocation entry point and backend wiring
//! - [`publish`] - Replaying an exported collection onto a stream
//! - [`config`] - Layered configuration and per-run settings
//! - [`state_machine`] - Run and partition lifecycles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stream_ingest::config::ConfigLoader;
//! use stream_ingest::handler::{Backends, IngestionHandler, InvocationEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! let backends = Backends::from_config(&config).await?;
//! let handler = IngestionHandler::new(config, backends);
//!
//! let result = handler.invoke(InvocationEvent::default()).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! In-memory stream, secret, checkpoint and object stores are provided for
//! tests; the local backends run the whole pipeline against a directory:
//!
//! ```bash
//! cargo test                 # Unit and integration tests
//! cargo test --features aws  # Include the AWS backends in the build
//! ```

pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod handler;
pub mod logging;
pub mod models;
pub mod publish;
pub mod secrets;
pub mod sink;
pub mod state_machine;
pub mod stream;
pub mod transform;

pub use checkpoint::{CheckpointError, CheckpointStore};
pub use config::{ConfigLoader, IngestConfig, PipelineSettings};
pub use consumer::{ConsumedBatch, ConsumerCoordinator, PartitionOutcome};
pub use error::{ErrorKind, IngestError, IngestResult};
pub use handler::{Backends, IngestionHandler, InvocationEvent};
pub use models::{
    Checkpoint, CheckpointKey, CreatorRow, OrderRow, RawRecord, ReadCursor, RunResult, RunSummary,
    StreamPartition,
};
pub use publish::{PublishSummary, Publisher};
pub use sink::{Dataset, DatasetSink, ObjectLocation, ObjectStore};
pub use stream::{StreamClient, StreamWriter};
pub use transform::{transform, transform_batch, TransformedBatch};
