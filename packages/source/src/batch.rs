//! Bounded accumulation of measurements between ingestion calls.

use velocity_db_source_models::{IngestError, Measurement};

/// Number of measurements that triggers a flush to the ingestion sink.
pub const INGESTION_BATCH_SIZE: usize = 5000;

/// Accumulates measurements for one parse and hands them to the ingestion
/// sink in batches.
///
/// The sink is borrowed for the duration of the parse and receives one slice
/// per flush. It is never called with an empty slice.
pub struct MeasurementBatch<'a, F> {
    measurements: Vec<Measurement>,
    ingest: &'a mut F,
    flushes: u64,
}

impl<'a, F> MeasurementBatch<'a, F>
where
    F: FnMut(&[Measurement]) -> Result<(), IngestError>,
{
    #[must_use]
    pub fn new(ingest: &'a mut F) -> Self {
        Self {
            measurements: Vec::with_capacity(INGESTION_BATCH_SIZE),
            ingest,
            flushes: 0,
        }
    }

    pub fn push(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Number of times the sink has been called.
    #[must_use]
    pub const fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Flushes if the batch has reached [`INGESTION_BATCH_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns the sink's error if it fails to persist the batch.
    pub fn flush_if_full(&mut self) -> Result<(), IngestError> {
        if self.measurements.len() >= INGESTION_BATCH_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    /// Hands the accumulated measurements to the sink and clears the batch.
    /// Does nothing when the batch is empty.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if it fails to persist the batch.
    pub fn flush(&mut self) -> Result<(), IngestError> {
        if self.measurements.is_empty() {
            return Ok(());
        }

        log::debug!("Ingesting batch of {} measurements", self.measurements.len());

        (self.ingest)(&self.measurements)?;
        self.measurements.clear();
        self.flushes += 1;

        Ok(())
    }
}
