//! Aggregate create, read and delete.
//!
//! Reads fan out to the three services concurrently and join; writes fan out
//! as events and join on the channel's acknowledgements, never on downstream
//! processing.

use crate::integration::DownstreamClient;
use crate::publisher::PendingPublish;
use catalog_composite_core::catalog::ReadOptions;
use catalog_composite_core::error::CompositeError;
use catalog_composite_core::model::{AggregateSpec, AggregateView, ItemId, MIN_ITEM_ID};
use futures::future::try_join_all;

/// Highest accepted `faultPercent`.
pub const MAX_FAULT_PERCENT: u32 = 100;

/// Composes the dependent services into aggregates.
#[derive(Clone)]
pub struct Aggregator {
    client: DownstreamClient,
}

impl Aggregator {
    /// Create an aggregator.
    #[must_use]
    pub const fn new(client: DownstreamClient) -> Self {
        Self { client }
    }

    /// The downstream client.
    #[must_use]
    pub const fn client(&self) -> &DownstreamClient {
        &self.client
    }

    /// Publish one item, its ratings and its commentary.
    ///
    /// Every event is queued, in order, before any acknowledgement is awaited.
    ///
    /// # Errors
    ///
    /// - [`CompositeError::InvalidInput`] if the id is below 1
    /// - [`CompositeError::EventSubmission`] if any event could not be queued
    ///   or was refused by the channel
    pub async fn create_aggregate(&self, spec: &AggregateSpec) -> Result<(), CompositeError> {
        validate_id(spec.id)?;
        tracing::debug!(item_id = spec.id, "Creating aggregate");

        let mut pending = Vec::with_capacity(1 + spec.ratings.len() + spec.commentary.len());
        pending.push(self.client.create_item(spec.item())?);
        for rating in spec.rating_records() {
            pending.push(self.client.create_rating(rating)?);
        }
        for commentary in spec.commentary_records() {
            pending.push(self.client.create_commentary(commentary)?);
        }

        let events = pending.len();
        await_all(pending).await.inspect_err(|e| {
            tracing::warn!(item_id = spec.id, error = %e, "Create aggregate failed");
        })?;

        tracing::info!(item_id = spec.id, events, "Aggregate creation published");
        Ok(())
    }

    /// Read an item with its ratings and commentary.
    ///
    /// # Errors
    ///
    /// - [`CompositeError::InvalidInput`] for an id below 1 or a
    ///   `fault_percent` above 100
    /// - any error of the item read; ratings and commentary never fail
    pub async fn get_aggregate(
        &self,
        id: ItemId,
        options: &ReadOptions,
    ) -> Result<AggregateView, CompositeError> {
        validate_id(id)?;
        if options.fault_percent > MAX_FAULT_PERCENT {
            return Err(CompositeError::InvalidInput(format!(
                "Invalid faultPercent: {}",
                options.fault_percent
            )));
        }
        tracing::info!(item_id = id, "Getting aggregate");

        let (item, ratings, commentary) = tokio::join!(
            self.client.fetch_primary(id, options),
            self.client.fetch_ratings(id, options),
            self.client.fetch_commentary(id, options),
        );
        let item = item.inspect_err(|e| {
            tracing::warn!(item_id = id, error = %e, "Get aggregate failed");
        })?;

        Ok(AggregateView::assemble(
            item,
            &ratings,
            &commentary,
            self.client.composite_address(),
        ))
    }

    /// Publish deletion of the item, its ratings and its commentary.
    ///
    /// Deleting an aggregate that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// - [`CompositeError::InvalidInput`] if the id is below 1
    /// - [`CompositeError::EventSubmission`] if any event could not be queued
    ///   or was refused by the channel
    pub async fn delete_aggregate(&self, id: ItemId) -> Result<(), CompositeError> {
        validate_id(id)?;
        tracing::debug!(item_id = id, "Deleting aggregate");

        let pending = vec![
            self.client.delete_item(id)?,
            self.client.delete_ratings(id)?,
            self.client.delete_commentary(id)?,
        ];
        await_all(pending).await.inspect_err(|e| {
            tracing::warn!(item_id = id, error = %e, "Delete aggregate failed");
        })?;

        tracing::info!(item_id = id, "Aggregate deletion published");
        Ok(())
    }
}

fn validate_id(id: ItemId) -> Result<(), CompositeError> {
    if id < MIN_ITEM_ID {
        return Err(CompositeError::InvalidInput(format!("Invalid itemId: {id}")));
    }
    Ok(())
}

async fn await_all(pending: Vec<PendingPublish>) -> Result<(), CompositeError> {
    try_join_all(pending.into_iter().map(PendingPublish::accepted))
        .await
        .map(|_| ())
}
